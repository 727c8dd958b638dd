//! Static catalog of USCIS and EOIR forms.
//!
//! Read-only lookup table: given a form number, return its metadata or nothing.

pub mod urls;

use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use urls::{ArtifactKind, SourceEndpoints, TransferRequest};

/// Where a form is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormSource {
    /// `https://www.uscis.gov/sites/default/files/document/forms/{form}.pdf`
    Uscis,
    /// `https://www.justice.gov/eoir/file/{id}/download`
    Eoir,
    Other,
}

impl std::fmt::Display for FormSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormSource::Uscis => write!(f, "USCIS"),
            FormSource::Eoir => write!(f, "EOIR"),
            FormSource::Other => write!(f, "Other"),
        }
    }
}

impl FromStr for FormSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uscis" => Ok(FormSource::Uscis),
            "eoir" => Ok(FormSource::Eoir),
            "other" => Ok(FormSource::Other),
            _ => Err(ConfigError::InvalidSource(s.to_string())),
        }
    }
}

/// A catalog entry identifying one retrievable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInfo {
    /// Form number, e.g. `I-130`
    pub form_number: String,
    pub display_name: String,
    pub source: FormSource,
    pub notes: Option<String>,
}

impl FormInfo {
    pub fn new(form_number: &str, display_name: &str, source: FormSource) -> Self {
        Self {
            form_number: form_number.to_string(),
            display_name: display_name.to_string(),
            source,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

type Entry = (&'static str, &'static str, FormSource, Option<&'static str>);

const FORMS: &[Entry] = &[
    // USCIS I-Forms
    ("I-90", "Application to Replace Permanent Resident Card", FormSource::Uscis, None),
    ("I-102", "Application for Replacement/Initial Nonimmigrant Arrival-Departure Record", FormSource::Uscis, None),
    ("I-129F", "Petition for Alien Fiancé(e)", FormSource::Uscis, None),
    ("I-130", "Petition for Alien Relative", FormSource::Uscis, None),
    ("I-130A", "Supplemental Information for Spouse Beneficiary", FormSource::Uscis, None),
    ("I-131", "Application for Travel Document", FormSource::Uscis, None),
    ("I-131A", "Application for Travel Document (Carrier Documentation)", FormSource::Uscis, None),
    ("I-192", "Application for Advance Permission to Enter as Nonimmigrant", FormSource::Uscis, None),
    ("I-212", "Application for Permission to Reapply for Admission", FormSource::Uscis, None),
    ("I-246", "Application for Stay of Deportation or Removal", FormSource::Uscis, None),
    ("I-290B", "Notice of Appeal or Motion", FormSource::Uscis, None),
    ("I-360", "Petition for Amerasian, Widow(er), or Special Immigrant", FormSource::Uscis, None),
    ("I-485", "Application to Register Permanent Residence or Adjust Status", FormSource::Uscis, None),
    ("I-539", "Application to Extend/Change Nonimmigrant Status", FormSource::Uscis, None),
    ("I-589", "Application for Asylum and for Withholding of Removal", FormSource::Uscis, None),
    ("I-601", "Application for Waiver of Grounds of Inadmissibility", FormSource::Uscis, None),
    ("I-601A", "Application for Provisional Unlawful Presence Waiver", FormSource::Uscis, None),
    ("I-639", "Application for Waiver (Ineligibility Based on Health)", FormSource::Uscis, None),
    ("I-730", "Refugee/Asylee Relative Petition", FormSource::Uscis, None),
    ("I-751", "Petition to Remove Conditions on Residence", FormSource::Uscis, None),
    ("I-765", "Application for Employment Authorization", FormSource::Uscis, None),
    ("I-765WS", "I-765 Worksheet", FormSource::Uscis, None),
    ("I-821", "Application for Temporary Protected Status", FormSource::Uscis, None),
    ("I-821D", "Consideration of Deferred Action for Childhood Arrivals", FormSource::Uscis, None),
    ("I-824", "Application for Action on an Approved Application or Petition", FormSource::Uscis, None),
    ("I-864", "Affidavit of Support Under Section 213A of the INA", FormSource::Uscis, None),
    ("I-881", "Application for Suspension of Deportation or Special Rule Cancellation", FormSource::Uscis, None),
    ("I-912", "Request for Fee Waiver", FormSource::Uscis, None),
    ("I-914", "Application for T Nonimmigrant Status", FormSource::Uscis, None),
    ("I-914A", "Supplement A to Form I-914", FormSource::Uscis, Some("Also known as I-914 Supplement A")),
    ("I-918", "Petition for U Nonimmigrant Status", FormSource::Uscis, None),
    ("I-918A", "Supplement A to Form I-918", FormSource::Uscis, Some("Petition for Qualifying Family Member")),
    ("I-918B", "Supplement B to Form I-918", FormSource::Uscis, Some("U Nonimmigrant Status Certification")),
    // USCIS N-Forms
    ("N-336", "Request for Hearing on Decision in Naturalization Proceedings", FormSource::Uscis, None),
    ("N-400", "Application for Naturalization", FormSource::Uscis, None),
    ("N-565", "Application for Replacement Naturalization/Citizenship Document", FormSource::Uscis, None),
    ("N-600", "Application for Certificate of Citizenship", FormSource::Uscis, None),
    ("N-648", "Medical Certification for Disability Exceptions", FormSource::Uscis, None),
    // USCIS G-Forms
    ("G-28", "Notice of Entry of Appearance as Attorney or Accredited Representative", FormSource::Uscis, None),
    ("G-325A", "Biographic Information", FormSource::Uscis, None),
    // USCIS AR-Forms
    ("AR-11", "Alien's Change of Address Card", FormSource::Uscis, None),
    // EOIR (Department of Justice)
    ("EOIR-26", "Notice of Appeal from a Decision of an Immigration Judge", FormSource::Eoir, None),
    ("EOIR-27", "Notice of Entry of Appearance as Attorney or Representative Before the BIA", FormSource::Eoir, None),
    ("EOIR-28", "Notice of Entry of Appearance as Attorney or Representative Before the Immigration Court", FormSource::Eoir, None),
    ("EOIR-33", "Change of Address Form/Immigration Court", FormSource::Eoir, None),
    ("EOIR-42A", "Application for Cancellation of Removal for Certain Permanent Residents", FormSource::Eoir, None),
    ("EOIR-42B", "Application for Cancellation of Removal for Certain Nonpermanent Residents", FormSource::Eoir, None),
    ("EOIR-59", "Request for Telephonic/Video Conference Appearance", FormSource::Eoir, None),
    ("EOIR-60", "Application for Temporary Admission", FormSource::Eoir, None),
    ("EOIR-61", "Motion to Reopen/Reconsider", FormSource::Eoir, None),
];

static CATALOG: LazyLock<Vec<FormInfo>> = LazyLock::new(|| {
    FORMS
        .iter()
        .map(|(number, name, source, notes)| FormInfo {
            form_number: number.to_string(),
            display_name: name.to_string(),
            source: *source,
            notes: notes.map(str::to_string),
        })
        .collect()
});

/// All known forms, in catalog order.
pub fn all_forms() -> &'static [FormInfo] {
    &CATALOG
}

/// Find a form by number (case-insensitive).
pub fn find_form(form_number: &str) -> Option<&'static FormInfo> {
    let wanted = form_number.trim();
    CATALOG
        .iter()
        .find(|f| f.form_number.eq_ignore_ascii_case(wanted))
}

/// Forms published by `source`, or every form when no filter is given.
pub fn forms_for(source: Option<FormSource>) -> Vec<FormInfo> {
    CATALOG
        .iter()
        .filter(|f| source.map_or(true, |s| f.source == s))
        .cloned()
        .collect()
}

/// Resolve a user-supplied selection into catalog entries.
///
/// Explicit form numbers win over the source filter; an unknown number is a
/// configuration error so nothing is fetched for a half-valid selection.
/// An empty selection with no filter returns an empty list.
pub fn select_forms(
    numbers: &[String],
    source: Option<FormSource>,
    all: bool,
) -> Result<Vec<FormInfo>, ConfigError> {
    if !numbers.is_empty() {
        return numbers
            .iter()
            .map(|n| {
                find_form(n)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownForm(n.clone()))
            })
            .collect();
    }

    if all || source.is_some() {
        return Ok(forms_for(source));
    }

    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_form_case_insensitive() {
        let upper = find_form("I-130").unwrap();
        let lower = find_form("i-130").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.display_name, "Petition for Alien Relative");

        assert_eq!(find_form("eoir-42b").unwrap().form_number, "EOIR-42B");
        assert_eq!(find_form(" n-400 ").unwrap().form_number, "N-400");
    }

    #[test]
    fn test_find_form_unknown() {
        assert!(find_form("I-999").is_none());
        assert!(find_form("").is_none());
        assert!(find_form("I-13").is_none());
    }

    #[test]
    fn test_form_numbers_are_unique_ignoring_case() {
        for form in all_forms() {
            let matches = all_forms()
                .iter()
                .filter(|f| f.form_number.eq_ignore_ascii_case(&form.form_number))
                .count();
            assert_eq!(matches, 1, "duplicate entry for {}", form.form_number);
        }
    }

    #[test]
    fn test_notes_preserved() {
        let form = find_form("I-918B").unwrap();
        assert_eq!(
            form.notes.as_deref(),
            Some("U Nonimmigrant Status Certification")
        );
        assert!(find_form("I-130").unwrap().notes.is_none());
    }

    #[test]
    fn test_source_filter_parsing() {
        assert_eq!("USCIS".parse::<FormSource>().unwrap(), FormSource::Uscis);
        assert_eq!("eoir".parse::<FormSource>().unwrap(), FormSource::Eoir);
        assert_eq!(" Other ".parse::<FormSource>().unwrap(), FormSource::Other);

        let err = "dhs".parse::<FormSource>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSource(ref s) if s == "dhs"));
    }

    #[test]
    fn test_forms_for_source() {
        let eoir = forms_for(Some(FormSource::Eoir));
        assert_eq!(eoir.len(), 9);
        assert!(eoir.iter().all(|f| f.source == FormSource::Eoir));

        assert!(forms_for(Some(FormSource::Other)).is_empty());
        assert_eq!(forms_for(None).len(), all_forms().len());
    }

    #[test]
    fn test_select_forms() {
        let picked = select_forms(&["i-765".to_string(), "EOIR-26".to_string()], None, false)
            .unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].form_number, "I-765");
        assert_eq!(picked[1].form_number, "EOIR-26");

        let err = select_forms(&["I-765".to_string(), "X-9".to_string()], None, false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownForm(ref s) if s == "X-9"));

        assert!(select_forms(&[], None, false).unwrap().is_empty());
        assert_eq!(select_forms(&[], None, true).unwrap().len(), all_forms().len());
        // A filter that matches nothing is not an error
        assert!(select_forms(&[], Some(FormSource::Other), false)
            .unwrap()
            .is_empty());
    }
}

//! Download locations for catalog forms.
//!
//! Pure functions of (form number, source, endpoints): no I/O, no state.

use serde::{Deserialize, Serialize};

use super::{FormInfo, FormSource};
use crate::error::ConfigError;

pub const USCIS_FORMS_BASE: &str = "https://www.uscis.gov/sites/default/files/document/forms";
pub const EOIR_FILES_BASE: &str = "https://www.justice.gov/eoir/file";

/// Base URLs for each publishing source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceEndpoints {
    pub uscis_base: String,
    pub eoir_base: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            uscis_base: USCIS_FORMS_BASE.to_string(),
            eoir_base: EOIR_FILES_BASE.to_string(),
        }
    }
}

/// Which file of a form is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Form,
    Instructions,
}

/// A resolved fetch: where to GET and what to call the result locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    pub file_name: String,
    pub kind: ArtifactKind,
}

/// Download URL for a form, or `None` when its source has no known pattern.
pub fn form_url(form_number: &str, source: FormSource, endpoints: &SourceEndpoints) -> Option<String> {
    let lower = form_number.to_ascii_lowercase();
    match source {
        FormSource::Uscis => Some(format!("{}/{}.pdf", trim(&endpoints.uscis_base), lower)),
        // EOIR ids drop the dash: EOIR-42A -> eoir42a
        FormSource::Eoir => Some(format!(
            "{}/{}/download",
            trim(&endpoints.eoir_base),
            lower.replace('-', "")
        )),
        FormSource::Other => None,
    }
}

/// Instructions URL. Only USCIS publishes separate instructions.
pub fn instructions_url(
    form_number: &str,
    source: FormSource,
    endpoints: &SourceEndpoints,
) -> Option<String> {
    match source {
        FormSource::Uscis => Some(format!(
            "{}/{}instr.pdf",
            trim(&endpoints.uscis_base),
            form_number.to_ascii_lowercase()
        )),
        FormSource::Eoir | FormSource::Other => None,
    }
}

/// Primary transfer for a form.
pub fn form_request(form: &FormInfo, endpoints: &SourceEndpoints) -> Result<TransferRequest, ConfigError> {
    let url = form_url(&form.form_number, form.source, endpoints).ok_or_else(|| {
        ConfigError::NoUrlPattern {
            form: form.form_number.clone(),
            source_name: form.source.to_string(),
        }
    })?;

    Ok(TransferRequest {
        url,
        file_name: format!("{}.pdf", form.form_number),
        kind: ArtifactKind::Form,
    })
}

/// Secondary instructions transfer, if the form's source has one.
pub fn instructions_request(form: &FormInfo, endpoints: &SourceEndpoints) -> Option<TransferRequest> {
    instructions_url(&form.form_number, form.source, endpoints).map(|url| TransferRequest {
        url,
        file_name: format!("{}_instructions.pdf", form.form_number),
        kind: ArtifactKind::Instructions,
    })
}

fn trim(base: &str) -> &str {
    base.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_form;

    #[test]
    fn test_uscis_urls() {
        let endpoints = SourceEndpoints::default();
        assert_eq!(
            form_url("I-130", FormSource::Uscis, &endpoints).unwrap(),
            "https://www.uscis.gov/sites/default/files/document/forms/i-130.pdf"
        );
        assert_eq!(
            instructions_url("I-130", FormSource::Uscis, &endpoints).unwrap(),
            "https://www.uscis.gov/sites/default/files/document/forms/i-130instr.pdf"
        );
    }

    #[test]
    fn test_eoir_urls() {
        let endpoints = SourceEndpoints::default();
        assert_eq!(
            form_url("EOIR-42A", FormSource::Eoir, &endpoints).unwrap(),
            "https://www.justice.gov/eoir/file/eoir42a/download"
        );
        assert!(instructions_url("EOIR-42A", FormSource::Eoir, &endpoints).is_none());
    }

    #[test]
    fn test_other_source_has_no_pattern() {
        let form = FormInfo::new("X-1", "Mystery form", FormSource::Other);
        let err = form_request(&form, &SourceEndpoints::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoUrlPattern { ref form, .. } if form == "X-1"));
        assert!(instructions_request(&form, &SourceEndpoints::default()).is_none());
    }

    #[test]
    fn test_url_derivation_is_pure() {
        let endpoints = SourceEndpoints::default();
        let form = find_form("I-765").unwrap();

        let first = form_request(form, &endpoints).unwrap();
        // Interleave other lookups; nothing carries over
        let _ = form_request(find_form("EOIR-26").unwrap(), &endpoints).unwrap();
        let _ = instructions_request(find_form("N-400").unwrap(), &endpoints);
        let second = form_request(form, &endpoints).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.file_name, "I-765.pdf");
        assert_eq!(first.kind, ArtifactKind::Form);
    }

    #[test]
    fn test_custom_endpoints() {
        let endpoints = SourceEndpoints {
            uscis_base: "http://127.0.0.1:9000/uscis/".to_string(),
            eoir_base: "http://127.0.0.1:9000/eoir".to_string(),
        };
        let form = FormInfo::new("X-1", "Test form", FormSource::Uscis);

        let primary = form_request(&form, &endpoints).unwrap();
        assert_eq!(primary.url, "http://127.0.0.1:9000/uscis/x-1.pdf");

        let secondary = instructions_request(&form, &endpoints).unwrap();
        assert_eq!(secondary.url, "http://127.0.0.1:9000/uscis/x-1instr.pdf");
        assert_eq!(secondary.file_name, "X-1_instructions.pdf");
        assert_eq!(secondary.kind, ArtifactKind::Instructions);
    }
}

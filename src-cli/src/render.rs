//! Terminal output: progress lines, catalog table, summaries.

use std::fmt::Write;

use formschema_core::batch::{BatchOutcome, InstructionsOutcome, ItemStatus};
use formschema_core::catalog::ArtifactKind;
use formschema_core::{EventEmitter, FormInfo, PipelineEvent, SchemaReport};

/// Prints pipeline events to stderr as they happen.
pub struct TerminalEmitter {
    /// Print every status check (noisy with several items in flight)
    show_polls: bool,
}

impl TerminalEmitter {
    pub fn single() -> Self {
        Self { show_polls: true }
    }

    pub fn batch() -> Self {
        Self { show_polls: false }
    }
}

impl EventEmitter for TerminalEmitter {
    fn emit(&self, event: PipelineEvent) {
        if let Some(line) = progress_line(&event, self.show_polls) {
            eprintln!("{}", line);
        }
    }
}

fn progress_line(event: &PipelineEvent, show_polls: bool) -> Option<String> {
    let line = match event {
        PipelineEvent::TransferStarted { form, kind, .. } => match kind {
            ArtifactKind::Form => format!("Downloading {}...", form),
            ArtifactKind::Instructions => format!("Downloading {} instructions...", form),
        },
        PipelineEvent::TransferCompleted { .. } => return None,
        PipelineEvent::TransferFailed { form, error } => {
            format!("Download of {} failed: {}", form, error)
        }
        PipelineEvent::InstructionsUnavailable { form, reason } => {
            format!("  {}: instructions unavailable ({})", form, reason)
        }
        PipelineEvent::Uploaded { source, file_id } => {
            format!("Uploaded {} (file ID: {})", source, file_id)
        }
        PipelineEvent::JobStarted { source, run_id } => {
            format!("Extracting schema for {} (run ID: {})", source, run_id)
        }
        PipelineEvent::StatusChecked {
            attempt, status, ..
        } => {
            if !show_polls {
                return None;
            }
            format!("  check {}: {}", attempt, status)
        }
        PipelineEvent::SchemaSaved {
            source,
            field_count,
            ..
        } => format!("Schema for {}: {} fields", source, field_count),
        PipelineEvent::ItemFinished {
            form,
            succeeded,
            processed,
            total,
        } => format!(
            "[{}/{}] {} {}",
            processed,
            total,
            form,
            if *succeeded { "done" } else { "FAILED" }
        ),
    };
    Some(line)
}

/// Catalog listing, one form per line.
pub fn catalog_table(forms: &[FormInfo]) -> String {
    let width = forms
        .iter()
        .map(|f| f.form_number.len())
        .max()
        .unwrap_or(0)
        .max("FORM".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:<6}  NAME", "FORM", "SOURCE", width = width);
    for form in forms {
        let _ = write!(
            out,
            "{:<width$}  {:<6}  {}",
            form.form_number,
            form.source.to_string(),
            form.display_name,
            width = width
        );
        if let Some(notes) = &form.notes {
            let _ = write!(out, " ({})", notes);
        }
        out.push('\n');
    }
    let _ = writeln!(out, "\n{} forms", forms.len());
    out
}

/// Single-document result, as printed by `generate`.
pub fn schema_report(report: &SchemaReport) -> String {
    format!(
        "Schema generated: {} fields\n  Output: {}\n  File ID: {}\n  Run ID: {}\n",
        report.field_count(),
        report.output_path.display(),
        report.handle.file_id,
        report.handle.run_id
    )
}

/// Per-item results followed by the totals.
pub fn batch_summary(outcome: &BatchOutcome) -> String {
    let mut out = String::new();

    for item in &outcome.items {
        match &item.status {
            ItemStatus::Succeeded {
                bytes,
                path,
                instructions,
                field_count,
            } => {
                let _ = write!(out, "  ok      {:<10} {}", item.form_number, path.display());
                match field_count {
                    Some(n) => {
                        let _ = write!(out, " ({} fields)", n);
                    }
                    None => {
                        let _ = write!(out, " ({} bytes)", bytes);
                    }
                }
                out.push('\n');

                match instructions {
                    InstructionsOutcome::Saved { path, .. } => {
                        let _ = writeln!(out, "          instructions: {}", path.display());
                    }
                    InstructionsOutcome::Unavailable { reason } => {
                        let _ = writeln!(out, "          instructions unavailable: {}", reason);
                    }
                    InstructionsOutcome::NotRequested | InstructionsOutcome::NotPublished => {}
                }
            }
            ItemStatus::Failed { stage, error } => {
                let _ = writeln!(
                    out,
                    "  FAILED  {:<10} [{}] {}",
                    item.form_number, stage, error
                );
            }
        }
    }

    let _ = write!(
        out,
        "\nSucceeded: {}  Failed: {}",
        outcome.succeeded, outcome.failed
    );
    if outcome.skipped() > 0 {
        let _ = write!(out, "  Skipped: {}", outcome.skipped());
    }
    let elapsed = outcome.elapsed().num_milliseconds() as f64 / 1000.0;
    let _ = writeln!(out, "  ({:.1}s)", elapsed);
    if outcome.cancelled {
        out.push_str("Cancelled before all forms were processed\n");
    }
    out
}

//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats. Sensitive values are
//! always redacted.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::plans::{Action, ChangeSet, ChangeSummary};
use crate::state::StateSnapshot;
use crate::value::Value;
use crate::walker::WalkResult;

use super::commands::OutputFormat;

/// Placeholder shown instead of a sensitive value.
pub const REDACTED: &str = "(sensitive value)";

const MAX_VALUE_WIDTH: usize = 48;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Planned change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Output")]
    address: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
}

/// Stored output row for table display.
#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Output")]
    address: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan walk and the changes it recorded.
    #[must_use]
    pub fn format_plan(&self, changes: &ChangeSet, result: &WalkResult) -> String {
        match self.format {
            OutputFormat::Json => to_json(&PlanJson::new(changes, result)),
            OutputFormat::Text => Self::format_plan_text(changes, result),
        }
    }

    fn format_plan_text(changes: &ChangeSet, result: &WalkResult) -> String {
        let mut output = format!("\nPlan {}\n\n", changes.id().to_string().dimmed());

        let rows: Vec<ChangeRow> = ChangeJson::collect(changes)
            .into_iter()
            .filter(|c| c.action != Action::NoOp)
            .map(|c| ChangeRow {
                action: Self::format_action(c.action),
                address: c.address,
                before: c.before,
                after: c.after,
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let summary = changes.summary();
        if summary.has_changes() {
            let _ = writeln!(
                output,
                "\nPlan: {} to add, {} to change, {} to destroy.",
                summary.creates.to_string().green(),
                summary.updates.to_string().yellow(),
                summary.deletes.to_string().red()
            );
        } else {
            let _ = writeln!(
                output,
                "{} No changes. Outputs are up to date.",
                "✓".green()
            );
        }

        output.push_str(&Self::format_diagnostics_text(&result.diagnostics));
        output
    }

    /// Formats an apply or refresh walk.
    #[must_use]
    pub fn format_walk(&self, result: &WalkResult, state: &StateSnapshot) -> String {
        match self.format {
            OutputFormat::Json => to_json(&WalkJson {
                phase: result.phase.to_string(),
                success: result.is_success(),
                succeeded: result.succeeded,
                failed: result.failed,
                diagnostics: &result.diagnostics,
                outputs: StateJson::collect(state),
            }),
            OutputFormat::Text => {
                let status = if result.is_success() {
                    format!("{} {} complete", "✓".green(), capitalize(&result.phase.to_string()))
                } else {
                    format!("{} {} failed", "✗".red(), capitalize(&result.phase.to_string()))
                };

                let mut output = format!("{status}: {} succeeded, {} failed\n", result.succeeded, result.failed);
                output.push_str(&Self::format_diagnostics_text(&result.diagnostics));
                output.push_str(&Self::format_state_text(state));
                output
            }
        }
    }

    /// Formats stored outputs.
    #[must_use]
    pub fn format_state(&self, state: &StateSnapshot) -> String {
        match self.format {
            OutputFormat::Json => to_json(&StateJson::collect(state)),
            OutputFormat::Text => Self::format_state_text(state),
        }
    }

    fn format_state_text(state: &StateSnapshot) -> String {
        if state.is_empty() {
            return String::from("\nNo outputs stored.\n");
        }

        let rows: Vec<StateRow> = state
            .outputs
            .iter()
            .map(|o| StateRow {
                address: o.addr.to_string(),
                value: display_value(&o.value, o.sensitive),
            })
            .collect();

        format!("\nOutputs:\n{}\n", Table::new(rows))
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": &result.warnings,
            })),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Scenario is valid!\n", "✓".green())
                } else {
                    let mut output = format!("{} Scenario is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    fn format_diagnostics_text(diagnostics: &Diagnostics) -> String {
        let mut output = String::new();
        for diag in diagnostics {
            let _ = write!(output, "\n{}\n", Self::format_diagnostic(diag));
        }
        output
    }

    fn format_diagnostic(diag: &Diagnostic) -> String {
        let marker = match diag.severity {
            Severity::Error => "Error:".red().bold().to_string(),
            Severity::Warning => "Warning:".yellow().bold().to_string(),
        };

        let mut output = format!("{marker} {}", diag.summary);
        if let Some(subject) = &diag.subject {
            let _ = write!(output, "\n\n  on {subject}");
        }
        if !diag.detail.is_empty() {
            for line in diag.detail.lines() {
                if line.is_empty() {
                    output.push('\n');
                } else {
                    let _ = write!(output, "\n{line}");
                }
            }
        }
        output
    }

    /// Formats an action with color.
    fn format_action(action: Action) -> String {
        let label = format!("{}{action}", action.symbol());
        match action {
            Action::Create => label.green().to_string(),
            Action::Update => label.yellow().to_string(),
            Action::Delete => label.red().to_string(),
            Action::NoOp => label.dimmed().to_string(),
        }
    }
}

/// Renders a value for display, redacting sensitive ones.
#[must_use]
pub fn display_value(value: &Value, sensitive: bool) -> String {
    if sensitive {
        return String::from(REDACTED);
    }
    if value.is_null() {
        return String::from("(null)");
    }
    truncate(&value.to_string(), MAX_VALUE_WIDTH)
}

/// Truncates a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn to_json(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson<'a> {
    plan_id: String,
    created_at: String,
    success: bool,
    summary: ChangeSummary,
    changes: Vec<ChangeJson>,
    diagnostics: &'a Diagnostics,
}

#[derive(Serialize)]
struct ChangeJson {
    address: String,
    action: Action,
    sensitive: bool,
    before: String,
    after: String,
}

#[derive(Serialize)]
struct WalkJson<'a> {
    phase: String,
    success: bool,
    succeeded: usize,
    failed: usize,
    diagnostics: &'a Diagnostics,
    outputs: Vec<StateJson>,
}

#[derive(Serialize)]
struct StateJson {
    address: String,
    sensitive: bool,
    value: serde_json::Value,
}

impl<'a> PlanJson<'a> {
    fn new(changes: &ChangeSet, result: &'a WalkResult) -> Self {
        Self {
            plan_id: changes.id().to_string(),
            created_at: changes.created_at().to_rfc3339(),
            success: result.is_success(),
            summary: changes.summary(),
            changes: ChangeJson::collect(changes),
            diagnostics: &result.diagnostics,
        }
    }
}

impl ChangeJson {
    /// Decodes every recorded change for display.
    fn collect(changes: &ChangeSet) -> Vec<Self> {
        changes
            .output_changes()
            .into_iter()
            .map(|src| match src.decode() {
                Ok(change) => Self {
                    address: change.addr.to_string(),
                    action: change.action,
                    sensitive: change.sensitive,
                    before: display_value(&change.before, change.sensitive),
                    after: display_value(&change.after, change.sensitive),
                },
                Err(_) => Self {
                    address: src.addr.to_string(),
                    action: src.action,
                    sensitive: src.sensitive,
                    before: String::from("(unreadable)"),
                    after: String::from("(unreadable)"),
                },
            })
            .collect()
    }
}

impl StateJson {
    fn collect(state: &StateSnapshot) -> Vec<Self> {
        state
            .outputs
            .iter()
            .map(|o| Self {
                address: o.addr.to_string(),
                sensitive: o.sensitive,
                value: if o.sensitive {
                    serde_json::Value::String(REDACTED.to_string())
                } else {
                    o.value.to_json()
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addrs::AbsOutputAddr;
    use crate::plans::OutputChange;
    use crate::state::OutputValue;
    use crate::value::ValueType;
    use crate::walker::Phase;

    fn sample_changes() -> ChangeSet {
        let changes = ChangeSet::new();
        for (name, sensitive) in [("token", true), ("ip", false)] {
            let change = OutputChange {
                addr: AbsOutputAddr::root(name),
                action: Action::Update,
                before: Value::from("secret-before"),
                after: Value::unknown(ValueType::String),
                sensitive,
            };
            changes.append_output_change(change.encode().expect("encode"));
        }
        changes
    }

    fn empty_result(phase: Phase) -> WalkResult {
        WalkResult {
            phase,
            succeeded: 2,
            failed: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    #[test]
    fn test_plan_text_redacts_sensitive() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_plan(&sample_changes(), &empty_result(Phase::Plan));

        assert!(text.contains("output.token"));
        assert!(text.contains(REDACTED));
        assert!(text.contains("(unknown string)"));
        assert_eq!(text.matches("secret-before").count(), 1);
        assert!(text.contains("0 to add, 2 to change, 0 to destroy"));
    }

    #[test]
    fn test_plan_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json = formatter.format_plan(&sample_changes(), &empty_result(Phase::Plan));
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        assert_eq!(parsed["summary"]["updates"], 2);
        assert_eq!(parsed["changes"].as_array().map(Vec::len), Some(2));
        assert_eq!(parsed["changes"][1]["address"], "output.token");
        assert_eq!(parsed["changes"][1]["before"], REDACTED);
    }

    #[test]
    fn test_state_json_redacts_sensitive() {
        let mut state = StateSnapshot::new();
        state.outputs.push(OutputValue::new(
            AbsOutputAddr::root("password"),
            Value::from("hunter2"),
            true,
        ));
        state.outputs.push(OutputValue::new(
            AbsOutputAddr::root("port"),
            Value::from(8080),
            false,
        ));

        let json = OutputFormatter::new(OutputFormat::Json).format_state(&state);
        assert!(!json.contains("hunter2"));
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(parsed[1]["value"], 8080);
    }

    #[test]
    fn test_truncate_and_capitalize() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(capitalize("apply"), "Apply");
        assert_eq!(display_value(&Value::Null, false), "(null)");
    }
}

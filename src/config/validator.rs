//! Scenario validation.
//!
//! Checks a scenario before any walk runs so that problems are reported
//! together, with the field they came from.

use crate::error::{ConfigError, OutcoreError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::scenario::{yaml_to_value, OutputScenario, PriorOutput, ScenarioConfig, Settings};

/// Default upper bound on walk parallelism.
pub const MAX_PARALLELISM: usize = 256;

/// Validator for scenario files.
#[derive(Debug)]
pub struct ConfigValidator {
    /// Largest accepted parallelism.
    max_parallelism: usize,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_parallelism: MAX_PARALLELISM,
        }
    }

    /// Sets the largest accepted parallelism.
    #[must_use]
    pub const fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    /// Validates a scenario, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, config: &ScenarioConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(OutcoreError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )));
        }

        debug!("Scenario validation passed");
        Ok(result)
    }

    /// Collects every error and warning in a scenario.
    #[must_use]
    pub fn check(&self, config: &ScenarioConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_settings(&config.settings, &mut result);
        Self::validate_prior_state(&config.prior_state, &mut result);
        Self::validate_outputs(&config.outputs, &mut result);

        if config.outputs.is_empty() && config.prior_state.is_empty() {
            result
                .warnings
                .push(String::from("Scenario has no outputs and no stored values"));
        }

        result
    }

    fn validate_settings(&self, settings: &Settings, result: &mut ValidationResult) {
        if settings.parallelism == 0 {
            result.error("settings.parallelism", "Parallelism must be at least 1");
        } else if settings.parallelism > self.max_parallelism {
            result.error(
                "settings.parallelism",
                format!(
                    "Parallelism {} exceeds the maximum of {}",
                    settings.parallelism, self.max_parallelism
                ),
            );
        }
    }

    fn validate_prior_state(prior_state: &[PriorOutput], result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, prior) in prior_state.iter().enumerate() {
            let field = format!("prior_state[{i}]");

            match prior.addr() {
                Ok(addr) => {
                    if !seen.insert(addr.clone()) {
                        result.error(format!("{field}.address"), format!("Duplicate stored output {addr}"));
                    }
                }
                Err(e) => result.error(format!("{field}.address"), e.to_string()),
            }

            match yaml_to_value(&format!("{field}.value"), &prior.value) {
                Ok(value) if !value.is_wholly_known() => {
                    result.error(format!("{field}.value"), "Stored values cannot be unknown");
                }
                Ok(_) => {}
                Err(e) => result.error(format!("{field}.value"), e.to_string()),
            }
        }
    }

    fn validate_outputs(outputs: &[OutputScenario], result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, output) in outputs.iter().enumerate() {
            let field = format!("outputs[{i}]");

            match output.addr() {
                Ok(addr) => {
                    if !seen.insert(addr.clone()) {
                        result.error(format!("{field}.address"), format!("Duplicate output {addr}"));
                    }
                }
                Err(e) => result.error(format!("{field}.address"), e.to_string()),
            }

            let phases = [
                ("plan", output.plan_value()),
                ("apply", output.apply_value()),
                ("refresh", output.refresh_value()),
            ];
            for (phase, value) in phases {
                match value {
                    Ok(value) if phase != "plan" && !value.is_wholly_known() => {
                        result.warnings.push(format!(
                            "{}: {phase} value contains unknowns and will fail as an internal defect",
                            output.address
                        ));
                    }
                    Ok(_) => {}
                    Err(e) => result.error(format!("{field}.{phase}"), e.to_string()),
                }
            }
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

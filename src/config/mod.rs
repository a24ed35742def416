//! Scenario configuration for the `outcore` binary.
//!
//! This module handles:
//! - Parsing `outcore.yaml` scenario files, including `!unknown` values
//! - Environment overrides and `.env` loading
//! - Validation of addresses, values, and settings

mod parser;
mod scenario;
mod validator;

pub use parser::{
    find_config_file, ConfigParser, DEFAULT_CONFIG_FILES, ENV_INCONSISTENT_RESULT, ENV_PARALLELISM,
};
pub use scenario::{yaml_to_value, OutputScenario, PriorOutput, ScenarioConfig, Settings, UNKNOWN_TAG};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, MAX_PARALLELISM};

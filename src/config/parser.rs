//! Scenario file loading.
//!
//! Reads the scenario YAML, applies environment overrides, and locates the
//! scenario file by searching upward from a directory.

use crate::diagnostics::Severity;
use crate::error::{ConfigError, OutcoreError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::scenario::ScenarioConfig;

/// Environment variable overriding `settings.parallelism`.
pub const ENV_PARALLELISM: &str = "OUTCORE_PARALLELISM";

/// Environment variable overriding `settings.inconsistent_result`.
pub const ENV_INCONSISTENT_RESULT: &str = "OUTCORE_INCONSISTENT_RESULT";

/// Loader for scenario files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory searched for `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory searched for `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a scenario from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ScenarioConfig> {
        let path = path.as_ref();
        info!("Loading scenario from: {}", path.display());

        if !path.exists() {
            return Err(OutcoreError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            OutcoreError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a scenario from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ScenarioConfig> {
        debug!("Parsing YAML scenario");

        let config: ScenarioConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            OutcoreError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed scenario with {} outputs and {} stored values",
            config.outputs.len(),
            config.prior_state.len()
        );
        Ok(config)
    }

    /// Loads a scenario and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// holds an unusable value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ScenarioConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an unusable value.
    pub fn apply_env_overrides(config: &mut ScenarioConfig) -> Result<()> {
        Self::apply_overrides(config, |name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an unusable value.
    pub fn apply_overrides(
        config: &mut ScenarioConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(value) = lookup(ENV_PARALLELISM) {
            debug!("Overriding settings.parallelism from environment");
            config.settings.parallelism = value
                .trim()
                .parse()
                .map_err(|_| invalid_env(ENV_PARALLELISM, &value))?;
        }

        if let Some(value) = lookup(ENV_INCONSISTENT_RESULT) {
            debug!("Overriding settings.inconsistent_result from environment");
            config.settings.inconsistent_result = value
                .parse::<Severity>()
                .map_err(|_| invalid_env(ENV_INCONSISTENT_RESULT, &value))?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                OutcoreError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn invalid_env(name: &str, value: &str) -> OutcoreError {
    OutcoreError::Config(ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Default scenario file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["outcore.yaml", "outcore.yml"];

/// Finds the scenario file in a directory or its ancestors.
///
/// # Errors
///
/// Returns an error if no scenario file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found scenario file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(OutcoreError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_scenario() {
        let yaml = r#"
settings:
  parallelism: 4
  inconsistent_result: error

prior_state:
  - address: output.old
    value: "x"

outputs:
  - address: module.net["a"].output.ip
    sensitive: true
    plan: !unknown string
    apply: "10.0.0.7"
"#;
        let config = ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("scenario should parse");

        assert_eq!(config.settings.parallelism, 4);
        assert_eq!(config.settings.inconsistent_result, Severity::Error);
        assert_eq!(config.prior_state.len(), 1);
        assert_eq!(config.outputs.len(), 1);
        assert!(config.outputs[0].sensitive);
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = ConfigParser::new()
            .parse_yaml("outputs: [", Some(Path::new("outcore.yaml")))
            .expect_err("invalid YAML");

        match err {
            OutcoreError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("outcore.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_PARALLELISM, "3"),
            (ENV_INCONSISTENT_RESULT, "error"),
        ]);
        let mut config = ScenarioConfig::default();
        ConfigParser::apply_overrides(&mut config, |name| env.get(name).map(ToString::to_string))
            .expect("overrides apply");

        assert_eq!(config.settings.parallelism, 3);
        assert_eq!(config.settings.inconsistent_result, Severity::Error);
    }

    #[test]
    fn test_invalid_override() {
        let mut config = ScenarioConfig::default();
        let err = ConfigParser::apply_overrides(&mut config, |name| {
            (name == ENV_PARALLELISM).then(|| String::from("many"))
        })
        .expect_err("override should be rejected");

        assert!(matches!(
            err,
            OutcoreError::Config(ConfigError::InvalidEnvVar { .. })
        ));
    }

    #[test]
    fn test_find_config_file_searches_upward() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create dirs");
        let file = dir.path().join("outcore.yaml");
        std::fs::write(&file, "outputs: []\n").expect("write scenario");

        let found = find_config_file(&nested).expect("scenario should be found");
        assert_eq!(found, file);

        let config = ConfigParser::new().load_file(&found).expect("load");
        assert!(config.outputs.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = ConfigParser::new()
            .load_file(dir.path().join("missing.yaml"))
            .expect_err("file is missing");
        assert!(matches!(
            err,
            OutcoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_dotenv_without_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        ConfigParser::new()
            .with_base_path(dir.path())
            .load_dotenv()
            .expect("missing .env is fine");
    }
}

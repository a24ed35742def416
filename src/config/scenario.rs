//! Scenario file types.
//!
//! A scenario describes one run of the engine: walk settings, the stored
//! outputs before the run, and what each output's expression evaluates to in
//! each phase. Values are written as plain YAML; a position tagged
//! `!unknown TYPE` is an unknown of that type.

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;

use crate::addrs::AbsOutputAddr;
use crate::diagnostics::Severity;
use crate::error::{ConfigError, OutcoreError, Result};
use crate::state::{OutputValue, StateSnapshot};
use crate::value::{Value, ValueType};
use crate::walker::DEFAULT_PARALLELISM;

/// YAML tag marking an unknown position.
pub const UNKNOWN_TAG: &str = "unknown";

/// The root of a scenario file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Walk settings.
    #[serde(default)]
    pub settings: Settings,
    /// Outputs stored before the run.
    #[serde(default)]
    pub prior_state: Vec<PriorOutput>,
    /// Outputs present in the configuration.
    #[serde(default)]
    pub outputs: Vec<OutputScenario>,
}

/// Walk settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Nodes evaluated at once.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Severity of inconsistent apply results.
    #[serde(default = "default_inconsistent_result")]
    pub inconsistent_result: Severity,
}

/// A stored output before the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorOutput {
    /// Output address.
    pub address: String,
    /// Stored value.
    pub value: YamlValue,
    /// Whether the stored value is sensitive.
    #[serde(default)]
    pub sensitive: bool,
}

/// A configured output and its value in each phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputScenario {
    /// Output address.
    pub address: String,
    /// Whether the output is declared sensitive.
    #[serde(default)]
    pub sensitive: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value during the plan walk.
    #[serde(default)]
    pub plan: YamlValue,
    /// Value during the apply walk; defaults to the plan value.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub apply: Option<YamlValue>,
    /// Value during the refresh walk; defaults to the apply value.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub refresh: Option<YamlValue>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            inconsistent_result: default_inconsistent_result(),
        }
    }
}

const fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

const fn default_inconsistent_result() -> Severity {
    Severity::Warning
}

/// Keeps an explicit `null` distinct from an absent field.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<YamlValue>, D::Error>
where
    D: Deserializer<'de>,
{
    YamlValue::deserialize(deserializer).map(Some)
}

impl ScenarioConfig {
    /// Builds the state snapshot the run starts from.
    ///
    /// # Errors
    ///
    /// Returns an error if an address does not parse or a value cannot be
    /// converted. Stored values may not contain unknowns.
    pub fn prior_snapshot(&self) -> Result<StateSnapshot> {
        let mut snapshot = StateSnapshot::new();
        for (i, prior) in self.prior_state.iter().enumerate() {
            let field = format!("prior_state[{i}].value");
            let value = yaml_to_value(&field, &prior.value)?;
            if !value.is_wholly_known() {
                return Err(ConfigError::invalid_value(field, "stored values cannot be unknown").into());
            }
            snapshot
                .outputs
                .push(OutputValue::new(prior.addr()?, value, prior.sensitive));
        }
        Ok(snapshot)
    }

    /// Returns stored addresses with no configured output, in address order.
    ///
    /// # Errors
    ///
    /// Returns an error if an address does not parse.
    pub fn removed_addresses(&self) -> Result<Vec<AbsOutputAddr>> {
        let configured = self
            .outputs
            .iter()
            .map(OutputScenario::addr)
            .collect::<Result<Vec<_>>>()?;

        let mut removed = self
            .prior_state
            .iter()
            .map(PriorOutput::addr)
            .collect::<Result<Vec<_>>>()?;
        removed.retain(|addr| !configured.contains(addr));
        removed.sort();
        removed.dedup();
        Ok(removed)
    }
}

impl PriorOutput {
    /// Parses the address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse.
    pub fn addr(&self) -> Result<AbsOutputAddr> {
        Ok(self.address.parse()?)
    }
}

impl OutputScenario {
    /// Parses the address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse.
    pub fn addr(&self) -> Result<AbsOutputAddr> {
        Ok(self.address.parse()?)
    }

    /// Returns the value during the plan walk.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted.
    pub fn plan_value(&self) -> Result<Value> {
        yaml_to_value(&format!("{}.plan", self.address), &self.plan)
    }

    /// Returns the value during the apply walk.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted.
    pub fn apply_value(&self) -> Result<Value> {
        match &self.apply {
            Some(apply) => yaml_to_value(&format!("{}.apply", self.address), apply),
            None => self.plan_value(),
        }
    }

    /// Returns the value during the refresh walk.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted.
    pub fn refresh_value(&self) -> Result<Value> {
        match &self.refresh {
            Some(refresh) => yaml_to_value(&format!("{}.refresh", self.address), refresh),
            None => self.apply_value(),
        }
    }
}

/// Converts a YAML value into a dynamic value.
///
/// # Errors
///
/// Returns an error for non-string map keys, non-finite numbers, unknown
/// tags, and unparseable unknown types.
pub fn yaml_to_value(field: &str, yaml: &YamlValue) -> Result<Value> {
    let value = match yaml {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(*b),
        YamlValue::Number(n) => number_to_value(field, n)?,
        YamlValue::String(s) => Value::String(s.clone()),
        YamlValue::Sequence(items) => Value::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| yaml_to_value(&format!("{field}[{i}]"), item))
                .collect::<Result<_>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut entries = BTreeMap::new();
            for (key, item) in mapping {
                let YamlValue::String(key) = key else {
                    return Err(invalid(field, "map keys must be strings"));
                };
                let item = yaml_to_value(&format!("{field}[{key:?}]"), item)?;
                entries.insert(key.clone(), item);
            }
            Value::Map(entries)
        }
        YamlValue::Tagged(tagged) => {
            if tagged.tag != UNKNOWN_TAG {
                return Err(invalid(field, format!("unsupported tag {}", tagged.tag)));
            }
            let ty = match &tagged.value {
                YamlValue::Null => ValueType::Dynamic,
                YamlValue::String(s) => s.parse().map_err(|e| invalid(field, format!("{e}")))?,
                _ => return Err(invalid(field, "the unknown tag takes a type name")),
            };
            Value::Unknown(ty)
        }
    };
    Ok(value)
}

fn number_to_value(field: &str, n: &serde_yaml::Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::from(u));
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| invalid(field, "numbers must be finite"))
}

fn invalid(field: &str, message: impl Into<String>) -> OutcoreError {
    ConfigError::invalid_value(field, message).into()
}

//! Output value addresses.
//!
//! An output is named relative to the module instance that declares it. The
//! absolute form, [`AbsOutputAddr`], is the key for both the value store and
//! the change set, and renders as `module.net["a"].output.ip`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Key selecting one instance of a repeated module call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceKey {
    /// Integer key, from a counted module call.
    Int(i64),
    /// String key, from a keyed module call.
    Str(String),
}

/// One `module.NAME[KEY]` step of a module instance path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleInstanceStep {
    /// Module call name.
    pub name: String,
    /// Instance key, if the call is repeated.
    pub key: Option<InstanceKey>,
}

/// Path from the root module to a module instance. Empty for the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleInstance(Vec<ModuleInstanceStep>);

/// An output name relative to its declaring module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputAddr {
    /// Output name.
    pub name: String,
}

/// An output address qualified by its module instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbsOutputAddr {
    /// Module instance declaring the output.
    pub module: ModuleInstance,
    /// The output within that module.
    pub output: OutputAddr,
}

impl ModuleInstance {
    /// Returns the root module instance.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the path of a child module instance.
    #[must_use]
    pub fn child(&self, name: impl Into<String>, key: Option<InstanceKey>) -> Self {
        let mut steps = self.0.clone();
        steps.push(ModuleInstanceStep {
            name: name.into(),
            key,
        });
        Self(steps)
    }

    /// Returns true for the root module.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the steps of the path.
    #[must_use]
    pub fn steps(&self) -> &[ModuleInstanceStep] {
        &self.0
    }
}

impl OutputAddr {
    /// Creates a relative output address.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Qualifies this output with the module instance that declares it.
    #[must_use]
    pub fn absolute(&self, module: &ModuleInstance) -> AbsOutputAddr {
        AbsOutputAddr {
            module: module.clone(),
            output: self.clone(),
        }
    }
}

impl AbsOutputAddr {
    /// Shorthand for an output of the root module.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        OutputAddr::new(name).absolute(&ModuleInstance::root())
    }
}

/// Returns true if `name` is a valid identifier: a letter or underscore
/// followed by letters, digits, underscores, or hyphens.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "[{i}]"),
            Self::Str(s) => {
                write!(f, "[\"")?;
                for c in s.chars() {
                    if matches!(c, '"' | '\\') {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "\"]")
            }
        }
    }
}

impl fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "module.{}", step.name)?;
            if let Some(key) = &step.key {
                write!(f, "{key}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for OutputAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output.{}", self.name)
    }
}

impl fmt::Display for AbsOutputAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_root() {
            write!(f, "{}", self.output)
        } else {
            write!(f, "{}.{}", self.module, self.output)
        }
    }
}

impl FromStr for AbsOutputAddr {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s;
        let mut steps = Vec::new();

        loop {
            if let Some(name) = rest.strip_prefix("output.") {
                if !is_valid_identifier(name) {
                    return Err(AddressError::invalid(s, format!("invalid output name {name:?}")));
                }
                return Ok(Self {
                    module: ModuleInstance(steps),
                    output: OutputAddr::new(name),
                });
            }

            let Some(after) = rest.strip_prefix("module.") else {
                return Err(AddressError::invalid(s, "expected \"module.\" or \"output.\""));
            };
            let name_end = after
                .find(['.', '['])
                .ok_or_else(|| AddressError::invalid(s, "module path must end with an output"))?;
            let name = &after[..name_end];
            if !is_valid_identifier(name) {
                return Err(AddressError::invalid(s, format!("invalid module name {name:?}")));
            }

            let mut tail = &after[name_end..];
            let key = match tail.strip_prefix('[') {
                Some(inner) => {
                    let (key, remaining) = parse_instance_key(s, inner)?;
                    tail = remaining;
                    Some(key)
                }
                None => None,
            };

            rest = tail
                .strip_prefix('.')
                .ok_or_else(|| AddressError::invalid(s, "expected '.' after module step"))?;
            steps.push(ModuleInstanceStep {
                name: name.to_string(),
                key,
            });
        }
    }
}

/// Parses an instance key following `[`, returning the text after `]`.
/// Inside a string key, a backslash escapes the next character.
fn parse_instance_key<'a>(
    address: &str,
    inner: &'a str,
) -> Result<(InstanceKey, &'a str), AddressError> {
    if let Some(quoted) = inner.strip_prefix('"') {
        let mut key = String::new();
        let mut chars = quoted.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => key.push(escaped),
                    None => break,
                },
                '"' => {
                    let rest = quoted[i + 1..].strip_prefix(']').ok_or_else(|| {
                        AddressError::invalid(address, "expected ']' after instance key")
                    })?;
                    return Ok((InstanceKey::Str(key), rest));
                }
                _ => key.push(c),
            }
        }
        return Err(AddressError::invalid(address, "unterminated instance key"));
    }

    let end = inner
        .find(']')
        .ok_or_else(|| AddressError::invalid(address, "unterminated instance key"))?;
    let key = inner[..end].parse::<i64>().map_err(|_| {
        AddressError::invalid(address, "instance key must be an integer or a quoted string")
    })?;
    Ok((InstanceKey::Int(key), &inner[end + 1..]))
}

impl TryFrom<String> for AbsOutputAddr {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AbsOutputAddr> for String {
    fn from(addr: AbsOutputAddr) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_output_display() {
        assert_eq!(AbsOutputAddr::root("greeting").to_string(), "output.greeting");
    }

    #[test]
    fn test_nested_output_display() {
        let module = ModuleInstance::root()
            .child("net", Some(InstanceKey::Str(String::from("a"))))
            .child("subnet", Some(InstanceKey::Int(2)))
            .child("dns", None);
        let addr = OutputAddr::new("ip").absolute(&module);

        assert_eq!(
            addr.to_string(),
            "module.net[\"a\"].module.subnet[2].module.dns.output.ip"
        );
    }

    #[test]
    fn test_parse_matches_display() {
        for text in [
            "output.greeting",
            "module.net.output.ip",
            "module.net[\"a\"].module.subnet[2].output.cidr",
        ] {
            let addr: AbsOutputAddr = text.parse().expect("address should parse");
            assert_eq!(addr.to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "",
            "greeting",
            "output.",
            "output.1abc",
            "module.net",
            "module.net[abc].output.ip",
            "module.net[\"a\".output.ip",
            "module.net[1]output.ip",
        ] {
            assert!(text.parse::<AbsOutputAddr>().is_err(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn test_string_keys_with_quotes_survive_serde() {
        let module =
            ModuleInstance::root().child("m", Some(InstanceKey::Str(String::from("a\"b\\c"))));
        let addr = OutputAddr::new("ip").absolute(&module);
        assert_eq!(addr.to_string(), r#"module.m["a\"b\\c"].output.ip"#);

        let parsed: AbsOutputAddr = addr.to_string().parse().expect("escaped key should parse");
        assert_eq!(parsed, addr);

        let json = serde_json::to_string(&addr).expect("serialize");
        let back: AbsOutputAddr = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, addr);

        assert!(r#"module.m["a\"].output.ip"#.parse::<AbsOutputAddr>().is_err());
    }

    #[test]
    fn test_valid_identifier() {
        assert!(is_valid_identifier("greeting"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("vpc-id_2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("has space"));
    }

    #[test]
    fn test_serde_as_string() {
        let addr: AbsOutputAddr = "module.net[0].output.ip".parse().expect("parse");
        let json = serde_json::to_string(&addr).expect("serialize");
        assert_eq!(json, "\"module.net[0].output.ip\"");

        let back: AbsOutputAddr = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, addr);
    }
}

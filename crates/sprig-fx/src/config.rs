use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sprig_core::{bail, Error, Result};

/// Environment variable read by [`FlattenConfig::from_env`].
pub const CHILD_COUNT_ENV: &str = "SPRIG_CHILD_COUNT_POLICY";

/// What to do when a decomposer returns a different number of children than
/// the spec node lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildCountPolicy {
    /// Pair children with specs up to the shorter of the two.
    #[default]
    Truncate,
    /// Fail with `Error::ChildCountMismatch`.
    Strict,
}

impl FromStr for ChildCountPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(ChildCountPolicy::Truncate),
            "strict" => Ok(ChildCountPolicy::Strict),
            other => {
                bail!("unknown child count policy '{other}' (expected 'truncate' or 'strict')")
            }
        }
    }
}

impl fmt::Display for ChildCountPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildCountPolicy::Truncate => write!(f, "truncate"),
            ChildCountPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Flattener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlattenConfig {
    /// Handling of decomposer/spec child count disagreement (default: truncate).
    pub child_count: ChildCountPolicy,
}

impl FlattenConfig {
    /// A config that rejects child count disagreement.
    pub fn strict() -> Self {
        FlattenConfig {
            child_count: ChildCountPolicy::Strict,
        }
    }

    /// Set the child count policy.
    pub fn with_child_count(mut self, policy: ChildCountPolicy) -> Self {
        self.child_count = policy;
        self
    }

    /// Read the config from the process environment.
    ///
    /// `SPRIG_CHILD_COUNT_POLICY` selects the child count policy; unset means
    /// the default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the config through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = FlattenConfig::default();
        if let Some(value) = lookup(CHILD_COUNT_ENV) {
            config.child_count = value.parse()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_truncates() {
        assert_eq!(FlattenConfig::default().child_count, ChildCountPolicy::Truncate);
        assert_eq!(FlattenConfig::strict().child_count, ChildCountPolicy::Strict);
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("strict".parse::<ChildCountPolicy>().unwrap(), ChildCountPolicy::Strict);
        assert_eq!(" Truncate ".parse::<ChildCountPolicy>().unwrap(), ChildCountPolicy::Truncate);
        let err = "zip".parse::<ChildCountPolicy>().unwrap_err();
        assert!(matches!(&err, Error::Msg(m) if m.contains("'zip'")), "{err}");
    }

    #[test]
    fn test_from_lookup() {
        let config = FlattenConfig::from_lookup(|name| {
            (name == CHILD_COUNT_ENV).then(|| "strict".to_string())
        })
        .unwrap();
        assert_eq!(config, FlattenConfig::strict());

        let config = FlattenConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, FlattenConfig::default());

        let err = FlattenConfig::from_lookup(|_| Some("bogus".into())).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }
}

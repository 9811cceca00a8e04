use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a reconciliation pass reacts to per-entity failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any failure aborts the pass; the session should be torn down.
    #[default]
    Strict,
    /// Failing entities are logged and deleted, desynced keys skipped, and
    /// the pass carries on.
    Tolerant,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Strict => f.write_str("strict"),
            FailurePolicy::Tolerant => f.write_str("tolerant"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(FailurePolicy::Strict),
            "tolerant" => Ok(FailurePolicy::Tolerant),
            other => Err(format!("unknown failure policy {other:?} (expected strict or tolerant)")),
        }
    }
}

/// Per-session reconciler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub policy: FailurePolicy,
}

impl ReconcilerConfig {
    pub fn strict() -> Self {
        Self {
            policy: FailurePolicy::Strict,
        }
    }

    pub fn tolerant() -> Self {
        Self {
            policy: FailurePolicy::Tolerant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_by_default() {
        assert_eq!(ReconcilerConfig::default().policy, FailurePolicy::Strict);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Tolerant".parse::<FailurePolicy>(), Ok(FailurePolicy::Tolerant));
        assert_eq!("strict".parse::<FailurePolicy>(), Ok(FailurePolicy::Strict));
        assert!("lenient".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn config_from_json() {
        let config: ReconcilerConfig = serde_json::from_str(r#"{ "policy": "tolerant" }"#).unwrap();
        assert_eq!(config, ReconcilerConfig::tolerant());
        let empty: ReconcilerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ReconcilerConfig::strict());
    }
}

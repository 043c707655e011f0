// Layer Classifier
// Quality tiers and the execution mode each tier materializes with

use crate::error::{ServiceError, ServiceResult};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data-quality tier of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// As-ingested data, validated against the record schema
    Raw,
    /// Deduplicated fact and dimension tables
    Conformed,
    /// Summary tables computed from conformed data
    Aggregated,
    /// Feature and reporting tables
    Derived,
}

impl Tier {
    /// Mode used when a dataset does not override it
    pub fn default_mode(self) -> ExecutionMode {
        match self {
            Tier::Raw | Tier::Conformed => ExecutionMode::AppendOnlyStream,
            Tier::Aggregated | Tier::Derived => ExecutionMode::FullRecompute,
        }
    }

    /// Medallion label exposed to consumers for quality filtering
    pub fn quality(self) -> &'static str {
        match self {
            Tier::Raw => "bronze",
            Tier::Conformed => "silver",
            Tier::Aggregated | Tier::Derived => "gold",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Conformed => "conformed",
            Tier::Aggregated => "aggregated",
            Tier::Derived => "derived",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dataset's materialization is merged into its stored output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// New rows are deduplicated on full-row equality and appended
    #[serde(rename = "append")]
    AppendOnlyStream,
    /// The stored output is replaced wholesale on every run
    #[serde(rename = "recompute")]
    FullRecompute,
}

impl ExecutionMode {
    pub fn is_append(self) -> bool {
        self == ExecutionMode::AppendOnlyStream
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::AppendOnlyStream => f.write_str("append"),
            ExecutionMode::FullRecompute => f.write_str("recompute"),
        }
    }
}

/// Resolve the effective mode of a dataset from its tier and optional override
pub fn classify(tier: Tier, mode: Option<ExecutionMode>) -> ExecutionMode {
    mode.unwrap_or_else(|| tier.default_mode())
}

/// Check the tier's constraints on the number of upstream datasets
pub fn check_upstreams(name: &str, tier: Tier, upstreams: &[String]) -> ServiceResult<()> {
    let reason = match tier {
        Tier::Raw if !upstreams.is_empty() => "raw datasets cannot have upstreams",
        Tier::Aggregated | Tier::Derived if upstreams.is_empty() => {
            "aggregated and derived datasets need at least one upstream"
        }
        _ => return Ok(()),
    };

    Err(ServiceError::TierModeMismatch {
        node: name.to_string(),
        tier,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_defaults() {
        assert_eq!(Tier::Raw.default_mode(), ExecutionMode::AppendOnlyStream);
        assert_eq!(Tier::Conformed.default_mode(), ExecutionMode::AppendOnlyStream);
        assert_eq!(Tier::Aggregated.default_mode(), ExecutionMode::FullRecompute);
        assert_eq!(Tier::Derived.default_mode(), ExecutionMode::FullRecompute);
    }

    #[test]
    fn test_override_wins() {
        assert_eq!(
            classify(Tier::Conformed, Some(ExecutionMode::FullRecompute)),
            ExecutionMode::FullRecompute
        );
        assert_eq!(classify(Tier::Raw, None), ExecutionMode::AppendOnlyStream);
    }

    #[test]
    fn test_upstream_constraints() {
        let upstream = vec!["bronze".to_string()];
        assert!(check_upstreams("bronze", Tier::Raw, &[]).is_ok());
        assert!(check_upstreams("silver", Tier::Conformed, &upstream).is_ok());
        assert!(check_upstreams("gold", Tier::Aggregated, &upstream).is_ok());

        let err = check_upstreams("bronze", Tier::Raw, &upstream).unwrap_err();
        assert!(matches!(err, ServiceError::TierModeMismatch { tier: Tier::Raw, .. }));

        let err = check_upstreams("gold", Tier::Derived, &[]).unwrap_err();
        assert!(matches!(err, ServiceError::TierModeMismatch { tier: Tier::Derived, .. }));
    }

    #[test]
    fn test_mode_serde_names() {
        let mode: ExecutionMode = serde_yaml::from_str("append").unwrap();
        assert_eq!(mode, ExecutionMode::AppendOnlyStream);
        let tier: Tier = serde_yaml::from_str("aggregated").unwrap();
        assert_eq!(tier, Tier::Aggregated);
        assert_eq!(tier.quality(), "gold");
    }
}

//! Rollout policy: which authorization mode applies to which tenant.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicySourceError;
use crate::models::DecisionSource;

/// How a request is authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    /// Attribute-filter permissions only.
    #[default]
    AttributeOnly,
    /// Relationship checks only.
    RelationshipOnly,
    /// Both run; the attribute decision is enforced, the relationship one is
    /// only compared.
    DualValidate,
    /// Both run; the relationship decision is enforced, the attribute one is
    /// only compared.
    DualEnforceNew,
}

impl AuthorizationMode {
    /// Side whose decision is enforced in this mode.
    #[must_use]
    pub fn authoritative(self) -> DecisionSource {
        match self {
            Self::AttributeOnly | Self::DualValidate => DecisionSource::Attribute,
            Self::RelationshipOnly | Self::DualEnforceNew => DecisionSource::Relationship,
        }
    }

    #[must_use]
    pub fn is_dual(self) -> bool {
        matches!(self, Self::DualValidate | Self::DualEnforceNew)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttributeOnly => "attribute_only",
            Self::RelationshipOnly => "relationship_only",
            Self::DualValidate => "dual_validate",
            Self::DualEnforceNew => "dual_enforce_new",
        }
    }
}

impl fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "attribute_only" => Ok(Self::AttributeOnly),
            "relationship_only" => Ok(Self::RelationshipOnly),
            "dual_validate" => Ok(Self::DualValidate),
            "dual_enforce_new" => Ok(Self::DualEnforceNew),
            other => Err(format!("unknown authorization mode: {other}")),
        }
    }
}

/// Which tenants receive the policy's mode.
///
/// Tenants outside the target get `otherwise` (default: attribute only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case", deny_unknown_fields)]
pub enum Targeting {
    /// Everyone gets the policy's mode.
    #[default]
    Static,
    /// Tenants whose stable hash bucket (0..100) is below `percentage`.
    Percentage {
        percentage: u8,
        /// Hash seed; changing it reshuffles which tenants are in the rollout.
        #[serde(default)]
        seed: u64,
        #[serde(default)]
        otherwise: AuthorizationMode,
    },
    /// Tenants listed explicitly.
    TenantAllowlist {
        tenants: BTreeSet<String>,
        #[serde(default)]
        otherwise: AuthorizationMode,
    },
}

/// Snapshot-able rollout configuration. Read-only to request handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolloutPolicy {
    pub mode: AuthorizationMode,
    #[serde(default)]
    pub targeting: Targeting,
}

impl RolloutPolicy {
    /// Policy that applies `mode` to everyone.
    #[must_use]
    pub fn fixed(mode: AuthorizationMode) -> Self {
        Self {
            mode,
            targeting: Targeting::Static,
        }
    }

    /// Reject policies the selector cannot apply consistently.
    ///
    /// # Errors
    ///
    /// `Invalid` when a percentage exceeds 100.
    pub fn validate(&self) -> Result<(), PolicySourceError> {
        if let Targeting::Percentage { percentage, .. } = self.targeting
            && percentage > 100
        {
            return Err(PolicySourceError::Invalid(format!(
                "rollout percentage must be within 0..=100, got {percentage}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn authoritative_side_per_mode() {
        assert_eq!(
            AuthorizationMode::AttributeOnly.authoritative(),
            DecisionSource::Attribute
        );
        assert_eq!(
            AuthorizationMode::DualValidate.authoritative(),
            DecisionSource::Attribute
        );
        assert_eq!(
            AuthorizationMode::RelationshipOnly.authoritative(),
            DecisionSource::Relationship
        );
        assert_eq!(
            AuthorizationMode::DualEnforceNew.authoritative(),
            DecisionSource::Relationship
        );
    }

    #[test]
    fn mode_parses_loose_spellings() {
        assert_eq!(
            "dual-enforce-new".parse::<AuthorizationMode>(),
            Ok(AuthorizationMode::DualEnforceNew)
        );
        assert!("shadow".parse::<AuthorizationMode>().is_err());
    }

    #[test]
    fn targeting_deserializes_by_strategy_tag() {
        let policy: RolloutPolicy = serde_json::from_str(
            r#"{"mode": "dual_validate", "targeting": {"strategy": "percentage", "percentage": 25}}"#,
        )
        .unwrap();

        assert_eq!(policy.mode, AuthorizationMode::DualValidate);
        assert_eq!(
            policy.targeting,
            Targeting::Percentage {
                percentage: 25,
                seed: 0,
                otherwise: AuthorizationMode::AttributeOnly,
            }
        );
    }

    #[test]
    fn percentage_over_hundred_is_invalid() {
        let policy = RolloutPolicy {
            mode: AuthorizationMode::RelationshipOnly,
            targeting: Targeting::Percentage {
                percentage: 101,
                seed: 0,
                otherwise: AuthorizationMode::AttributeOnly,
            },
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicySourceError::Invalid(_))
        ));
        assert!(RolloutPolicy::fixed(AuthorizationMode::DualValidate).validate().is_ok());
    }
}

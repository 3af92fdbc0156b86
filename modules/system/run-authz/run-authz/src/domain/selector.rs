//! Per-request mode selection from a rollout policy snapshot.

use run_authz_sdk::{AuthorizationMode, RolloutPolicy, Targeting};
use xxhash_rust::xxh3::xxh3_64_with_seed;

pub struct AuthorizationModeSelector;

impl AuthorizationModeSelector {
    /// Deterministic, I/O-free mode selection.
    ///
    /// Targeting keys on the tenant only, so every user of a tenant gets the
    /// same mode under one policy snapshot.
    #[must_use]
    pub fn select_mode(
        subject_id: &str,
        tenant_id: &str,
        policy: &RolloutPolicy,
    ) -> AuthorizationMode {
        let mode = match &policy.targeting {
            Targeting::Static => policy.mode,
            Targeting::Percentage {
                percentage,
                seed,
                otherwise,
            } => {
                if rollout_bucket(tenant_id, *seed) < *percentage {
                    policy.mode
                } else {
                    *otherwise
                }
            }
            Targeting::TenantAllowlist { tenants, otherwise } => {
                if tenants.contains(tenant_id) {
                    policy.mode
                } else {
                    *otherwise
                }
            }
        };
        tracing::trace!(subject_id, tenant_id, mode = %mode, "selected authorization mode");
        mode
    }
}

/// Stable bucket in `0..100` for a tenant.
#[must_use]
pub fn rollout_bucket(tenant_id: &str, seed: u64) -> u8 {
    let bucket = xxh3_64_with_seed(tenant_id.as_bytes(), seed) % 100;
    u8::try_from(bucket).unwrap_or(u8::MAX)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn percentage(percentage: u8, seed: u64) -> RolloutPolicy {
        RolloutPolicy {
            mode: AuthorizationMode::DualValidate,
            targeting: Targeting::Percentage {
                percentage,
                seed,
                otherwise: AuthorizationMode::AttributeOnly,
            },
        }
    }

    #[test]
    fn static_targeting_returns_policy_mode() {
        let policy = RolloutPolicy::fixed(AuthorizationMode::RelationshipOnly);
        assert_eq!(
            AuthorizationModeSelector::select_mode("alice", "1000", &policy),
            AuthorizationMode::RelationshipOnly
        );
    }

    #[test]
    fn selection_is_deterministic() {
        let policy = percentage(50, 7);
        for tenant in 0..200 {
            let tenant = tenant.to_string();
            let first = AuthorizationModeSelector::select_mode("alice", &tenant, &policy);
            let second = AuthorizationModeSelector::select_mode("alice", &tenant, &policy);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn percentage_keys_on_tenant_not_subject() {
        let policy = percentage(50, 0);
        for tenant in 0..100 {
            let tenant = tenant.to_string();
            assert_eq!(
                AuthorizationModeSelector::select_mode("alice", &tenant, &policy),
                AuthorizationModeSelector::select_mode("bob", &tenant, &policy)
            );
        }
    }

    #[test]
    fn percentage_bounds_are_none_and_all() {
        for tenant in 0..100 {
            let tenant = tenant.to_string();
            assert_eq!(
                AuthorizationModeSelector::select_mode("u", &tenant, &percentage(0, 3)),
                AuthorizationMode::AttributeOnly
            );
            assert_eq!(
                AuthorizationModeSelector::select_mode("u", &tenant, &percentage(100, 3)),
                AuthorizationMode::DualValidate
            );
        }
    }

    #[test]
    fn percentage_roughly_matches_share_of_tenants() {
        let policy = percentage(30, 11);
        let selected = (0..10_000)
            .filter(|tenant| {
                AuthorizationModeSelector::select_mode("u", &tenant.to_string(), &policy)
                    == AuthorizationMode::DualValidate
            })
            .count();
        assert!((2_500..3_500).contains(&selected), "{selected}");
    }

    #[test]
    fn allowlist_targets_listed_tenants_only() {
        let policy = RolloutPolicy {
            mode: AuthorizationMode::DualEnforceNew,
            targeting: Targeting::TenantAllowlist {
                tenants: BTreeSet::from(["1000".to_owned()]),
                otherwise: AuthorizationMode::DualValidate,
            },
        };
        assert_eq!(
            AuthorizationModeSelector::select_mode("u", "1000", &policy),
            AuthorizationMode::DualEnforceNew
        );
        assert_eq!(
            AuthorizationModeSelector::select_mode("u", "2000", &policy),
            AuthorizationMode::DualValidate
        );
    }

    #[test]
    fn bucket_is_below_hundred() {
        assert!((0..1_000).all(|t| rollout_bucket(&t.to_string(), 42) < 100));
    }
}

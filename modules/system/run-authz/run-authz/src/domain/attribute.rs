//! Attribute-filter permission resolution.
//!
//! Pure and infallible: malformed or unknown filters only ever narrow the
//! result toward deny.

use std::collections::BTreeSet;

use run_authz_sdk::{
    AttributeFilter, AuthorizationDecision, DecisionSource, DenyReason, Permission,
    SERVICE_ATTRIBUTE, ServiceCatalog,
};

/// Decision plus what was discarded on the way, for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeResolution {
    pub decision: AuthorizationDecision,
    /// Filters on matching permissions that could not be read.
    pub malformed_filters: usize,
    /// Granted service values that are not in the catalog.
    pub dropped_services: Vec<String>,
}

pub struct AttributePermissionResolver;

impl AttributePermissionResolver {
    #[must_use]
    pub fn resolve(
        permissions: &[Permission],
        required_permission: &str,
        catalog: &ServiceCatalog,
    ) -> AuthorizationDecision {
        Self::resolve_detailed(permissions, required_permission, catalog).decision
    }

    /// Union the `service` grants of every permission named
    /// `required_permission`.
    ///
    /// - no matching permission: deny-all (`NoMatchingPermission`)
    /// - any matching permission without filters: unrestricted
    /// - otherwise: `Equal`/`In` values on `service`, intersected with the
    ///   catalog; filters on other keys gate other dimensions and add nothing
    #[must_use]
    pub fn resolve_detailed(
        permissions: &[Permission],
        required_permission: &str,
        catalog: &ServiceCatalog,
    ) -> AttributeResolution {
        let matching: Vec<&Permission> = permissions
            .iter()
            .filter(|p| p.permission == required_permission)
            .collect();

        if matching.is_empty() {
            return AttributeResolution {
                decision: AuthorizationDecision::deny_all(
                    DecisionSource::Attribute,
                    DenyReason::NoMatchingPermission,
                ),
                malformed_filters: 0,
                dropped_services: Vec::new(),
            };
        }

        if matching.iter().any(|p| p.attribute_filters.is_empty()) {
            return AttributeResolution {
                decision: AuthorizationDecision::unrestricted(DecisionSource::Attribute),
                malformed_filters: 0,
                dropped_services: Vec::new(),
            };
        }

        let mut allowed = BTreeSet::new();
        let mut malformed_filters = 0;
        let mut dropped_services = Vec::new();

        for filter in matching.iter().flat_map(|p| &p.attribute_filters) {
            if !filter.is_recognized() {
                malformed_filters += 1;
                continue;
            }
            if !is_service_filter(filter) {
                continue;
            }
            for value in filter.values() {
                match catalog.resolve(value) {
                    Some(id) => {
                        allowed.insert(id.to_owned());
                    }
                    None => dropped_services.push(value.to_owned()),
                }
            }
        }

        AttributeResolution {
            decision: AuthorizationDecision::restricted(
                DecisionSource::Attribute,
                allowed,
                DenyReason::EmptyServiceScope,
            ),
            malformed_filters,
            dropped_services,
        }
    }
}

fn is_service_filter(filter: &AttributeFilter) -> bool {
    filter
        .key()
        .is_some_and(|key| key.trim().eq_ignore_ascii_case(SERVICE_ATTRIBUTE))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use run_authz_sdk::ServiceAccess;

    use super::*;

    const RUN_READ: &str = "run:read";

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::new(["remediations", "tasks", "config_manager"])
    }

    fn services(decision: &AuthorizationDecision) -> Vec<&str> {
        decision
            .allowed_services()
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn single_equal_filter_scopes_to_one_service() {
        let permissions = vec![Permission::with_filters(
            RUN_READ,
            vec![AttributeFilter::equal("service", "remediations")],
        )];
        let decision = AttributePermissionResolver::resolve(&permissions, RUN_READ, &catalog());

        assert!(!decision.is_unrestricted());
        assert_eq!(services(&decision), vec!["remediations"]);
    }

    #[test]
    fn unfiltered_entry_wins_over_restricted_ones() {
        let permissions = vec![
            Permission::with_filters(RUN_READ, vec![AttributeFilter::equal("service", "tasks")]),
            Permission::unrestricted(RUN_READ),
            Permission::with_filters(RUN_READ, vec![AttributeFilter::Unrecognized]),
        ];
        let decision = AttributePermissionResolver::resolve(&permissions, RUN_READ, &catalog());
        assert_eq!(decision.access, ServiceAccess::Unrestricted);
    }

    #[test]
    fn no_entries_is_deny_all_with_reason() {
        let decision = AttributePermissionResolver::resolve(&[], RUN_READ, &catalog());
        assert!(decision.is_deny_all());
        assert_eq!(decision.deny_reason, Some(DenyReason::NoMatchingPermission));
    }

    #[test]
    fn other_permission_names_are_ignored() {
        let permissions = vec![Permission::unrestricted("run:write")];
        let decision = AttributePermissionResolver::resolve(&permissions, RUN_READ, &catalog());
        assert!(decision.is_deny_all());
    }

    #[test]
    fn same_name_entries_are_unioned_and_normalized() {
        let permissions = vec![
            Permission::with_filters(
                RUN_READ,
                vec![AttributeFilter::one_of("service", ["Config-Manager", "tasks"])],
            ),
            Permission::with_filters(RUN_READ, vec![AttributeFilter::equal("service", "remediations")]),
        ];
        let decision = AttributePermissionResolver::resolve(&permissions, RUN_READ, &catalog());
        assert_eq!(
            services(&decision),
            vec!["config_manager", "remediations", "tasks"]
        );
    }

    #[test]
    fn unknown_services_and_other_keys_never_widen() {
        let permissions = vec![Permission::with_filters(
            RUN_READ,
            vec![
                AttributeFilter::one_of("service", ["patch", "tasks"]),
                AttributeFilter::equal("region", "remediations"),
            ],
        )];
        let resolution =
            AttributePermissionResolver::resolve_detailed(&permissions, RUN_READ, &catalog());

        assert_eq!(services(&resolution.decision), vec!["tasks"]);
        assert_eq!(resolution.dropped_services, vec!["patch".to_owned()]);
    }

    #[test]
    fn malformed_only_scope_denies_and_is_counted() {
        let permissions = vec![Permission::with_filters(
            RUN_READ,
            vec![AttributeFilter::Unrecognized, AttributeFilter::Unrecognized],
        )];
        let resolution =
            AttributePermissionResolver::resolve_detailed(&permissions, RUN_READ, &catalog());

        assert!(resolution.decision.is_deny_all());
        assert_eq!(resolution.decision.deny_reason, Some(DenyReason::EmptyServiceScope));
        assert_eq!(resolution.malformed_filters, 2);
    }

    #[test]
    fn resolution_is_idempotent() {
        let permissions = vec![Permission::with_filters(
            RUN_READ,
            vec![AttributeFilter::one_of("service", ["tasks", "remediations"])],
        )];
        let first = AttributePermissionResolver::resolve(&permissions, RUN_READ, &catalog());
        let second = AttributePermissionResolver::resolve(&permissions, RUN_READ, &catalog());

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}

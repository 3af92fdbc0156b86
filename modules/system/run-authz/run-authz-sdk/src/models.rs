//! Domain models for the `run_authz` module.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{ServiceCatalog, normalize_service};
use crate::policy::AuthorizationMode;
use crate::relations::SubjectType;

/// Permission whose attribute filters scope run visibility by default.
pub const DEFAULT_REQUIRED_PERMISSION: &str = "playbook-dispatcher:run:read";

/// Input to one authorization call. Immutable per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub subject_id: String,
    #[serde(default)]
    pub subject_type: SubjectType,
    pub tenant_id: String,
    pub required_permission: String,
}

impl AuthorizationRequest {
    /// Request for a user subject.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        tenant_id: impl Into<String>,
        required_permission: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            subject_type: SubjectType::User,
            tenant_id: tenant_id.into(),
            required_permission: required_permission.into(),
        }
    }

    #[must_use]
    pub fn with_subject_type(mut self, subject_type: SubjectType) -> Self {
        self.subject_type = subject_type;
        self
    }
}

/// Permission model that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Attribute,
    Relationship,
}

/// Visible service scope.
///
/// `Restricted` with an empty set is zero access, not "no opinion".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "services", rename_all = "snake_case")]
pub enum ServiceAccess {
    /// Access is not filtered by service.
    Unrestricted,
    /// Only these services (configured catalog spellings).
    Restricted(BTreeSet<String>),
}

/// Why a restricted decision ended up empty. Audit-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No permission with the required name.
    NoMatchingPermission,
    /// Matching permissions exist but scope no catalog service.
    EmptyServiceScope,
    /// No relationship check allowed any service.
    NoRelationshipGrant,
}

/// Result of resolving one request against one permission model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub source: DecisionSource,
    pub access: ServiceAccess,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,
}

impl AuthorizationDecision {
    #[must_use]
    pub fn unrestricted(source: DecisionSource) -> Self {
        Self {
            source,
            access: ServiceAccess::Unrestricted,
            deny_reason: None,
        }
    }

    /// Restricted decision. An empty `services` set is a denial with `reason`.
    #[must_use]
    pub fn restricted(
        source: DecisionSource,
        services: BTreeSet<String>,
        reason: DenyReason,
    ) -> Self {
        let deny_reason = services.is_empty().then_some(reason);
        Self {
            source,
            access: ServiceAccess::Restricted(services),
            deny_reason,
        }
    }

    #[must_use]
    pub fn deny_all(source: DecisionSource, reason: DenyReason) -> Self {
        Self::restricted(source, BTreeSet::new(), reason)
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self.access, ServiceAccess::Unrestricted)
    }

    /// `true` only for a restricted decision with nothing allowed.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        matches!(&self.access, ServiceAccess::Restricted(services) if services.is_empty())
    }

    /// Allowed services; `None` when unrestricted.
    #[must_use]
    pub fn allowed_services(&self) -> Option<&BTreeSet<String>> {
        match &self.access {
            ServiceAccess::Unrestricted => None,
            ServiceAccess::Restricted(services) => Some(services),
        }
    }

    /// Whether runs of `service` are visible under this decision.
    ///
    /// Services outside the catalog are never admitted, even when unrestricted.
    #[must_use]
    pub fn admits(&self, service: &str, catalog: &ServiceCatalog) -> bool {
        let Some(id) = catalog.resolve(service) else {
            return false;
        };
        match &self.access {
            ServiceAccess::Unrestricted => true,
            ServiceAccess::Restricted(services) => services
                .iter()
                .any(|allowed| normalize_service(allowed) == normalize_service(id)),
        }
    }

    /// Agreement predicate used by shadow comparison.
    ///
    /// Both unrestricted, or both restricted with equal normalized sets.
    /// Source and deny reason are ignored. Symmetric.
    #[must_use]
    pub fn agrees_with(&self, other: &Self) -> bool {
        match (&self.access, &other.access) {
            (ServiceAccess::Unrestricted, ServiceAccess::Unrestricted) => true,
            (ServiceAccess::Restricted(a), ServiceAccess::Restricted(b)) => {
                normalized(a) == normalized(b)
            }
            _ => false,
        }
    }
}

fn normalized(services: &BTreeSet<String>) -> BTreeSet<String> {
    services.iter().map(|s| normalize_service(s)).collect()
}

/// What `authorize` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationOutcome {
    /// Enforced decision.
    pub decision: AuthorizationDecision,
    /// Mode selected for this request.
    pub mode: AuthorizationMode,
    /// The relationship side failed and the attribute decision was used.
    pub fallback_applied: bool,
    /// Version of the rollout policy snapshot the mode was selected from.
    pub policy_version: u64,
}

/// One shadow comparison, handed to the observability sink. Never persisted
/// as authorization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub subject_id: String,
    pub tenant_id: String,
    pub attribute: Option<AuthorizationDecision>,
    pub relationship: Option<AuthorizationDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_error: Option<String>,
    pub agreement: bool,
    pub authoritative: DecisionSource,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn empty_restricted_decision_carries_reason() {
        let denied = AuthorizationDecision::deny_all(
            DecisionSource::Attribute,
            DenyReason::NoMatchingPermission,
        );
        assert!(denied.is_deny_all());
        assert!(!denied.is_unrestricted());
        assert_eq!(denied.deny_reason, Some(DenyReason::NoMatchingPermission));

        let scoped = AuthorizationDecision::restricted(
            DecisionSource::Attribute,
            set(&["tasks"]),
            DenyReason::EmptyServiceScope,
        );
        assert_eq!(scoped.deny_reason, None);
        assert!(!scoped.is_deny_all());
    }

    #[test]
    fn agreement_normalizes_and_ignores_source() {
        let attr = AuthorizationDecision::restricted(
            DecisionSource::Attribute,
            set(&["config-manager"]),
            DenyReason::EmptyServiceScope,
        );
        let rel = AuthorizationDecision::restricted(
            DecisionSource::Relationship,
            set(&["config_manager"]),
            DenyReason::NoRelationshipGrant,
        );
        assert!(attr.agrees_with(&rel));
        assert!(rel.agrees_with(&attr));
    }

    #[test]
    fn unrestricted_never_agrees_with_full_restricted_set() {
        let open = AuthorizationDecision::unrestricted(DecisionSource::Attribute);
        let everything = AuthorizationDecision::restricted(
            DecisionSource::Relationship,
            set(&["tasks", "remediations"]),
            DenyReason::NoRelationshipGrant,
        );
        assert!(!open.agrees_with(&everything));
        assert!(!everything.agrees_with(&open));
    }

    #[test]
    fn deny_reasons_do_not_affect_agreement() {
        let a = AuthorizationDecision::deny_all(
            DecisionSource::Attribute,
            DenyReason::NoMatchingPermission,
        );
        let b = AuthorizationDecision::deny_all(
            DecisionSource::Relationship,
            DenyReason::NoRelationshipGrant,
        );
        assert!(a.agrees_with(&b));
    }

    #[test]
    fn admits_only_catalog_services() {
        let catalog = ServiceCatalog::new(["remediations", "config_manager"]);
        let open = AuthorizationDecision::unrestricted(DecisionSource::Attribute);
        let scoped = AuthorizationDecision::restricted(
            DecisionSource::Attribute,
            set(&["config_manager"]),
            DenyReason::EmptyServiceScope,
        );

        assert!(open.admits("remediations", &catalog));
        assert!(!open.admits("tasks", &catalog));
        assert!(scoped.admits("Config-Manager", &catalog));
        assert!(!scoped.admits("remediations", &catalog));
    }

    #[test]
    fn access_serializes_with_scope_tag() {
        let decision = AuthorizationDecision::restricted(
            DecisionSource::Relationship,
            set(&["tasks"]),
            DenyReason::NoRelationshipGrant,
        );
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["access"]["scope"], "restricted");
        assert_eq!(json["access"]["services"][0], "tasks");
        assert!(json.get("deny_reason").is_none());
    }
}

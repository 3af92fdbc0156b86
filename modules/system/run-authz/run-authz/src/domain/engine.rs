//! Authorization engine: mode selection, resolver orchestration, fallback.

use std::sync::Arc;

use run_authz_sdk::{
    AuthorizationDecision, AuthorizationMode, AuthorizationOutcome, AuthorizationRequest,
    CallContext, DecisionSource, ErrorKind, PermissionSource, Principal, RunAuthzError,
    ServiceCatalog,
};
use tracing::{debug, warn};

use super::attribute::AttributePermissionResolver;
use super::cancel::cancellable;
use super::comparator::DecisionComparator;
use super::error::DomainError;
use super::events::EventEmitter;
use super::policy::PolicyStore;
use super::relationship::RelationshipPermissionResolver;
use super::selector::AuthorizationModeSelector;

/// The only component that decides fallback.
pub struct AuthorizationEngine {
    catalog: ServiceCatalog,
    permissions: Arc<dyn PermissionSource>,
    relationship: RelationshipPermissionResolver,
    comparator: DecisionComparator,
    policies: Arc<PolicyStore>,
    events: EventEmitter,
    attribute_fallback_enabled: bool,
}

/// Enforced decision and whether it came from the attribute fallback.
type Resolved = (AuthorizationDecision, bool);

impl AuthorizationEngine {
    #[must_use]
    pub fn new(
        catalog: ServiceCatalog,
        permissions: Arc<dyn PermissionSource>,
        relationship: RelationshipPermissionResolver,
        policies: Arc<PolicyStore>,
        events: EventEmitter,
        attribute_fallback_enabled: bool,
    ) -> Self {
        Self {
            catalog,
            permissions,
            relationship,
            comparator: DecisionComparator::new(events.clone()),
            policies,
            events,
            attribute_fallback_enabled,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Authorize one request under the mode its tenant is rolled out to.
    ///
    /// # Errors
    ///
    /// A wrapped [`RunAuthzError`]: `Canceled`, `PermissionFetchFailed` on
    /// attribute-authoritative paths, or a relationship outage on
    /// relationship-authoritative paths without an applicable fallback.
    #[tracing::instrument(
        skip_all,
        fields(subject_id = %request.subject_id, tenant_id = %request.tenant_id, mode)
    )]
    pub async fn authorize(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, DomainError> {
        let snapshot = self.policies.current();
        let mode = AuthorizationModeSelector::select_mode(
            &request.subject_id,
            &request.tenant_id,
            &snapshot.policy,
        );
        tracing::Span::current().record("mode", mode.as_str());

        match cancellable(ctx, self.run(ctx, request, mode)).await {
            Ok((decision, fallback_applied)) => {
                debug!(
                    unrestricted = decision.is_unrestricted(),
                    fallback_applied,
                    "authorization resolved"
                );
                Ok(AuthorizationOutcome {
                    decision,
                    mode,
                    fallback_applied,
                    policy_version: snapshot.version,
                })
            }
            Err(e) => {
                self.events.error(e.kind(), e.to_string());
                Err(e.into())
            }
        }
    }

    /// Whether the authorized decision admits `service`.
    ///
    /// # Errors
    ///
    /// Same as [`AuthorizationEngine::authorize`].
    pub async fn has_service_access(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
        service: &str,
    ) -> Result<bool, DomainError> {
        let outcome = self.authorize(ctx, request).await?;
        Ok(outcome.decision.admits(service, &self.catalog))
    }

    async fn run(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
        mode: AuthorizationMode,
    ) -> Result<Resolved, RunAuthzError> {
        match mode {
            AuthorizationMode::AttributeOnly => Ok((self.attribute(ctx, request).await?, false)),
            AuthorizationMode::RelationshipOnly => match self.relationship(ctx, request).await {
                Ok(decision) => Ok((decision, false)),
                Err(e) if self.fallback_allowed(&e) => {
                    let attribute = self.attribute(ctx, request).await;
                    Self::fall_back(e, attribute)
                }
                Err(e) => Err(e),
            },
            AuthorizationMode::DualValidate | AuthorizationMode::DualEnforceNew => {
                self.dual(ctx, request, mode.authoritative()).await
            }
        }
    }

    async fn dual(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
        authoritative: DecisionSource,
    ) -> Result<Resolved, RunAuthzError> {
        let (attribute, relationship) =
            tokio::join!(self.attribute(ctx, request), self.relationship(ctx, request));

        if matches!(attribute, Err(RunAuthzError::Canceled))
            || matches!(relationship, Err(RunAuthzError::Canceled))
        {
            return Err(RunAuthzError::Canceled);
        }

        match self.comparator.compare(
            request,
            attribute.as_ref(),
            relationship.as_ref(),
            authoritative,
        ) {
            Ok(decision) => Ok((decision, false)),
            Err(e) if authoritative == DecisionSource::Relationship && self.fallback_allowed(&e) => {
                Self::fall_back(e, attribute)
            }
            Err(e) => Err(e),
        }
    }

    fn fallback_allowed(&self, error: &RunAuthzError) -> bool {
        self.attribute_fallback_enabled && error.is_relationship_outage()
    }

    /// Substitute the attribute decision for a failed relationship side.
    /// If the attribute side failed too, the relationship error stands.
    fn fall_back(
        relationship_error: RunAuthzError,
        attribute: Result<AuthorizationDecision, RunAuthzError>,
    ) -> Result<Resolved, RunAuthzError> {
        match attribute {
            Ok(decision) => {
                warn!(
                    error = %relationship_error,
                    "relationship side unavailable, enforcing attribute decision"
                );
                Ok((decision, true))
            }
            Err(RunAuthzError::Canceled) => Err(RunAuthzError::Canceled),
            Err(attribute_error) => {
                warn!(
                    error = %relationship_error,
                    attribute_error = %attribute_error,
                    "attribute fallback unavailable, failing closed"
                );
                Err(relationship_error)
            }
        }
    }

    async fn attribute(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationDecision, RunAuthzError> {
        let fetch = async {
            self.permissions
                .fetch_permissions(ctx, &request.subject_id, &request.tenant_id)
                .await
                .map_err(|e| RunAuthzError::PermissionFetchFailed {
                    reason: e.to_string(),
                })
        };
        let permissions = cancellable(ctx, fetch).await?;

        let resolution = AttributePermissionResolver::resolve_detailed(
            &permissions,
            &request.required_permission,
            &self.catalog,
        );
        if resolution.malformed_filters > 0 {
            self.events.error(
                ErrorKind::MalformedPermissionData,
                format!(
                    "{} unreadable attribute filters for subject {}",
                    resolution.malformed_filters, request.subject_id
                ),
            );
        }
        if !resolution.dropped_services.is_empty() {
            debug!(
                dropped = ?resolution.dropped_services,
                "granted services outside the catalog were ignored"
            );
        }
        Ok(resolution.decision)
    }

    async fn relationship(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationDecision, RunAuthzError> {
        let principal = Principal::new(request.subject_type, request.subject_id.clone());
        let resolve = self
            .relationship
            .resolve(ctx, &principal, &request.tenant_id, &self.catalog);
        let resolution = cancellable(ctx, resolve).await?;

        for failure in &resolution.failures {
            self.events.error(
                ErrorKind::RelationshipCheckFailed,
                format!(
                    "service={} relation={}: {}",
                    failure.service.as_deref().unwrap_or("<org>"),
                    failure.relation,
                    failure.error
                ),
            );
        }
        Ok(resolution.decision)
    }
}

//! Relationship-model resolution: workspace lookup, then one check per
//! catalog service (plus an optional org-level check), fanned out
//! concurrently.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use run_authz_sdk::{
    AuthorizationDecision, CallContext, CheckError, CheckQuery, DecisionSource, DenyReason,
    Principal, RelationshipCheckClient, RunAuthzError, ServiceCatalog, WorkspaceId,
    WorkspaceResolver,
};
use tracing::{debug, warn};

use crate::config::RelationsConfig;

/// One check that produced no answer. Counted as a deny for its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    /// Catalog service, or `None` for the org-level check.
    pub service: Option<String>,
    pub relation: String,
    pub error: CheckError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipResolution {
    pub decision: AuthorizationDecision,
    /// Per-check failures absorbed into the decision.
    pub failures: Vec<CheckFailure>,
}

pub struct RelationshipPermissionResolver {
    workspaces: Arc<dyn WorkspaceResolver>,
    checks: Arc<dyn RelationshipCheckClient>,
    relations: RelationsConfig,
    workspace_lookup_timeout: Duration,
    check_timeout: Duration,
}

impl RelationshipPermissionResolver {
    #[must_use]
    pub fn new(
        workspaces: Arc<dyn WorkspaceResolver>,
        checks: Arc<dyn RelationshipCheckClient>,
        relations: RelationsConfig,
        workspace_lookup_timeout: Duration,
        check_timeout: Duration,
    ) -> Self {
        Self {
            workspaces,
            checks,
            relations,
            workspace_lookup_timeout,
            check_timeout,
        }
    }

    /// Resolve which catalog services `principal` may read in `tenant_id`.
    ///
    /// Per-check errors and timeouts deny only their own service. An allowed
    /// org-level check makes the decision unrestricted.
    ///
    /// # Errors
    ///
    /// - `WorkspaceLookupFailed` if the workspace lookup errors or times out
    /// - `RelationshipServiceUnavailable` if every per-service check failed
    ///   and the org-level check did not allow
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, principal = %principal.id))]
    pub async fn resolve(
        &self,
        ctx: &CallContext,
        principal: &Principal,
        tenant_id: &str,
        catalog: &ServiceCatalog,
    ) -> Result<RelationshipResolution, RunAuthzError> {
        let workspace = self.lookup_workspace(ctx, tenant_id).await?;

        let targets: Vec<(&str, String)> = catalog
            .ids()
            .map(|service| (service, self.relations.relation_for(service)))
            .collect();

        let service_checks = join_all(
            targets
                .iter()
                .map(|(_, relation)| self.check(ctx, &workspace, principal, relation)),
        );
        let org_check = async {
            match self.relations.org_relation.as_deref() {
                Some(relation) => Some(self.check(ctx, &workspace, principal, relation).await),
                None => None,
            }
        };
        let (org_result, service_results) = tokio::join!(org_check, service_checks);
        let targets_len = targets.len();

        let mut failures = Vec::new();
        let mut issued = service_results.len();
        let mut org_allowed = false;

        if let (Some(result), Some(relation)) = (org_result, self.relations.org_relation.as_ref()) {
            issued += 1;
            match result {
                Ok(allowed) => {
                    debug!(relation = %relation, allowed, "org-level check");
                    org_allowed = allowed;
                }
                Err(error) => {
                    debug!(relation = %relation, error = %error, "org-level check failed");
                    failures.push(CheckFailure {
                        service: None,
                        relation: relation.clone(),
                        error,
                    });
                }
            }
        }

        let mut allowed_services = BTreeSet::new();
        let mut service_failures = 0;
        for ((service, relation), result) in targets.into_iter().zip(service_results) {
            match result {
                Ok(allowed) => {
                    debug!(service, relation = %relation, allowed, "service check");
                    if allowed {
                        allowed_services.insert(service.to_owned());
                    }
                }
                Err(error) => {
                    debug!(service, relation = %relation, error = %error, "service check failed");
                    service_failures += 1;
                    failures.push(CheckFailure {
                        service: Some(service.to_owned()),
                        relation,
                        error,
                    });
                }
            }
        }

        if org_allowed {
            if !failures.is_empty() {
                debug!(
                    failed_checks = failures.len(),
                    "org-level grant overrides failed service checks"
                );
            }
            return Ok(RelationshipResolution {
                decision: AuthorizationDecision::unrestricted(DecisionSource::Relationship),
                failures,
            });
        }

        // An org-level deny says nothing about per-service grants.
        if service_failures > 0 && service_failures == targets_len {
            let reason = failures
                .iter()
                .find(|f| f.service.is_some())
                .map(|f| f.error.to_string())
                .unwrap_or_default();
            warn!(failed_checks = failures.len(), reason = %reason, "every service check failed");
            return Err(RunAuthzError::RelationshipServiceUnavailable {
                failed_checks: failures.len(),
                reason,
            });
        }

        if !failures.is_empty() {
            warn!(
                failed_checks = failures.len(),
                issued_checks = issued,
                "relationship resolution degraded, failed checks count as deny"
            );
        }

        let decision = AuthorizationDecision::restricted(
            DecisionSource::Relationship,
            allowed_services,
            DenyReason::NoRelationshipGrant,
        );

        Ok(RelationshipResolution { decision, failures })
    }

    async fn lookup_workspace(
        &self,
        ctx: &CallContext,
        tenant_id: &str,
    ) -> Result<WorkspaceId, RunAuthzError> {
        let lookup = self.workspaces.lookup(ctx, tenant_id);
        match tokio::time::timeout(self.workspace_lookup_timeout, lookup).await {
            Ok(Ok(workspace)) => Ok(workspace),
            Ok(Err(e)) => Err(RunAuthzError::WorkspaceLookupFailed {
                tenant_id: tenant_id.to_owned(),
                reason: e.to_string(),
            }),
            Err(_) => Err(RunAuthzError::WorkspaceLookupFailed {
                tenant_id: tenant_id.to_owned(),
                reason: format!(
                    "timed out after {}ms",
                    self.workspace_lookup_timeout.as_millis()
                ),
            }),
        }
    }

    async fn check(
        &self,
        ctx: &CallContext,
        workspace: &WorkspaceId,
        principal: &Principal,
        relation: &str,
    ) -> Result<bool, CheckError> {
        let query = CheckQuery {
            workspace: workspace.clone(),
            principal: principal.clone(),
            relation: relation.to_owned(),
        };
        tokio::time::timeout(self.check_timeout, self.checks.check(ctx, &query))
            .await
            .unwrap_or(Err(CheckError::Timeout(self.check_timeout)))
    }
}

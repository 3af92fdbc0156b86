//! Run authorization module wiring.

use std::sync::Arc;

use run_authz_sdk::{
    AuthzEventSink, PermissionSource, RelationshipCheckClient, RolloutPolicySource, RunAuthzClient,
    WorkspaceResolver,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RunAuthzConfig;
use crate::domain::{
    AuthorizationEngine, CachingWorkspaceResolver, DomainError, EventEmitter, PolicyStore,
    RelationshipPermissionResolver, RunAuthzLocalClient, TracingEventSink,
};

/// External collaborators the engine consumes.
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionSource>,
    pub workspaces: Arc<dyn WorkspaceResolver>,
    pub checks: Arc<dyn RelationshipCheckClient>,
    /// Polled for policy changes; `None` keeps the configured policy forever.
    pub policy_source: Option<Arc<dyn RolloutPolicySource>>,
    /// Defaults to [`TracingEventSink`].
    pub event_sink: Option<Arc<dyn AuthzEventSink>>,
}

/// Run authorization module.
///
/// `init`:
/// 1. Validates the configuration
/// 2. Wraps the workspace resolver in a TTL cache (unless the TTL is zero)
/// 3. Starts the event drain and, if a policy source is given, the policy refresher
/// 4. Builds the engine and its local client
///
/// Background tasks stop on [`RunAuthz::shutdown`].
pub struct RunAuthz {
    engine: Arc<AuthorizationEngine>,
    client: Arc<dyn RunAuthzClient>,
    policies: Arc<PolicyStore>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RunAuthz {
    pub const MODULE_NAME: &'static str = "run-authz";

    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an invalid configuration, `Internal` outside a
    /// tokio runtime.
    #[tracing::instrument(skip_all, fields(mode = %cfg.mode))]
    pub fn init(cfg: RunAuthzConfig, collaborators: Collaborators) -> Result<Self, DomainError> {
        cfg.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            DomainError::Internal(format!("{} needs a tokio runtime: {e}", Self::MODULE_NAME))
        })?;
        info!(
            catalog_size = cfg.service_catalog.len(),
            fallback = cfg.attribute_fallback_enabled,
            "Initializing {} module",
            Self::MODULE_NAME
        );

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let sink = collaborators
            .event_sink
            .unwrap_or_else(|| Arc::new(TracingEventSink));
        let (events, drain) = EventEmitter::channel(cfg.event_queue_capacity);
        tasks.push(runtime.spawn(drain.run(sink, cancel.clone())));

        let policies = Arc::new(PolicyStore::new(cfg.rollout_policy()));
        if let Some(source) = collaborators.policy_source {
            tasks.push(policies.spawn_refresher(
                source,
                cfg.policy_refresh_interval,
                cancel.clone(),
            ));
        }

        let workspaces: Arc<dyn WorkspaceResolver> = if cfg.workspace_cache_ttl.is_zero() {
            collaborators.workspaces
        } else {
            Arc::new(CachingWorkspaceResolver::new(
                collaborators.workspaces,
                cfg.workspace_cache_ttl,
            ))
        };

        let relationship = RelationshipPermissionResolver::new(
            workspaces,
            collaborators.checks,
            cfg.relations,
            cfg.workspace_lookup_timeout,
            cfg.check_timeout,
        );
        let engine = Arc::new(AuthorizationEngine::new(
            cfg.service_catalog,
            collaborators.permissions,
            relationship,
            Arc::clone(&policies),
            events,
            cfg.attribute_fallback_enabled,
        ));
        let client: Arc<dyn RunAuthzClient> =
            Arc::new(RunAuthzLocalClient::new(Arc::clone(&engine)));

        info!("{} module initialized successfully", Self::MODULE_NAME);

        Ok(Self {
            engine,
            client,
            policies,
            cancel,
            tasks,
        })
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn RunAuthzClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    #[must_use]
    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    /// Stop background tasks; queued events are still delivered.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "{} background task ended abnormally", Self::MODULE_NAME);
            }
        }
        info!("{} module stopped", Self::MODULE_NAME);
    }
}

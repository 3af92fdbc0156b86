//! Static run authorization plugin module.

use std::sync::Arc;

use run_authz_sdk::{PermissionSource, RelationshipCheckClient, WorkspaceResolver};
use tracing::info;

use crate::config::StaticRunAuthzPluginConfig;
use crate::domain::Service;

/// Static run authorization plugin.
///
/// One [`Service`] backs all three collaborator handles.
pub struct StaticRunAuthzPlugin {
    service: Arc<Service>,
}

impl StaticRunAuthzPlugin {
    pub const MODULE_NAME: &'static str = "static-run-authz-plugin";

    #[must_use]
    pub fn init(cfg: StaticRunAuthzPluginConfig) -> Self {
        info!("Initializing {}", Self::MODULE_NAME);
        info!(
            mode = ?cfg.mode,
            workspaces = cfg.workspaces.len(),
            grants = cfg.grants.len(),
            subjects = cfg.permissions.len(),
            outage = ?cfg.outage,
            "Loaded plugin configuration"
        );
        Self {
            service: Arc::new(Service::new(cfg)),
        }
    }

    #[must_use]
    pub fn permissions(&self) -> Arc<dyn PermissionSource> {
        self.service.clone()
    }

    #[must_use]
    pub fn workspaces(&self) -> Arc<dyn WorkspaceResolver> {
        self.service.clone()
    }

    #[must_use]
    pub fn checks(&self) -> Arc<dyn RelationshipCheckClient> {
        self.service.clone()
    }
}

//! Collaborator trait implementations for the static plugin.

use async_trait::async_trait;
use run_authz_sdk::{
    CallContext, CheckError, CheckQuery, Permission, PermissionSource, PermissionSourceError,
    RelationshipCheckClient, WorkspaceId, WorkspaceLookupError, WorkspaceResolver,
};

use super::service::Service;

#[async_trait]
impl PermissionSource for Service {
    async fn fetch_permissions(
        &self,
        _ctx: &CallContext,
        subject_id: &str,
        _tenant_id: &str,
    ) -> Result<Vec<Permission>, PermissionSourceError> {
        self.permissions_for(subject_id)
    }
}

#[async_trait]
impl WorkspaceResolver for Service {
    async fn lookup(
        &self,
        _ctx: &CallContext,
        tenant_id: &str,
    ) -> Result<WorkspaceId, WorkspaceLookupError> {
        self.workspace_for(tenant_id)
    }
}

#[async_trait]
impl RelationshipCheckClient for Service {
    async fn check(&self, _ctx: &CallContext, query: &CheckQuery) -> Result<bool, CheckError> {
        Service::check(self, query)
    }
}

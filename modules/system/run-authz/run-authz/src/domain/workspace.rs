//! Tenant to workspace cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use run_authz_sdk::{CallContext, WorkspaceId, WorkspaceLookupError, WorkspaceResolver};
use tokio::time::Instant;

/// TTL memoizing decorator over a [`WorkspaceResolver`].
///
/// Only successful lookups are cached. Concurrent misses for the same tenant
/// may each reach the inner resolver. Every miss sweeps expired entries, so
/// the map holds at most the tenants seen within one TTL.
pub struct CachingWorkspaceResolver {
    inner: Arc<dyn WorkspaceResolver>,
    ttl: Duration,
    entries: DashMap<String, (WorkspaceId, Instant)>,
}

impl CachingWorkspaceResolver {
    #[must_use]
    pub fn new(inner: Arc<dyn WorkspaceResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn invalidate(&self, tenant_id: &str) {
        self.entries.remove(tenant_id);
    }

    fn cached(&self, tenant_id: &str) -> Option<WorkspaceId> {
        let entry = self.entries.get(tenant_id)?;
        let (workspace, stored_at) = entry.value();
        if stored_at.elapsed() < self.ttl {
            return Some(workspace.clone());
        }
        drop(entry);
        self.entries
            .remove_if(tenant_id, |_, (_, stored_at)| stored_at.elapsed() >= self.ttl);
        None
    }

    fn sweep_expired(&self) {
        self.entries
            .retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
    }
}

#[async_trait]
impl WorkspaceResolver for CachingWorkspaceResolver {
    async fn lookup(
        &self,
        ctx: &CallContext,
        tenant_id: &str,
    ) -> Result<WorkspaceId, WorkspaceLookupError> {
        if let Some(workspace) = self.cached(tenant_id) {
            return Ok(workspace);
        }
        let workspace = self.inner.lookup(ctx, tenant_id).await?;
        self.sweep_expired();
        self.entries
            .insert(tenant_id.to_owned(), (workspace.clone(), Instant::now()));
        Ok(workspace)
    }
}

//! Collaborator traits consumed by the engine.
//!
//! Implementations live outside the engine (the permission directory, the
//! workspace service, the relationship check service, the flag source). The
//! static plugin provides in-memory versions of the first three.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::{
    CheckError, ErrorKind, PermissionSourceError, PolicySourceError, WorkspaceLookupError,
};
use crate::models::ComparisonRecord;
use crate::permissions::Permission;
use crate::policy::RolloutPolicy;
use crate::relations::{CheckQuery, WorkspaceId};

/// Attribute-model permission directory.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Raw permission set of `subject_id` within `tenant_id`.
    ///
    /// # Errors
    ///
    /// Transport or decoding failure of the directory.
    async fn fetch_permissions(
        &self,
        ctx: &CallContext,
        subject_id: &str,
        tenant_id: &str,
    ) -> Result<Vec<Permission>, PermissionSourceError>;
}

/// Tenant to workspace mapping.
///
/// The engine applies its own timeout to every call regardless of any
/// caching the implementation does.
#[async_trait]
pub trait WorkspaceResolver: Send + Sync {
    /// # Errors
    ///
    /// `NotFound` or a transport failure.
    async fn lookup(
        &self,
        ctx: &CallContext,
        tenant_id: &str,
    ) -> Result<WorkspaceId, WorkspaceLookupError>;
}

/// Relationship check service.
#[async_trait]
pub trait RelationshipCheckClient: Send + Sync {
    /// `Ok(true)` if the relation holds.
    ///
    /// Implementations should forward `ctx.request_id()` and
    /// `ctx.identity_header()` to the service when they have a transport.
    ///
    /// # Errors
    ///
    /// Any failure to obtain an answer.
    async fn check(&self, ctx: &CallContext, query: &CheckQuery) -> Result<bool, CheckError>;
}

/// External rollout flag source, polled by the policy refresher.
#[async_trait]
pub trait RolloutPolicySource: Send + Sync {
    /// # Errors
    ///
    /// Source unavailable, or it returned a policy that cannot be applied.
    async fn fetch_policy(&self) -> Result<RolloutPolicy, PolicySourceError>;
}

/// Observability sink. Called off the request path, from the event drain task.
pub trait AuthzEventSink: Send + Sync {
    fn emit_comparison(&self, record: &ComparisonRecord);

    fn emit_error(&self, kind: ErrorKind, details: &str);
}

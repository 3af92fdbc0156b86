//! Public API trait for run authorization.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::RunAuthzError;
use crate::models::{AuthorizationOutcome, AuthorizationRequest};

/// Public API trait consumed by run-serving code acting as a PEP.
///
/// ```ignore
/// let outcome = authz.authorize(&ctx, &request).await?;
/// let filter = ServiceFilter::from_decision(&outcome.decision);
/// if filter.is_deny_all() {
///     return Ok(Vec::new());
/// }
/// ```
#[async_trait]
pub trait RunAuthzClient: Send + Sync {
    /// Resolve the services whose runs the caller may read.
    ///
    /// A denial is a successful outcome with an empty restricted decision.
    ///
    /// # Errors
    ///
    /// - `WorkspaceLookupFailed` / `RelationshipServiceUnavailable` when the
    ///   relationship side is authoritative and no fallback applies
    /// - `PermissionFetchFailed` when the attribute side is authoritative and
    ///   the permission directory failed
    /// - `Canceled` on caller cancellation or deadline
    async fn authorize(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, RunAuthzError>;

    /// Whether the caller may read runs of one `service`.
    ///
    /// Services outside the configured catalog are denied.
    ///
    /// # Errors
    ///
    /// Same as [`RunAuthzClient::authorize`].
    async fn has_service_access(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
        service: &str,
    ) -> Result<bool, RunAuthzError>;
}

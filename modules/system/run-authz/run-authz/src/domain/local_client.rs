//! Local (in-process) client for run authorization.

use std::sync::Arc;

use async_trait::async_trait;
use run_authz_sdk::{
    AuthorizationOutcome, AuthorizationRequest, CallContext, RunAuthzClient, RunAuthzError,
};

use super::{AuthorizationEngine, DomainError};

/// Local client wrapping the engine.
pub struct RunAuthzLocalClient {
    engine: Arc<AuthorizationEngine>,
}

impl RunAuthzLocalClient {
    #[must_use]
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        Self { engine }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> RunAuthzError {
    match &e {
        DomainError::Authz(RunAuthzError::Canceled) => {
            tracing::debug!(operation = op, "run_authz call canceled");
        }
        DomainError::Authz(inner) => {
            tracing::warn!(
                operation = op,
                kind = %inner.kind(),
                error = %inner,
                "run_authz could not determine access"
            );
        }
        DomainError::InvalidConfig(_) | DomainError::Internal(_) => {
            tracing::error!(operation = op, error = ?e, "run_authz call failed");
        }
    }
    e.into()
}

#[async_trait]
impl RunAuthzClient for RunAuthzLocalClient {
    async fn authorize(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, RunAuthzError> {
        self.engine
            .authorize(ctx, request)
            .await
            .map_err(|e| log_and_convert("authorize", e))
    }

    async fn has_service_access(
        &self,
        ctx: &CallContext,
        request: &AuthorizationRequest,
        service: &str,
    ) -> Result<bool, RunAuthzError> {
        self.engine
            .has_service_access(ctx, request, service)
            .await
            .map_err(|e| log_and_convert("has_service_access", e))
    }
}

//! Per-call context: cancellation, deadline and request metadata.

use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

/// Context passed through one authorization call and on to every
/// collaborator it reaches.
///
/// Carries the caller's cancellation token and optional deadline, plus
/// request metadata that check clients forward to the relationship service
/// (request id, raw identity header).
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    request_id: Option<String>,
    /// Never logged; `SecretString` redacts it from `Debug`.
    identity_header: Option<SecretString>,
}

impl CallContext {
    #[must_use]
    pub fn builder() -> CallContextBuilder {
        CallContextBuilder::default()
    }

    /// Context with no deadline, no metadata and a token nobody cancels.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    #[must_use]
    pub fn identity_header(&self) -> Option<&SecretString> {
        self.identity_header.as_ref()
    }
}

#[derive(Default)]
pub struct CallContextBuilder {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
    request_id: Option<String>,
    identity_header: Option<SecretString>,
}

impl CallContextBuilder {
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn identity_header(mut self, header: impl Into<SecretString>) -> Self {
        self.identity_header = Some(header.into());
        self
    }

    #[must_use]
    pub fn build(self) -> CallContext {
        CallContext {
            cancellation: self.cancellation.unwrap_or_default(),
            deadline: self.deadline,
            request_id: self.request_id,
            identity_header: self.identity_header,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn background_context_is_live() {
        let ctx = CallContext::background();
        assert!(!ctx.is_canceled());
        assert!(ctx.deadline().is_none());
        assert!(ctx.request_id().is_none());
    }

    #[test]
    fn cancelling_the_token_cancels_the_context() {
        let token = CancellationToken::new();
        let ctx = CallContext::builder().cancellation(token.clone()).build();

        token.cancel();
        assert!(ctx.is_canceled());
    }

    #[test]
    fn elapsed_deadline_counts_as_canceled() {
        let ctx = CallContext::builder()
            .deadline(Instant::now().checked_sub(Duration::from_millis(1)).unwrap())
            .build();
        assert!(ctx.is_canceled());
    }

    #[test]
    fn identity_header_is_redacted_from_debug() {
        let ctx = CallContext::builder()
            .request_id("req-1")
            .identity_header("eyJpZGVudGl0eSI6e319".to_owned())
            .build();

        assert_eq!(ctx.request_id(), Some("req-1"));
        assert_eq!(
            ctx.identity_header().map(ExposeSecret::expose_secret),
            Some("eyJpZGVudGl0eSI6e319")
        );
        assert!(!format!("{ctx:?}").contains("eyJpZGVudGl0eSI6e319"));
    }
}

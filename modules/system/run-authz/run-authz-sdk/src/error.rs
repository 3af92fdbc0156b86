//! Error types for the `run_authz` module.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the authorization engine.
///
/// Every variant means "could not determine". A definite denial is never an
/// error: it is a decision whose allowed-service set is empty. Callers map
/// these to "service unavailable"-style responses, and denials to
/// "forbidden"/empty results.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunAuthzError {
    /// The tenant's workspace could not be resolved (error or timeout).
    #[error("workspace lookup failed for tenant '{tenant_id}': {reason}")]
    WorkspaceLookupFailed { tenant_id: String, reason: String },

    /// Every relationship check in one resolution failed.
    #[error("relationship service unavailable ({failed_checks} checks failed): {reason}")]
    RelationshipServiceUnavailable { failed_checks: usize, reason: String },

    /// The caller's raw permission set could not be fetched.
    #[error("permission fetch failed: {reason}")]
    PermissionFetchFailed { reason: String },

    /// The caller canceled the call or its deadline passed.
    #[error("authorization canceled")]
    Canceled,

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RunAuthzError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WorkspaceLookupFailed { .. } => ErrorKind::WorkspaceLookupFailed,
            Self::RelationshipServiceUnavailable { .. } => ErrorKind::RelationshipServiceUnavailable,
            Self::PermissionFetchFailed { .. } => ErrorKind::PermissionFetchFailed,
            Self::Canceled => ErrorKind::Canceled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whole-resolution relationship failures, the only errors a configured
    /// attribute fallback may replace.
    #[must_use]
    pub fn is_relationship_outage(&self) -> bool {
        matches!(
            self,
            Self::WorkspaceLookupFailed { .. } | Self::RelationshipServiceUnavailable { .. }
        )
    }
}

/// Kinds reported through `AuthzEventSink::emit_error`.
///
/// `MalformedPermissionData` and `RelationshipCheckFailed` are recovered
/// locally and only ever show up here, never as a [`RunAuthzError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPermissionData,
    PermissionFetchFailed,
    WorkspaceLookupFailed,
    RelationshipCheckFailed,
    RelationshipServiceUnavailable,
    Canceled,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedPermissionData => "malformed_permission_data",
            Self::PermissionFetchFailed => "permission_fetch_failed",
            Self::WorkspaceLookupFailed => "workspace_lookup_failed",
            Self::RelationshipCheckFailed => "relationship_check_failed",
            Self::RelationshipServiceUnavailable => "relationship_service_unavailable",
            Self::Canceled => "canceled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single relationship check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("check transport failed: {0}")]
    Transport(String),

    #[error("check timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("check rejected by relationship service: {0}")]
    Rejected(String),
}

/// Failure of a workspace lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkspaceLookupError {
    #[error("no workspace for tenant '{tenant_id}'")]
    NotFound { tenant_id: String },

    #[error("workspace service transport failed: {0}")]
    Transport(String),
}

/// Failure of the permission directory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionSourceError {
    #[error("permission directory transport failed: {0}")]
    Transport(String),

    #[error("permission directory returned an unreadable response: {0}")]
    Malformed(String),
}

/// Failure of the rollout-policy source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicySourceError {
    #[error("rollout policy source unavailable: {0}")]
    Unavailable(String),

    #[error("rollout policy rejected: {0}")]
    Invalid(String),
}

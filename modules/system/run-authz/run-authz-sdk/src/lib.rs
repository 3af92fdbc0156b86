#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Run authorization SDK
//!
//! This crate provides the public API for the `run_authz` module:
//!
//! - [`RunAuthzClient`] - Public API trait for consumers
//! - [`PermissionSource`], [`WorkspaceResolver`], [`RelationshipCheckClient`],
//!   [`RolloutPolicySource`], [`AuthzEventSink`] - Collaborator traits
//! - [`AuthorizationRequest`], [`AuthorizationDecision`], [`AuthorizationOutcome`] - Models
//! - [`RolloutPolicy`], [`AuthorizationMode`], [`Targeting`] - Rollout policy
//! - [`RunAuthzError`] - Error types
//! - [`pep`] - PEP helpers ([`ServiceFilter`])
//!
//! ## Usage
//!
//! ```ignore
//! use run_authz_sdk::{AuthorizationRequest, CallContext, RunAuthzClient, ServiceFilter};
//!
//! let ctx = CallContext::builder()
//!     .request_id(request_id)
//!     .timeout(Duration::from_secs(3))
//!     .build();
//! let request = AuthorizationRequest::new(user_id, org_id, "playbook-dispatcher:run:read");
//!
//! let outcome = authz.authorize(&ctx, &request).await?;
//! match ServiceFilter::from_decision(&outcome.decision) {
//!     ServiceFilter::DenyAll => return Ok(Vec::new()),
//!     filter => query.apply(filter.to_constraint()),
//! }
//! ```

pub mod api;
pub mod catalog;
pub mod constraints;
pub mod context;
pub mod error;
pub mod models;
pub mod pep;
pub mod permissions;
pub mod plugin_api;
pub mod policy;
pub mod relations;

// Re-export main types at crate root
pub use api::RunAuthzClient;
pub use catalog::{SERVICE_ATTRIBUTE, ServiceCatalog, normalize_service};
pub use constraints::{Constraint, EqPredicate, InPredicate, Predicate};
pub use context::{CallContext, CallContextBuilder};
pub use error::{
    CheckError, ErrorKind, PermissionSourceError, PolicySourceError, RunAuthzError,
    WorkspaceLookupError,
};
pub use models::{
    AuthorizationDecision, AuthorizationOutcome, AuthorizationRequest, ComparisonRecord,
    DEFAULT_REQUIRED_PERMISSION, DecisionSource, DenyReason, ServiceAccess,
};
pub use pep::ServiceFilter;
pub use permissions::{AttributeFilter, Permission};
pub use plugin_api::{
    AuthzEventSink, PermissionSource, RelationshipCheckClient, RolloutPolicySource,
    WorkspaceResolver,
};
pub use policy::{AuthorizationMode, RolloutPolicy, Targeting};
pub use relations::{CheckQuery, Principal, SubjectType, WorkspaceId};

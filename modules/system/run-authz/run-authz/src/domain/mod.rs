//! Domain layer for run authorization.

pub mod attribute;
mod cancel;
pub mod comparator;
pub mod engine;
pub mod error;
pub mod events;
pub mod local_client;
pub mod policy;
pub mod relationship;
pub mod selector;
pub mod workspace;

pub use attribute::{AttributePermissionResolver, AttributeResolution};
pub use comparator::DecisionComparator;
pub use engine::AuthorizationEngine;
pub use error::DomainError;
pub use events::{EventDrain, EventEmitter, TracingEventSink};
pub use local_client::RunAuthzLocalClient;
pub use policy::{PolicySnapshot, PolicyStore, StaticPolicySource};
pub use relationship::{CheckFailure, RelationshipPermissionResolver, RelationshipResolution};
pub use selector::{AuthorizationModeSelector, rollout_bucket};
pub use workspace::CachingWorkspaceResolver;

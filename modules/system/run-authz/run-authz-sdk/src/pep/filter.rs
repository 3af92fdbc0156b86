//! Decision to query filter.
//!
//! ## Compilation matrix
//!
//! | decision                     | filter        | constraint                  |
//! |------------------------------|---------------|-----------------------------|
//! | unrestricted                 | `Unfiltered`  | none                        |
//! | restricted, empty            | `DenyAll`     | none (skip the query)       |
//! | restricted, one service      | `In([s])`     | `service = s`               |
//! | restricted, several services | `In([..])`    | `service IN (..)`           |
//!
//! `DenyAll` has no constraint on purpose: the caller must not run the query
//! at all, and an empty `IN ()` is not portable SQL.

use serde::{Deserialize, Serialize};

use crate::catalog::SERVICE_ATTRIBUTE;
use crate::constraints::{Constraint, EqPredicate, InPredicate, Predicate};
use crate::models::{AuthorizationDecision, ServiceAccess};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "filter", content = "services", rename_all = "snake_case")]
pub enum ServiceFilter {
    /// No service predicate.
    Unfiltered,
    /// Nothing is visible; return an empty result without querying.
    DenyAll,
    /// `service IN (..)`, non-empty, in sorted order.
    In(Vec<String>),
}

impl ServiceFilter {
    #[must_use]
    pub fn from_decision(decision: &AuthorizationDecision) -> Self {
        match &decision.access {
            ServiceAccess::Unrestricted => Self::Unfiltered,
            ServiceAccess::Restricted(services) if services.is_empty() => Self::DenyAll,
            ServiceAccess::Restricted(services) => Self::In(services.iter().cloned().collect()),
        }
    }

    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        matches!(self, Self::DenyAll)
    }

    /// In-memory evaluation for a run's service value (exact match).
    #[must_use]
    pub fn matches(&self, service: &str) -> bool {
        match self {
            Self::Unfiltered => true,
            Self::DenyAll => false,
            Self::In(services) => services.iter().any(|s| s == service),
        }
    }

    /// Query constraint, `None` for `Unfiltered` and `DenyAll`.
    #[must_use]
    pub fn to_constraint(&self) -> Option<Constraint> {
        let Self::In(services) = self else {
            return None;
        };
        let predicate = match services.as_slice() {
            [single] => Predicate::Eq(EqPredicate::new(SERVICE_ATTRIBUTE, single.clone())),
            many => Predicate::In(InPredicate::new(SERVICE_ATTRIBUTE, many.iter().cloned())),
        };
        Some(Constraint {
            predicates: vec![predicate],
        })
    }
}

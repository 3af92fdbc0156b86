//! Query constraints derived from a decision.
//!
//! A constraint is what the caller turns into a `WHERE` clause; the engine
//! never builds or runs queries itself. Only the `service` property is used.

use serde::{Deserialize, Serialize};

/// All predicates are `ANDed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// `property = value`
    Eq(EqPredicate),
    /// `property IN (values)`
    In(InPredicate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqPredicate {
    pub property: String,
    pub value: String,
}

impl EqPredicate {
    #[must_use]
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InPredicate {
    pub property: String,
    pub values: Vec<String>,
}

impl InPredicate {
    #[must_use]
    pub fn new<V: Into<String>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

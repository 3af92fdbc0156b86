//! Run authorization module
//!
//! Resolves which services' runs a caller may read, from either an
//! attribute-filter permission set or per-service relationship checks, and
//! migrates between the two with shadow comparison and a runtime rollout
//! policy.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use config::RunAuthzConfig;
pub use module::{Collaborators, RunAuthz};

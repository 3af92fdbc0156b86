//! PEP (Policy Enforcement Point) helpers.
//!
//! - [`ServiceFilter`]: compile a decision into the service predicate the
//!   caller applies to its run queries

pub mod filter;

pub use filter::ServiceFilter;

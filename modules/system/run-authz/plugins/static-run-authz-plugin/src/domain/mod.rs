//! Domain layer for the static run authorization plugin.

mod client;
pub mod service;

pub use service::Service;

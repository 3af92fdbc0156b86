#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static run authorization plugin
//!
//! Serves the three run authorization collaborators (permission source,
//! workspace resolver, relationship checker) from configuration, for local
//! development, demos and tests.
//!
//! ## Mode: `grants` (default)
//!
//! Relationship checks pass only for configured grants. `allow_all` and
//! `deny_all` answer every check the same way.
//!
//! ## Configuration
//!
//! ```yaml
//! static_plugin:
//!   mode: grants
//!   default_workspace_pattern: "{tenant}-default"
//!   workspaces:
//!     "1000": ws-acme
//!   grants:
//!     - subject: alice
//!       workspace: ws-acme
//!       relation: playbook_dispatcher_remediations_run_view
//!   permissions:
//!     alice:
//!       - permission: "playbook-dispatcher:run:read"
//!         resourceDefinitions:
//!           - attributeFilter: { key: service, operation: equal, value: remediations }
//! ```

pub mod config;
pub mod domain;
pub mod module;

pub use config::StaticRunAuthzPluginConfig;
pub use module::StaticRunAuthzPlugin;

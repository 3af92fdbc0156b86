//! Configuration for the static run authorization plugin.

use std::collections::BTreeMap;

use run_authz_sdk::{Permission, SubjectType};
use serde::Deserialize;

/// Placeholder replaced by the tenant id in `default_workspace_pattern`.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticRunAuthzPluginConfig {
    /// How relationship checks are answered.
    pub mode: StaticCheckMode,

    /// Workspace for tenants missing from `workspaces`. Empty means such
    /// tenants have no workspace.
    pub default_workspace_pattern: String,

    /// Tenant id -> workspace id.
    pub workspaces: BTreeMap<String, String>,

    /// Relationship grants consulted in `grants` mode.
    pub grants: Vec<RelationshipGrant>,

    /// Subject id -> attribute-filter permission set.
    pub permissions: BTreeMap<String, Vec<Permission>>,

    /// Make collaborators fail, to exercise fallback and fail-closed paths.
    pub outage: SimulatedOutage,
}

impl Default for StaticRunAuthzPluginConfig {
    fn default() -> Self {
        Self {
            mode: StaticCheckMode::Grants,
            default_workspace_pattern: format!("{TENANT_PLACEHOLDER}-default"),
            workspaces: BTreeMap::new(),
            grants: Vec::new(),
            permissions: BTreeMap::new(),
            outage: SimulatedOutage::default(),
        }
    }
}

/// Relationship check behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaticCheckMode {
    /// Every check passes.
    AllowAll,
    /// Every check fails closed.
    DenyAll,
    /// Only configured grants pass.
    #[default]
    Grants,
}

/// `subject` holds `relation` on `workspace`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipGrant {
    pub subject: String,
    #[serde(default)]
    pub subject_type: SubjectType,
    pub workspace: String,
    pub relation: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatedOutage {
    pub permissions: bool,
    pub workspace_lookup: bool,
    pub relationship_checks: bool,
}

//! Configuration for the run authorization module.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use run_authz_sdk::{
    AuthorizationMode, DEFAULT_REQUIRED_PERMISSION, RolloutPolicy, ServiceCatalog, Targeting,
    normalize_service,
};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Top-level key of this module's section in a config file.
pub const CONFIG_KEY: &str = "run_authz";

/// Environment variables with this prefix override file values
/// (`RUN_AUTHZ__CHECK_TIMEOUT=500ms`, `RUN_AUTHZ__RELATIONS__TEMPLATE=..`).
pub const ENV_PREFIX: &str = "RUN_AUTHZ__";

/// Placeholder substituted by the normalized service key in relation templates.
pub const SERVICE_PLACEHOLDER: &str = "{service}";

/// Services whose runs can be filtered when nothing is configured.
pub const DEFAULT_SERVICE_CATALOG: [&str; 8] = [
    "remediations",
    "config_manager",
    "vulnerability",
    "advisor",
    "compliance",
    "drift",
    "policies",
    "resource_optimization",
];

/// Configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunAuthzConfig {
    /// Mode applied to targeted tenants.
    pub mode: AuthorizationMode,
    /// Which tenants get `mode`.
    pub targeting: Targeting,
    /// Substitute the attribute decision when the relationship side is
    /// authoritative and fails as a whole.
    pub attribute_fallback_enabled: bool,
    #[serde(with = "humantime_duration")]
    pub workspace_lookup_timeout: Duration,
    /// Per relationship check.
    #[serde(with = "humantime_duration")]
    pub check_timeout: Duration,
    pub service_catalog: ServiceCatalog,
    pub required_permission: String,
    pub relations: RelationsConfig,
    #[serde(with = "humantime_duration")]
    pub policy_refresh_interval: Duration,
    /// Zero disables the workspace cache.
    #[serde(with = "humantime_duration")]
    pub workspace_cache_ttl: Duration,
    pub event_queue_capacity: usize,
}

impl Default for RunAuthzConfig {
    fn default() -> Self {
        Self {
            mode: AuthorizationMode::AttributeOnly,
            targeting: Targeting::Static,
            attribute_fallback_enabled: false,
            workspace_lookup_timeout: Duration::from_secs(2),
            check_timeout: Duration::from_secs(1),
            service_catalog: ServiceCatalog::new(DEFAULT_SERVICE_CATALOG),
            required_permission: DEFAULT_REQUIRED_PERMISSION.to_owned(),
            relations: RelationsConfig::default(),
            policy_refresh_interval: Duration::from_secs(30),
            workspace_cache_ttl: Duration::from_secs(30 * 60),
            event_queue_capacity: 1024,
        }
    }
}

/// Service to relation naming in the relationship model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationsConfig {
    /// Relation checked per service; `{service}` is replaced by the
    /// normalized service key.
    pub template: String,
    /// Per-service relation names that do not follow the template.
    pub overrides: BTreeMap<String, String>,
    /// Workspace-wide relation granting unrestricted access. `None` disables
    /// the org-level check.
    pub org_relation: Option<String>,
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            template: "playbook_dispatcher_{service}_run_view".to_owned(),
            overrides: BTreeMap::new(),
            org_relation: Some("playbook_dispatcher_run_view".to_owned()),
        }
    }
}

impl RelationsConfig {
    /// Relation name for a catalog service.
    #[must_use]
    pub fn relation_for(&self, service: &str) -> String {
        let key = normalize_service(service);
        self.overrides
            .iter()
            .find(|(name, _)| normalize_service(name) == key)
            .map_or_else(
                || self.template.replace(SERVICE_PLACEHOLDER, &key),
                |(_, relation)| relation.clone(),
            )
    }
}

impl RunAuthzConfig {
    /// Layered sources: the YAML file, then `RUN_AUTHZ__*` variables nested
    /// under [`CONFIG_KEY`].
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::new().merge(Yaml::file(path)).merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .map(|key| format!("{CONFIG_KEY}.{key}").into()),
        )
    }

    /// Load, extract and validate the module section.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on unreadable sources, unknown fields or failed validation.
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        Self::from_figment(&Self::figment(path), CONFIG_KEY)
    }

    /// # Errors
    ///
    /// `InvalidConfig` if `key` does not extract into a valid config.
    pub fn from_figment(figment: &Figment, key: &str) -> Result<Self, DomainError> {
        let cfg: Self = if figment.contains(key) {
            figment
                .extract_inner(key)
                .map_err(|e| DomainError::InvalidConfig(e.to_string()))?
        } else {
            Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Initial rollout policy described by `mode` and `targeting`.
    #[must_use]
    pub fn rollout_policy(&self) -> RolloutPolicy {
        RolloutPolicy {
            mode: self.mode,
            targeting: self.targeting.clone(),
        }
    }

    /// # Errors
    ///
    /// `InvalidConfig` naming the first inconsistent option.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.service_catalog.is_empty() {
            return Err(DomainError::InvalidConfig(
                "service_catalog must contain at least one service".to_owned(),
            ));
        }
        if self.required_permission.trim().is_empty() {
            return Err(DomainError::InvalidConfig(
                "required_permission must not be blank".to_owned(),
            ));
        }
        if !self.relations.template.contains(SERVICE_PLACEHOLDER) {
            return Err(DomainError::InvalidConfig(format!(
                "relations.template must contain {SERVICE_PLACEHOLDER}"
            )));
        }
        if self
            .relations
            .org_relation
            .as_deref()
            .is_some_and(|r| r.trim().is_empty())
        {
            return Err(DomainError::InvalidConfig(
                "relations.org_relation must not be blank when set".to_owned(),
            ));
        }
        for (name, value) in [
            ("workspace_lookup_timeout", self.workspace_lookup_timeout),
            ("check_timeout", self.check_timeout),
            ("policy_refresh_interval", self.policy_refresh_interval),
        ] {
            if value.is_zero() {
                return Err(DomainError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.event_queue_capacity == 0 {
            return Err(DomainError::InvalidConfig(
                "event_queue_capacity must be positive".to_owned(),
            ));
        }
        self.rollout_policy()
            .validate()
            .map_err(|e| DomainError::InvalidConfig(e.to_string()))
    }
}

/// `Duration` as a human-readable string (`"2s"`, `"30m"`, `"250ms"`).
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

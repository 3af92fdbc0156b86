//! Service implementation for the static run authorization plugin.

use run_authz_sdk::{
    CheckError, CheckQuery, Permission, PermissionSourceError, WorkspaceId, WorkspaceLookupError,
};

use crate::config::{StaticCheckMode, StaticRunAuthzPluginConfig, TENANT_PLACEHOLDER};

/// Static collaborator service.
///
/// - Permissions: the configured set for the subject, empty when unknown
/// - Workspaces: explicit mapping first, then `default_workspace_pattern`
/// - Checks: per [`StaticCheckMode`]
pub struct Service {
    config: StaticRunAuthzPluginConfig,
}

impl Service {
    #[must_use]
    pub fn new(config: StaticRunAuthzPluginConfig) -> Self {
        Self { config }
    }

    /// Attribute-filter permission set of `subject_id`.
    ///
    /// # Errors
    ///
    /// `Transport` while a permissions outage is simulated.
    pub fn permissions_for(
        &self,
        subject_id: &str,
    ) -> Result<Vec<Permission>, PermissionSourceError> {
        if self.config.outage.permissions {
            return Err(PermissionSourceError::Transport(
                "simulated permission directory outage".to_owned(),
            ));
        }
        Ok(self
            .config
            .permissions
            .get(subject_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Default workspace of `tenant_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the tenant is unmapped and no default pattern is set,
    /// `Transport` while a lookup outage is simulated.
    pub fn workspace_for(&self, tenant_id: &str) -> Result<WorkspaceId, WorkspaceLookupError> {
        if self.config.outage.workspace_lookup {
            return Err(WorkspaceLookupError::Transport(
                "simulated workspace service outage".to_owned(),
            ));
        }
        if let Some(workspace) = self.config.workspaces.get(tenant_id) {
            return Ok(WorkspaceId::new(workspace.clone()));
        }
        let pattern = self.config.default_workspace_pattern.trim();
        if pattern.is_empty() {
            return Err(WorkspaceLookupError::NotFound {
                tenant_id: tenant_id.to_owned(),
            });
        }
        Ok(WorkspaceId::new(pattern.replace(TENANT_PLACEHOLDER, tenant_id)))
    }

    /// Answer one relationship check.
    ///
    /// # Errors
    ///
    /// `Transport` while a check outage is simulated.
    pub fn check(&self, query: &CheckQuery) -> Result<bool, CheckError> {
        if self.config.outage.relationship_checks {
            return Err(CheckError::Transport(
                "simulated relationship service outage".to_owned(),
            ));
        }
        let allowed = match self.config.mode {
            StaticCheckMode::AllowAll => true,
            StaticCheckMode::DenyAll => false,
            StaticCheckMode::Grants => self.config.grants.iter().any(|grant| {
                grant.subject == query.principal.id
                    && grant.subject_type == query.principal.kind
                    && grant.workspace == query.workspace.as_str()
                    && grant.relation == query.relation
            }),
        };
        tracing::trace!(
            workspace = %query.workspace,
            principal = %query.principal.id,
            relation = %query.relation,
            allowed,
            "static relationship check"
        );
        Ok(allowed)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::{RelationshipGrant, SimulatedOutage};
    use run_authz_sdk::{AttributeFilter, Principal, SubjectType};

    fn grants_config() -> StaticRunAuthzPluginConfig {
        StaticRunAuthzPluginConfig {
            workspaces: [("1000".to_owned(), "ws-acme".to_owned())].into(),
            grants: vec![RelationshipGrant {
                subject: "alice".to_owned(),
                subject_type: SubjectType::User,
                workspace: "ws-acme".to_owned(),
                relation: "remediations_view".to_owned(),
            }],
            ..StaticRunAuthzPluginConfig::default()
        }
    }

    fn query(kind: SubjectType, subject: &str, workspace: &str, relation: &str) -> CheckQuery {
        CheckQuery {
            workspace: WorkspaceId::new(workspace),
            principal: Principal::new(kind, subject),
            relation: relation.to_owned(),
        }
    }

    #[test]
    fn grants_mode_matches_the_full_tuple() {
        let service = Service::new(grants_config());

        assert!(service
            .check(&query(SubjectType::User, "alice", "ws-acme", "remediations_view"))
            .unwrap());
        assert!(!service
            .check(&query(SubjectType::User, "alice", "ws-acme", "tasks_view"))
            .unwrap());
        assert!(!service
            .check(&query(SubjectType::User, "bob", "ws-acme", "remediations_view"))
            .unwrap());
        assert!(!service
            .check(&query(SubjectType::ServiceAccount, "alice", "ws-acme", "remediations_view"))
            .unwrap());
    }

    #[test]
    fn fixed_modes_ignore_grants() {
        let allow = Service::new(StaticRunAuthzPluginConfig {
            mode: StaticCheckMode::AllowAll,
            ..StaticRunAuthzPluginConfig::default()
        });
        let deny = Service::new(StaticRunAuthzPluginConfig {
            mode: StaticCheckMode::DenyAll,
            ..grants_config()
        });
        let q = query(SubjectType::User, "alice", "ws-acme", "remediations_view");

        assert!(allow.check(&q).unwrap());
        assert!(!deny.check(&q).unwrap());
    }

    #[test]
    fn workspace_mapping_then_pattern() {
        let service = Service::new(grants_config());

        assert_eq!(service.workspace_for("1000").unwrap().as_str(), "ws-acme");
        assert_eq!(service.workspace_for("2000").unwrap().as_str(), "2000-default");
    }

    #[test]
    fn empty_pattern_leaves_unmapped_tenants_without_workspace() {
        let service = Service::new(StaticRunAuthzPluginConfig {
            default_workspace_pattern: String::new(),
            ..grants_config()
        });

        assert!(matches!(
            service.workspace_for("2000"),
            Err(WorkspaceLookupError::NotFound { tenant_id }) if tenant_id == "2000"
        ));
    }

    #[test]
    fn unknown_subject_has_no_permissions() {
        let mut config = grants_config();
        config.permissions.insert(
            "alice".to_owned(),
            vec![Permission::with_filters(
                "run:read",
                vec![AttributeFilter::equal("service", "remediations")],
            )],
        );
        let service = Service::new(config);

        assert_eq!(service.permissions_for("alice").unwrap().len(), 1);
        assert!(service.permissions_for("mallory").unwrap().is_empty());
    }

    #[test]
    fn simulated_outage_fails_each_collaborator() {
        let service = Service::new(StaticRunAuthzPluginConfig {
            outage: SimulatedOutage {
                permissions: true,
                workspace_lookup: true,
                relationship_checks: true,
            },
            ..grants_config()
        });

        assert!(service.permissions_for("alice").is_err());
        assert!(service.workspace_for("1000").is_err());
        assert!(service
            .check(&query(SubjectType::User, "alice", "ws-acme", "remediations_view"))
            .is_err());
    }
}

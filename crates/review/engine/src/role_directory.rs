//! Role resolution for role-based approver requirements
//!
//! Identities arrive pre-resolved from the identity collaborator. The engine
//! only needs to know who holds a role at the moment a workflow is created.

use review_types::ApproverIdentity;
use std::collections::{BTreeMap, HashMap};

/// Looks up the identities holding a role
pub trait RoleDirectory: Send + Sync {
    fn members(&self, role: &str) -> Vec<ApproverIdentity>;
}

/// Fixed role membership, usually loaded from configuration
#[derive(Clone, Debug, Default)]
pub struct StaticRoleDirectory {
    roles: HashMap<String, Vec<ApproverIdentity>>,
}

impl StaticRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>, members: Vec<ApproverIdentity>) -> Self {
        self.roles.insert(role.into(), members);
        self
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}

impl From<BTreeMap<String, Vec<ApproverIdentity>>> for StaticRoleDirectory {
    fn from(roles: BTreeMap<String, Vec<ApproverIdentity>>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn members(&self, role: &str) -> Vec<ApproverIdentity> {
        self.roles.get(role).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_of_known_and_unknown_roles() {
        let directory = StaticRoleDirectory::new().with_role(
            "team-lead",
            vec![
                ApproverIdentity::new("u-ana", "Ana"),
                ApproverIdentity::new("u-ben", "Ben"),
            ],
        );
        assert_eq!(directory.members("team-lead").len(), 2);
        assert!(directory.members("ghost").is_empty());
    }

    #[test]
    fn test_from_config_map() {
        let mut map = BTreeMap::new();
        map.insert("qa".to_string(), vec![ApproverIdentity::new("u-q", "Q")]);
        let directory = StaticRoleDirectory::from(map);
        assert_eq!(directory.role_count(), 1);
        assert_eq!(directory.members("qa")[0].name, "Q");
    }
}

//! The fixed vocabulary of resource kinds.

use crate::error::NamingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A kind of resource the naming convention knows how to name.
///
/// Each kind maps to a short, lowercase type tag that becomes part of the
/// derived name. The tags are stable: changing one renames every resource
/// of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
    ResourceGroup,
    StorageAccount,
    StorageContainer,
    Blob,
    SqlServer,
    SqlDatabase,
    HostingPlan,
    AppService,
    KeyVault,
    KeyVaultAccessPolicy,
    KeyVaultSecret,
    RoleAssignment,
    FirewallRule,
    DirectoryAdministrator,
    AnalyticsWorkspace,
    RandomPassword,
}

impl ResourceKind {
    /// Every supported kind, in declaration order
    pub const ALL: [ResourceKind; 16] = [
        Self::ResourceGroup,
        Self::StorageAccount,
        Self::StorageContainer,
        Self::Blob,
        Self::SqlServer,
        Self::SqlDatabase,
        Self::HostingPlan,
        Self::AppService,
        Self::KeyVault,
        Self::KeyVaultAccessPolicy,
        Self::KeyVaultSecret,
        Self::RoleAssignment,
        Self::FirewallRule,
        Self::DirectoryAdministrator,
        Self::AnalyticsWorkspace,
        Self::RandomPassword,
    ];

    /// Short type tag embedded in derived names
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "rg",
            Self::StorageAccount => "sa",
            Self::StorageContainer => "sc",
            Self::Blob => "blob",
            Self::SqlServer => "sql",
            Self::SqlDatabase => "sqdb",
            Self::HostingPlan => "asp",
            Self::AppService => "app",
            Self::KeyVault => "kv",
            Self::KeyVaultAccessPolicy => "kvap",
            Self::KeyVaultSecret => "kvs",
            Self::RoleAssignment => "ra",
            Self::FirewallRule => "fw",
            Self::DirectoryAdministrator => "sqla",
            Self::AnalyticsWorkspace => "law",
            Self::RandomPassword => "pwd",
        }
    }

    /// Human-readable description of the kind
    pub fn description(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "Resource group",
            Self::StorageAccount => "Storage account",
            Self::StorageContainer => "Storage container",
            Self::Blob => "Blob",
            Self::SqlServer => "SQL server",
            Self::SqlDatabase => "SQL database",
            Self::HostingPlan => "Hosting plan",
            Self::AppService => "Application host",
            Self::KeyVault => "Secret store",
            Self::KeyVaultAccessPolicy => "Secret store access policy",
            Self::KeyVaultSecret => "Secret",
            Self::RoleAssignment => "Role assignment",
            Self::FirewallRule => "Firewall rule",
            Self::DirectoryAdministrator => "Directory administrator",
            Self::AnalyticsWorkspace => "Analytics workspace",
            Self::RandomPassword => "Generated password",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ResourceKind {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| NamingError::UnknownKind(s.to_string()))
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = NamingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.tag().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique_and_short() {
        let tags: HashSet<_> = ResourceKind::ALL.iter().map(ResourceKind::tag).collect();
        assert_eq!(tags.len(), ResourceKind::ALL.len());
        for tag in tags {
            assert!(!tag.is_empty() && tag.len() <= 4, "tag {tag} out of bounds");
            assert!(tag.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!("rg".parse::<ResourceKind>(), Ok(ResourceKind::ResourceGroup));
        assert_eq!("sa".parse::<ResourceKind>(), Ok(ResourceKind::StorageAccount));
        assert_eq!(
            "vm".parse::<ResourceKind>(),
            Err(NamingError::UnknownKind("vm".to_string()))
        );
        assert!("RG".parse::<ResourceKind>().is_err());
    }
}

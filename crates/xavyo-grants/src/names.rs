//! Well-known grant names.
//!
//! Grants are dotted strings: `<system>.<functional module>.<grant type>`.
//! Admin-panel grants live in their own namespace (see
//! [`ADMIN_PANEL_GRANT_PREFIX`]) and are matched against the owner's
//! userspace instead of its work group.

/// Prefix that marks a grant as an admin-panel grant.
pub const ADMIN_PANEL_GRANT_PREFIX: &str = "admins.";

/// Blanket userspace administration grant.
pub const ADMINS_USER_ENTITIES_WRITE: &str = "admins.user-entities-write";

/// Grant that only the system user is expected to hold.
pub const ONLY_SYSTEM_USER: &str = "only.system.user";

pub const BASE_SYSTEM_WORK_GROUP_ROLES_READ: &str = "base-system.work-group.roles-read";
pub const BASE_SYSTEM_WORK_GROUP_ROLES_WRITE: &str = "base-system.work-group.roles-write";
pub const BASE_SYSTEM_WORK_GROUP_READ: &str = "base-system.work-group.read";
pub const BASE_SYSTEM_WORK_GROUP_WRITE: &str = "base-system.work-group.write";
pub const BASE_SYSTEM_WORK_GROUP_DELIVERIES_READ: &str = "base-system.work-group.deliveries-read";
pub const BASE_SYSTEM_WORK_GROUP_DELIVERIES_WRITE: &str =
    "base-system.work-group.deliveries-write";
pub const CLOUD_MANAGEMENT_GRANTS_META_READ: &str = "cloud-management.grants-meta.read";
pub const CLOUD_MANAGEMENT_GRANTS_META_WRITE: &str = "cloud-management.grants-meta.write";

/// A requested grant name, classified by the owner-matching rule it needs.
///
/// ```
/// use xavyo_grants::Grant;
///
/// assert!(matches!(Grant::classify("admins.user-entities-write"), Grant::AdminPanel(_)));
/// assert!(matches!(Grant::classify("base-system.rsm.read"), Grant::Regular(_)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grant<'a> {
    /// Work-group scoped grant.
    Regular(&'a str),
    /// Userspace scoped admin-panel grant.
    AdminPanel(&'a str),
}

impl<'a> Grant<'a> {
    /// Classify a grant name by its namespace.
    #[must_use]
    pub fn classify(name: &'a str) -> Self {
        if name.starts_with(ADMIN_PANEL_GRANT_PREFIX) {
            Grant::AdminPanel(name)
        } else {
            Grant::Regular(name)
        }
    }

    /// The full grant name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            Grant::Regular(name) | Grant::AdminPanel(name) => name,
        }
    }

    #[must_use]
    pub fn is_admin_panel(&self) -> bool {
        matches!(self, Grant::AdminPanel(_))
    }
}

/// Keep only the admin-panel grants out of `names`.
#[must_use]
pub fn admin_panel_grants<'a>(names: &[&'a str]) -> Vec<&'a str> {
    names
        .iter()
        .copied()
        .map(Grant::classify)
        .filter(Grant::is_admin_panel)
        .map(|grant| grant.name())
        .collect()
}

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "materials.issue"). The wildcard
/// `"*"` grants everything and is only handed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const MATERIALS_READ: Permission = Permission(Cow::Borrowed("materials.read"));
    pub const MATERIALS_WRITE: Permission = Permission(Cow::Borrowed("materials.write"));
    pub const MATERIALS_DELETE: Permission = Permission(Cow::Borrowed("materials.delete"));
    pub const MATERIALS_ISSUE: Permission = Permission(Cow::Borrowed("materials.issue"));
    pub const RECORDS_READ: Permission = Permission(Cow::Borrowed("records.read"));
    pub const RECORDS_DELETE: Permission = Permission(Cow::Borrowed("records.delete"));
    pub const MESSAGES_USE: Permission = Permission(Cow::Borrowed("messages.use"));
    pub const PERSONNEL_READ: Permission = Permission(Cow::Borrowed("personnel.read"));
    pub const PEOPLE_MANAGE: Permission = Permission(Cow::Borrowed("personnel.manage"));
    pub const INVENTORY_RECONCILE: Permission = Permission(Cow::Borrowed("inventory.reconcile"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Static role → permission mapping.
    pub fn granted_to(role: Role) -> Vec<Permission> {
        match role {
            Role::Admin => vec![Permission::WILDCARD],
            Role::Operator => vec![
                Permission::MATERIALS_READ,
                Permission::MATERIALS_WRITE,
                Permission::MATERIALS_DELETE,
                Permission::MATERIALS_ISSUE,
                Permission::RECORDS_READ,
                Permission::MESSAGES_USE,
                Permission::PERSONNEL_READ,
            ],
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

//! Access control lists and the visibility they imply

use adapter_core::Visibility;

/// Grantee URI for the anonymous "all users" group
pub const ALL_USERS_GROUP: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    ReadAcp,
    WriteAcp,
    FullControl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    /// Predefined group, identified by URI
    Group(String),
    /// Account, identified by canonical ID
    CanonicalUser(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: Permission,
}

/// Grants attached to one object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    pub owner: Option<String>,
    pub grants: Vec<Grant>,
}

impl Acl {
    /// Public iff the all-users group holds `Read`; any other permission for it stays private.
    pub fn visibility(&self) -> Visibility {
        let public = self.grants.iter().any(|grant| {
            grant.permission == Permission::Read
                && matches!(&grant.grantee, Grantee::Group(uri) if uri == ALL_USERS_GROUP)
        });

        if public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// Predefined ACL applied on commit or by `put_object_acl`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
}

impl CannedAcl {
    /// Expand into the grants the service would store
    pub fn to_acl(self, owner: Option<String>) -> Acl {
        let mut grants = Vec::new();
        if let Some(id) = &owner {
            grants.push(Grant {
                grantee: Grantee::CanonicalUser(id.clone()),
                permission: Permission::FullControl,
            });
        }
        if self == CannedAcl::PublicRead {
            grants.push(Grant {
                grantee: Grantee::Group(ALL_USERS_GROUP.to_string()),
                permission: Permission::Read,
            });
        }
        Acl { owner, grants }
    }
}

impl From<Visibility> for CannedAcl {
    fn from(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Public => CannedAcl::PublicRead,
            Visibility::Private => CannedAcl::Private,
        }
    }
}

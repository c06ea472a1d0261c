use std::io;
use std::path::Path;

use indexmap::IndexMap;
use log::{error, warn};
use serde::Deserialize;

use crate::error::DeskError;

/// A named role. Roles with `sees_all` bypass the owner match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub sees_all: bool,
}

impl Role {
    pub fn full_visibility(name: impl Into<String>) -> Self {
        Role {
            name: name.into(),
            sees_all: true,
        }
    }

    pub fn restricted(name: impl Into<String>) -> Self {
        Role {
            name: name.into(),
            sees_all: false,
        }
    }
}

/// Who is asking: their role and the owner name their rows carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessScope {
    pub role: Role,
    pub filter_name: String,
}

impl AccessScope {
    pub fn new(role: Role, filter_name: impl Into<String>) -> Self {
        AccessScope {
            role,
            filter_name: filter_name.into(),
        }
    }

    pub fn sees_all(&self) -> bool {
        self.role.sees_all
    }
}

/// The set of known roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBook {
    roles: Vec<Role>,
}

impl RoleBook {
    pub fn new(roles: Vec<Role>) -> Self {
        RoleBook { roles }
    }

    pub fn default_roles() -> Vec<Role> {
        vec![Role::full_visibility("admin"), Role::restricted("standard")]
    }

    /// Unknown names resolve to a restricted role of the same name.
    pub fn resolve(&self, name: &str) -> Role {
        match self.roles.iter().find(|role| role.name == name) {
            Some(role) => role.clone(),
            None => {
                warn!("role '{}' is not configured, restricting to own rows", name);
                Role::restricted(name)
            }
        }
    }
}

impl Default for RoleBook {
    fn default() -> Self {
        RoleBook::new(RoleBook::default_roles())
    }
}

// the roster also has a password column; it is never read
#[derive(Debug, Deserialize)]
struct RosterEntry {
    username: String,
    role: String,
    filter_name: String,
}

/// Users known to the desk, loaded from the `users.csv` roster.
#[derive(Debug, Default)]
pub struct Roster {
    users: IndexMap<String, RosterEntry>,
}

impl Roster {
    pub fn load(path: &Path) -> Result<Self, DeskError> {
        let file = std::fs::File::open(path).map_err(|err| DeskError::Roster {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Roster::from_reader(file).map_err(|err| DeskError::Roster {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    pub fn from_reader<R: io::Read>(source: R) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_reader(source);
        // headers are needed up front; a roster without them is unusable
        reader.headers()?;

        let users = reader
            .deserialize::<RosterEntry>()
            .filter_map(|item| {
                if item.is_err() {
                    error!("could not parse roster entry, will be skipped: {:?}", item)
                }
                item.ok()
            })
            // first entry wins for a repeated username
            .fold(IndexMap::new(), |mut users, entry| {
                users.entry(entry.username.clone()).or_insert(entry);
                users
            });
        Ok(Roster { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn scope_for(&self, username: &str, roles: &RoleBook) -> Result<AccessScope, DeskError> {
        let entry = self
            .users
            .get(username)
            .ok_or_else(|| DeskError::UnknownUser(username.to_string()))?;
        Ok(AccessScope::new(
            roles.resolve(&entry.role),
            entry.filter_name.clone(),
        ))
    }
}

#[cfg(test)]
const ROSTER: &str = "\
username,password,role,filter_name
admin,secret,admin,
bob,hunter2,standard,Bob Smith
bob,other,admin,Someone Else
carol,pw,auditor,Carol
";

#[test]
fn roster_resolves_scopes() {
    let roster = Roster::from_reader(ROSTER.as_bytes()).unwrap();
    let roles = RoleBook::default();

    assert_eq!(roster.len(), 3);

    let admin = roster.scope_for("admin", &roles).unwrap();
    assert!(admin.sees_all());

    let bob = roster.scope_for("bob", &roles).unwrap();
    assert!(!bob.sees_all());
    assert_eq!(bob.filter_name, "Bob Smith");
}

#[test]
fn unconfigured_roles_are_restricted() {
    let roster = Roster::from_reader(ROSTER.as_bytes()).unwrap();

    let carol = roster.scope_for("carol", &RoleBook::default()).unwrap();
    assert_eq!(carol.role, Role::restricted("auditor"));

    let roles = RoleBook::new(vec![Role::full_visibility("auditor")]);
    let carol = roster.scope_for("carol", &roles).unwrap();
    assert!(carol.sees_all());
}

#[test]
fn unknown_user_is_an_error() {
    let roster = Roster::from_reader(ROSTER.as_bytes()).unwrap();

    assert!(matches!(
        roster.scope_for("mallory", &RoleBook::default()),
        Err(DeskError::UnknownUser(name)) if name == "mallory"
    ));
}

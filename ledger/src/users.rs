//! User directory
//!
//! User provisioning belongs to an external collaborator; the engine only
//! reads identities. The directory mirrors what that collaborator maintains.

use common::error::{Error, Result};
use common::model::user::{Role, User};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Directory of provisioned users
pub struct UserDirectory {
    users: DashMap<Uuid, User>,
}

impl UserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    /// Register a regular user and issue an API credential
    pub fn register(&self, name: impl Into<String>) -> Result<User> {
        self.insert(User::new(name, Role::User)?)
    }

    /// Register an administrative user
    pub fn register_admin(&self, name: impl Into<String>) -> Result<User> {
        self.insert(User::new(name, Role::Admin)?)
    }

    fn insert(&self, user: User) -> Result<User> {
        info!("Registering user {} ({:?})", user.name, user.role);
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Look up a user by id
    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    /// Look up a user by API credential
    pub fn find_by_api_key(&self, api_key: &str) -> Option<User> {
        self.users
            .iter()
            .find(|entry| entry.value().api_key == api_key)
            .map(|entry| entry.value().clone())
    }

    /// Remove a user (administrative action). Trade history referencing the
    /// user survives removal; transaction order references are weak links.
    pub fn remove(&self, id: Uuid) -> Result<User> {
        self.users
            .remove(&id)
            .map(|(_, user)| user)
            .ok_or_else(|| Error::UserNotFound(format!("user {} does not exist", id)))
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

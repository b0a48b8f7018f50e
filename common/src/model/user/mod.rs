//! User models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Regular trading user
    User,
    /// Administrative user (instrument and balance provisioning)
    Admin,
}

/// User model
///
/// Users are provisioned by an external collaborator; the engine only reads
/// them. Immutable once created except by administrative action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Role
    pub role: Role,
    /// API credential issued at registration
    pub api_key: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id and API credential.
    pub fn new(name: impl Into<String>, role: Role) -> Result<Self> {
        let name = name.into();
        if name.len() < 3 || name.len() > 100 {
            return Err(Error::ValidationError(format!(
                "user name must be 3..=100 characters, got {}",
                name.len()
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            role,
            api_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        })
    }

    /// Check if the user has administrative rights
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

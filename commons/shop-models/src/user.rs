use crate::enums::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account of the back office.
///
/// The password hash is never serialized, so neither API responses nor
/// cached copies carry it. Code that needs the hash must read the row
/// from the relational store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username: String::new(),
            email: String::new(),
            password_hash: String::new(),
            full_name: String::new(),
            role: UserRole::User,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub user_id: i64,
    pub product_id: i64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserFilter {
    /// Case-insensitive substring match on username or email.
    pub search: Option<String>,
    #[serde(default)]
    pub roles: Vec<UserRole>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            if !user.username.to_lowercase().contains(&needle)
                && !user.email.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if !self.roles.is_empty() && !self.roles.contains(&user.role) {
            return false;
        }

        true
    }
}

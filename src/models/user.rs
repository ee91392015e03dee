use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authority granted to an account. Serialized with the `ROLE_` prefix, which
/// is also how roles appear inside access tokens and in the `users.roles`
/// column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROLE_USER" => Ok(Role::User),
            "ROLE_ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// An account as seen by the authentication subsystem.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    /// Unique; an email address.
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Public view of an account, without the password hash.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub roles: Vec<Role>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            roles: user.roles.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_round_trip_through_strings() {
        assert_eq!("ROLE_ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "ROLE_USER");
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ROLE_ADMIN\"");
    }

    #[test]
    fn test_profile_hides_password_hash() {
        let user = User {
            id: 7,
            username: "test@example.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            roles: vec![Role::User],
            created_at: Utc::now(),
        };
        assert!(user.has_role(Role::User));
        assert!(!user.has_role(Role::Admin));

        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        assert_eq!(json["username"], "test@example.com");
        assert!(json.get("password_hash").is_none());
    }
}

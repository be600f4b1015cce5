//! Users, roles and the authenticated session

use crate::types::normalize_token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier assigned by the server
pub type UserId = i64;

/// What a user is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Customer,
    Courier,
    Admin,
}

impl UserRole {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Customer => "Cliente",
            Self::Courier => "Repartidor",
            Self::Admin => "Administrador",
        }
    }

    pub fn parse(raw: &str) -> Option<UserRole> {
        match normalize_token(raw).as_str() {
            "cliente" | "customer" => Some(Self::Customer),
            "repartidor" | "courier" | "driver" => Some(Self::Courier),
            "administrador" | "admin" | "administrator" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Customer => "Customer",
            Self::Courier => "Courier",
            Self::Admin => "Admin",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
}

/// The signed-in user and bearer token
///
/// The token only ever lives in memory; see `SessionStore`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl Session {
    pub fn from_user(token: impl Into<String>, user: &User) -> Self {
        Self {
            token: token.into(),
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("Repartidor"), Some(UserRole::Courier));
        assert_eq!(UserRole::parse("ADMINISTRADOR"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("cliente"), Some(UserRole::Customer));
        assert_eq!(UserRole::parse("root"), None);
    }

    #[test]
    fn test_session_debug_hides_token() {
        let user = User {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            role: UserRole::Courier,
            phone: None,
        };
        let session = Session::from_user("secret-token", &user);
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("ana@example.com"));
    }
}

//! Signed-in user, persisted in client storage next to the cart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, warn};
use crate::cart::{KeyValueStore, StorageError};

pub const SESSION_KEY: &str = "volt_user";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole { Admin, Manager, Client }

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Manager => write!(f, "manager"),
            Self::Client => write!(f, "client"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "client" => Ok(Self::Client),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User { pub id: String, pub email: String, pub role: UserRole, pub name: String }

impl User {
    pub fn can_administer(&self) -> bool { matches!(self.role, UserRole::Admin | UserRole::Manager) }
}

pub struct Session {
    user: Option<User>,
    storage: Arc<dyn KeyValueStore>,
}

impl Session {
    /// Corrupt stored values are treated as signed out.
    pub fn hydrate(storage: Arc<dyn KeyValueStore>) -> Self {
        let user = match storage.get(SESSION_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Option<User>>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored session is corrupt, signing out");
                None
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Stored session is unreadable, signing out");
                None
            }
        };
        Self { user, storage }
    }

    pub fn user(&self) -> Option<&User> { self.user.as_ref() }

    pub fn is_admin(&self) -> bool { self.user.as_ref().is_some_and(User::can_administer) }

    /// The display name is the local part of `email`.
    pub fn login(&mut self, email: &str, role: UserRole) -> &User {
        let email = email.trim();
        let name = email.split('@').next().unwrap_or_default().to_string();
        let user = User { id: "u1".to_string(), email: email.to_string(), role, name };
        if let Err(e) = serde_json::to_string(&user).map_err(StorageError::from).and_then(|json| self.storage.set(SESSION_KEY, &json)) {
            error!(error = %e, "Failed to persist session");
        }
        self.user.insert(user)
    }

    pub fn logout(&mut self) {
        self.user = None;
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            error!(error = %e, "Failed to clear stored session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::MemoryStore;

    #[test]
    fn test_login_persists_and_derives_name() {
        let storage = Arc::new(MemoryStore::new());
        let mut session = Session::hydrate(storage.clone());
        assert!(session.user().is_none());
        let user = session.login("olena@voltstore.ua", UserRole::Manager);
        assert_eq!(user.name, "olena");

        let restored = Session::hydrate(storage.clone());
        assert!(restored.is_admin());
        assert_eq!(restored.user().unwrap().email, "olena@voltstore.ua");

        session.logout();
        assert!(Session::hydrate(storage).user().is_none());
    }

    #[test]
    fn test_client_is_not_admin() {
        let mut session = Session::hydrate(Arc::new(MemoryStore::new()));
        session.login("buyer@example.com", UserRole::Client);
        assert!(!session.is_admin());
    }

    #[test]
    fn test_corrupt_session_signs_out() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(SESSION_KEY, "{\"role\":\"root\"}").unwrap();
        assert!(Session::hydrate(storage).user().is_none());
    }
}

use crate::models::User;

use super::KeyValueStore;

// Session-scoped storage: the app always starts signed out after the
// browser closes; only a live tab keeps the token.
const TOKEN_STORAGE_KEY: &str = "zs_token";

/// Identity cache for the storefront. Holds the bearer token and the user it
/// resolved to. Booting yields a pending token that the shell must confirm
/// against `GET /api/auth/me`; any failure invalidates it locally.
pub struct Session<S: KeyValueStore> {
    store: S,
    token: Option<String>,
    user: Option<User>,
}

impl<S: KeyValueStore> Session<S> {
    pub fn load(store: S) -> Self {
        let token = store.get(TOKEN_STORAGE_KEY);
        Self {
            store,
            token,
            user: None,
        }
    }

    /// Token rehydrated from storage but not yet confirmed by the server.
    pub fn pending_token(&self) -> Option<&str> {
        if self.user.is_none() {
            self.token.as_deref()
        } else {
            None
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Login, register and OTP verification all land here with a fresh
    /// token/user pair.
    pub fn establish(&mut self, token: String, user: User) {
        self.store.set(TOKEN_STORAGE_KEY, &token);
        self.token = Some(token);
        self.user = Some(user);
    }

    /// The boot-time identity probe failed; drop the stale token and treat
    /// the visitor as anonymous.
    pub fn invalidate(&mut self) {
        self.store.remove(TOKEN_STORAGE_KEY);
        self.token = None;
        self.user = None;
    }

    /// Pure local clear. Tokens are stateless server-side and simply expire.
    pub fn logout(&mut self) {
        self.invalidate();
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            phone: String::new(),
            role: role.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_session_is_anonymous() {
        let session = Session::load(MemoryStore::new());
        assert!(session.pending_token().is_none());
        assert!(!session.is_authenticated());
        assert!(!session.is_admin());
    }

    #[test]
    fn establish_persists_token_and_sets_identity() {
        let store = MemoryStore::new();
        let mut session = Session::load(store.clone());
        session.establish("tok".into(), user("user"));
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("tok"));

        // A new tab in the same browser session sees the pending token.
        let rehydrated = Session::load(store);
        assert_eq!(rehydrated.pending_token(), Some("tok"));
        assert!(!rehydrated.is_authenticated());
    }

    #[test]
    fn failed_probe_clears_the_stored_token() {
        let store = MemoryStore::new();
        store.set("zs_token", "stale");
        let mut session = Session::load(store.clone());
        assert_eq!(session.pending_token(), Some("stale"));
        session.invalidate();
        assert!(session.pending_token().is_none());
        assert!(store.get("zs_token").is_none());
    }

    #[test]
    fn logout_is_a_local_clear() {
        let store = MemoryStore::new();
        let mut session = Session::load(store.clone());
        session.establish("tok".into(), user("user"));
        session.logout();
        assert!(!session.is_authenticated());
        assert!(store.get("zs_token").is_none());
    }

    #[test]
    fn is_admin_checks_role_equality() {
        let mut session = Session::load(MemoryStore::new());
        session.establish("tok".into(), user("admin"));
        assert!(session.is_admin());

        let mut session = Session::load(MemoryStore::new());
        session.establish("tok".into(), user("user"));
        assert!(!session.is_admin());
    }
}

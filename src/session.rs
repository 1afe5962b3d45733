//! Client-side session cache contract.
//!
//! The browser client persists the last login/register response whole under
//! a single well-known key and mirrors it into in-memory state; every
//! privileged request reads the token from that state. This module is the
//! canonical definition of that contract: the serialized payload, the
//! storage key, and the allowed state transitions (hydrate once at startup,
//! login, logout). Expired tokens are not detected at hydration; the server
//! reports them with a 401 on the next privileged call.

use std::collections::HashMap;

use crate::users::dto::AuthResponse;

/// The single storage key the client uses for its session.
pub const SESSION_KEY: &str = "session";

/// The persisted payload: exactly the register/login response.
pub type Session = AuthResponse;

/// Durable single-key-value storage as the browser exposes it.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// In-memory store, used by tests in place of browser storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Single source of truth for the client's session state. All mutation goes
/// through [`hydrate`](Self::hydrate), [`login`](Self::login) and
/// [`logout`](Self::logout); views only read.
pub struct SessionCache<S: SessionStore> {
    store: S,
    current: Option<Session>,
    hydrated: bool,
}

impl<S: SessionStore> SessionCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: None,
            hydrated: false,
        }
    }

    /// Read storage into memory. Runs once per app start; later calls are
    /// no-ops so nothing can repopulate state behind the defined actions.
    /// A corrupt payload is dropped from storage and treated as logged out.
    pub fn hydrate(&mut self) {
        if self.hydrated {
            return;
        }
        self.hydrated = true;
        let Some(raw) = self.store.get(SESSION_KEY) else {
            return;
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => self.current = Some(session),
            Err(_) => self.store.remove(SESSION_KEY),
        }
    }

    /// Write-through on successful login or registration.
    pub fn login(&mut self, session: Session) {
        if let Ok(raw) = serde_json::to_string(&session) {
            self.store.set(SESSION_KEY, raw);
        }
        self.current = Some(session);
    }

    /// Clear both the durable entry and in-memory state.
    pub fn logout(&mut self) {
        self.store.remove(SESSION_KEY);
        self.current = None;
    }

    pub fn session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.is_some()
    }

    /// Value for the Authorization header of a privileged request.
    pub fn bearer(&self) -> Option<String> {
        self.current.as_ref().map(|s| format!("Bearer {}", s.token))
    }

    #[cfg(test)]
    fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::dto::PublicUser;
    use crate::users::repo::Role;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn make_session(token: &str) -> Session {
        Session {
            token: token.into(),
            user: PublicUser {
                id: Uuid::new_v4(),
                full_name: "A B".into(),
                email: "a@b.com".into(),
                profile_picture: None,
                bio: None,
                role: Role::Cook,
                joined_at: OffsetDateTime::now_utc(),
            },
        }
    }

    #[test]
    fn starts_logged_out() {
        let mut cache = SessionCache::new(MemoryStore::default());
        cache.hydrate();
        assert!(!cache.is_logged_in());
        assert!(cache.bearer().is_none());
    }

    #[test]
    fn login_writes_through_and_logout_clears() {
        let mut cache = SessionCache::new(MemoryStore::default());
        cache.hydrate();
        cache.login(make_session("tok-1"));
        assert_eq!(cache.bearer().as_deref(), Some("Bearer tok-1"));

        cache.logout();
        assert!(!cache.is_logged_in());
        assert!(cache.bearer().is_none());
        assert!(cache.into_store().get(SESSION_KEY).is_none());
    }

    #[test]
    fn login_persists_across_restart() {
        let mut cache = SessionCache::new(MemoryStore::default());
        cache.hydrate();
        cache.login(make_session("tok-2"));

        // A fresh cache over the same storage sees the session.
        let mut restarted = SessionCache::new(cache.into_store());
        restarted.hydrate();
        assert_eq!(restarted.session().unwrap().token, "tok-2");
    }

    #[test]
    fn hydrate_restores_a_persisted_session() {
        let mut store = MemoryStore::default();
        let session = make_session("persisted");
        store.set(SESSION_KEY, serde_json::to_string(&session).unwrap());

        let mut cache = SessionCache::new(store);
        cache.hydrate();
        assert!(cache.is_logged_in());
        assert_eq!(cache.session().unwrap().token, "persisted");
    }

    #[test]
    fn hydrate_runs_only_once() {
        let mut store = MemoryStore::default();
        store.set(
            SESSION_KEY,
            serde_json::to_string(&make_session("early")).unwrap(),
        );
        let mut cache = SessionCache::new(store);
        cache.hydrate();
        cache.logout();

        // A second hydrate must not resurrect the cleared session.
        cache.hydrate();
        assert!(!cache.is_logged_in());
    }

    #[test]
    fn corrupt_payload_is_discarded() {
        let mut store = MemoryStore::default();
        store.set(SESSION_KEY, "{not json".into());
        let mut cache = SessionCache::new(store);
        cache.hydrate();
        assert!(!cache.is_logged_in());
    }
}

//! Application-scoped cache of the latest auth session per signed-in user.
//!
//! Auth handlers report sign-in, refresh, user update and sign-out here.
//! Listeners subscribe for those events; each new subscriber first receives
//! a `Sync` event. A panicking listener is logged and skipped so the others
//! still receive the event.

use crate::models::auth::{AuthSession, AuthUserRecord};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    Sync,
    SignedIn,
    TokenRefreshed,
    UserUpdated,
    SignedOut,
}

impl AuthEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventKind::Sync => "sync",
            AuthEventKind::SignedIn => "signed_in",
            AuthEventKind::TokenRefreshed => "token_refreshed",
            AuthEventKind::UserUpdated => "user_updated",
            AuthEventKind::SignedOut => "signed_out",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub user_id: Option<Uuid>,
    /// Session after the event; `None` for `Sync` and `SignedOut`.
    pub session: Option<AuthSession>,
}

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
pub struct SessionContext {
    sessions: DashMap<Uuid, AuthSession>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_listener_id: AtomicU64,
}

impl SessionContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Latest known session for `user_id`.
    pub fn current(&self, user_id: Uuid) -> Option<AuthSession> {
        self.sessions.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().insert(id, listener.clone());

        let sync = AuthEvent {
            kind: AuthEventKind::Sync,
            user_id: None,
            session: None,
        };
        deliver(id, &listener, &sync);

        Subscription {
            id,
            context: Arc::downgrade(self),
        }
    }

    pub fn signed_in(&self, session: AuthSession) {
        self.store(AuthEventKind::SignedIn, session);
    }

    pub fn token_refreshed(&self, session: AuthSession) {
        self.store(AuthEventKind::TokenRefreshed, session);
    }

    /// Replace the user record of a cached session.
    pub fn user_updated(&self, user: AuthUserRecord) {
        let user_id = user.id;
        let session = self.sessions.get_mut(&user_id).map(|mut entry| {
            entry.user = user;
            entry.clone()
        });
        self.emit(&AuthEvent {
            kind: AuthEventKind::UserUpdated,
            user_id: Some(user_id),
            session,
        });
    }

    pub fn signed_out(&self, user_id: Uuid) {
        self.sessions.remove(&user_id);
        self.emit(&AuthEvent {
            kind: AuthEventKind::SignedOut,
            user_id: Some(user_id),
            session: None,
        });
    }

    fn store(&self, kind: AuthEventKind, session: AuthSession) {
        let user_id = session.user_id();
        self.sessions.insert(user_id, session.clone());
        self.emit(&AuthEvent {
            kind,
            user_id: Some(user_id),
            session: Some(session),
        });
    }

    fn emit(&self, event: &AuthEvent) {
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<(u64, Listener)> = self
            .lock_listeners()
            .iter()
            .map(|(id, listener)| (*id, listener.clone()))
            .collect();
        for (id, listener) in &listeners {
            deliver(*id, listener, event);
        }
    }

    fn remove_listener(&self, id: u64) {
        self.lock_listeners().remove(&id);
    }

    fn lock_listeners(&self) -> MutexGuard<'_, BTreeMap<u64, Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn deliver(id: u64, listener: &Listener, event: &AuthEvent) {
    if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
        tracing::error!(
            listener_id = id,
            event = event.kind.as_str(),
            "Auth event listener panicked"
        );
    }
}

/// Handle returned by [`SessionContext::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    context: Weak<SessionContext>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(context) = self.context.upgrade() {
            context.remove_listener(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn session(user_id: Uuid, token: &str) -> AuthSession {
        serde_json::from_value(json!({
            "access_token": token,
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": { "id": user_id, "email": "ana@loja.com" }
        }))
        .unwrap()
    }

    fn recorder(context: &Arc<SessionContext>) -> (Arc<StdMutex<Vec<AuthEventKind>>>, Subscription) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = context.subscribe(move |event| sink.lock().unwrap().push(event.kind));
        (seen, subscription)
    }

    #[test]
    fn subscribe_delivers_sync_first() {
        let context = SessionContext::new();
        let (seen, _subscription) = recorder(&context);

        assert_eq!(*seen.lock().unwrap(), vec![AuthEventKind::Sync]);
    }

    #[test]
    fn caches_latest_session_per_user() {
        let context = SessionContext::new();
        let (seen, _subscription) = recorder(&context);
        let user = Uuid::new_v4();

        context.signed_in(session(user, "first"));
        context.token_refreshed(session(user, "second"));

        assert_eq!(context.current(user).unwrap().access_token, "second");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                AuthEventKind::Sync,
                AuthEventKind::SignedIn,
                AuthEventKind::TokenRefreshed
            ]
        );

        context.signed_out(user);
        assert!(context.current(user).is_none());
        assert_eq!(context.active_sessions(), 0);
    }

    #[test]
    fn user_update_replaces_cached_user() {
        let context = SessionContext::new();
        let user = Uuid::new_v4();
        context.signed_in(session(user, "token"));

        let mut record = context.current(user).unwrap().user;
        record.email = Some("nova@loja.com".to_string());
        context.user_updated(record);

        assert_eq!(
            context.current(user).unwrap().user.email.as_deref(),
            Some("nova@loja.com")
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let context = SessionContext::new();
        let (seen, subscription) = recorder(&context);
        assert_eq!(context.listener_count(), 1);

        subscription.unsubscribe();
        context.signed_in(session(Uuid::new_v4(), "token"));

        assert_eq!(context.listener_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![AuthEventKind::Sync]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let context = SessionContext::new();
        {
            let (_seen, _subscription) = recorder(&context);
            assert_eq!(context.listener_count(), 1);
        }
        assert_eq!(context.listener_count(), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let context = SessionContext::new();
        let _bad = context.subscribe(|event| {
            if event.kind == AuthEventKind::SignedIn {
                panic!("listener failure");
            }
        });
        let (seen, _good) = recorder(&context);

        context.signed_in(session(Uuid::new_v4(), "token"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![AuthEventKind::Sync, AuthEventKind::SignedIn]
        );
    }
}

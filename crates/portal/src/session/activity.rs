//! Client-side idle timeout.
//!
//! The browser shell keeps a last-activity timestamp in client-local storage
//! and forces a logout once the idle window passes. This is defense in depth
//! for shared front-office machines - it does not replace server-side
//! expiry, which is governed by the identity provider's token lifetime.
//!
//! The storage and the clock are injected so the logic runs unchanged in the
//! web shell, the desktop wrapper, and the tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{SessionConfig, SessionTokens};
use crate::identity::IdentityProvider;

/// Storage key for the last-activity timestamp (epoch milliseconds).
pub const LAST_ACTIVITY_KEY: &str = "lastActivity";

/// How often the idle check runs.
const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Where an expired session sends the user.
const LOGIN_PATH: &str = "/auth/login";

/// The fixed set of interaction events that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
}

/// Client-local storage as seen by the tracker.
///
/// Models the two browser stores the shell exposes: keyed values that
/// survive a tab reload, plus a session store cleared wholesale on logout.
pub trait ActivityStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Clear the session-scoped store.
    fn clear_session(&self);
}

/// A wall clock, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tracks interaction activity and enforces the idle window.
#[derive(Clone)]
pub struct ActivityTracker {
    store: Arc<dyn ActivityStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    max_inactivity: Duration,
}

impl ActivityTracker {
    /// Create a tracker over the given store and provider.
    #[must_use]
    pub fn new(
        store: Arc<dyn ActivityStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &SessionConfig,
    ) -> Self {
        Self::with_clock(store, identity, config, Arc::new(SystemClock))
    }

    /// Create a tracker with an explicit clock.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn ActivityStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            identity,
            clock,
            max_inactivity: config.max_inactivity,
        }
    }

    /// Record an interaction event.
    pub fn record(&self, _event: ActivityEvent) {
        let now_ms = self.clock.now().timestamp_millis();
        self.store.set(LAST_ACTIVITY_KEY, &now_ms.to_string());
    }

    /// The last recorded activity, if any.
    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(LAST_ACTIVITY_KEY)?;
        let ms = raw.parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(ms)
    }

    /// Whether the idle window has passed.
    ///
    /// A missing or unreadable record counts as expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let Some(last) = self.last_activity() else {
            return true;
        };

        let idle = self
            .clock
            .now()
            .signed_duration_since(last)
            .to_std()
            .unwrap_or(Duration::ZERO);
        idle > self.max_inactivity
    }

    /// Tear the session down: revoke at the provider, clear client storage.
    ///
    /// The provider call is best effort - local state is cleared even when
    /// the provider cannot be reached, so a flaky network cannot pin an
    /// expired session on a shared machine.
    pub async fn force_logout(&self, tokens: &SessionTokens) {
        if let Some(access) = tokens.access.as_deref()
            && let Err(err) = self.identity.sign_out(access).await
        {
            tracing::warn!(error = %err, "provider sign-out failed during idle logout");
        }

        self.store.remove(LAST_ACTIVITY_KEY);
        self.store.clear_session();
    }

    /// Run the periodic idle check until it fires.
    ///
    /// Records an initial activity mark on entry (mount counts as activity),
    /// then checks once per minute. On expiry: logout, then navigate to the
    /// login page through the supplied callback.
    pub async fn run<F>(self, tokens: SessionTokens, navigate: F)
    where
        F: Fn(&str) + Send,
    {
        self.record(ActivityEvent::PointerMove);

        loop {
            tokio::time::sleep(CHECK_INTERVAL).await;

            if self.is_expired() {
                tracing::info!("idle window exceeded; forcing logout");
                self.force_logout(&tokens).await;
                navigate(LOGIN_PATH);
                return;
            }
        }
    }
}

/// In-memory [`ActivityStore`] used by the tests and the desktop shell.
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    local: std::sync::Mutex<std::collections::HashMap<String, String>>,
    session: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryActivityStore {
    /// Put a value in the session-scoped store.
    pub fn set_session(&self, key: &str, value: &str) {
        if let Ok(mut session) = self.session.lock() {
            session.insert(key.to_owned(), value.to_owned());
        }
    }

    /// Whether the session-scoped store holds anything.
    #[must_use]
    pub fn session_is_empty(&self) -> bool {
        self.session.lock().map_or(true, |s| s.is_empty())
    }
}

impl ActivityStore for MemoryActivityStore {
    fn get(&self, key: &str) -> Option<String> {
        self.local.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut local) = self.local.lock() {
            local.insert(key.to_owned(), value.to_owned());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut local) = self.local.lock() {
            local.remove(key);
        }
    }

    fn clear_session(&self) {
        if let Ok(mut session) = self.session.lock() {
            session.clear();
        }
    }
}

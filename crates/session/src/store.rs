//! Session store: token state, subscribers, expiry timer and storage sync
//!
//! The store is created once per process with [`SessionStore::open`] and
//! shared as an `Arc`. Every transition (set, clear, expiry, change made by
//! another instance) notifies subscribers synchronously and in registration
//! order before the triggering call returns.
//!
//! Subscribers registered before the first transition and before any initial
//! notification has run also receive the loaded state once, from a spawned
//! task. That delivery is tied to the registration itself, so it cannot be
//! lost to a worker thread running ahead of the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use shopdesk_common::{Clock, SystemClock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::claims;
use crate::storage::{SessionStorage, StorageEvent};
use crate::SessionConfig;

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

/// Token and the expiry task armed for it.
///
/// Kept under one lock: a timer checks its generation and clears the token
/// without a window for another token to slip in between.
#[derive(Default)]
struct SessionState {
    token: Option<String>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Subscriber {
    id: u64,
    callback: Callback,
    awaiting_initial: bool,
}

#[derive(Default)]
struct Subscribers {
    entries: Vec<Subscriber>,
    /// Set once any notification, initial or transition, has been delivered
    initial_done: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the current bearer token.
pub struct SessionStore {
    config: SessionConfig,
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    subscribers: Mutex<Subscribers>,
    next_subscription: AtomicU64,
    sync_task: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
    this: Weak<SessionStore>,
}

impl SessionStore {
    /// Open the store, loading any persisted token.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime. Later calls may come from
    /// any thread; tasks are spawned on the runtime captured here.
    pub fn open(storage: Arc<dyn SessionStorage>, config: SessionConfig) -> Arc<Self> {
        Self::open_with_clock(storage, config, Arc::new(SystemClock))
    }

    /// Same as [`SessionStore::open`] with an explicit wall clock.
    pub fn open_with_clock(
        storage: Arc<dyn SessionStorage>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let runtime = Handle::current();
        let persisted = match storage.get_item(&config.key) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, key = %config.key, "Failed to load persisted session token");
                None
            }
        };

        let store = Arc::new_cyclic(|this| Self {
            config,
            storage,
            clock,
            state: Mutex::new(SessionState {
                token: persisted.clone(),
                ..SessionState::default()
            }),
            subscribers: Mutex::new(Subscribers::default()),
            next_subscription: AtomicU64::new(0),
            sync_task: Mutex::new(None),
            runtime,
            this: this.clone(),
        });

        if let Some(token) = persisted.as_deref() {
            let mut state = lock(&store.state);
            store.arm_expiry(&mut state, token);
        }
        store.start_sync();

        tracing::debug!(
            key = %store.config.key,
            authenticated = persisted.is_some(),
            "Session store opened"
        );
        store
    }

    /// Storage slot this store owns
    pub fn key(&self) -> &str {
        &self.config.key
    }

    /// Current token, if any.
    pub fn get_token(&self) -> Option<String> {
        lock(&self.state).token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.state)
            .token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Store a freshly issued token and notify subscribers.
    ///
    /// A token whose claims segment carries a numeric `exp` is cleared
    /// automatically `expiry_margin` before that instant. Any previously
    /// scheduled expiry is cancelled first.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        {
            let mut state = lock(&self.state);
            if let Err(e) = self.storage.set_item(&self.config.key, &token) {
                tracing::warn!(error = %e, key = %self.config.key, "Failed to persist session token");
            }
            self.arm_expiry(&mut state, &token);
            state.token = Some(token);
        }

        tracing::info!(key = %self.config.key, expires_at = ?self.expires_at(), "Session token set");
        self.notify();
    }

    /// Drop the session and notify subscribers. Always notifies, even when
    /// already logged out.
    pub fn clear_token(&self) {
        {
            let mut state = lock(&self.state);
            state.token = None;
            if let Err(e) = self.storage.remove_item(&self.config.key) {
                tracing::warn!(error = %e, key = %self.config.key, "Failed to remove persisted session token");
            }
            self.reset_expiry(&mut state, None);
        }

        tracing::info!(key = %self.config.key, "Session cleared");
        self.notify();
    }

    /// Register a callback invoked with the authentication state on every
    /// future transition.
    ///
    /// Registrations are independent: the same callback registered twice is
    /// called twice. Dropping the returned handle keeps the callback
    /// registered; call [`Subscription::unsubscribe`] to detach it.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let awaiting_initial = {
            let mut subscribers = lock(&self.subscribers);
            let awaiting_initial = !subscribers.initial_done;
            subscribers.entries.push(Subscriber {
                id,
                callback: Arc::new(callback),
                awaiting_initial,
            });
            awaiting_initial
        };

        if awaiting_initial {
            let weak = self.this.clone();
            self.runtime.spawn(async move {
                if let Some(store) = weak.upgrade() {
                    store.deliver_initial(id);
                }
            });
        }

        Subscription {
            id,
            store: self.this.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).entries.len()
    }

    /// Expiry instant from the current token's `exp` claim
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let token = self.get_token()?;
        let millis = claims::decode_claims(&token)?.expires_at_millis()?;
        DateTime::from_timestamp_millis(millis)
    }

    /// Whether the current token is inside its expiry margin.
    ///
    /// No timer is armed for a token that is already stale when set, so
    /// callers check this before relying on the session.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => {
                let margin = self.config.expiry_margin.as_millis() as i64;
                expires_at.timestamp_millis().saturating_sub(margin) <= self.clock.now_millis()
            }
            None => false,
        }
    }

    /// Whether an expiry task is currently scheduled
    pub fn has_pending_expiry(&self) -> bool {
        lock(&self.state)
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Apply a change another instance made to the storage origin.
    ///
    /// Returns `false` when the event concerns a different slot.
    pub fn apply_storage_event(&self, event: &StorageEvent) -> bool {
        if event.key != self.config.key {
            return false;
        }

        let token = event.new_value.clone().filter(|t| !t.is_empty());
        {
            let mut state = lock(&self.state);
            match token.as_deref() {
                Some(token) => self.arm_expiry(&mut state, token),
                None => self.reset_expiry(&mut state, None),
            }
            state.token = token.clone();
        }

        tracing::debug!(
            key = %self.config.key,
            source = event.source.0,
            authenticated = token.is_some(),
            "Session changed by another instance"
        );
        self.notify();
        true
    }

    fn remove_subscriber(&self, id: u64) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.entries.len();
        subscribers.entries.retain(|subscriber| subscriber.id != id);
        subscribers.entries.len() != before
    }

    fn notify(&self) {
        let authenticated = self.is_authenticated();

        // Callbacks may re-enter the store, so none of its locks are held here
        let callbacks: Vec<Callback> = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.initial_done = true;
            subscribers
                .entries
                .iter_mut()
                .map(|subscriber| {
                    subscriber.awaiting_initial = false;
                    Arc::clone(&subscriber.callback)
                })
                .collect()
        };

        for callback in callbacks {
            callback(authenticated);
        }
    }

    fn deliver_initial(&self, id: u64) {
        let callback = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.initial_done = true;
            subscribers
                .entries
                .iter_mut()
                .find(|subscriber| subscriber.id == id && subscriber.awaiting_initial)
                .map(|subscriber| {
                    subscriber.awaiting_initial = false;
                    Arc::clone(&subscriber.callback)
                })
        };

        if let Some(callback) = callback {
            callback(self.is_authenticated());
        }
    }

    fn arm_expiry(&self, state: &mut SessionState, token: &str) {
        let delay = claims::expiry_delay(token, self.clock.now_millis(), self.config.expiry_margin);
        self.reset_expiry(state, delay);
    }

    /// Cancel the pending expiry task, then schedule a new one after `delay`.
    fn reset_expiry(&self, state: &mut SessionState, delay: Option<Duration>) {
        state.generation = state.generation.wrapping_add(1);

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        if let Some(delay) = delay {
            let generation = state.generation;
            let weak = self.this.clone();
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Session expiry scheduled");

            state.timer = Some(self.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(store) = weak.upgrade() {
                    store.expire(generation);
                }
            }));
        }
    }

    fn expire(&self, generation: u64) {
        {
            let mut state = lock(&self.state);
            // Superseded by a later token
            if state.generation != generation {
                return;
            }
            state.generation = state.generation.wrapping_add(1);
            state.timer = None;
            state.token = None;
            if let Err(e) = self.storage.remove_item(&self.config.key) {
                tracing::warn!(error = %e, key = %self.config.key, "Failed to remove persisted session token");
            }
        }

        tracing::info!(key = %self.config.key, "Session token expired");
        self.notify();
    }

    fn start_sync(&self) {
        let Some(mut watcher) = self.storage.subscribe() else {
            return;
        };

        let weak = self.this.clone();
        let task = self.runtime.spawn(async move {
            while let Some(event) = watcher.next().await {
                let Some(store) = weak.upgrade() else {
                    break;
                };
                store.apply_storage_event(&event);
            }
        });

        *lock(&self.sync_task) = Some(task);
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        let sync_task = self
            .sync_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = sync_task {
            task.abort();
        }

        let timer = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .timer
            .take();
        if let Some(timer) = timer {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for SessionStore {
    #[mutants::skip]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.config.key)
            .field("token", &self.get_token().map(|_| "[REDACTED]"))
            .field("subscribers", &self.subscriber_count())
            .field("pending_expiry", &self.has_pending_expiry())
            .finish()
    }
}

/// Handle returned by [`SessionStore::on_change`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    store: Weak<SessionStore>,
}

impl Subscription {
    /// Detach the callback. Other subscriptions are unaffected.
    ///
    /// Returns `false` if the store no longer exists.
    pub fn unsubscribe(self) -> bool {
        match self.store.upgrade() {
            Some(store) => store.remove_subscriber(self.id),
            None => false,
        }
    }
}

//! Session and identity store.
//!
//! Holds the signed-in identity, persists it between runs, and tells the
//! identity-scoped stores when it changes. Session expiry is a client-side
//! timer against the persisted issue time; the backend is only asked whether
//! the user still exists.

mod monitor;

pub use monitor::{ActivityKind, SessionEvent, SessionMonitor};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use arcade_core::{Email, Identity, Money, UserId};

use crate::api::BackendClient;
use crate::config::SessionConfig;
use crate::error::{Result, StoreError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::storage::{KeyValueStorage, keys};
use crate::stores::LoadingGuard;

/// Fallback shown when registration fails without a backend message.
pub const REGISTER_FAILED: &str = "Could not create account";

/// Fallback shown when sign-in fails without a backend message.
pub const LOGIN_FAILED: &str = "Invalid credentials";

/// Something that follows the signed-in identity.
///
/// Called only when the identity's id changes: sign-in, registration,
/// restore, sign-out, or a purged session. Balance and profile updates of
/// the same identity are not reported.
#[async_trait]
pub trait IdentityListener: Send + Sync {
    async fn on_identity_changed(&self, identity: Option<&Identity>);
}

/// Current time in milliseconds since the Unix epoch.
fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The signed-in identity and its persisted snapshot.
pub struct SessionStore {
    api: BackendClient,
    storage: Arc<dyn KeyValueStorage>,
    config: SessionConfig,
    identity: RwLock<Option<Identity>>,
    loading: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn IdentityListener>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(
        api: BackendClient,
        storage: Arc<dyn KeyValueStorage>,
        config: SessionConfig,
    ) -> Self {
        Self {
            api,
            storage,
            config,
            identity: RwLock::new(None),
            loading: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The signed-in identity, if any.
    pub async fn current(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    /// Id of the signed-in identity, if any.
    pub async fn current_id(&self) -> Option<UserId> {
        self.identity.read().await.as_ref().map(|i| i.id)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.identity.read().await.is_some()
    }

    /// Whether a restore, sign-in or registration is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Session timing settings.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Follow identity changes. The store keeps only a weak reference.
    pub fn subscribe<L: IdentityListener + 'static>(&self, listener: &Arc<L>) {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn IdentityListener> = weak;
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(weak);
        }
    }

    async fn notify(&self, identity: Option<&Identity>) {
        let live: Vec<Arc<dyn IdentityListener>> = match self.listeners.lock() {
            Ok(mut listeners) => {
                listeners.retain(|l| l.strong_count() > 0);
                listeners.iter().filter_map(Weak::upgrade).collect()
            }
            Err(_) => Vec::new(),
        };
        for listener in live {
            listener.on_identity_changed(identity).await;
        }
    }

    /// Replace the current identity, notifying listeners if the id changed.
    async fn set_identity(&self, identity: Option<Identity>) {
        let changed = {
            let mut current = self.identity.write().await;
            let changed = current.as_ref().map(|i| i.id) != identity.as_ref().map(|i| i.id);
            current.clone_from(&identity);
            changed
        };
        if changed {
            self.announce(identity.as_ref()).await;
        }
    }

    async fn announce(&self, identity: Option<&Identity>) {
        match identity {
            Some(i) => set_sentry_user(&i.id, Some(i.email.as_str())),
            None => clear_sentry_user(),
        }
        self.notify(identity).await;
    }

    fn persist_snapshot(&self, identity: &Identity) -> Result<()> {
        let json = serde_json::to_string(identity)
            .map_err(|e| StoreError::Validation(format!("identity cannot be stored: {e}")))?;
        self.storage.set(keys::CURRENT_USER, &json)?;
        Ok(())
    }

    fn persist_new_session(&self, identity: &Identity) -> Result<()> {
        self.persist_snapshot(identity)?;
        self.storage
            .set(keys::SESSION_TIMESTAMP, &now_millis().to_string())?;
        Ok(())
    }

    fn clear_storage(&self) {
        for key in [keys::CURRENT_USER, keys::SESSION_TIMESTAMP] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to clear persisted session");
            }
        }
    }

    async fn purge(&self, reason: &str) {
        tracing::info!(reason, "Session purged");
        let previous = {
            let mut current = self.identity.write().await;
            self.clear_storage();
            current.take()
        };
        if previous.is_some() {
            self.announce(None).await;
        }
    }

    /// Purge the session only if it still belongs to `user`.
    ///
    /// The session belongs to `user` when `user` is signed in, or when nobody
    /// is signed in and nothing else is persisted. Returns whether `user` was
    /// signed in and has now been signed out.
    async fn purge_if(&self, user: UserId, reason: &str) -> bool {
        let previous = {
            let mut current = self.identity.write().await;
            match current.as_ref().map(|i| i.id) {
                Some(id) if id != user => return false,
                None if self.persisted_id().is_some_and(|id| id != user) => return false,
                _ => {}
            }
            self.clear_storage();
            current.take()
        };
        tracing::info!(user_id = %user, reason, "Session purged");
        if previous.is_none() {
            return false;
        }
        self.announce(None).await;
        true
    }

    /// Id in the persisted snapshot, ignoring the session window.
    fn persisted_id(&self) -> Option<UserId> {
        let snapshot = self.storage.get(keys::CURRENT_USER).ok()??;
        serde_json::from_str::<Identity>(&snapshot).ok().map(|i| i.id)
    }

    /// Read the persisted snapshot if it is present and inside the session
    /// window, or say why it is not usable.
    fn read_snapshot(&self) -> std::result::Result<Identity, &'static str> {
        let snapshot = self.storage.get(keys::CURRENT_USER);
        let timestamp = self.storage.get(keys::SESSION_TIMESTAMP);
        let (snapshot, timestamp) = match (snapshot, timestamp) {
            (Ok(Some(snapshot)), Ok(Some(timestamp))) => (snapshot, timestamp),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Persisted session unreadable");
                return Err("unreadable");
            }
            _ => return Err("missing"),
        };

        let Ok(issued_at) = timestamp.trim().parse::<i64>() else {
            return Err("bad timestamp");
        };
        let lifetime_ms = i64::try_from(self.config.lifetime.as_millis()).unwrap_or(i64::MAX);
        if now_millis().saturating_sub(issued_at) > lifetime_ms {
            return Err("expired");
        }

        serde_json::from_str::<Identity>(&snapshot).map_err(|e| {
            tracing::warn!(error = %e, "Persisted identity unparseable");
            "bad snapshot"
        })
    }

    /// Check the persisted session.
    ///
    /// False, with the persisted state purged and the identity cleared, when
    /// the snapshot or timestamp is missing, the session is older than the
    /// session lifetime, or the backend no longer knows the user. A backend
    /// failure of any kind counts as invalid. A different identity that
    /// signed in while the backend was being asked is left alone.
    #[instrument(skip(self))]
    pub async fn validate_session(&self) -> bool {
        let snapshot = match self.read_snapshot() {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                self.purge(reason).await;
                return false;
            }
        };
        match self.api.get_user(snapshot.id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(user_id = %snapshot.id, error = %e, "Backend rejected stored session");
                self.purge_if(snapshot.id, "backend rejected").await;
                false
            }
        }
    }

    /// Why the session of `user` is no longer valid, if it is not.
    ///
    /// Nothing is purged here. `None` also when `user` is no longer the
    /// signed-in identity.
    async fn fault(&self, user: UserId) -> Option<&'static str> {
        if self.current_id().await != Some(user) {
            return None;
        }
        let snapshot = match self.read_snapshot() {
            Ok(snapshot) if snapshot.id == user => snapshot,
            Ok(_) => return None,
            Err(reason) => return Some(reason),
        };
        match self.api.get_user(snapshot.id).await {
            Ok(_) => None,
            Err(e) => {
                tracing::info!(user_id = %user, error = %e, "Backend rejected stored session");
                Some("backend rejected")
            }
        }
    }

    /// Restore the persisted session at start-up.
    ///
    /// Returns the restored identity, if the session was valid.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<Identity> {
        let _loading = LoadingGuard::start(&self.loading);
        if !self.validate_session().await {
            return None;
        }
        let identity = self.read_snapshot().ok()?;
        tracing::info!(user_id = %identity.id, "Session restored");
        self.set_identity(Some(identity.clone())).await;
        Some(identity)
    }

    /// Create an account and sign in as it.
    ///
    /// The display name defaults to the local part of the email.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email or empty password,
    /// or the backend's error. Stored state is untouched on error.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(StoreError::Validation("Password is required".to_string()));
        }
        let display_name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| email.default_display_name(), str::to_string);

        let _loading = LoadingGuard::start(&self.loading);
        let identity = self
            .api
            .create_user(&display_name, email.as_str(), password)
            .await?;
        self.establish(identity, "register").await
    }

    /// Sign in.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email, or the backend's
    /// error. Stored state is untouched on error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let email = Email::parse(email)?;
        let _loading = LoadingGuard::start(&self.loading);
        let identity = self.api.login(email.as_str(), password).await?;
        self.establish(identity, "login").await
    }

    async fn establish(&self, identity: Identity, how: &str) -> Result<Identity> {
        // Persist under the write lock so a concurrent purge cannot clear the
        // new session's storage after it was written.
        let changed = {
            let mut current = self.identity.write().await;
            self.persist_new_session(&identity)?;
            let changed = current.as_ref().map(|i| i.id) != Some(identity.id);
            *current = Some(identity.clone());
            changed
        };
        tracing::info!(user_id = %identity.id, how, "Signed in");
        let user_id = identity.id.to_string();
        add_breadcrumb("auth", how, Some(&[("user_id", user_id.as_str())]));
        if changed {
            self.announce(Some(&identity)).await;
        }
        Ok(identity)
    }

    /// Sign out. Local only; never fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let previous = {
            let mut current = self.identity.write().await;
            self.clear_storage();
            current.take()
        };
        if previous.is_some() {
            add_breadcrumb("auth", "logout", None);
            self.announce(None).await;
        }
    }

    /// Sign `user` out, unless someone else has signed in meanwhile.
    ///
    /// Returns whether `user` was signed out.
    pub async fn logout_user(&self, user: UserId) -> bool {
        let signed_out = self.purge_if(user, "signed out").await;
        if signed_out {
            add_breadcrumb("auth", "logout", None);
        }
        signed_out
    }

    /// Set the identity's balance and re-persist the snapshot.
    ///
    /// No-op without an identity. Listeners are not notified.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub async fn update_balance(&self, balance: Money) -> Result<()> {
        let updated = {
            let mut current = self.identity.write().await;
            let Some(identity) = current.as_mut() else {
                return Ok(());
            };
            identity.balance = balance;
            identity.clone()
        };
        self.persist_snapshot(&updated)
    }

    /// Replace the signed-in identity's profile with `identity`.
    ///
    /// Ignored unless `identity` has the signed-in id. Listeners are not
    /// notified.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub async fn update_identity(&self, identity: Identity) -> Result<()> {
        {
            let mut current = self.identity.write().await;
            match current.as_mut() {
                Some(existing) if existing.id == identity.id => {
                    existing.clone_from(&identity);
                }
                _ => return Ok(()),
            }
        }
        self.persist_snapshot(&identity)
    }

    pub(crate) fn api(&self) -> &BackendClient {
        &self.api
    }
}

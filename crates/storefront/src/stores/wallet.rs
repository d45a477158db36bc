//! Wallet store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use arcade_core::{Identity, Money, UserId};

use crate::error::{Result, StoreError, user_message};
use crate::notice::{Notice, NoticeSink, Route};
use crate::session::{IdentityListener, SessionStore};

use super::LoadingGuard;

/// The signed-in identity's spendable balance.
///
/// The backend is the source of truth: top-ups adopt the balance it
/// returns rather than a locally computed sum.
pub struct WalletStore {
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
    balance: RwLock<Money>,
    loading: AtomicBool,
}

impl WalletStore {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            session,
            notices,
            balance: RwLock::new(Money::ZERO),
            loading: AtomicBool::new(false),
        }
    }

    pub async fn balance(&self) -> Money {
        *self.balance.read().await
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Refetch the balance. Zero without an identity.
    ///
    /// The session snapshot is only rewritten when the balance changed.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the balance is reset to zero.
    pub async fn refresh_balance(&self) -> Result<Money> {
        let user = self.session.current_id().await;
        self.load(user).await
    }

    async fn load(&self, user: Option<UserId>) -> Result<Money> {
        let Some(user) = user else {
            *self.balance.write().await = Money::ZERO;
            return Ok(Money::ZERO);
        };
        let _loading = LoadingGuard::start(&self.loading);
        match self.session.api().get_balance(user).await {
            Ok(balance) => {
                *self.balance.write().await = balance;
                let snapshot = self.session.current().await.map(|i| i.balance);
                if snapshot.is_some_and(|b| b != balance) {
                    self.session.update_balance(balance).await?;
                }
                Ok(balance)
            }
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to load wallet");
                *self.balance.write().await = Money::ZERO;
                Err(e.into())
            }
        }
    }

    /// Top up the wallet.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without an identity, a validation error
    /// for a non-positive amount, or the backend's error.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn add_balance(&self, amount: Money) -> Result<Money> {
        let Some(user) = self.session.current_id().await else {
            self.notices.notify(
                Notice::error("Sign in required", "You need to sign in to add balance.")
                    .with_action(Route::Login),
            );
            return Err(StoreError::NotAuthenticated);
        };
        if !amount.is_positive() {
            self.notices.notify(Notice::error(
                "Invalid amount",
                "The amount must be greater than zero.",
            ));
            return Err(StoreError::Validation(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let _loading = LoadingGuard::start(&self.loading);
        match self.session.api().add_balance(user, amount).await {
            Ok(balance) => {
                *self.balance.write().await = balance;
                self.session.update_balance(balance).await?;
                self.notices.notify(Notice::info(
                    "Balance added",
                    format!("{amount} was added to your wallet. New balance: {balance}"),
                ));
                Ok(balance)
            }
            Err(e) => {
                let err = StoreError::from(e);
                err.report("wallet.add");
                self.notices.notify(Notice::error(
                    "Error",
                    user_message(&err, "Could not add balance to your wallet."),
                ));
                Err(err)
            }
        }
    }
}

#[async_trait]
impl IdentityListener for WalletStore {
    async fn on_identity_changed(&self, identity: Option<&Identity>) {
        let _ = self.load(identity.map(|i| i.id)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::test_support::Harness;

    async fn wallet(h: &Harness) -> Arc<WalletStore> {
        let wallet = Arc::new(WalletStore::new(h.session.clone(), h.notices.clone()));
        h.session.subscribe(&wallet);
        wallet
    }

    async fn mock_balance(h: &Harness, body: &str) {
        Mock::given(method("GET"))
            .and(path("/wallet/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&h.server)
            .await;
    }

    #[tokio::test]
    async fn test_unchanged_balance_skips_snapshot_write() {
        let h = Harness::start().await;
        mock_balance(&h, "50.0").await;
        let wallet = wallet(&h).await;
        h.login(1, 50.0).await;
        assert_eq!(wallet.balance().await, Money::from_cents(5000));

        let writes = h.storage.write_count();
        wallet.refresh_balance().await.unwrap();
        assert_eq!(h.storage.write_count(), writes);
    }

    #[tokio::test]
    async fn test_changed_balance_is_pushed_to_session() {
        let h = Harness::start().await;
        mock_balance(&h, "80").await;
        let wallet = wallet(&h).await;
        h.login(1, 50.0).await;

        assert_eq!(wallet.balance().await, Money::from_cents(8000));
        let identity = h.session.current().await.unwrap();
        assert_eq!(identity.balance, Money::from_cents(8000));
    }

    #[tokio::test]
    async fn test_top_up_adopts_backend_balance() {
        let h = Harness::start().await;
        mock_balance(&h, "10").await;
        Mock::given(method("POST"))
            .and(path("/wallet/1"))
            .and(body_json(serde_json::json!({"valor": 25.0})))
            .respond_with(ResponseTemplate::new(200).set_body_string("40.0"))
            .mount(&h.server)
            .await;
        let wallet = wallet(&h).await;
        h.login(1, 10.0).await;

        // Backend applied a bonus; its figure wins over 10 + 25.
        let balance = wallet.add_balance(Money::from_cents(2500)).await.unwrap();
        assert_eq!(balance, Money::from_cents(4000));
        assert_eq!(h.session.current().await.unwrap().balance, balance);
    }

    #[tokio::test]
    async fn test_top_up_rejects_non_positive_amounts() {
        let h = Harness::start().await;
        mock_balance(&h, "10").await;
        let wallet = wallet(&h).await;
        h.login(1, 10.0).await;

        let err = wallet.add_balance(Money::ZERO).await.unwrap_err();
        assert!(err.is_validation());
        let err = wallet.add_balance(Money::from_cents(-100)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_failed_refresh_resets_to_zero_and_logout_clears() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/wallet/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&h.server)
            .await;
        let wallet = wallet(&h).await;
        h.login(1, 10.0).await;
        assert_eq!(wallet.balance().await, Money::ZERO);

        h.session.logout().await;
        assert!(wallet.add_balance(Money::from_cents(100)).await.is_err());
        assert_eq!(wallet.balance().await, Money::ZERO);
    }
}

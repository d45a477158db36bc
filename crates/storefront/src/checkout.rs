//! Checkout orchestration.
//!
//! Checkout spans four stores: it reads the cart and balance, asks the
//! backend to convert the cart into a purchase, then brings the cart, wallet
//! and library back in line with what the backend did. The backend is
//! trusted; nothing is rolled back client-side if a later step fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use arcade_core::{Money, Purchase};

use crate::error::{StoreError, user_message};
use crate::notice::{Notice, NoticeSink, Route};
use crate::session::SessionStore;
use crate::stores::{CartStore, LibraryStore, WalletStore};

/// Words in a backend message that mean the wallet could not cover the
/// purchase. The backend answers in Portuguese.
const BALANCE_KEYWORDS: [&str; 4] = ["balance", "insufficient", "saldo", "insuficiente"];

/// Whether a checkout is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    Idle,
    Processing,
}

/// Why a checkout did not go through.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("You need to sign in to check out")]
    NotAuthenticated,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Insufficient balance: {needed} needed, {available} available")]
    InsufficientBalance { needed: Money, available: Money },

    #[error("A checkout is already in progress")]
    AlreadyProcessing,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Where the user should go to resolve the error, if anywhere.
    #[must_use]
    pub const fn route(&self) -> Option<Route> {
        match self {
            Self::NotAuthenticated => Some(Route::Login),
            Self::InsufficientBalance { .. } => Some(Route::Account),
            Self::EmptyCart | Self::AlreadyProcessing | Self::Store(_) => None,
        }
    }
}

/// A completed checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub purchase: Purchase,
    pub item_count: usize,
    pub total: Money,
    /// Where to send the user afterwards.
    pub next: Route,
}

/// Resets the processing flag when the checkout ends, however it ends.
struct Processing<'a>(&'a AtomicBool);

impl<'a> Processing<'a> {
    fn begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for Processing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn is_balance_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    BALANCE_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub struct CheckoutOrchestrator {
    session: Arc<SessionStore>,
    cart: Arc<CartStore>,
    wallet: Arc<WalletStore>,
    library: Arc<LibraryStore>,
    notices: Arc<dyn NoticeSink>,
    redirect_delay: Duration,
    processing: AtomicBool,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        cart: Arc<CartStore>,
        wallet: Arc<WalletStore>,
        library: Arc<LibraryStore>,
        notices: Arc<dyn NoticeSink>,
        redirect_delay: Duration,
    ) -> Self {
        Self {
            session,
            cart,
            wallet,
            library,
            notices,
            redirect_delay,
            processing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn phase(&self) -> CheckoutPhase {
        if self.processing.load(Ordering::SeqCst) {
            CheckoutPhase::Processing
        } else {
            CheckoutPhase::Idle
        }
    }

    /// Buy everything in the cart.
    ///
    /// # Errors
    ///
    /// Guard failures (`NotAuthenticated`, `EmptyCart`,
    /// `InsufficientBalance`) are returned before any remote call. A
    /// second call while one is running gets `AlreadyProcessing`. Backend
    /// failures come back as `Store`.
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> Result<CheckoutReceipt, CheckoutError> {
        let Some(_processing) = Processing::begin(&self.processing) else {
            return Err(CheckoutError::AlreadyProcessing);
        };

        let Some(identity) = self.session.current().await else {
            self.notices.notify(
                Notice::error("Sign in required", "You need to sign in to check out.")
                    .with_action(Route::Login),
            );
            return Err(CheckoutError::NotAuthenticated);
        };

        let items = self.cart.items().await;
        if items.is_empty() {
            self.notices.notify(Notice::error(
                "Empty cart",
                "Add some games to your cart before checking out.",
            ));
            return Err(CheckoutError::EmptyCart);
        }

        let total: Money = items.iter().map(|i| i.price).sum();
        // Every successful wallet fetch is written back to the snapshot.
        let available = identity.balance;
        if total > available {
            self.notices.notify(
                Notice::error(
                    "Insufficient balance",
                    format!(
                        "Your cart costs {total} but your balance is {available}. Add funds to continue."
                    ),
                )
                .with_action(Route::Account),
            );
            return Err(CheckoutError::InsufficientBalance {
                needed: total,
                available,
            });
        }

        let purchase = match self.process(identity.id).await {
            Ok(purchase) => purchase,
            Err(err) => {
                self.report_failure(&err);
                return Err(err.into());
            }
        };

        let item_count = items.len();
        self.notices.notify(
            Notice::info(
                "Purchase complete",
                format!("{item_count} game(s) purchased for {total}."),
            )
            .with_action(Route::Library),
        );
        self.cart.clear_cart().await;
        let (library, wallet) =
            tokio::join!(self.library.refresh_library(), self.wallet.refresh_balance());
        if let Err(e) = library {
            tracing::warn!(error = %e, "Library refresh after checkout failed");
        }
        if let Err(e) = wallet {
            tracing::warn!(error = %e, "Wallet refresh after checkout failed");
        }

        tracing::info!(
            purchase_id = %purchase.id,
            item_count,
            total = %total,
            "Checkout complete"
        );
        tokio::time::sleep(self.redirect_delay).await;

        Ok(CheckoutReceipt {
            purchase,
            item_count,
            total,
            next: Route::Library,
        })
    }

    async fn process(&self, user: arcade_core::UserId) -> Result<Purchase, StoreError> {
        // The backend decides whether the funds are there.
        if let Err(e) = self.wallet.refresh_balance().await {
            tracing::warn!(user_id = %user, error = %e, "Balance refresh before checkout failed");
        }
        Ok(self.session.api().checkout(user).await?)
    }

    fn report_failure(&self, err: &StoreError) {
        err.report("checkout");
        let message = user_message(err, "Could not complete the purchase. Please try again.");
        let notice = if is_balance_message(&message) {
            Notice::error("Insufficient balance", message).with_action(Route::Account)
        } else {
            Notice::error("Checkout failed", message)
        };
        self.notices.notify(notice);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::notice::NoticeLevel;
    use crate::test_support::{Harness, jogo_json};

    struct Fixture {
        h: Harness,
        cart: Arc<CartStore>,
        wallet: Arc<WalletStore>,
        checkout: Arc<CheckoutOrchestrator>,
    }

    async fn fixture(balance: &str, cart: serde_json::Value) -> Fixture {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/wallet/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(balance))
            .mount(&h.server)
            .await;
        assemble(h, cart).await
    }

    /// Stores and orchestrator over `h`; the wallet endpoint is up to the caller.
    async fn assemble(h: Harness, cart: serde_json::Value) -> Fixture {
        Mock::given(method("GET"))
            .and(path("/cart/usuario/1/jogos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cart))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/library/usuario/1/jogos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&h.server)
            .await;
        let cart = Arc::new(CartStore::new(h.session.clone(), h.notices.clone()));
        let wallet = Arc::new(WalletStore::new(h.session.clone(), h.notices.clone()));
        let library = Arc::new(LibraryStore::new(h.session.clone()));
        h.session.subscribe(&cart);
        h.session.subscribe(&wallet);
        h.session.subscribe(&library);
        let checkout = Arc::new(CheckoutOrchestrator::new(
            h.session.clone(),
            cart.clone(),
            wallet.clone(),
            library,
            h.notices.clone(),
            Duration::ZERO,
        ));
        Fixture {
            h,
            cart,
            wallet,
            checkout,
        }
    }

    #[test]
    fn test_balance_keywords() {
        assert!(is_balance_message("Saldo insuficiente para a compra"));
        assert!(is_balance_message("Insufficient funds"));
        assert!(!is_balance_message("Jogo não encontrado"));
    }

    #[test]
    fn test_error_routes() {
        assert_eq!(CheckoutError::NotAuthenticated.route(), Some(Route::Login));
        let err = CheckoutError::InsufficientBalance {
            needed: Money::from_cents(100),
            available: Money::ZERO,
        };
        assert_eq!(err.route(), Some(Route::Account));
        assert_eq!(CheckoutError::EmptyCart.route(), None);
    }

    #[tokio::test]
    async fn test_guards_run_before_remote_calls() {
        let f = fixture("0", serde_json::json!([])).await;
        assert!(matches!(
            f.checkout.checkout().await,
            Err(CheckoutError::NotAuthenticated)
        ));

        f.h.login(1, 0.0).await;
        assert!(matches!(
            f.checkout.checkout().await,
            Err(CheckoutError::EmptyCart)
        ));
        assert_eq!(f.checkout.phase(), CheckoutPhase::Idle);
    }

    #[tokio::test]
    async fn test_backend_balance_message_becomes_insufficient_notice() {
        let f = fixture("100", serde_json::json!([jogo_json(3, "Skyline Rally", 20.0)])).await;
        Mock::given(method("POST"))
            .and(path("/compras/1"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"message": "Saldo insuficiente"})),
            )
            .mount(&f.h.server)
            .await;
        f.h.login(1, 100.0).await;
        f.h.notices.drain();

        let err = f.checkout.checkout().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Store(_)));
        let notices = f.h.notices.drain();
        let last = notices.last().unwrap();
        assert_eq!(last.level, NoticeLevel::Error);
        assert_eq!(last.title, "Insufficient balance");
        assert_eq!(last.message, "Saldo insuficiente");
        assert_eq!(f.cart.len().await, 1);
    }

    #[tokio::test]
    async fn test_other_failures_become_checkout_failed() {
        let f = fixture("100", serde_json::json!([jogo_json(3, "Skyline Rally", 20.0)])).await;
        Mock::given(method("POST"))
            .and(path("/compras/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&f.h.server)
            .await;
        f.h.login(1, 100.0).await;
        f.h.notices.drain();

        f.checkout.checkout().await.unwrap_err();
        let notices = f.h.notices.drain();
        assert_eq!(notices.last().unwrap().title, "Checkout failed");
        assert_eq!(f.checkout.phase(), CheckoutPhase::Idle);
    }

    fn purchase_json() -> serde_json::Value {
        serde_json::json!({
            "id": 9,
            "usuarioId": 1,
            "jogos": [jogo_json(3, "Skyline Rally", 20.0)],
            "valor": 20.0,
            "dataCompra": "2024-05-01T12:00:00"
        })
    }

    #[tokio::test]
    async fn test_wallet_outage_does_not_block_checkout() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/wallet/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("100"))
            .up_to_n_times(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wallet/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&h.server)
            .await;
        let f = assemble(h, serde_json::json!([jogo_json(3, "Skyline Rally", 20.0)])).await;
        Mock::given(method("POST"))
            .and(path("/compras/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(purchase_json()))
            .expect(1)
            .mount(&f.h.server)
            .await;
        f.h.login(1, 100.0).await;
        f.h.notices.drain();

        let receipt = f.checkout.checkout().await.unwrap();
        assert_eq!(receipt.total, Money::from_cents(2000));
        assert!(f.cart.is_empty().await);
        let titles: Vec<String> = f.h.notices.drain().into_iter().map(|n| n.title).collect();
        assert!(titles.contains(&"Purchase complete".to_string()));
        assert!(!titles.contains(&"Checkout failed".to_string()));
    }

    #[tokio::test]
    async fn test_zero_snapshot_is_not_topped_up_from_wallet_store() {
        let f = fixture("100", serde_json::json!([jogo_json(3, "Skyline Rally", 20.0)])).await;
        Mock::given(method("POST"))
            .and(path("/compras/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(purchase_json()))
            .expect(0)
            .mount(&f.h.server)
            .await;
        f.h.login(1, 100.0).await;
        assert_eq!(f.wallet.balance().await, Money::from_cents(10000));
        f.h.session.update_balance(Money::ZERO).await.unwrap();

        match f.checkout.checkout().await {
            Err(CheckoutError::InsufficientBalance { needed, available }) => {
                assert_eq!(needed, Money::from_cents(2000));
                assert_eq!(available, Money::ZERO);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_checkout_is_rejected() {
        let f = fixture("100", serde_json::json!([jogo_json(3, "Skyline Rally", 20.0)])).await;
        Mock::given(method("POST"))
            .and(path("/compras/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(purchase_json())
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&f.h.server)
            .await;
        f.h.login(1, 100.0).await;

        let first = tokio::spawn({
            let checkout = f.checkout.clone();
            async move { checkout.checkout().await }
        });
        while f.checkout.phase() == CheckoutPhase::Idle {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            f.checkout.checkout().await,
            Err(CheckoutError::AlreadyProcessing)
        ));

        let receipt = first.await.unwrap().unwrap();
        assert_eq!(receipt.item_count, 1);
        assert_eq!(receipt.next, Route::Library);
        assert!(f.cart.is_empty().await);
        assert_eq!(f.wallet.balance().await, Money::from_cents(10000));
    }
}

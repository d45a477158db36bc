//! The storefront as a whole.

use std::sync::Arc;

use arcade_core::{Identity, PurchaseId};

use crate::api::{ApiError, BackendClient};
use crate::checkout::CheckoutOrchestrator;
use crate::config::StorefrontConfig;
use crate::error::StoreError;
use crate::functions::FunctionsClient;
use crate::image::ImageValidator;
use crate::notice::NoticeSink;
use crate::session::{SessionMonitor, SessionStore};
use crate::storage::{FileStorage, KeyValueStorage};
use crate::stores::{
    AccountService, CartStore, CatalogStore, HistoryStore, LibraryStore, RatingService, WalletStore,
};

/// Every store, wired to one backend and one session.
///
/// Cheaply cloneable via `Arc`. The identity-scoped stores and the session
/// monitor are subscribed to the session on construction.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    notices: Arc<dyn NoticeSink>,
    session: Arc<SessionStore>,
    monitor: Arc<SessionMonitor>,
    catalog: CatalogStore,
    cart: Arc<CartStore>,
    wallet: Arc<WalletStore>,
    library: Arc<LibraryStore>,
    history: Arc<HistoryStore>,
    account: AccountService,
    ratings: RatingService,
    checkout: CheckoutOrchestrator,
    functions: Option<FunctionsClient>,
}

impl Storefront {
    /// Build a storefront persisting its session under `config.state_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, notices: Arc<dyn NoticeSink>) -> Result<Self, ApiError> {
        let storage = Arc::new(FileStorage::in_dir(&config.state_dir));
        Self::with_storage(config, storage, notices)
    }

    /// Build a storefront on an explicit session storage.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn with_storage(
        config: StorefrontConfig,
        storage: Arc<dyn KeyValueStorage>,
        notices: Arc<dyn NoticeSink>,
    ) -> Result<Self, ApiError> {
        let api = BackendClient::new(&config)?;
        let images = ImageValidator::new()?;
        let functions = config
            .functions
            .as_ref()
            .map(|f| FunctionsClient::new(f, config.request_timeout))
            .transpose()?;

        let session = Arc::new(SessionStore::new(api, storage, config.session));
        let cart = Arc::new(CartStore::new(session.clone(), notices.clone()));
        let wallet = Arc::new(WalletStore::new(session.clone(), notices.clone()));
        let library = Arc::new(LibraryStore::new(session.clone()));
        let history = Arc::new(HistoryStore::new(session.clone(), notices.clone()));
        let monitor = Arc::new(SessionMonitor::new(session.clone(), notices.clone()));
        session.subscribe(&cart);
        session.subscribe(&wallet);
        session.subscribe(&library);
        session.subscribe(&history);
        session.subscribe(&monitor);

        let checkout = CheckoutOrchestrator::new(
            session.clone(),
            cart.clone(),
            wallet.clone(),
            library.clone(),
            notices.clone(),
            config.checkout_redirect_delay,
        );

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                catalog: CatalogStore::new(session.clone(), notices.clone(), images),
                account: AccountService::new(session.clone(), notices.clone()),
                ratings: RatingService::new(session.clone(), notices.clone()),
                config,
                notices,
                session,
                monitor,
                cart,
                wallet,
                library,
                history,
                checkout,
                functions,
            }),
        })
    }

    /// Restore a persisted session and load the catalog.
    ///
    /// A catalog failure is logged, not returned; the front end can still
    /// show the rest.
    pub async fn start(&self) -> Option<Identity> {
        let identity = self.inner.session.restore().await;
        if let Err(e) = self.inner.catalog.refresh().await {
            tracing::warn!(error = %e, "Catalog unavailable at startup");
        }
        identity
    }

    /// Re-validate the session and refetch everything.
    ///
    /// Returns whether a valid session remains. Individual refresh failures
    /// are logged by the stores.
    pub async fn reload(&self) -> bool {
        let valid = self.inner.session.validate_session().await;
        let inner = &self.inner;
        let _ = tokio::join!(
            inner.catalog.refresh(),
            inner.cart.refresh_cart(),
            inner.wallet.refresh_balance(),
            inner.library.refresh_library(),
            inner.history.refresh(),
        );
        valid
    }

    /// Refund a purchase, then reload so the wallet and library reflect
    /// whatever the backend did.
    ///
    /// # Errors
    ///
    /// Returns the refund's error; nothing is reloaded then.
    pub async fn refund(&self, id: PurchaseId) -> Result<(), StoreError> {
        self.inner.history.refund(id).await?;
        self.reload().await;
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn notices(&self) -> &Arc<dyn NoticeSink> {
        &self.inner.notices
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn monitor(&self) -> &SessionMonitor {
        &self.inner.monitor
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogStore {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn wallet(&self) -> &WalletStore {
        &self.inner.wallet
    }

    #[must_use]
    pub fn library(&self) -> &LibraryStore {
        &self.inner.library
    }

    #[must_use]
    pub fn history(&self) -> &HistoryStore {
        &self.inner.history
    }

    #[must_use]
    pub fn account(&self) -> &AccountService {
        &self.inner.account
    }

    #[must_use]
    pub fn ratings(&self) -> &RatingService {
        &self.inner.ratings
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }

    /// The serverless functions client, when configured.
    #[must_use]
    pub fn functions(&self) -> Option<&FunctionsClient> {
        self.inner.functions.as_ref()
    }
}

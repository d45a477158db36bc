//! Cart store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use arcade_core::{Identity, Item, ItemId, Money, UserId};

use crate::error::{Result, StoreError, user_message};
use crate::notice::{Notice, NoticeSink, Route};
use crate::session::{IdentityListener, SessionStore};

use super::{LoadingGuard, dedup_items};

/// The signed-in identity's pending selections.
///
/// Holds item snapshots, each item id at most once.
pub struct CartStore {
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
    items: RwLock<Vec<Item>>,
    loading: AtomicBool,
}

impl CartStore {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            session,
            notices,
            items: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
        }
    }

    pub async fn items(&self) -> Vec<Item> {
        self.items.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub async fn contains(&self, id: ItemId) -> bool {
        self.items.read().await.iter().any(|i| i.id == id)
    }

    /// Sum of the items' prices.
    pub async fn total(&self) -> Money {
        self.items.read().await.iter().map(|i| i.price).sum()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Add an item to the cart.
    ///
    /// An item already in the cart is not sent again.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without an identity, or the backend's
    /// error. Local state is untouched on error.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn add_to_cart(&self, item: &Item) -> Result<()> {
        let Some(user) = self.session.current_id().await else {
            self.notices.notify(
                Notice::error("Sign in required", "You need to sign in to add items to your cart.")
                    .with_action(Route::Login),
            );
            return Err(StoreError::NotAuthenticated);
        };
        if self.contains(item.id).await {
            self.notices.notify(Notice::info(
                "Already in cart",
                format!("{} is already in your cart.", item.title),
            ));
            return Ok(());
        }

        if let Err(e) = self.session.api().add_to_cart(user, item.id).await {
            let err = StoreError::from(e);
            err.report("cart.add");
            self.notices.notify(Notice::error(
                "Error",
                user_message(&err, "Could not add the item to your cart."),
            ));
            return Err(err);
        }

        {
            // Re-checked under the write lock; a concurrent add may have won.
            let mut items = self.items.write().await;
            if !items.iter().any(|i| i.id == item.id) {
                items.push(item.clone());
            }
        }
        self.notices.notify(Notice::info(
            "Added to cart",
            format!("{} was added to your cart.", item.title),
        ));
        Ok(())
    }

    /// Remove an item from the cart. Without an identity this does nothing.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; local state is untouched on error.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn remove_from_cart(&self, id: ItemId) -> Result<()> {
        let Some(user) = self.session.current_id().await else {
            return Ok(());
        };

        if let Err(e) = self.session.api().remove_from_cart(user, id).await {
            let err = StoreError::from(e);
            err.report("cart.remove");
            self.notices.notify(Notice::error(
                "Error",
                user_message(&err, "Could not remove the item from your cart."),
            ));
            return Err(err);
        }

        let removed = {
            let mut items = self.items.write().await;
            items
                .iter()
                .position(|i| i.id == id)
                .map(|index| items.remove(index))
        };
        if let Some(item) = removed {
            self.notices.notify(Notice::info(
                "Removed from cart",
                format!("{} was removed from your cart.", item.title),
            ));
        }
        Ok(())
    }

    /// Empty the cart locally. The backend is not told.
    pub async fn clear_cart(&self) {
        self.items.write().await.clear();
    }

    /// Refetch the signed-in identity's cart, or empty it without one.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the current items are kept.
    pub async fn refresh_cart(&self) -> Result<()> {
        let user = self.session.current_id().await;
        self.load(user).await
    }

    async fn load(&self, user: Option<UserId>) -> Result<()> {
        let Some(user) = user else {
            self.clear_cart().await;
            return Ok(());
        };
        let _loading = LoadingGuard::start(&self.loading);
        match self.session.api().list_cart(user).await {
            Ok(items) => {
                *self.items.write().await = dedup_items(items);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to load cart");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl IdentityListener for CartStore {
    async fn on_identity_changed(&self, identity: Option<&Identity>) {
        // Errors are logged in `load`.
        let _ = self.load(identity.map(|i| i.id)).await;
    }
}

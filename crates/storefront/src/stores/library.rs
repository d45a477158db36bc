//! Library store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use arcade_core::{Identity, Item, ItemId, UserId};

use crate::error::Result;
use crate::session::{IdentityListener, SessionStore};

use super::{LoadingGuard, dedup_items};

/// Items the signed-in identity owns.
///
/// Only ever reloaded wholesale; checkout and refunds change it on the
/// backend and then call [`LibraryStore::refresh_library`].
pub struct LibraryStore {
    session: Arc<SessionStore>,
    items: RwLock<Vec<Item>>,
    loading: AtomicBool,
}

impl LibraryStore {
    #[must_use]
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            items: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
        }
    }

    pub async fn items(&self) -> Vec<Item> {
        self.items.read().await.clone()
    }

    pub async fn contains(&self, id: ItemId) -> bool {
        self.items.read().await.iter().any(|i| i.id == id)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Refetch the library, or empty it without an identity.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the current items are kept.
    pub async fn refresh_library(&self) -> Result<()> {
        let user = self.session.current_id().await;
        self.load(user).await
    }

    async fn load(&self, user: Option<UserId>) -> Result<()> {
        let Some(user) = user else {
            self.items.write().await.clear();
            return Ok(());
        };
        let _loading = LoadingGuard::start(&self.loading);
        match self.session.api().list_library(user).await {
            Ok(items) => {
                *self.items.write().await = dedup_items(items);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to load library");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl IdentityListener for LibraryStore {
    async fn on_identity_changed(&self, identity: Option<&Identity>) {
        let _ = self.load(identity.map(|i| i.id)).await;
    }
}

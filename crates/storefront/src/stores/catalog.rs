//! Catalog store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::instrument;

use arcade_core::{CategoryFilter, Item, ItemDraft, ItemId};

use crate::error::{Result, StoreError};
use crate::image::ImageValidator;
use crate::notice::{Notice, NoticeSink};
use crate::session::SessionStore;

use super::LoadingGuard;

#[derive(Default)]
struct CatalogState {
    items: Vec<Item>,
    query: String,
    category: CategoryFilter,
    filtered: Vec<Item>,
}

impl CatalogState {
    fn recompute(&mut self) {
        let query = self.query.to_lowercase();
        self.filtered = self
            .items
            .iter()
            .filter(|item| item.matches(&query, &self.category))
            .cloned()
            .collect();
    }
}

/// The full catalog plus the current search and category filter.
///
/// The filtered view is recomputed whenever the items, query or category
/// change, not on every read.
pub struct CatalogStore {
    session: Arc<SessionStore>,
    notices: Arc<dyn NoticeSink>,
    images: ImageValidator,
    state: RwLock<CatalogState>,
    loading: AtomicBool,
}

impl CatalogStore {
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        notices: Arc<dyn NoticeSink>,
        images: ImageValidator,
    ) -> Self {
        Self {
            session,
            notices,
            images,
            state: RwLock::new(CatalogState::default()),
            loading: AtomicBool::new(false),
        }
    }

    pub async fn items(&self) -> Vec<Item> {
        self.state.read().await.items.clone()
    }

    /// Items passing the current query and category.
    pub async fn filtered(&self) -> Vec<Item> {
        self.state.read().await.filtered.clone()
    }

    pub async fn query(&self) -> String {
        self.state.read().await.query.clone()
    }

    pub async fn set_query(&self, query: impl Into<String>) {
        let mut state = self.state.write().await;
        state.query = query.into();
        state.recompute();
    }

    pub async fn category(&self) -> CategoryFilter {
        self.state.read().await.category.clone()
    }

    pub async fn set_category(&self, category: CategoryFilter) {
        let mut state = self.state.write().await;
        state.category = category;
        state.recompute();
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Refetch the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the current list is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let _loading = LoadingGuard::start(&self.loading);
        match self.session.api().list_items().await {
            Ok(items) => {
                let mut state = self.state.write().await;
                state.items = items;
                state.recompute();
                tracing::debug!(count = state.items.len(), "Catalog loaded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load catalog");
                Err(e.into())
            }
        }
    }

    /// Fetch one entry straight from the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn get(&self, id: ItemId) -> Result<Item> {
        Ok(self.session.api().get_item(id).await?)
    }

    /// The draft's image URL if it validates. A URL that does not is
    /// dropped with a notice, and the entry falls back to stock artwork.
    async fn checked_image(&self, draft: &ItemDraft) -> Option<String> {
        let url = draft.image_url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let validation = self.images.validate_complete_image_url(url).await;
        if validation.is_valid {
            return Some(url.to_string());
        }
        let reason = validation.error.unwrap_or_default();
        tracing::info!(url, reason = %reason, "Image URL rejected");
        self.notices.notify(Notice::info(
            "Image not attached",
            format!("The image URL was not used ({reason}); a default image will be shown."),
        ));
        None
    }

    /// Create a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad draft, or the backend's error.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create(&self, draft: &ItemDraft) -> Result<Item> {
        draft
            .validate()
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let image = self.checked_image(draft).await;
        let item = self
            .session
            .api()
            .create_item(draft, image.as_deref())
            .await?;

        let mut state = self.state.write().await;
        state.items.push(item.clone());
        state.recompute();
        drop(state);

        self.notices.notify(Notice::info(
            "Item created",
            format!("{} was added to the catalog.", item.title),
        ));
        Ok(item)
    }

    /// Replace a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad draft, or the backend's error.
    #[instrument(skip(self, draft), fields(item_id = %id))]
    pub async fn update(&self, id: ItemId, draft: &ItemDraft) -> Result<Item> {
        draft
            .validate()
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let image = self.checked_image(draft).await;
        let item = self
            .session
            .api()
            .update_item(id, draft, image.as_deref())
            .await?;

        let mut state = self.state.write().await;
        match state.items.iter_mut().find(|i| i.id == id) {
            Some(existing) => *existing = item.clone(),
            None => state.items.push(item.clone()),
        }
        state.recompute();
        Ok(item)
    }

    /// Delete a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the local list is untouched on error.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete(&self, id: ItemId) -> Result<()> {
        self.session.api().delete_item(id).await?;
        let mut state = self.state.write().await;
        state.items.retain(|i| i.id != id);
        state.recompute();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use arcade_core::{ImageRef, Money};

    use super::*;
    use crate::test_support::{Harness, jogo_json};

    fn catalog(h: &Harness) -> CatalogStore {
        CatalogStore::new(
            h.session.clone(),
            h.notices.clone(),
            ImageValidator::new().unwrap(),
        )
    }

    async fn mount_listing(h: &Harness) {
        let mut rally = jogo_json(1, "Skyline Rally", 19.9);
        rally["gender"] = "Racing, Sports".into();
        let mut depths = jogo_json(2, "Hollow Depths", 35.0);
        depths["gender"] = "Horror".into();
        Mock::given(method("GET"))
            .and(path("/jogo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([rally, depths])))
            .mount(&h.server)
            .await;
    }

    #[tokio::test]
    async fn test_filter_by_query_and_category() {
        let h = Harness::start().await;
        mount_listing(&h).await;
        let catalog = catalog(&h);
        catalog.refresh().await.unwrap();
        assert_eq!(catalog.filtered().await.len(), 2);

        catalog.set_query("SPORT").await;
        let filtered = catalog.filtered().await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Skyline Rally");

        catalog.set_query("").await;
        catalog.set_category(CategoryFilter::from_label("Horror")).await;
        assert_eq!(catalog.filtered().await[0].id, ItemId::new(2));

        catalog.set_category(CategoryFilter::from_label("all")).await;
        assert_eq!(catalog.filtered().await.len(), 2);
    }

    #[tokio::test]
    async fn test_query_is_matched_as_typed() {
        let h = Harness::start().await;
        mount_listing(&h).await;
        let catalog = catalog(&h);
        catalog.refresh().await.unwrap();

        // Surrounding spaces are part of the search text.
        catalog.set_query(" rally").await;
        assert_eq!(catalog.filtered().await.len(), 1);
        catalog.set_query("rally ").await;
        assert!(catalog.filtered().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_drops_unloadable_image() {
        let h = Harness::start().await;
        Mock::given(method("POST"))
            .and(path("/jogo"))
            .and(body_partial_json(serde_json::json!({"imagemUrl": "", "gender": "Puzzle"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(jogo_json(14, "Tile Tactics", 4.99)),
            )
            .expect(1)
            .mount(&h.server)
            .await;
        let catalog = catalog(&h);

        let draft = ItemDraft {
            title: "Tile Tactics".to_string(),
            price: Money::from_cents(499),
            tags: vec!["Puzzle".to_string()],
            image_url: Some("not-a-url".to_string()),
            ..ItemDraft::default()
        };
        let item = catalog.create(&draft).await.unwrap();
        assert_eq!(item.image, ImageRef::Stock(2));
        assert_eq!(catalog.items().await.len(), 1);
        assert!(h.notices.drain().iter().any(|n| n.title == "Image not attached"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_draft_before_calling_backend() {
        let h = Harness::start().await;
        let catalog = catalog(&h);
        let draft = ItemDraft {
            title: "Broken".to_string(),
            price: Money::from_cents(-1),
            ..ItemDraft::default()
        };
        assert!(catalog.create(&draft).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_delete_propagates_errors() {
        let h = Harness::start().await;
        mount_listing(&h).await;
        Mock::given(method("DELETE"))
            .and(path("/jogo/1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&h.server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/jogo/2"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&h.server)
            .await;
        let catalog = catalog(&h);
        catalog.refresh().await.unwrap();

        assert!(catalog.delete(ItemId::new(1)).await.is_err());
        assert_eq!(catalog.items().await.len(), 2);
        catalog.delete(ItemId::new(2)).await.unwrap();
        assert_eq!(catalog.items().await.len(), 1);
    }
}

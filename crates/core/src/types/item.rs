//! Catalog items.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::category::CategoryFilter;
use super::id::ItemId;
use super::money::Money;

/// Stock artwork used when an item has no usable image of its own.
pub const STOCK_IMAGES: [&str; 6] = [
    "assets/game1.jpg",
    "assets/game2.jpg",
    "assets/game3.jpg",
    "assets/game4.jpg",
    "assets/game5.jpg",
    "assets/game6.jpg",
];

/// Rating shown for items the backend has not rated.
pub const DEFAULT_RATING: f64 = 8.5;

/// Errors raised by [`Item::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// Price below zero.
    #[error("price cannot be negative")]
    NegativePrice,
    /// Discounted price above the original price.
    #[error("discounted price cannot exceed the original price")]
    DiscountAboveOriginal,
    /// Discount outside 0..=100.
    #[error("discount must be between 0 and 100 percent")]
    DiscountOutOfRange,
    /// No category tags.
    #[error("item must carry at least one tag")]
    NoTags,
    /// Blank title.
    #[error("title cannot be empty")]
    EmptyTitle,
}

/// Where an item's artwork comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageRef {
    /// An image hosted elsewhere (absolute http(s) URL or a root-relative path).
    Remote(String),
    /// Index into [`STOCK_IMAGES`].
    Stock(usize),
}

impl ImageRef {
    /// Pick the stock image for an item.
    ///
    /// Items with an id hash onto the pool by id so the same item always gets
    /// the same artwork; items without one fall back to their listing
    /// position.
    #[must_use]
    pub fn stock_for(id: Option<ItemId>, position: usize) -> Self {
        let len = STOCK_IMAGES.len();
        let index = id.map_or(position % len, |id| {
            // rem_euclid keeps negative ids inside the pool.
            usize::try_from(id.as_i64().rem_euclid(len as i64)).unwrap_or(0)
        });
        Self::Stock(index)
    }

    /// Use `url` when it looks like something an image can be loaded from,
    /// otherwise the stock fallback.
    #[must_use]
    pub fn from_backend(url: Option<&str>, id: Option<ItemId>, position: usize) -> Self {
        match url {
            Some(url)
                if url.starts_with("http://")
                    || url.starts_with("https://")
                    || url.starts_with('/') =>
            {
                Self::Remote(url.to_owned())
            }
            _ => Self::stock_for(id, position),
        }
    }

    /// Path or URL to load the artwork from.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Remote(url) => url,
            Self::Stock(index) => STOCK_IMAGES
                .get(*index)
                .or_else(|| STOCK_IMAGES.first())
                .copied()
                .unwrap_or_default(),
        }
    }

    /// The remote URL, if this is not a stock image.
    #[must_use]
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Remote(url) => Some(url),
            Self::Stock(_) => None,
        }
    }
}

/// A purchasable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub image: ImageRef,
    pub price: Money,
    pub original_price: Money,
    /// Discount percentage, 0..=100.
    pub discount: u8,
    pub rating: f64,
    /// Category tags; never empty.
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl Item {
    /// Check the pricing and tag invariants.
    ///
    /// # Errors
    ///
    /// Returns the first invariant the item breaks.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.price.is_negative() {
            return Err(ItemError::NegativePrice);
        }
        if self.discount > 100 {
            return Err(ItemError::DiscountOutOfRange);
        }
        if self.discount > 0 && self.price > self.original_price {
            return Err(ItemError::DiscountAboveOriginal);
        }
        if self.tags.is_empty() {
            return Err(ItemError::NoTags);
        }
        Ok(())
    }

    /// Whether the item passes the catalog's search and category filter.
    ///
    /// `query_lower` must already be lower-cased; an empty query matches
    /// everything.
    #[must_use]
    pub fn matches(&self, query_lower: &str, category: &CategoryFilter) -> bool {
        let matches_query = self.title.to_lowercase().contains(query_lower)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(query_lower));
        matches_query && category.admits(&self.tags)
    }
}

/// Split a comma-separated genre string into tags.
///
/// Blank segments are dropped; an absent or blank string yields the single
/// tag `"Game"` so the non-empty invariant holds.
#[must_use]
pub fn tags_from_genres(genres: Option<&str>) -> Vec<String> {
    let tags: Vec<String> = genres
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect();
    if tags.is_empty() {
        vec!["Game".to_owned()]
    } else {
        tags
    }
}

/// Fields supplied when creating or editing a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    pub price: Money,
    /// Category tags; sent to the backend as one comma-separated string.
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Externally hosted artwork, checked before it is attached.
    pub image_url: Option<String>,
}

impl ItemDraft {
    /// Check the draft before it is submitted.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank title or a negative price.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.title.trim().is_empty() {
            return Err(ItemError::EmptyTitle);
        }
        if self.price.is_negative() {
            return Err(ItemError::NegativePrice);
        }
        Ok(())
    }

    /// Tags joined the way the backend stores them.
    #[must_use]
    pub fn genres(&self) -> Option<String> {
        let joined = self
            .tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        (!joined.is_empty()).then_some(joined)
    }
}

//! Core types for Arcade.
//!
//! This module provides type-safe wrappers for the storefront's domain
//! concepts.

pub mod category;
pub mod email;
pub mod id;
pub mod identity;
pub mod item;
pub mod money;
pub mod purchase;
pub mod rating;

pub use category::{CATEGORIES, CategoryFilter};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::Identity;
pub use item::{DEFAULT_RATING, ImageRef, Item, ItemDraft, ItemError, STOCK_IMAGES, tags_from_genres};
pub use money::Money;
pub use purchase::Purchase;
pub use rating::{Rating, Score, ScoreError};

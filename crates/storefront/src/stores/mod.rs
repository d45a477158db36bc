//! Client-side stores.
//!
//! The cart, wallet, library and purchase history follow the signed-in
//! identity: they refetch when it changes and empty themselves when it goes
//! away. The catalog is shared by everyone. No store holds a lock across a
//! backend call; concurrent refreshes resolve last-write-wins.

mod account;
mod cart;
mod catalog;
mod history;
mod library;
mod ratings;
mod wallet;

pub use account::{AccountService, MIN_PASSWORD_LEN};
pub use cart::CartStore;
pub use catalog::CatalogStore;
pub use history::HistoryStore;
pub use library::LibraryStore;
pub use ratings::RatingService;
pub use wallet::WalletStore;

use std::sync::atomic::{AtomicBool, Ordering};

use arcade_core::Item;

/// Sets a loading flag for its lifetime.
pub(crate) struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    pub(crate) fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drop repeated item ids, keeping the first occurrence.
pub(crate) fn dedup_items(items: Vec<Item>) -> Vec<Item> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.id)).collect()
}

//! Arcade Storefront library.
//!
//! Client side of the Arcade game store: a typed client for the REST
//! backend, the session and the stores that follow it, and the checkout
//! flow that ties them together. Front ends (the `arcade` CLI, tests) drive
//! everything through [`Storefront`].
//!
//! # Modules
//!
//! - [`api`] - REST backend client
//! - [`session`] - Signed-in identity, persistence, idle/expiry monitor
//! - [`stores`] - Catalog, cart, wallet, library, purchases, account, ratings
//! - [`checkout`] - Cart to purchase orchestration
//! - [`image`] - Artwork URL validation
//! - [`functions`] - Serverless functions client

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod checkout;
pub mod config;
pub mod error;
pub mod functions;
pub mod image;
pub mod notice;
pub mod session;
pub mod state;
pub mod storage;
pub mod stores;

#[cfg(test)]
mod test_support;

pub use checkout::{CheckoutError, CheckoutOrchestrator, CheckoutPhase, CheckoutReceipt};
pub use config::StorefrontConfig;
pub use error::{Result, StoreError};
pub use notice::{Notice, NoticeLevel, NoticeLog, NoticeSink, Route, TracingNotices};
pub use state::Storefront;

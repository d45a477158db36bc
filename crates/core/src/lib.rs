//! Arcade Core - Shared domain types.
//!
//! This crate provides the types used across all Arcade components:
//! - `storefront` - Backend client and identity-gated stores
//! - `cli` - Command-line front end driving the stores
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, emails, catalog items, identities,
//!   purchases and ratings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

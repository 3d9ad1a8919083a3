//! Records Server - validated record stores behind a thin HTTP surface
//!
//! The library holds everything with business rules:
//! - Field validation for user profiles, inventory items and logbook entries
//! - SQLite-backed inventory and profile stores with CSV import/export
//! - A Supabase-backed KKN activity logbook
//!
//! The binary in `main.rs` only wires configuration, logging and routes.

pub mod app;
pub mod config;
pub mod http;
pub mod store;
pub mod util;
pub mod validation;

pub use store::StoreError;
pub use validation::{ValidationError, Validator};

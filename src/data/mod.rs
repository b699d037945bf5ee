//! Data layer module
//!
//! Everything that touches the relational store:
//! - Row and view models
//! - The `SocialBackend` trait
//! - SQLite backend (local/offline)
//! - REST backend (hosted)

mod backend;
mod database;
mod models;
mod rest;

#[cfg(test)]
pub use backend::MockSocialBackend;
pub use backend::SocialBackend;
pub use database::Database;
pub use models::*;
pub use rest::RestBackend;

//! In-memory storage backend for the BannerHub service.
//!
//! This crate provides an in-memory implementation of the `BannerStore` trait
//! from `bannerhub-storage`. It is used for local runs without PostgreSQL and
//! as the store in service-level tests.
//!
//! # Example
//!
//! ```ignore
//! use bannerhub_db_memory::InMemoryBannerStore;
//! use bannerhub_storage::BannerStore;
//!
//! let store = InMemoryBannerStore::new();
//! let id = store.create_banner(new_banner).await?;
//! ```

mod storage;

pub use bannerhub_storage::{BannerStore, StorageError};
pub use storage::InMemoryBannerStore;

/// Creates a new in-memory store behind the shared trait object.
pub fn create_banner_store() -> bannerhub_storage::DynBannerStore {
    std::sync::Arc::new(InMemoryBannerStore::new())
}

//! # bannerhub-storage
//!
//! Storage abstraction layer for the BannerHub service.
//!
//! This crate defines the traits and types that all storage backends must
//! implement. It does not contain any implementations; those are provided by
//! `bannerhub-db-postgres`, `bannerhub-db-memory` and the cache backends in
//! `bannerhub-server`.
//!
//! ## Overview
//!
//! - [`BannerStore`]: relational store for banners and tag associations
//! - [`CacheStore`]: byte cache with per-key TTL and a distinguishable miss
//! - [`plan_reconciliation`]: positional tag-set reconciliation shared by
//!   every backend

mod error;
mod reconcile;
mod traits;
mod types;

pub use error::{CacheError, ErrorCategory, StorageError};
pub use reconcile::{TagOp, plan_reconciliation};
pub use traits::{BannerStore, CacheStore};
pub use types::{
    AssociationId, Banner, BannerContent, BannerId, FeatureId, NewBanner, TagAssociation, TagId,
    TagSlot,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared relational store.
pub type DynBannerStore = std::sync::Arc<dyn BannerStore>;

/// Type alias for a shared cache store.
pub type DynCacheStore = std::sync::Arc<dyn CacheStore>;

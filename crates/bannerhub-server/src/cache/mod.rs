//! Caching for the active-banner read path.
//!
//! ## Architecture
//!
//! - **Local (DashMap)**: In-memory, per-instance, expiry checked on read
//! - **Redis**: Shared across instances, expiry enforced by Redis
//!
//! Snapshots are MessagePack-encoded [`bannerhub_storage::Banner`] values
//! stored under [`banner_key`].
//!
//! ```text
//! resolve → CacheStore::get → hit: decode and return
//!                           → miss: BannerStore → CacheStore::set
//! ```

pub mod backend;
pub mod policy;

pub use backend::{CacheBackend, CachedEntry};
pub use policy::{CacheFailurePolicy, CacheOp, FailClosed, FailOpen, policy_from_config};

use bannerhub_storage::{FeatureId, TagId};

/// Cache key for the active banner of `(feature_id, tag_id)`.
pub fn banner_key(feature_id: FeatureId, tag_id: TagId) -> String {
    format!("banner:{feature_id}:{tag_id}")
}

//! SQL query implementations.
//!
//! Every function is generic over the executor so the same query runs against
//! the pool or inside a transaction (`&mut *tx`).

pub mod banners;
pub mod tags;

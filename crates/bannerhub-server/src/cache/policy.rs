//! What the resolver does when the cache backend fails.

use std::sync::Arc;

use bannerhub_storage::CacheError;

use crate::config::FailurePolicyKind;

/// Which cache call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    Get,
    Set,
}

impl std::fmt::Display for CacheOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Set => write!(f, "set"),
        }
    }
}

/// Decides whether a cache backend failure fails the read.
///
/// Returning `Ok(())` means "carry on as if the cache missed" for a `get`
/// and "ignore the failed write" for a `set`.
pub trait CacheFailurePolicy: Send + Sync {
    fn on_failure(&self, op: CacheOp, key: &str, err: CacheError) -> Result<(), CacheError>;
}

/// Propagates every cache failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailClosed;

impl CacheFailurePolicy for FailClosed {
    fn on_failure(&self, op: CacheOp, key: &str, err: CacheError) -> Result<(), CacheError> {
        tracing::error!(%op, key, error = %err, "Cache failure, failing request");
        Err(err)
    }
}

/// Logs cache failures and serves from the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailOpen;

impl CacheFailurePolicy for FailOpen {
    fn on_failure(&self, op: CacheOp, key: &str, err: CacheError) -> Result<(), CacheError> {
        tracing::warn!(%op, key, error = %err, "Cache failure, continuing without cache");
        Ok(())
    }
}

/// Builds the policy named in configuration.
pub fn policy_from_config(kind: FailurePolicyKind) -> Arc<dyn CacheFailurePolicy> {
    match kind {
        FailurePolicyKind::FailClosed => Arc::new(FailClosed),
        FailurePolicyKind::FailOpen => Arc::new(FailOpen),
    }
}

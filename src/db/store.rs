//! Backing store abstraction
//!
//! The recommendation core only needs one capability from the article store:
//! a bounded, filtered scan that can be resumed from an opaque cursor. Each
//! store decides how the predicate and cursor map onto its own query language.

use std::collections::BTreeSet;

use crate::{
    models::{Cursor, UserId},
    services::predicate::Predicate,
};

/// A record exactly as the store returned it
pub type RawItem = serde_json::Map<String, serde_json::Value>;

/// Failures surfaced by a backing store
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The request itself was rejected (bad predicate or cursor). Not retriable.
    #[error("invalid store request: {0}")]
    Validation(String),

    /// The store is shedding load. Callers may retry later; nothing here does.
    #[error("store throughput exceeded: {0}")]
    Throughput(String),

    /// A returned record could not be turned into an article
    #[error("malformed store record: {0}")]
    MalformedRecord(String),

    #[error("store request failed: {0}")]
    Transport(String),
}

/// One bounded scan
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// `None` scans every article
    pub predicate: Option<Predicate>,
    pub cursor: Option<Cursor>,
    /// Maximum number of items to return
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<RawItem>,
    /// `None` once the scan is exhausted
    pub next_cursor: Option<Cursor>,
}

/// Scan-capable store holding article summaries
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArticleStore: Send + Sync {
    /// Returns up to `request.limit` items matching the predicate, resuming after `request.cursor`
    async fn scan(&self, request: ScanRequest) -> Result<ScanPage, StoreError>;

    /// Cheap connectivity check used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}

/// Per-user tag preferences
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored tags for `user`; an unknown user has no preferences
    async fn get(&self, user: &UserId) -> Result<BTreeSet<String>, StoreError>;

    /// Replaces the stored tags for `user`
    async fn put(&self, user: &UserId, tags: BTreeSet<String>) -> Result<(), StoreError>;
}

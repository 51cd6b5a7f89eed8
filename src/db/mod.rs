pub mod cache;
pub mod cursor;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::{Fingerprint, ResponseCache};
pub use memory::{InMemoryArticleStore, InMemoryPreferenceStore};
pub use postgres::{create_pool, run_migrations, PgArticleStore, PgPreferenceStore};
pub use store::{ArticleStore, PreferenceStore, RawItem, ScanPage, ScanRequest, StoreError};

#[cfg(test)]
pub use store::{MockArticleStore, MockPreferenceStore};

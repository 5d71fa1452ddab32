//! Document store contract consumed by the record engine

use crate::core::descriptor::UniqueIndex;
use crate::core::query::{FindOptions, Filter, Page};
use async_trait::async_trait;

pub use crate::core::attributes::Document;

/// Failures reported by a [`Store`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write violated the unique index named `index`
    #[error("duplicate key for index {index}")]
    DuplicateKey { index: String },

    /// Any other backend or connectivity failure
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document persistence primitive shared by every entity type
///
/// Implementations assign identities on `save` and expose them under the
/// `_id` key of every returned document. Identities are opaque strings.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new document, returning it as stored (with `_id`)
    async fn save(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Apply `$set`-style dotted-path changes to the document with `id`,
    /// returning the number of documents the identity matched
    async fn update(&self, collection: &str, id: &str, changes: Document) -> StoreResult<u64>;

    /// Fetch one document by identity
    async fn find(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Fetch the documents matching `filter`, one page at a time
    async fn find_where(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Page>;

    /// Whether any document matches `filter`
    async fn exists(&self, collection: &str, filter: &Filter) -> StoreResult<bool>;

    /// Remove the document with `id`, returning the number removed
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<u64>;

    /// Install a unique index. Installing the same index twice is harmless.
    async fn ensure_unique_index(&self, collection: &str, index: &UniqueIndex) -> StoreResult<()>;
}

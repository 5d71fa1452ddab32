//! Shared test harness for store backend testing
//!
//! Provides document helpers and the `store_contract_tests!` macro that
//! validates any `Store` implementation against the contract consumed by the
//! record engine.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//! use store_harness::*;
//!
//! store_contract_tests!(InMemoryStore::new());
//! ```

#![allow(dead_code)]

#[macro_use]
mod store_contract_tests;

use kinship::core::{Document, ID_KEY, Store, document};
use serde_json::Value;

/// Collection used by the contract tests
pub const COLLECTION: &str = "contract_documents";

/// Identity that no backend ever assigns, valid as an ObjectId
pub const UNKNOWN_ID: &str = "000000000000000000000000";

/// JSON object literal as a document
pub fn doc(value: Value) -> Document {
    document(value)
}

/// Identity carried by a stored document
pub fn id_of(stored: &Document) -> String {
    stored
        .get(ID_KEY)
        .and_then(Value::as_str)
        .expect("stored document has a string _id")
        .to_string()
}

/// Save `value` into `collection` and return its identity
pub async fn insert(store: &dyn Store, collection: &str, value: Value) -> String {
    let stored = store
        .save(collection, doc(value))
        .await
        .expect("save should succeed");
    id_of(&stored)
}

/// Sorted string values of `field` across `documents`
pub fn sorted_values(documents: &[Document], field: &str) -> Vec<String> {
    let mut values: Vec<String> = documents
        .iter()
        .filter_map(|d| d.get(field).and_then(Value::as_str).map(str::to_owned))
        .collect();
    values.sort();
    values
}

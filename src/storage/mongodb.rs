//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! kinship = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! One MongoDB collection per entity collection name. Identities are
//! `ObjectId`s generated by the driver and exposed as 24-character hex
//! strings under `_id`; every other value round-trips through
//! `serde_json::Value` as relaxed extended JSON.
//!
//! # Connection
//!
//! The `Database` handle is created on first use and shared by every
//! collection and every clone of the store.

use crate::config::AppConfig;
use crate::core::attributes::Document;
use crate::core::descriptor::UniqueIndex;
use crate::core::query::{Direction, Filter, FindOptions, Page};
use crate::core::record::ID_KEY;
use crate::core::store::{Store, StoreError, StoreResult};
use anyhow::anyhow;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, Bson, doc};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

type BsonDocument = bson::Document;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a JSON document into a BSON document
fn to_bson_document(document: Document) -> StoreResult<BsonDocument> {
    match bson::to_bson(&Value::Object(document))
        .map_err(|e| anyhow!("Failed to convert JSON to BSON: {}", e))?
    {
        Bson::Document(d) => Ok(d),
        _ => Err(anyhow!("Expected BSON document, got non-object").into()),
    }
}

/// Convert a BSON document back into JSON, rendering an `ObjectId`
/// identity as its hex string
fn from_bson_document(mut document: BsonDocument) -> Document {
    let id = document.remove(ID_KEY);
    let mut json = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Some(id) = id {
        let id = match id {
            Bson::ObjectId(oid) => Value::String(oid.to_hex()),
            Bson::String(s) => Value::String(s),
            other => other.into_relaxed_extjson(),
        };
        json.insert(ID_KEY.to_string(), id);
    }
    json
}

/// Value of a filter operand; string identities become `ObjectId`s
fn operand(path: &str, value: &Value) -> StoreResult<Bson> {
    if path == ID_KEY
        && let Some(oid) = value.as_str().and_then(|s| ObjectId::parse_str(s).ok())
    {
        return Ok(Bson::ObjectId(oid));
    }
    bson::to_bson(value).map_err(|e| anyhow!("Failed to convert filter value: {}", e).into())
}

/// Translate a [`Filter`] into a MongoDB query document
fn filter_document(filter: &Filter) -> StoreResult<BsonDocument> {
    let query = match filter {
        Filter::All => doc! {},
        Filter::Eq(path, value) => {
            let mut query = BsonDocument::new();
            query.insert(path.as_str(), operand(path, value)?);
            query
        }
        Filter::In(path, values) => {
            let operands = values
                .iter()
                .map(|v| operand(path, v))
                .collect::<StoreResult<Vec<Bson>>>()?;
            let mut query = BsonDocument::new();
            query.insert(path.as_str(), doc! { "$in": operands });
            query
        }
        Filter::And(filters) if filters.is_empty() => doc! {},
        Filter::And(filters) => {
            let clauses = filters
                .iter()
                .map(filter_document)
                .collect::<StoreResult<Vec<BsonDocument>>>()?;
            doc! { "$and": clauses }
        }
        Filter::Or(filters) if filters.is_empty() => doc! { ID_KEY: { "$in": [] } },
        Filter::Or(filters) => {
            let clauses = filters
                .iter()
                .map(filter_document)
                .collect::<StoreResult<Vec<BsonDocument>>>()?;
            doc! { "$or": clauses }
        }
        Filter::Gte(path, bound) => range(path, "$gte", bound)?,
        Filter::Lte(path, bound) => range(path, "$lte", bound)?,
    };
    Ok(query)
}

/// `{ path: { op: bound } }`
fn range(path: &str, op: &str, bound: &Value) -> StoreResult<BsonDocument> {
    let mut condition = BsonDocument::new();
    condition.insert(op, operand(path, bound)?);
    let mut query = BsonDocument::new();
    query.insert(path, condition);
    Ok(query)
}

/// Name of the index reported by an E11000 duplicate key error
fn duplicate_index(message: &str) -> Option<String> {
    static INDEX_NAME: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = INDEX_NAME
        .get_or_init(|| Regex::new(r"index: (\S+) ").ok())
        .as_ref()?;
    regex
        .captures(message)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Classify a driver error, recognising unique index violations
fn classify(error: mongodb::error::Error, context: &str) -> StoreError {
    let message = error.to_string();
    if message.contains("E11000")
        && let Some(index) = duplicate_index(&message)
    {
        return StoreError::DuplicateKey { index };
    }
    StoreError::Backend(anyhow!("{}: {}", context, message))
}

// ---------------------------------------------------------------------------
// MongoStore
// ---------------------------------------------------------------------------

/// Document store backed by MongoDB
///
/// # Example
///
/// ```rust,ignore
/// use kinship::storage::MongoStore;
///
/// let store = MongoStore::new("mongodb://localhost:27017", "kinship_development");
/// let users = User::model(Arc::new(store), hasher);
/// users.ensure_indexes().await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoStore {
    url: String,
    database_name: String,
    database: Arc<OnceCell<Database>>,
}

impl MongoStore {
    /// Create a store that connects to `url` on first use
    pub fn new(url: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database_name: database_name.into(),
            database: Arc::new(OnceCell::new()),
        }
    }

    /// Create a store from the application configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.database_url, &config.database_name)
    }

    /// Wrap an already connected database handle
    pub fn with_database(database: Database) -> Self {
        Self {
            url: String::new(),
            database_name: database.name().to_string(),
            database: Arc::new(OnceCell::new_with(Some(database))),
        }
    }

    /// The shared database handle, connecting on first call
    pub async fn database(&self) -> StoreResult<&Database> {
        self.database
            .get_or_try_init(|| async {
                tracing::info!(database = %self.database_name, "connecting to MongoDB");
                let client = Client::with_uri_str(&self.url)
                    .await
                    .map_err(|e| anyhow!("Failed to connect to MongoDB: {}", e))?;
                Ok::<_, StoreError>(client.database(&self.database_name))
            })
            .await
    }

    async fn collection(&self, name: &str) -> StoreResult<Collection<BsonDocument>> {
        Ok(self.database().await?.collection(name))
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn save(&self, collection: &str, mut document: Document) -> StoreResult<Document> {
        document.remove(ID_KEY);
        let bson_document = to_bson_document(document.clone())?;

        let result = self
            .collection(collection)
            .await?
            .insert_one(bson_document)
            .await
            .map_err(|e| classify(e, "Failed to insert document"))?;

        let id = match result.inserted_id {
            Bson::ObjectId(oid) => Value::String(oid.to_hex()),
            other => other.into_relaxed_extjson(),
        };
        document.insert(ID_KEY.to_string(), id);
        Ok(document)
    }

    async fn update(&self, collection: &str, id: &str, changes: Document) -> StoreResult<u64> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(0);
        };
        let collection = self.collection(collection).await?;

        // MongoDB rejects an empty $set
        if changes.is_empty() {
            return collection
                .count_documents(doc! { ID_KEY: oid })
                .await
                .map_err(|e| classify(e, "Failed to count documents"));
        }

        let result = collection
            .update_one(doc! { ID_KEY: oid }, doc! { "$set": to_bson_document(changes)? })
            .await
            .map_err(|e| classify(e, "Failed to update document"))?;

        Ok(result.matched_count)
    }

    async fn find(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        let document = self
            .collection(collection)
            .await?
            .find_one(doc! { ID_KEY: oid })
            .await
            .map_err(|e| classify(e, "Failed to find document"))?;

        Ok(document.map(from_bson_document))
    }

    async fn find_where(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Page> {
        let collection = self.collection(collection).await?;
        let query = filter_document(filter)?;

        let total = collection
            .count_documents(query.clone())
            .await
            .map_err(|e| classify(e, "Failed to count documents"))?;

        let mut find = collection.find(query);
        if let Some(sort) = &options.sort {
            let direction = match sort.direction {
                Direction::Asc => 1,
                Direction::Desc => -1,
            };
            let mut order = BsonDocument::new();
            order.insert(sort.field.as_str(), direction);
            find = find.sort(order);
        }
        // the server rejects a skip that does not fit in a signed long
        if let Some(limit) = options.page_size() {
            find = find
                .skip(u64::try_from(options.skip()).map_or(i64::MAX as u64, |skip| {
                    skip.min(i64::MAX as u64)
                }))
                .limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let documents: Vec<BsonDocument> = find
            .await
            .map_err(|e| classify(e, "Failed to query documents"))?
            .try_collect()
            .await
            .map_err(|e| classify(e, "Failed to collect documents"))?;

        Ok(Page {
            records: documents.into_iter().map(from_bson_document).collect(),
            has_next_page: options.has_next_page(usize::try_from(total).unwrap_or(usize::MAX)),
        })
    }

    async fn exists(&self, collection: &str, filter: &Filter) -> StoreResult<bool> {
        let found = self
            .collection(collection)
            .await?
            .find_one(filter_document(filter)?)
            .await
            .map_err(|e| classify(e, "Failed to query documents"))?;

        Ok(found.is_some())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<u64> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(0);
        };

        let result = self
            .collection(collection)
            .await?
            .delete_one(doc! { ID_KEY: oid })
            .await
            .map_err(|e| classify(e, "Failed to delete document"))?;

        Ok(result.deleted_count)
    }

    async fn ensure_unique_index(&self, collection: &str, index: &UniqueIndex) -> StoreResult<()> {
        let mut keys = BsonDocument::new();
        for key in &index.keys {
            keys.insert(key.as_str(), 1);
        }
        let options = IndexOptions::builder()
            .unique(true)
            .name(index.name.clone())
            .build();
        let model = IndexModel::builder().keys(keys).options(options).build();

        self.collection(collection)
            .await?
            .create_index(model)
            .await
            .map_err(|e| classify(e, "Failed to create unique index"))?;

        Ok(())
    }
}

//! # Kinship
//!
//! Record lifecycle engine and friend-graph queries for a document-backed
//! social network API.
//!
//! ## Features
//!
//! - **Change tracking**: nested attribute writes kept apart from the persisted baseline
//! - **Shape validation**: recursive schema templates, business rules as hooks
//! - **Hook pipeline**: eight ordered async stages around validate/create/update
//! - **Typed errors**: `Invalid`, `NotFound`, `ReadOnly`, `DuplicateKey`, mapped to HTTP responses
//! - **Unique indexes**: store conflicts reported as field validation errors
//! - **Friend graph**: friendship and friend-of-friend checks over accepted requests
//! - **Storage backends**: in-memory, and MongoDB behind `mongodb_backend`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kinship::prelude::*;
//!
//! let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
//! let entities = Entities::new(store, hasher, Arc::new(UuidTokens));
//! entities.ensure_indexes().await?;
//!
//! let mut user = entities.users.build(document(json!({
//!     "name": "mickey",
//!     "email": "mickey@example.com",
//!     "password": "cheese123",
//! })));
//! user.save().await?;
//!
//! let auth = entities.sign_in("mickey@example.com", "cheese123").await?;
//! println!("{}", serde_json::to_string(&auth)?); // {"token":"..."}
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod links;
pub mod observability;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Engine ===
    pub use crate::core::{
        ChangeSet, DEFAULT_VIEW, Document, EntityDescriptor, Errors, Filter, FindOptions, Hook,
        Hooks, ID_KEY, Model, Record, RecordError, RecordPage, RecordResult, Schema, Sort,
        Stage, Store, StoreError, StoreResult, UniqueIndex, View, document, hook_fn,
    };

    // === Domain ===
    pub use crate::entities::{Entities, PasswordHasher, TokenGenerator, UuidTokens};
    pub use crate::links::FriendGraph;

    // === Storage ===
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoStore;

    // === Config ===
    pub use crate::config::{AppConfig, ConfigError};
    pub use crate::observability::init_tracing;

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}

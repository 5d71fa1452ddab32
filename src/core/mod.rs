//! Core module containing the record lifecycle engine and its building blocks

pub mod attributes;
pub mod descriptor;
pub mod error;
pub mod errors;
pub mod hooks;
pub mod model;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;
pub mod view;

pub use attributes::{ChangeSet, Document, document};
pub use descriptor::{DEFAULT_VIEW, EntityDescriptor, UniqueIndex};
pub use error::{RecordError, RecordResult};
pub use errors::Errors;
pub use hooks::{Hook, Hooks, Stage, hook_fn};
pub use model::{Model, RecordPage};
pub use query::{Direction, Filter, FindOptions, Page, Sort};
pub use record::{ID_KEY, Record};
pub use schema::Schema;
pub use store::{Store, StoreError, StoreResult};
pub use view::{View, ViewField};

//! Collection-level operations for one entity

use crate::core::attributes::Document;
use crate::core::descriptor::EntityDescriptor;
use crate::core::error::{RecordError, RecordResult};
use crate::core::query::{Filter, FindOptions};
use crate::core::record::Record;
use crate::core::store::Store;
use std::sync::Arc;

/// A page of records returned by [`Model::find_where`]
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub has_next_page: bool,
}

/// An entity descriptor bound to a store
#[derive(Clone)]
pub struct Model {
    descriptor: Arc<EntityDescriptor>,
    store: Arc<dyn Store>,
}

impl Model {
    pub fn new(descriptor: EntityDescriptor, store: Arc<dyn Store>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            store,
        }
    }

    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Transient record from raw attributes
    pub fn build(&self, attributes: Document) -> Record {
        Record::new(
            Arc::clone(&self.descriptor),
            Arc::clone(&self.store),
            attributes,
        )
    }

    /// Build and save in one step
    pub async fn create(&self, attributes: Document) -> RecordResult<Record> {
        let mut record = self.build(attributes);
        record.save().await?;
        Ok(record)
    }

    /// Fetch a record by identity
    pub async fn find(&self, id: &str) -> RecordResult<Record> {
        tracing::debug!(entity = %self.descriptor.name, id = %id, "finding record");
        match self.store.find(&self.descriptor.collection, id).await? {
            Some(document) => Ok(self.hydrate(document)),
            None => Err(RecordError::not_found_by_id(&self.descriptor.name, id)),
        }
    }

    /// Fetch one page of records matching `filter`
    pub async fn find_where(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> RecordResult<RecordPage> {
        let page = self
            .store
            .find_where(&self.descriptor.collection, filter, options)
            .await?;
        Ok(RecordPage {
            records: page
                .records
                .into_iter()
                .map(|document| self.hydrate(document))
                .collect(),
            has_next_page: page.has_next_page,
        })
    }

    /// First record matching `filter`, if any
    pub async fn first_where(&self, filter: &Filter) -> RecordResult<Option<Record>> {
        let page = self
            .find_where(filter, &FindOptions::new().limit(1))
            .await?;
        Ok(page.records.into_iter().next())
    }

    pub async fn exists(&self, filter: &Filter) -> RecordResult<bool> {
        Ok(self
            .store
            .exists(&self.descriptor.collection, filter)
            .await?)
    }

    /// Install every unique index declared by the entity
    pub async fn ensure_indexes(&self) -> RecordResult<()> {
        for index in &self.descriptor.unique_indexes {
            tracing::debug!(
                entity = %self.descriptor.name,
                index = %index.name,
                "ensuring unique index"
            );
            self.store
                .ensure_unique_index(&self.descriptor.collection, index)
                .await?;
        }
        Ok(())
    }

    fn hydrate(&self, document: Document) -> Record {
        Record::hydrate(
            Arc::clone(&self.descriptor),
            Arc::clone(&self.store),
            document,
        )
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("entity", &self.descriptor.name)
            .field("collection", &self.descriptor.collection)
            .finish()
    }
}

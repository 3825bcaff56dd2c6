//! Testing utilities for the CSM workspace
//!
//! Shared fixtures: schema models, change constructors, field containers
//! and a container store that simulates infrastructure failure.

#![allow(missing_docs)]

use async_trait::async_trait;
use csm_schema::{
    ChangeOperation, ContainerId, ContentId, FieldMap, FieldSchema, FieldType, FieldValue,
    ReleaseId, RowId, SchemaChange, SchemaContainerVersion,
};
use csm_store::{ContainerStore, EditState, FieldContainer, MemoryContainerStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The canonical single-field model: required text field "title"
pub fn article_model() -> csm_schema::SchemaModel {
    csm_schema::SchemaModel::new("article")
        .with_field(FieldSchema::new("title", FieldType::String).required())
        .with_display_field("title")
}

/// An add-field change for an optional text field
pub fn add_text_field(key: &str) -> SchemaChange {
    SchemaChange::new(ChangeOperation::AddField {
        field: FieldSchema::new(key, FieldType::String),
        insert_after: None,
    })
}

/// A remove-field change
pub fn remove_field(key: &str) -> SchemaChange {
    SchemaChange::new(ChangeOperation::RemoveField { key: key.into() })
}

/// A change-field-type change
pub fn change_field_type(key: &str, new_type: FieldType) -> SchemaChange {
    SchemaChange::new(ChangeOperation::ChangeFieldType {
        key: key.into(),
        new_type,
    })
}

/// A draft container with a single "title" value, bound to `version`
pub fn title_container(
    version: &Arc<SchemaContainerVersion>,
    release: ReleaseId,
    title: &str,
) -> FieldContainer {
    let mut fields = FieldMap::new();
    fields.insert("title".into(), FieldValue::String(title.into()));
    container_with_fields(version, release, fields)
}

/// A draft container with arbitrary fields, bound to `version`
pub fn container_with_fields(
    version: &Arc<SchemaContainerVersion>,
    release: ReleaseId,
    fields: FieldMap,
) -> FieldContainer {
    FieldContainer::new(
        ContentId::new(),
        "en",
        EditState::Draft,
        release,
        Arc::clone(version),
        fields,
    )
    .expect("fixture fields must type-check")
}

/// Container store that fails with an infrastructure error after a budget
/// of successful replace operations
///
/// Everything else delegates to an in-memory store, so a failed job can be
/// re-submitted against the surviving state.
#[derive(Debug)]
pub struct FlakyContainerStore {
    inner: MemoryContainerStore,
    replaces_left: AtomicUsize,
}

impl FlakyContainerStore {
    /// Allow `budget` replace operations before failing
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            inner: MemoryContainerStore::new(),
            replaces_left: AtomicUsize::new(budget),
        }
    }

    /// Lift the failure budget so a re-submitted job can finish
    pub fn recover(&self, budget: usize) {
        self.replaces_left.store(budget, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContainerStore for FlakyContainerStore {
    async fn insert(&self, container: FieldContainer) -> Result<RowId, StoreError> {
        self.inner.insert(container).await
    }

    async fn get(&self, row: RowId) -> Result<Option<FieldContainer>, StoreError> {
        self.inner.get(row).await
    }

    async fn live_at(
        &self,
        release: ReleaseId,
        container: ContainerId,
        version: u32,
    ) -> Result<Vec<FieldContainer>, StoreError> {
        self.inner.live_at(release, container, version).await
    }

    async fn live_in(
        &self,
        release: ReleaseId,
        container: ContainerId,
    ) -> Result<Vec<FieldContainer>, StoreError> {
        self.inner.live_in(release, container).await
    }

    async fn replace(
        &self,
        old_row: RowId,
        replacement: FieldContainer,
    ) -> Result<RowId, StoreError> {
        let left = self.replaces_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            n.checked_sub(1)
        });
        if left.is_err() {
            return Err(StoreError::Unavailable("simulated storage outage".into()));
        }
        self.inner.replace(old_row, replacement).await
    }

    async fn delete(&self, row: RowId) -> Result<(), StoreError> {
        self.inner.delete(row).await
    }

    async fn retired_count(
        &self,
        release: ReleaseId,
        container: ContainerId,
    ) -> Result<usize, StoreError> {
        self.inner.retired_count(release, container).await
    }
}

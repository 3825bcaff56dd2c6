//! Storage-engine seam for field containers
//!
//! The [`ContainerStore`] trait is the boundary to the durable storage
//! engine. It provides the atomicity guarantee for a single container
//! rewrite: [`ContainerStore::replace`] makes the new container live and
//! retires the old one as one unit, so a container is never observed
//! half-migrated. [`MemoryContainerStore`] is the in-process reference
//! implementation used by tests and the orchestrator defaults.

use crate::content::FieldContainer;
use crate::error::StoreError;
use async_trait::async_trait;
use csm_schema::{ContainerId, ReleaseId, RowId};
use dashmap::DashMap;

/// Durable read/write access to field containers
///
/// Retired containers are kept for audit and stay invisible to live reads.
#[async_trait]
pub trait ContainerStore: Send + Sync + std::fmt::Debug {
    /// Persist a new live container
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] when storage is unreachable.
    async fn insert(&self, container: FieldContainer) -> Result<RowId, StoreError>;

    /// Fetch a container by row identity, live or retired
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] when storage is unreachable.
    async fn get(&self, row: RowId) -> Result<Option<FieldContainer>, StoreError>;

    /// All live containers of a release bound to the given schema version
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] when storage is unreachable.
    async fn live_at(
        &self,
        release: ReleaseId,
        container: ContainerId,
        version: u32,
    ) -> Result<Vec<FieldContainer>, StoreError>;

    /// All live containers of a release for a schema container, regardless
    /// of bound version
    ///
    /// Readers must tolerate mixed versions here: a recorded pin does not
    /// imply migration has completed.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] when storage is unreachable.
    async fn live_in(
        &self,
        release: ReleaseId,
        container: ContainerId,
    ) -> Result<Vec<FieldContainer>, StoreError>;

    /// Atomically make `replacement` live and retire the old row
    ///
    /// The old container is kept for audit; it is never deleted before the
    /// replacement exists.
    ///
    /// # Errors
    /// - [`StoreError::RowNotFound`] when the old row does not exist
    /// - [`StoreError::Unavailable`] when storage is unreachable
    async fn replace(
        &self,
        old_row: RowId,
        replacement: FieldContainer,
    ) -> Result<RowId, StoreError>;

    /// Delete a container row outright, cascading to owned child structures
    ///
    /// Used for draft discard, never for migration retirement.
    ///
    /// # Errors
    /// - [`StoreError::RowNotFound`] when the row does not exist
    /// - [`StoreError::Unavailable`] when storage is unreachable
    async fn delete(&self, row: RowId) -> Result<(), StoreError>;

    /// Number of retired containers of a release for a schema container
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] when storage is unreachable.
    async fn retired_count(
        &self,
        release: ReleaseId,
        container: ContainerId,
    ) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredRow {
    container: FieldContainer,
    retired: bool,
}

/// In-memory reference implementation of [`ContainerStore`]
#[derive(Debug, Default)]
pub struct MemoryContainerStore {
    rows: DashMap<RowId, StoredRow>,
}

impl MemoryContainerStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn live_matching(
        &self,
        release: ReleaseId,
        container: ContainerId,
        version: Option<u32>,
    ) -> Vec<FieldContainer> {
        let mut rows: Vec<FieldContainer> = self
            .rows
            .iter()
            .filter(|entry| {
                let row = entry.value();
                !row.retired
                    && row.container.release() == release
                    && row.container.container_id() == container
                    && version.map_or(true, |v| row.container.version() == v)
            })
            .map(|entry| entry.value().container.clone())
            .collect();
        // Deterministic enumeration order for reports and tests
        rows.sort_by_key(FieldContainer::row);
        rows
    }
}

#[async_trait]
impl ContainerStore for MemoryContainerStore {
    async fn insert(&self, container: FieldContainer) -> Result<RowId, StoreError> {
        let row = container.row();
        self.rows.insert(
            row,
            StoredRow {
                container,
                retired: false,
            },
        );
        Ok(row)
    }

    async fn get(&self, row: RowId) -> Result<Option<FieldContainer>, StoreError> {
        Ok(self.rows.get(&row).map(|r| r.container.clone()))
    }

    async fn live_at(
        &self,
        release: ReleaseId,
        container: ContainerId,
        version: u32,
    ) -> Result<Vec<FieldContainer>, StoreError> {
        Ok(self.live_matching(release, container, Some(version)))
    }

    async fn live_in(
        &self,
        release: ReleaseId,
        container: ContainerId,
    ) -> Result<Vec<FieldContainer>, StoreError> {
        Ok(self.live_matching(release, container, None))
    }

    async fn replace(
        &self,
        old_row: RowId,
        replacement: FieldContainer,
    ) -> Result<RowId, StoreError> {
        let new_row = replacement.row();
        // Stage the replacement first: the old row is retired only after the
        // new one exists, so the data is never absent mid-rewrite. The
        // single writer per (release, container) pair keeps the two steps
        // from interleaving with another rewrite of the same row.
        self.rows.insert(
            new_row,
            StoredRow {
                container: replacement,
                retired: false,
            },
        );
        match self.rows.get_mut(&old_row) {
            Some(mut old) => {
                old.retired = true;
            }
            None => {
                self.rows.remove(&new_row);
                return Err(StoreError::RowNotFound(old_row));
            }
        }
        tracing::debug!(%old_row, %new_row, "replaced field container");
        Ok(new_row)
    }

    async fn delete(&self, row: RowId) -> Result<(), StoreError> {
        // Removing the row drops its field map, including nested list
        // values, which is the cascade for owned child structures here.
        match self.rows.remove(&row) {
            Some(_) => Ok(()),
            None => Err(StoreError::RowNotFound(row)),
        }
    }

    async fn retired_count(
        &self,
        release: ReleaseId,
        container: ContainerId,
    ) -> Result<usize, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| {
                let row = entry.value();
                row.retired
                    && row.container.release() == release
                    && row.container.container_id() == container
            })
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EditState;
    use csm_schema::{
        ContentId, FieldMap, FieldSchema, FieldType, FieldValue, SchemaContainer, SchemaKind,
        SchemaModel,
    };
    use std::sync::Arc;

    fn schema() -> SchemaContainer {
        let model = SchemaModel::new("article")
            .with_field(FieldSchema::new("title", FieldType::String).required());
        SchemaContainer::new("article", SchemaKind::Schema, model)
    }

    fn make_container(schema: &SchemaContainer, release: ReleaseId, title: &str) -> FieldContainer {
        let mut fields = FieldMap::new();
        fields.insert("title".into(), FieldValue::String(title.into()));
        FieldContainer::new(
            ContentId::new(),
            "en",
            EditState::Draft,
            release,
            Arc::clone(schema.head()),
            fields,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_enumerate_live() {
        let store = MemoryContainerStore::new();
        let schema = schema();
        let release = ReleaseId::new();

        store
            .insert(make_container(&schema, release, "one"))
            .await
            .unwrap();
        store
            .insert(make_container(&schema, release, "two"))
            .await
            .unwrap();
        // Different release stays invisible
        store
            .insert(make_container(&schema, ReleaseId::new(), "other"))
            .await
            .unwrap();

        let live = store.live_at(release, schema.id(), 1).await.unwrap();
        assert_eq!(live.len(), 2);
    }

    #[tokio::test]
    async fn replace_retires_old_and_keeps_it_for_audit() {
        let store = MemoryContainerStore::new();
        let schema = schema();
        let release = ReleaseId::new();

        let old = make_container(&schema, release, "one");
        let old_row = store.insert(old.clone()).await.unwrap();
        let new = old
            .replace_all_fields(old.fields().clone(), Arc::clone(schema.head()))
            .unwrap();
        let new_row = store.replace(old_row, new).await.unwrap();

        let live = store.live_at(release, schema.id(), 1).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].row(), new_row);

        // Old row still fetchable for audit
        assert!(store.get(old_row).await.unwrap().is_some());
        assert_eq!(store.retired_count(release, schema.id()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_unknown_row_fails() {
        let store = MemoryContainerStore::new();
        let schema = schema();
        let replacement = make_container(&schema, ReleaseId::new(), "x");

        let result = store.replace(RowId::new(), replacement).await;
        assert!(matches!(result, Err(StoreError::RowNotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_row_entirely() {
        let store = MemoryContainerStore::new();
        let schema = schema();
        let release = ReleaseId::new();

        let row = store
            .insert(make_container(&schema, release, "one"))
            .await
            .unwrap();
        store.delete(row).await.unwrap();

        assert!(store.get(row).await.unwrap().is_none());
        assert!(matches!(
            store.delete(row).await,
            Err(StoreError::RowNotFound(_))
        ));
    }
}

// src/board/mod.rs
//! JD board: records of one user, field-by-field edits, filters and the batch selection

pub mod filter;
pub mod import;
pub mod inline_edit;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use indexmap::IndexSet;

use crate::app_log;
use crate::types::{CreateJdRequest, FieldValue, JdField, JdRecord};

pub use filter::{JdFilters, SortOrder, StageFilter, TimeFilter};
pub use import::read_jd_csv;
pub use inline_edit::{CommitOutcome, EditError, EditKey, FieldKind, InlineEditField};

/// Remote store of JD records.
#[async_trait]
pub trait JdStore: Send + Sync {
    async fn list(&self, user_id: &str) -> Result<Vec<JdRecord>>;
    async fn stage_options(&self, user_id: &str) -> Result<Vec<String>>;
    async fn create(&self, request: &CreateJdRequest) -> Result<JdRecord>;
    async fn update_field(
        &self,
        id: &str,
        user_id: &str,
        field: JdField,
        value: &FieldValue,
    ) -> Result<JdRecord>;
    async fn delete(&self, id: &str, user_id: &str) -> Result<()>;
}

/// Ordered set of record ids picked for a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSelection {
    ids: IndexSet<String>,
}

impl BatchSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the id is selected after the toggle.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.shift_remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn select_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.ids.insert(id.to_string());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Ids in selection order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    fn retain_existing(&mut self, records: &[JdRecord]) {
        self.ids.retain(|id| records.iter().any(|record| record.id == *id));
    }
}

pub struct Board<S> {
    store: S,
    user_id: String,
    records: Vec<JdRecord>,
    stage_options: Vec<String>,
    pub filters: JdFilters,
    pub selection: BatchSelection,
}

impl<S: JdStore> Board<S> {
    pub fn new(store: S, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            records: Vec::new(),
            stage_options: Vec::new(),
            filters: JdFilters::default(),
            selection: BatchSelection::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn records(&self) -> &[JdRecord] {
        &self.records
    }

    pub fn stage_options(&self) -> &[String] {
        &self.stage_options
    }

    pub fn get(&self, id: &str) -> Option<&JdRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub async fn load(&mut self) -> Result<()> {
        self.records = self.store.list(&self.user_id).await?;
        self.selection.retain_existing(&self.records);
        app_log!(info, "Loaded {} JD records for {}", self.records.len(), self.user_id);
        Ok(())
    }

    pub async fn load_stage_options(&mut self) -> Result<&[String]> {
        self.stage_options = self.store.stage_options(&self.user_id).await?;
        Ok(&self.stage_options)
    }

    /// Create a record; it is prepended to the list.
    pub async fn create(&mut self, mut request: CreateJdRequest) -> Result<&JdRecord> {
        request.user_id = self.user_id.clone();
        request.validate()?;
        let record = self.store.create(&request).await?;
        app_log!(info, "Created JD {} ({} at {})", record.id, record.title, record.company);
        self.records.insert(0, record);
        Ok(&self.records[0])
    }

    /// Apply the change locally, then persist it; on failure the list is
    /// reloaded from the store and the error returned.
    pub async fn update_field(&mut self, id: &str, field: JdField, value: FieldValue) -> Result<()> {
        let Some(index) = self.records.iter().position(|record| record.id == id) else {
            anyhow::bail!("JD record not found: {}", id);
        };
        self.records[index].apply(field, &value);

        match self
            .store
            .update_field(id, &self.user_id, field, &value)
            .await
        {
            Ok(updated) => {
                if let Some(record) = self.records.iter_mut().find(|record| record.id == id) {
                    *record = updated;
                }
                Ok(())
            }
            Err(e) => {
                app_log!(warn, "Update of {} on {} failed, reloading: {}", field, id, e);
                if let Err(reload) = self.load().await {
                    app_log!(error, "Reload after failed update failed: {}", reload);
                }
                Err(e)
            }
        }
    }

    /// Delete remotely, then locally; a failed delete keeps the record.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.store.delete(id, &self.user_id).await?;
        self.records.retain(|record| record.id != id);
        self.selection.ids.shift_remove(id);
        app_log!(info, "Deleted JD {}", id);
        Ok(())
    }

    pub fn visible<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<&JdRecord> {
        self.filters.apply(&self.records, now)
    }

    pub fn select_all_visible<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        let ids: Vec<String> = self
            .visible(now)
            .into_iter()
            .map(|record| record.id.clone())
            .collect();
        self.selection.select_all(ids.iter().map(String::as_str));
    }

    /// Selected records in selection order.
    pub fn selected_records(&self) -> Vec<JdRecord> {
        self.selection
            .ids()
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }
}

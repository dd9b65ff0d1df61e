//! Collection store
//!
//! A deduplicating accumulator of [`PostRecord`]s keyed by post id. Records
//! seen again on later passes are merged into the stored copy; the number of
//! distinct ids only grows through insertions, which is what the scroll driver
//! watches to decide whether a step made progress.
//!
//! The driver thread and status readers share one store through
//! [`SharedStore`]. Mutation happens one record at a time, so a reader never
//! sees a half-applied pass as anything other than a smaller count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::types::PostRecord;

/// What happened to a record offered to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New id; the store grew by one
    Inserted,
    /// Known id; fields overwritten by the newer read
    Updated,
    /// Dropped by the owner filter or for lacking an id
    Rejected,
}

/// Whether `record` passes an owner filter.
///
/// Handles compare case-insensitively. An empty filter or an empty author
/// accepts the record.
pub fn filter_accepts(record: &PostRecord, owner_filter: Option<&str>) -> bool {
    match owner_filter {
        Some(owner) if !owner.is_empty() && !record.author_handle.is_empty() => {
            record.author_handle.eq_ignore_ascii_case(owner)
        }
        _ => true,
    }
}

/// Records collected in one session.
#[derive(Debug, Default)]
pub struct CollectionStore {
    records: HashMap<String, PostRecord>,
    owner_filter: Option<String>,
    last_mutation: Option<DateTime<Utc>>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict retained records to one author; `None` keeps everyone.
    pub fn set_owner_filter(&mut self, owner: Option<String>) {
        self.owner_filter = owner.filter(|o| !o.is_empty());
    }

    pub fn owner_filter(&self) -> Option<&str> {
        self.owner_filter.as_deref()
    }

    pub fn filter_accepts(&self, record: &PostRecord) -> bool {
        filter_accepts(record, self.owner_filter())
    }

    /// Insert or merge a record without consulting the owner filter.
    ///
    /// Returns `true` when the id was new.
    pub fn merge(&mut self, record: PostRecord) -> bool {
        match self.records.get_mut(&record.id) {
            Some(stored) => {
                stored.merge_from(record);
                false
            }
            None => {
                self.records.insert(record.id.clone(), record);
                self.last_mutation = Some(Utc::now());
                true
            }
        }
    }

    /// Filter, then merge.
    pub fn offer(&mut self, record: PostRecord) -> MergeOutcome {
        if record.id.is_empty() || !self.filter_accepts(&record) {
            return MergeOutcome::Rejected;
        }
        if self.merge(record) {
            MergeOutcome::Inserted
        } else {
            MergeOutcome::Updated
        }
    }

    /// Merge previously exported records, bypassing the owner filter.
    ///
    /// Returns how many ids were new.
    pub fn seed(&mut self, records: impl IntoIterator<Item = PostRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if !record.id.is_empty() && self.merge(record) {
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, id: &str) -> Option<&PostRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Time of the most recent insertion.
    pub fn last_mutation(&self) -> Option<DateTime<Utc>> {
        self.last_mutation
    }

    /// Drop every record. The owner filter is kept.
    pub fn clear(&mut self) {
        self.records.clear();
        self.last_mutation = None;
    }

    /// All records ordered by `created_at` as a string; empty timestamps first.
    ///
    /// Ties are broken by id so repeated exports are identical.
    pub fn export_view(&self) -> Vec<PostRecord> {
        let mut records: Vec<PostRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }
}

// ============================================
// Shared handle
// ============================================

/// A [`CollectionStore`] shared between the driver and status readers.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<CollectionStore>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the store. A panic on another holder does not poison the data
    /// for later readers; every mutation leaves the map consistent.
    pub fn lock(&self) -> MutexGuard<'_, CollectionStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn last_mutation(&self) -> Option<DateTime<Utc>> {
        self.lock().last_mutation()
    }

    pub fn export_view(&self) -> Vec<PostRecord> {
        self.lock().export_view()
    }
}

impl From<CollectionStore> for SharedStore {
    fn from(store: CollectionStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }
}

//! # Cache provider
//!
//! Keyed store of preview drafts. Each composite key owns two records: the
//! cache entry (snapshot, baseline render, structure key) and the pending
//! changes recorded since the last flush. Lookups on missing keys return
//! `None` or empty values; absence is the normal state while polling.

use super::backend::CacheBackend;
use crate::content::ContentMapper;
use crate::error::{CacheResult, PreviewError, PreviewResult};
use crate::key::PreviewKey;
use crate::snapshot::Snapshot;
use crate::structure::StructureProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

const ENTRY_PREFIX: &str = "entry";
const CHANGES_PREFIX: &str = "changes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub snapshot: Snapshot,

    /// Last render used as the diff baseline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,

    pub structure_key: String,

    /// Milliseconds since the epoch
    pub updated_at: i64,
}

/// Field path to the values recorded for it since the last flush
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingChanges {
    changes: BTreeMap<String, Vec<Value>>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: impl Into<String>, value: Value) {
        self.changes.entry(path.into()).or_default().push(value);
    }

    pub fn get(&self, path: &str) -> Option<&[Value]> {
        self.changes.get(path).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.changes
            .iter()
            .map(|(path, values)| (path.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

pub struct CacheProvider {
    backend: Arc<dyn CacheBackend>,
    content: Arc<dyn ContentMapper>,
    structures: Arc<dyn StructureProvider>,
    // read-modify-write of pending changes
    changes_lock: Mutex<()>,
}

impl CacheProvider {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        content: Arc<dyn ContentMapper>,
        structures: Arc<dyn StructureProvider>,
    ) -> Self {
        Self {
            backend,
            content,
            structures,
            changes_lock: Mutex::new(()),
        }
    }

    fn entry_id(key: &PreviewKey) -> String {
        format!("{}:{}", ENTRY_PREFIX, key.cache_id())
    }

    fn changes_id(key: &PreviewKey) -> String {
        format!("{}:{}", CHANGES_PREFIX, key.cache_id())
    }

    /// Load the document from the content mapper and store it as a fresh
    /// draft, replacing any previous entry and pending changes for the key.
    pub fn warm_up(&self, key: &PreviewKey) -> PreviewResult<Snapshot> {
        let document = self
            .content
            .load(&key.content_id, &key.webspace_key, &key.locale)
            .map_err(PreviewError::Content)?
            .ok_or_else(|| PreviewError::DocumentNotFound {
                content_id: key.content_id.clone(),
                webspace_key: key.webspace_key.clone(),
                locale: key.locale.clone(),
            })?;

        let structure = self
            .structures
            .structure(&document.structure_key)
            .ok_or_else(|| PreviewError::StructureNotFound(document.structure_key.clone()))?;

        let snapshot = Snapshot::from_document(&document, &structure)?;
        self.write_entry(
            key,
            &CacheEntry {
                structure_key: snapshot.structure_key.clone(),
                snapshot: snapshot.clone(),
                rendered: None,
                updated_at: now(),
            },
        )?;
        self.backend.remove(&Self::changes_id(key))?;

        tracing::debug!(
            user = %key.user_id,
            content = %key.content_id,
            webspace = %key.webspace_key,
            locale = %key.locale,
            "preview cache warmed up"
        );

        Ok(snapshot)
    }

    /// Overwrite the stored snapshot. Returns `None` when the key was never
    /// warmed up.
    pub fn save_structure(&self, snapshot: &Snapshot, key: &PreviewKey) -> CacheResult<Option<Snapshot>> {
        let Some(mut entry) = self.read_entry(key)? else {
            return Ok(None);
        };
        entry.snapshot = snapshot.clone();
        entry.structure_key = snapshot.structure_key.clone();
        entry.updated_at = now();
        self.write_entry(key, &entry)?;
        Ok(Some(entry.snapshot))
    }

    pub fn fetch_structure(&self, key: &PreviewKey) -> CacheResult<Option<Snapshot>> {
        Ok(self.read_entry(key)?.map(|entry| entry.snapshot))
    }

    pub fn contains(&self, key: &PreviewKey) -> CacheResult<bool> {
        self.backend.contains(&Self::entry_id(key))
    }

    pub fn fetch_entry(&self, key: &PreviewKey) -> CacheResult<Option<CacheEntry>> {
        self.read_entry(key)
    }

    /// Store the baseline render. Returns `false` when the key was never
    /// warmed up.
    pub fn save_render(&self, key: &PreviewKey, html: String) -> CacheResult<bool> {
        let Some(mut entry) = self.read_entry(key)? else {
            return Ok(false);
        };
        entry.rendered = Some(html);
        entry.updated_at = now();
        self.write_entry(key, &entry)?;
        Ok(true)
    }

    pub fn fetch_render(&self, key: &PreviewKey) -> CacheResult<Option<String>> {
        Ok(self.read_entry(key)?.and_then(|entry| entry.rendered))
    }

    /// Append each value to its path's history. Returns the whole record.
    pub fn save_changes<I>(&self, changes: I, key: &PreviewKey) -> CacheResult<PendingChanges>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let _guard = self.changes_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let id = Self::changes_id(key);
        let mut pending = self.read_changes(&id)?;
        for (path, value) in changes {
            pending.record(path, value);
        }
        self.backend.put(&id, serde_json::to_string(&pending)?)?;
        Ok(pending)
    }

    /// Current pending changes; `flush` clears them in the same step.
    pub fn fetch_changes(&self, key: &PreviewKey, flush: bool) -> CacheResult<PendingChanges> {
        let _guard = self.changes_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let id = Self::changes_id(key);
        let pending = self.read_changes(&id)?;
        if flush {
            self.backend.remove(&id)?;
        }
        Ok(pending)
    }

    /// Remove the entry and its pending changes. Returns whether an entry existed.
    pub fn delete(&self, key: &PreviewKey) -> CacheResult<bool> {
        let _guard = self.changes_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.backend.remove(&Self::changes_id(key))?;
        self.backend.remove(&Self::entry_id(key))
    }

    fn read_entry(&self, key: &PreviewKey) -> CacheResult<Option<CacheEntry>> {
        match self.backend.get(&Self::entry_id(key))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write_entry(&self, key: &PreviewKey, entry: &CacheEntry) -> CacheResult<()> {
        self.backend
            .put(&Self::entry_id(key), serde_json::to_string(entry)?)
    }

    fn read_changes(&self, id: &str) -> CacheResult<PendingChanges> {
        match self.backend.get(id)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(PendingChanges::new()),
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

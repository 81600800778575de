//! # Preview coordinator
//!
//! Drives a draft through its lifecycle per composite key:
//!
//! ```text
//! Absent --start--> Warm --update--> Dirty --changes--> Warm
//!                     \                 \
//!                      `------stop-------`--> Absent
//! ```
//!
//! All work on one key is serialized through a per-key lock. Snapshot writes
//! are committed before rendering, so a failing render never loses an edit.

use crate::cache::CacheProvider;
use crate::error::{PreviewError, PreviewResult};
use crate::key::PreviewKey;
use crate::path::FieldPath;
use crate::render::PreviewRenderer;
use crate::snapshot::Snapshot;
use crate::structure::{Structure, StructureProvider};
use crate::update::update_property;
use draftview_crawler::{diff, extract, FragmentDiff, FragmentMap, RemovedFieldPolicy, Vocabulary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewOptions {
    pub vocabulary: Vocabulary,

    pub removed_fields: RemovedFieldPolicy,

    /// Render without page chrome when computing diffs
    pub partial_diff: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::default(),
            removed_fields: RemovedFieldPolicy::Drop,
            partial_diff: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Absent,
    Warm,
    /// Warm with updates not yet flushed by a changes request
    Dirty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub snapshot: Snapshot,

    /// `false` when the key was already warm and nothing was reloaded
    pub warmed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub snapshot: Snapshot,

    /// Top-level fields touched by the update, in request order
    pub touched: Vec<String>,
}

/// Per-key async locks. Entries are pruned once no task holds or waits on them.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<PreviewKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    async fn lock(&self, key: &PreviewKey) -> KeyGuard<'_> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        KeyGuard {
            locks: self,
            key: key.clone(),
            _guard: lock.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Holds one key's lock; forgets the lock on drop unless another task holds
/// or waits on it.
struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: PreviewKey,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // the map and this guard
        if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 2) {
            locks.remove(&self.key);
        }
    }
}

pub struct Preview {
    cache: Arc<CacheProvider>,
    structures: Arc<dyn StructureProvider>,
    renderer: PreviewRenderer,
    options: PreviewOptions,
    locks: KeyLocks,
}

impl Preview {
    pub fn new(
        cache: Arc<CacheProvider>,
        structures: Arc<dyn StructureProvider>,
        renderer: PreviewRenderer,
        options: PreviewOptions,
    ) -> Self {
        Self {
            cache,
            structures,
            renderer,
            options,
            locks: KeyLocks::default(),
        }
    }

    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }

    pub fn cache(&self) -> &CacheProvider {
        &self.cache
    }

    /// Warm the draft for `key` and store the baseline render. Already warm
    /// keys are returned as they are.
    ///
    /// If the baseline render fails the draft stays warm without a baseline;
    /// the next changes request then reports every fragment.
    pub async fn start(&self, key: &PreviewKey, template_key: Option<&str>) -> PreviewResult<StartOutcome> {
        self.start_with(key, template_key, || ()).await.0
    }

    /// [`Preview::start`], then `bind` under the same key lock whenever the key
    /// is warm afterwards, even if the baseline render failed. `bind` must not
    /// block.
    pub async fn start_with<R>(
        &self,
        key: &PreviewKey,
        template_key: Option<&str>,
        bind: impl FnOnce() -> R,
    ) -> (PreviewResult<StartOutcome>, Option<R>) {
        let _guard = self.locks.lock(key).await;
        let started = self.warm(key, template_key);
        let bound = match self.cache.contains(key) {
            Ok(true) => Some(bind()),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache lookup failed after start");
                None
            }
        };
        (started, bound)
    }

    fn warm(&self, key: &PreviewKey, template_key: Option<&str>) -> PreviewResult<StartOutcome> {
        if let Some(snapshot) = self.cache.fetch_structure(key)? {
            tracing::debug!(key = %key, "preview already started");
            return Ok(StartOutcome {
                snapshot,
                warmed: false,
            });
        }

        let mut snapshot = self.cache.warm_up(key)?;
        if let Some(template_key) = template_key.filter(|t| *t != snapshot.structure_key) {
            let structure = self.structure(template_key)?;
            snapshot.change_structure(&structure);
            self.cache.save_structure(&snapshot, key)?;
        }

        let structure = self.structure(&snapshot.structure_key)?;
        let html = self.renderer.render(&snapshot, &structure, self.options.partial_diff)?;
        self.cache.save_render(key, html)?;

        tracing::info!(key = %key, structure = %snapshot.structure_key, "preview started");
        Ok(StartOutcome {
            snapshot,
            warmed: true,
        })
    }

    /// Apply a batch of field edits. Either every change applies or none do.
    pub async fn update<I>(
        &self,
        key: &PreviewKey,
        changes: I,
        template_key: Option<&str>,
    ) -> PreviewResult<UpdateOutcome>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let _guard = self.locks.lock(key).await;
        let mut snapshot = self.require(key)?;

        let mut structure = self.structure(&snapshot.structure_key)?;
        if let Some(template_key) = template_key.filter(|t| *t != snapshot.structure_key) {
            structure = self.structure(template_key)?;
            snapshot.change_structure(&structure);
        }

        let mut touched: Vec<String> = Vec::new();
        let mut recorded = Vec::new();
        for (raw_path, value) in changes {
            let path: FieldPath = raw_path.parse()?;
            let root = update_property(&mut snapshot, &structure, &path, value.clone())?;
            if !touched.contains(&root) {
                touched.push(root);
            }
            recorded.push((path.to_string(), value));
        }

        self.cache.save_structure(&snapshot, key)?;
        self.cache.save_changes(recorded, key)?;

        tracing::debug!(key = %key, fields = ?touched, "preview updated");
        Ok(UpdateOutcome { snapshot, touched })
    }

    /// Full render of the current draft
    pub async fn render(&self, key: &PreviewKey, partial: bool) -> PreviewResult<String> {
        let _guard = self.locks.lock(key).await;
        let snapshot = self.require(key)?;
        let structure = self.structure(&snapshot.structure_key)?;
        self.renderer.render(&snapshot, &structure, partial)
    }

    /// Re-render, diff against the stored baseline, then make the new render
    /// the baseline and flush pending changes.
    pub async fn get_changes(&self, key: &PreviewKey) -> PreviewResult<FragmentDiff> {
        let _guard = self.locks.lock(key).await;
        let snapshot = self.require(key)?;
        let structure = self.structure(&snapshot.structure_key)?;

        let html = self.renderer.render(&snapshot, &structure, self.options.partial_diff)?;
        let vocabulary = &self.options.vocabulary;
        let old = match self.cache.fetch_render(key)? {
            Some(previous) => extract(&previous, vocabulary)?,
            None => FragmentMap::new(),
        };
        let new = extract(&html, vocabulary)?;
        let changes = diff(&old, &new, self.options.removed_fields);

        self.cache.save_render(key, html)?;
        self.cache.fetch_changes(key, true)?;

        tracing::debug!(key = %key, changed = changes.len(), "preview changes computed");
        Ok(changes)
    }

    /// Evict the draft, its baseline and its pending changes.
    pub async fn stop(&self, key: &PreviewKey) -> PreviewResult<()> {
        self.stop_if(key, || true).await.map(|_| ())
    }

    /// Evict the draft if `decide` agrees. `decide` runs under the key lock,
    /// so no other command on the key lands between the decision and the
    /// eviction. Returns whether the draft was evicted.
    pub async fn stop_if(&self, key: &PreviewKey, decide: impl FnOnce() -> bool) -> PreviewResult<bool> {
        let _guard = self.locks.lock(key).await;
        if !self.cache.contains(key)? {
            return Err(PreviewError::State(key.to_string()));
        }
        if !decide() {
            tracing::debug!(key = %key, "preview kept");
            return Ok(false);
        }
        self.cache.delete(key)?;
        tracing::info!(key = %key, "preview stopped");
        Ok(true)
    }

    pub fn contains(&self, key: &PreviewKey) -> PreviewResult<bool> {
        Ok(self.cache.contains(key)?)
    }

    pub fn snapshot(&self, key: &PreviewKey) -> PreviewResult<Option<Snapshot>> {
        Ok(self.cache.fetch_structure(key)?)
    }

    pub fn state(&self, key: &PreviewKey) -> PreviewResult<SessionState> {
        if !self.cache.contains(key)? {
            return Ok(SessionState::Absent);
        }
        if self.cache.fetch_changes(key, false)?.is_empty() {
            Ok(SessionState::Warm)
        } else {
            Ok(SessionState::Dirty)
        }
    }

    fn require(&self, key: &PreviewKey) -> PreviewResult<Snapshot> {
        self.cache
            .fetch_structure(key)?
            .ok_or_else(|| PreviewError::State(key.to_string()))
    }

    fn structure(&self, key: &str) -> PreviewResult<Structure> {
        self.structures
            .structure(key)
            .ok_or_else(|| PreviewError::StructureNotFound(key.to_string()))
    }
}

use crate::collaborators::load_structures;
use draftview_engine::MemoryStructureProvider;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),

    #[error("Watch error: {0}")]
    WatchError(String),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    pub fn new(path: &Path, mode: RecursiveMode) -> WatcherResult<Self> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(path, mode)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Block until the next event. `None` once the watcher has shut down.
    pub fn next_event(&self) -> Option<Event> {
        loop {
            match self.receiver.recv() {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(e)) => tracing::warn!(error = %e, "watch error"),
                Err(_) => return None,
            }
        }
    }
}

/// Reload the structure file into `provider`. On failure the previous
/// definitions stay in place.
pub fn reload_structures(path: &Path, provider: &MemoryStructureProvider) -> bool {
    match load_structures(path) {
        Ok(structures) => {
            let count = structures.len();
            provider.replace(structures);
            tracing::info!(path = %path.display(), count, "structures reloaded");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "structure reload failed, keeping previous definitions");
            false
        }
    }
}

/// Watch the structure file and reload it on change.
///
/// The parent directory is watched, since editors often replace the file
/// instead of writing it in place.
pub fn watch_structures(
    path: PathBuf,
    provider: Arc<MemoryStructureProvider>,
) -> WatcherResult<tokio::task::JoinHandle<()>> {
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .ok_or_else(|| WatcherError::WatchError(format!("{} is not a file path", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let watcher = FileWatcher::new(&dir, RecursiveMode::NonRecursive)?;
    tracing::info!(path = %path.display(), "watching structure file");

    Ok(tokio::task::spawn_blocking(move || {
        while let Some(event) = watcher.next_event() {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                continue;
            }
            let ours = event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()));
            if ours {
                reload_structures(&path, &provider);
            }
        }
    }))
}

pub mod collaborators;
pub mod config;
pub mod watcher;
pub mod ws;

pub use collaborators::{load_structures, CollaboratorError, CollaboratorResult, JsonContentMapper};
pub use config::{ServerConfig, DEFAULT_CONFIG_NAME};
pub use watcher::{reload_structures, watch_structures, FileWatcher, WatcherError, WatcherResult};

use draftview_engine::{
    AnnotatedTemplateRenderer, CacheBackend, CacheProvider, FileBackend, MemoryBackend, MemoryStructureProvider,
    MessageHandler, Preview, PreviewOptions, PreviewRenderer,
};
use std::sync::Arc;

/// Everything the transport needs, wired from a config
pub struct Services {
    pub handler: Arc<MessageHandler>,
    pub structures: Arc<MemoryStructureProvider>,
}

pub fn build_services(config: &ServerConfig) -> anyhow::Result<Services> {
    let structures = Arc::new(MemoryStructureProvider::default());
    if config.structure_file.exists() {
        structures.replace(load_structures(&config.structure_file)?);
    } else {
        tracing::warn!(path = %config.structure_file.display(), "structure file not found, starting without structures");
    }

    let backend: Arc<dyn CacheBackend> = match &config.cache_dir {
        Some(dir) => Arc::new(FileBackend::new(dir)?),
        None => Arc::new(MemoryBackend::new()),
    };
    let content = Arc::new(JsonContentMapper::new(&config.content_dir));
    let cache = CacheProvider::new(backend, content, structures.clone());

    let options = PreviewOptions {
        removed_fields: config.removed_fields,
        ..PreviewOptions::default()
    };
    let renderer = PreviewRenderer::new(Arc::new(AnnotatedTemplateRenderer::new(options.vocabulary.clone())));
    let preview = Preview::new(Arc::new(cache), structures.clone(), renderer, options);

    Ok(Services {
        handler: Arc::new(MessageHandler::new(Arc::new(preview), config.channel_capacity)),
        structures,
    })
}

//! # Draftview Engine
//!
//! Live preview of unsaved document edits. A draft snapshot is cached per
//! user, document, webspace and locale; edits are applied to the snapshot,
//! the draft is re-rendered, and only the annotated fragments that changed
//! since the previous render are pushed to preview clients.
//!
//! The host application plugs in through three collaborators:
//! [`ContentMapper`] loads stored documents, [`StructureProvider`] describes
//! their fields, and [`RenderCollaborator`] turns a snapshot into HTML.

pub mod cache;
mod content;
mod error;
pub mod handler;
mod key;
pub mod message;
pub mod path;
pub mod preview;
pub mod render;
pub mod snapshot;
pub mod structure;
mod update;

pub use cache::{CacheBackend, CacheEntry, CacheProvider, FileBackend, MemoryBackend, PendingChanges};
pub use content::{ContentMapper, MemoryContentMapper};
pub use error::{BoxError, CacheError, CacheResult, PreviewError, PreviewResult};
pub use handler::{ConnectionId, MessageHandler};
pub use key::PreviewKey;
pub use message::{Command, InboundMessage, MessageError, OutboundMessage, Role, Status};
pub use path::{FieldPath, PathSegment};
pub use preview::{Preview, PreviewOptions, SessionState, StartOutcome, UpdateOutcome};
pub use render::{AnnotatedTemplateRenderer, PreviewRenderer, RenderCollaborator};
pub use snapshot::{BlockItem, Document, FieldValue, Fields, Snapshot};
pub use structure::{
    BlockType, FieldKind, MemoryStructureProvider, PropertyDescriptor, Structure, StructureProvider,
};
pub use update::update_property;

// Re-export the crawler types that appear in this crate's API
pub use draftview_crawler::{FragmentDiff, RemovedFieldPolicy, Vocabulary};

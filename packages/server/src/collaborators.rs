//! File-backed collaborators for running the server without a host
//! application: documents from a directory tree and structure definitions
//! from a single JSON file.

use draftview_engine::{BoxError, ContentMapper, Document, Structure};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid path component '{0}'")]
    InvalidComponent(String),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// On-disk document; the id is taken from the file name
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentFile {
    structure_key: String,

    #[serde(default)]
    fields: Map<String, Value>,
}

/// Reads `{root}/{webspace}/{locale}/{id}.json`
#[derive(Debug, Clone)]
pub struct JsonContentMapper {
    root: PathBuf,
}

impl JsonContentMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, content_id: &str, webspace_key: &str, locale: &str) -> CollaboratorResult<PathBuf> {
        Ok(self
            .root
            .join(component(webspace_key)?)
            .join(component(locale)?)
            .join(format!("{}.json", component(content_id)?)))
    }

    fn read(&self, content_id: &str, webspace_key: &str, locale: &str) -> CollaboratorResult<Option<Document>> {
        let path = self.document_path(content_id, webspace_key, locale)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CollaboratorError::Io { path, source }),
        };
        let file: DocumentFile =
            serde_json::from_str(&content).map_err(|source| CollaboratorError::Parse { path, source })?;

        Ok(Some(Document {
            id: content_id.to_string(),
            structure_key: file.structure_key,
            fields: file.fields,
        }))
    }
}

impl ContentMapper for JsonContentMapper {
    fn load(&self, content_id: &str, webspace_key: &str, locale: &str) -> Result<Option<Document>, BoxError> {
        Ok(self.read(content_id, webspace_key, locale)?)
    }
}

/// Key components end up in file names; only plain names are accepted.
fn component(value: &str) -> CollaboratorResult<&str> {
    let plain = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0']);
    if plain {
        Ok(value)
    } else {
        Err(CollaboratorError::InvalidComponent(value.to_string()))
    }
}

/// Load structure definitions from a JSON array of structures
pub fn load_structures(path: &Path) -> CollaboratorResult<Vec<Structure>> {
    let content = std::fs::read_to_string(path).map_err(|source| CollaboratorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CollaboratorError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

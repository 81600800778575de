use crate::error::BoxError;
use crate::snapshot::Document;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Loads stored documents. Returns `Ok(None)` when the id cannot be resolved.
pub trait ContentMapper: Send + Sync {
    fn load(
        &self,
        content_id: &str,
        webspace_key: &str,
        locale: &str,
    ) -> Result<Option<Document>, BoxError>;
}

type DocumentKey = (String, String, String);

/// Documents held in memory, keyed by id, webspace and locale
#[derive(Debug, Default)]
pub struct MemoryContentMapper {
    documents: RwLock<HashMap<DocumentKey, Document>>,
}

impl MemoryContentMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, webspace_key: impl Into<String>, locale: impl Into<String>, document: Document) {
        let key = (document.id.clone(), webspace_key.into(), locale.into());
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, document);
    }
}

impl ContentMapper for MemoryContentMapper {
    fn load(
        &self,
        content_id: &str,
        webspace_key: &str,
        locale: &str,
    ) -> Result<Option<Document>, BoxError> {
        let key = (
            content_id.to_string(),
            webspace_key.to_string(),
            locale.to_string(),
        );
        Ok(self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned())
    }
}

//! # Structure metadata
//!
//! Describes which fields a document template defines and how each field is
//! shaped. The update engine validates field paths against it, and the
//! default renderer lays out markup from it.
//!
//! ```json
//! {
//!   "key": "default",
//!   "properties": [
//!     { "name": "title", "kind": "scalar", "tag": "h1" },
//!     { "name": "tags", "kind": "multiValue" },
//!     { "name": "block", "kind": "block", "types": [
//!       { "name": "article", "properties": [ { "name": "title", "kind": "scalar" } ] }
//!     ] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub key: String,
    pub properties: Vec<PropertyDescriptor>,
}

impl Structure {
    pub fn new(key: impl Into<String>, properties: Vec<PropertyDescriptor>) -> Self {
        Self {
            key: key.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        find_property(&self.properties, name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,

    #[serde(flatten)]
    pub kind: FieldKind,

    /// Element used by the default renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Value is trusted markup and is rendered unescaped
    #[serde(default)]
    pub markup: bool,
}

impl PropertyDescriptor {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Scalar)
    }

    pub fn multi_value(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::MultiValue)
    }

    pub fn block(name: impl Into<String>, types: Vec<BlockType>) -> Self {
        Self::with_kind(name, FieldKind::Block { types })
    }

    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tag: None,
            markup: false,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_markup(mut self) -> Self {
        self.markup = true;
        self
    }
}

/// Shape of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    /// Single text, number or boolean value
    Scalar,

    /// List of scalar values
    MultiValue,

    /// List of typed items, each with its own fields
    Block { types: Vec<BlockType> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockType {
    pub name: String,
    pub properties: Vec<PropertyDescriptor>,
}

impl BlockType {
    pub fn new(name: impl Into<String>, properties: Vec<PropertyDescriptor>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        find_property(&self.properties, name)
    }
}

pub(crate) fn find_property<'a>(
    properties: &'a [PropertyDescriptor],
    name: &str,
) -> Option<&'a PropertyDescriptor> {
    properties.iter().find(|property| property.name == name)
}

/// Looks up structure definitions by template key.
pub trait StructureProvider: Send + Sync {
    fn structure(&self, key: &str) -> Option<Structure>;
}

/// Structure definitions held in memory. Definitions can be replaced at
/// runtime (e.g. when the definition file changes).
#[derive(Debug, Default)]
pub struct MemoryStructureProvider {
    structures: RwLock<HashMap<String, Structure>>,
}

impl MemoryStructureProvider {
    pub fn new(structures: impl IntoIterator<Item = Structure>) -> Self {
        let provider = Self::default();
        provider.replace(structures);
        provider
    }

    pub fn insert(&self, structure: Structure) {
        self.structures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(structure.key.clone(), structure);
    }

    pub fn replace(&self, structures: impl IntoIterator<Item = Structure>) {
        let map = structures
            .into_iter()
            .map(|structure| (structure.key.clone(), structure))
            .collect();
        *self
            .structures
            .write()
            .unwrap_or_else(PoisonError::into_inner) = map;
    }

    pub fn len(&self) -> usize {
        self.structures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StructureProvider for MemoryStructureProvider {
    fn structure(&self, key: &str) -> Option<Structure> {
        self.structures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

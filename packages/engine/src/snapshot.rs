//! # Document snapshot
//!
//! The in-memory draft of a content document used only for preview. Values
//! are shaped by the document's structure: scalars, lists of scalars, or
//! lists of typed block items with their own fields.

use crate::error::{PreviewError, PreviewResult};
use crate::structure::{BlockType, FieldKind, PropertyDescriptor, Structure};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type Fields = BTreeMap<String, FieldValue>;

/// Document as loaded from the content mapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,

    /// Template key of the document's structure
    pub structure_key: String,

    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Scalar(Value),
    List(Vec<Value>),
    Blocks(Vec<BlockItem>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockItem {
    #[serde(rename = "type")]
    pub block_type: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub structure_key: String,
    pub fields: Fields,
}

impl Snapshot {
    /// Build a snapshot from a loaded document. Document fields the structure
    /// does not define are skipped; missing ones start empty.
    pub fn from_document(document: &Document, structure: &Structure) -> PreviewResult<Self> {
        let mut fields = Fields::new();
        for property in &structure.properties {
            let value = match document.fields.get(&property.name) {
                Some(value) => FieldValue::from_json(&property.kind, value.clone(), &property.name)?,
                None => FieldValue::empty(&property.kind),
            };
            fields.insert(property.name.clone(), value);
        }

        for name in document.fields.keys() {
            if structure.property(name).is_none() {
                tracing::debug!(
                    document = %document.id,
                    field = %name,
                    structure = %structure.key,
                    "skipping field not defined by structure"
                );
            }
        }

        Ok(Self {
            structure_key: structure.key.clone(),
            fields,
        })
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Plain JSON view of the fields, as templates and clients see them
    pub fn to_json(&self) -> Value {
        fields_to_json(&self.fields)
    }

    /// Switch to another structure, keeping values the new structure can
    /// hold under the same name.
    pub fn change_structure(&mut self, structure: &Structure) {
        let previous = std::mem::take(&mut self.fields);
        self.fields = remap_fields(previous, &structure.properties);
        self.structure_key = structure.key.clone();
    }
}

fn remap_fields(mut previous: Fields, properties: &[PropertyDescriptor]) -> Fields {
    properties
        .iter()
        .map(|property| {
            let value = previous
                .remove(&property.name)
                .and_then(|old| {
                    FieldValue::from_json(&property.kind, old.to_json(), &property.name).ok()
                })
                .unwrap_or_else(|| FieldValue::empty(&property.kind));
            (property.name.clone(), value)
        })
        .collect()
}

pub(crate) fn fields_to_json(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}

impl FieldValue {
    pub fn empty(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Scalar => FieldValue::Scalar(Value::Null),
            FieldKind::MultiValue => FieldValue::List(Vec::new()),
            FieldKind::Block { .. } => FieldValue::Blocks(Vec::new()),
        }
    }

    /// Coerce a JSON value into the shape `kind` describes.
    pub fn from_json(kind: &FieldKind, value: Value, path: &str) -> PreviewResult<Self> {
        match kind {
            FieldKind::Scalar => Ok(FieldValue::Scalar(scalar(value, path)?)),
            FieldKind::MultiValue => match value {
                Value::Null => Ok(FieldValue::List(Vec::new())),
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| scalar(item, &format!("{},{}", path, i)))
                    .collect::<PreviewResult<Vec<_>>>()
                    .map(FieldValue::List),
                other => Ok(FieldValue::List(vec![scalar(other, path)?])),
            },
            FieldKind::Block { types } => match value {
                Value::Null => Ok(FieldValue::Blocks(Vec::new())),
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| BlockItem::from_json(types, item, &format!("{},{}", path, i)))
                    .collect::<PreviewResult<Vec<_>>>()
                    .map(FieldValue::Blocks),
                _ => Err(PreviewError::invalid_value(path, "expected a list of block items")),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Scalar(value) => value.clone(),
            FieldValue::List(items) => Value::Array(items.clone()),
            FieldValue::Blocks(items) => Value::Array(items.iter().map(BlockItem::to_json).collect()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_blocks(&self) -> Option<&[BlockItem]> {
        match self {
            FieldValue::Blocks(items) => Some(items),
            _ => None,
        }
    }
}

fn scalar(value: Value, path: &str) -> PreviewResult<Value> {
    match value {
        Value::Array(_) | Value::Object(_) => {
            Err(PreviewError::invalid_value(path, "expected a scalar value"))
        }
        scalar => Ok(scalar),
    }
}

impl BlockItem {
    /// Coerce a JSON object (`{"type": ..., field: value, ...}`) into an item.
    /// With a single block type, `type` may be omitted.
    pub fn from_json(types: &[BlockType], value: Value, path: &str) -> PreviewResult<Self> {
        let Value::Object(mut object) = value else {
            return Err(PreviewError::invalid_value(path, "expected a block item object"));
        };

        let block_type = match object.remove("type") {
            Some(Value::String(name)) => resolve_block_type(types, &name, path)?,
            Some(_) => return Err(PreviewError::invalid_value(path, "block type must be a string")),
            None if types.len() == 1 => &types[0],
            None => return Err(PreviewError::invalid_value(path, "block item has no type")),
        };

        Self::with_type(block_type, object, path)
    }

    fn with_type(block_type: &BlockType, mut object: Map<String, Value>, path: &str) -> PreviewResult<Self> {
        let mut fields = Fields::new();
        for property in &block_type.properties {
            let field_path = format!("{},{}", path, property.name);
            let value = match object.remove(&property.name) {
                Some(value) => FieldValue::from_json(&property.kind, value, &field_path)?,
                None => FieldValue::empty(&property.kind),
            };
            fields.insert(property.name.clone(), value);
        }

        Ok(Self {
            block_type: block_type.name.clone(),
            fields,
        })
    }

    /// Switch the item to another block type, keeping compatible values.
    pub fn change_type(&mut self, block_type: &BlockType) {
        let previous = std::mem::take(&mut self.fields);
        self.fields = remap_fields(previous, &block_type.properties);
        self.block_type = block_type.name.clone();
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::String(self.block_type.clone()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        Value::Object(object)
    }
}

pub(crate) fn resolve_block_type<'a>(
    types: &'a [BlockType],
    name: &str,
    path: &str,
) -> PreviewResult<&'a BlockType> {
    types
        .iter()
        .find(|block_type| block_type.name == name)
        .ok_or_else(|| PreviewError::invalid_value(path, format!("unknown block type '{}'", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{BlockType, PropertyDescriptor};
    use serde_json::json;

    fn structure() -> Structure {
        Structure::new(
            "overview",
            vec![
                PropertyDescriptor::scalar("title"),
                PropertyDescriptor::multi_value("tags"),
                PropertyDescriptor::block(
                    "block",
                    vec![
                        BlockType::new(
                            "type1",
                            vec![
                                PropertyDescriptor::scalar("title"),
                                PropertyDescriptor::multi_value("article"),
                            ],
                        ),
                        BlockType::new("type2", vec![PropertyDescriptor::scalar("name")]),
                    ],
                ),
            ],
        )
    }

    fn document(fields: Value) -> Document {
        Document {
            id: "123".to_string(),
            structure_key: "overview".to_string(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_from_document() {
        let doc = document(json!({
            "title": "Test1",
            "tags": "one",
            "block": [{"type": "type1", "title": "Block", "article": ["a", "b"]}],
            "unknown": true
        }));
        let snapshot = Snapshot::from_document(&doc, &structure()).unwrap();

        assert_eq!(snapshot.get("title").unwrap().as_str(), Some("Test1"));
        assert_eq!(snapshot.get("tags"), Some(&FieldValue::List(vec![json!("one")])));
        let blocks = snapshot.get("block").unwrap().as_blocks().unwrap();
        assert_eq!(blocks[0].block_type, "type1");
        assert_eq!(blocks[0].fields["article"], FieldValue::List(vec![json!("a"), json!("b")]));
        assert!(snapshot.get("unknown").is_none());
    }

    #[test]
    fn test_missing_fields_start_empty() {
        let snapshot = Snapshot::from_document(&document(json!({})), &structure()).unwrap();
        assert_eq!(snapshot.get("title"), Some(&FieldValue::Scalar(Value::Null)));
        assert_eq!(snapshot.get("block"), Some(&FieldValue::Blocks(vec![])));
    }

    #[test]
    fn test_unknown_block_type_is_rejected() {
        let doc = document(json!({"block": [{"type": "nope"}]}));
        let err = Snapshot::from_document(&doc, &structure()).unwrap_err();
        assert_eq!(err.code(), "invalid_value");
    }

    #[test]
    fn test_object_for_scalar_is_rejected() {
        let doc = document(json!({"title": {"a": 1}}));
        assert!(Snapshot::from_document(&doc, &structure()).is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_value_kinds() {
        let doc = document(json!({"title": "x", "tags": [], "block": []}));
        let snapshot = Snapshot::from_document(&doc, &structure()).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_change_structure_keeps_compatible_fields() {
        let doc = document(json!({"title": "Keep", "tags": ["x"]}));
        let mut snapshot = Snapshot::from_document(&doc, &structure()).unwrap();

        let other = Structure::new(
            "simple",
            vec![
                PropertyDescriptor::scalar("title"),
                PropertyDescriptor::scalar("tags"),
                PropertyDescriptor::scalar("subtitle"),
            ],
        );
        snapshot.change_structure(&other);

        assert_eq!(snapshot.structure_key, "simple");
        assert_eq!(snapshot.get("title").unwrap().as_str(), Some("Keep"));
        // a list cannot become a scalar
        assert_eq!(snapshot.get("tags"), Some(&FieldValue::Scalar(Value::Null)));
        assert_eq!(snapshot.get("subtitle"), Some(&FieldValue::Scalar(Value::Null)));
        assert!(snapshot.get("block").is_none());
    }

    #[test]
    fn test_to_json() {
        let doc = document(json!({"title": "T", "block": [{"type": "type2", "name": "n"}]}));
        let snapshot = Snapshot::from_document(&doc, &structure()).unwrap();
        assert_eq!(
            snapshot.to_json(),
            json!({"title": "T", "tags": [], "block": [{"type": "type2", "name": "n"}]})
        );
    }
}

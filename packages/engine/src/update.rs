//! # Update engine
//!
//! Applies a single field-path edit to a snapshot. The path is resolved
//! against both the structure (which names exist, which kind each has) and
//! the snapshot (which block items exist). Nothing is written until the path
//! and value are known to be valid, so a failed update leaves the snapshot
//! as it was.

use crate::error::{PreviewError, PreviewResult};
use crate::path::{FieldPath, PathSegment};
use crate::snapshot::{resolve_block_type, BlockItem, FieldValue, Fields, Snapshot};
use crate::structure::{find_property, FieldKind, PropertyDescriptor, Structure};
use serde_json::Value;

/// Set the value at `path`. Returns the top-level field that was touched.
pub fn update_property(
    snapshot: &mut Snapshot,
    structure: &Structure,
    path: &FieldPath,
    value: Value,
) -> PreviewResult<String> {
    set_in_fields(
        &mut snapshot.fields,
        &structure.properties,
        path.segments(),
        value,
        path,
    )?;
    Ok(path.root().to_string())
}

fn set_in_fields(
    fields: &mut Fields,
    properties: &[PropertyDescriptor],
    segments: &[PathSegment],
    value: Value,
    path: &FieldPath,
) -> PreviewResult<()> {
    let name = match segments.first() {
        Some(PathSegment::Name(name)) => name,
        Some(PathSegment::Index(index)) => {
            return Err(PreviewError::unknown_path(
                path,
                format!("expected a field name, found index {}", index),
            ))
        }
        None => return Err(PreviewError::unknown_path(path, "path ends early")),
    };

    let property = find_property(properties, name)
        .ok_or_else(|| PreviewError::unknown_path(path, format!("no field '{}'", name)))?;

    let rest = &segments[1..];
    if rest.is_empty() {
        let coerced = FieldValue::from_json(&property.kind, value, &path.to_string())?;
        fields.insert(name.clone(), coerced);
        return Ok(());
    }

    let index = match rest[0] {
        PathSegment::Index(index) => index,
        PathSegment::Name(ref sub) => {
            return Err(PreviewError::unknown_path(
                path,
                format!("'{}' has no sub-field '{}'", name, sub),
            ))
        }
    };

    match &property.kind {
        FieldKind::Scalar => Err(PreviewError::unknown_path(
            path,
            format!("'{}' is not a list", name),
        )),
        FieldKind::MultiValue => {
            if rest.len() > 1 {
                return Err(PreviewError::unknown_path(
                    path,
                    format!("items of '{}' have no sub-fields", name),
                ));
            }
            set_list_item(fields, name, index, value, path)
        }
        FieldKind::Block { types } => {
            let item = match fields.get_mut(name.as_str()) {
                Some(FieldValue::Blocks(items)) => items.get_mut(index),
                _ => None,
            };

            if rest.len() == 1 {
                // Replace or append a whole item.
                let new_item = BlockItem::from_json(types, value, &path.to_string())?;
                return match item {
                    Some(item) => {
                        *item = new_item;
                        Ok(())
                    }
                    None => append_block(fields, name, index, new_item, path),
                };
            }

            let item = item.ok_or_else(|| {
                PreviewError::unknown_path(path, format!("'{}' has no item {}", name, index))
            })?;

            if let [PathSegment::Name(sub)] = &rest[1..] {
                if sub == "type" {
                    let type_name = value.as_str().ok_or_else(|| {
                        PreviewError::invalid_value(path, "block type must be a string")
                    })?;
                    let block_type = resolve_block_type(types, type_name, &path.to_string())?;
                    item.change_type(block_type);
                    return Ok(());
                }
            }

            let block_type = resolve_block_type(types, &item.block_type, &path.to_string())?;
            set_in_fields(&mut item.fields, &block_type.properties, &rest[1..], value, path)
        }
    }
}

fn set_list_item(
    fields: &mut Fields,
    name: &str,
    index: usize,
    value: Value,
    path: &FieldPath,
) -> PreviewResult<()> {
    let scalar = match value {
        Value::Array(_) | Value::Object(_) => {
            return Err(PreviewError::invalid_value(path, "expected a scalar value"))
        }
        scalar => scalar,
    };

    let items = match fields.get_mut(name) {
        Some(FieldValue::List(items)) => items,
        _ => {
            if index != 0 {
                return Err(PreviewError::unknown_path(
                    path,
                    format!("'{}' has no item {}", name, index),
                ));
            }
            fields.insert(name.to_string(), FieldValue::List(vec![scalar]));
            return Ok(());
        }
    };

    if index < items.len() {
        items[index] = scalar;
    } else if index == items.len() {
        items.push(scalar);
    } else {
        return Err(PreviewError::unknown_path(
            path,
            format!("'{}' has {} items, cannot set item {}", name, items.len(), index),
        ));
    }
    Ok(())
}

fn append_block(
    fields: &mut Fields,
    name: &str,
    index: usize,
    item: BlockItem,
    path: &FieldPath,
) -> PreviewResult<()> {
    let entry = fields
        .entry(name.to_string())
        .or_insert_with(|| FieldValue::Blocks(Vec::new()));
    match entry {
        FieldValue::Blocks(items) if index == items.len() => {
            items.push(item);
            Ok(())
        }
        FieldValue::Blocks(items) => Err(PreviewError::unknown_path(
            path,
            format!("'{}' has {} items, cannot set item {}", name, items.len(), index),
        )),
        _ => Err(PreviewError::unknown_path(path, format!("'{}' is not a block list", name))),
    }
}

//! Annotated fragment extraction.
//!
//! Walks a parsed document depth-first and records the inner markup of every
//! element carrying the field attribute. Collection fields are split into
//! items addressed as `field,index`, and fields inside an item are recorded
//! under the item's path (`field,index,sub`).

use crate::dom::{parse_html, Node};
use crate::error::CrawlResult;
use crate::vocabulary::Vocabulary;
use serde::Serialize;
use std::collections::BTreeMap;

pub const PATH_SEPARATOR: char = ',';

/// Flat mapping of fragment path to the fragments found at that path, in
/// document order (a field may be rendered more than once).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FragmentMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl FragmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(path, fragments)| (path.as_str(), fragments.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, path: String, fragment: String) {
        self.entries.entry(path).or_default().push(fragment);
    }
}

/// Parse `html` and extract its annotated fragments.
pub fn extract(html: &str, vocabulary: &Vocabulary) -> CrawlResult<FragmentMap> {
    let document = parse_html(html)?;
    Ok(extract_document(&document, vocabulary))
}

/// Extract annotated fragments from an already parsed tree.
pub fn extract_document(document: &Node, vocabulary: &Vocabulary) -> FragmentMap {
    let mut map = FragmentMap::new();
    for child in document.children() {
        walk(child, "", vocabulary, &mut map);
    }
    map
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", prefix, PATH_SEPARATOR, segment)
    }
}

fn walk(node: &Node, prefix: &str, vocabulary: &Vocabulary, map: &mut FragmentMap) {
    if !node.is_element() {
        return;
    }

    let Some(field) = vocabulary.field_name(node) else {
        for child in node.children() {
            walk(child, prefix, vocabulary, map);
        }
        return;
    };

    let path = join(prefix, field);

    if vocabulary.is_collection(node) {
        for (index, item) in collection_items(node, field, vocabulary).into_iter().enumerate() {
            let item_path = join(&path, &index.to_string());
            map.push(item_path.clone(), item.inner_html().trim().to_string());
            for child in item.children() {
                walk(child, &item_path, vocabulary, map);
            }
        }
        return;
    }

    map.push(path, node.inner_html().trim().to_string());
    for child in node.children() {
        walk(child, prefix, vocabulary, map);
    }
}

/// Items of a collection element: descendants marked with the item attribute
/// for this field (not looking inside other fields or other items). Without
/// any marked item, the direct element children are the items.
fn collection_items<'a>(collection: &'a Node, field: &str, vocabulary: &Vocabulary) -> Vec<&'a Node> {
    let mut items = Vec::new();
    find_items(collection, field, vocabulary, &mut items);
    if items.is_empty() {
        items = collection
            .children()
            .iter()
            .filter(|child| child.is_element())
            .collect();
    }
    items
}

fn find_items<'a>(node: &'a Node, field: &str, vocabulary: &Vocabulary, items: &mut Vec<&'a Node>) {
    for child in node.children().iter().filter(|child| child.is_element()) {
        if vocabulary.is_item_of(child, field) {
            items.push(child);
        } else if vocabulary.field_name(child).is_none() {
            find_items(child, field, vocabulary, items);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(html: &str) -> FragmentMap {
        extract(html, &Vocabulary::default()).unwrap()
    }

    #[test]
    fn test_scalar_fields_in_document_order() {
        let map = fragments(
            r#"<h1 property="title">Test1</h1>
               <div property="article"><p>Lorem</p></div>
               <span property="title">PREF: Test1</span>"#,
        );
        assert_eq!(map.get("title").unwrap(), ["Test1", "PREF: Test1"]);
        assert_eq!(map.get("article").unwrap(), ["<p>Lorem</p>"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_collection_items_and_sub_fields() {
        let map = fragments(
            r#"<div property="block" typeof="collection">
                 <div rel="block" typeof="block"><h2 property="title">A</h2></div>
                 <div rel="block" typeof="block"><h2 property="title">B</h2><ul><li property="article">x</li></ul></div>
               </div>"#,
        );
        assert_eq!(map.get("block,0").unwrap(), [r#"<h2 property="title">A</h2>"#]);
        assert_eq!(map.get("block,0,title").unwrap(), ["A"]);
        assert_eq!(map.get("block,1,title").unwrap(), ["B"]);
        assert_eq!(map.get("block,1,article").unwrap(), ["x"]);
        assert!(map.get("block").is_none());
    }

    #[test]
    fn test_collection_without_item_markers_uses_children() {
        let map = fragments(
            r#"<ul property="tags" typeof="collection"><li>a</li><li>b</li></ul>"#,
        );
        assert_eq!(map.get("tags,0").unwrap(), ["a"]);
        assert_eq!(map.get("tags,1").unwrap(), ["b"]);
    }

    #[test]
    fn test_nested_collections() {
        let map = fragments(
            r#"<section property="outer" typeof="collection">
                 <div rel="outer">
                   <ol property="inner" typeof="collection"><li rel="inner"><b property="x">1</b></li></ol>
                 </div>
               </section>"#,
        );
        assert_eq!(map.get("outer,0,inner,0,x").unwrap(), ["1"]);
        assert!(map.get("outer,0,inner,0").is_some());
    }

    #[test]
    fn test_unannotated_markup_is_empty() {
        assert!(fragments("<p>nothing here</p>").is_empty());
    }
}

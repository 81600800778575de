use crate::extract::{FragmentMap, PATH_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to emit for a path rendered before but missing from the new render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovedFieldPolicy {
    /// Emit nothing for removed paths
    #[default]
    Drop,
    /// Emit the previous fragments for removed paths
    Tombstone,
}

/// Changed fragments between two renders: path to the new fragments in
/// document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentDiff {
    changes: BTreeMap<String, Vec<String>>,
}

impl FragmentDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.changes.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.changes.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.changes
            .iter()
            .map(|(path, fragments)| (path.as_str(), fragments.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.changes
    }
}

fn is_ancestor(ancestor: &str, path: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(PATH_SEPARATOR)
}

/// Diff two fragment maps.
///
/// A path is emitted when its fragments differ. A path whose ancestor is
/// emitted as well is left out, since the ancestor's fragment already carries
/// it (a changed block item reports `block,0`, not `block,0,title`).
pub fn diff(old: &FragmentMap, new: &FragmentMap, policy: RemovedFieldPolicy) -> FragmentDiff {
    let mut candidates: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (path, fragments) in new.iter() {
        if old.get(path) != Some(fragments) {
            candidates.insert(path.to_string(), fragments.to_vec());
        }
    }

    if policy == RemovedFieldPolicy::Tombstone {
        for (path, fragments) in old.iter() {
            if new.get(path).is_none() {
                candidates.insert(path.to_string(), fragments.to_vec());
            }
        }
    }

    let emitted: Vec<String> = candidates.keys().cloned().collect();
    candidates.retain(|path, _| !emitted.iter().any(|other| is_ancestor(other, path)));

    tracing::trace!(changed = candidates.len(), "fragment diff computed");

    FragmentDiff {
        changes: candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extract, Vocabulary};

    fn map(html: &str) -> FragmentMap {
        extract(html, &Vocabulary::default()).unwrap()
    }

    #[test]
    fn test_changed_field_reports_every_occurrence() {
        let old = map(r#"<h1 property="title">Test1</h1><p property="title">PREF: Test1</p>"#);
        let new = map(r#"<h1 property="title">New Title</h1><p property="title">PREF: New Title</p>"#);
        let diff = diff(&old, &new, RemovedFieldPolicy::Drop);
        assert_eq!(diff.get("title").unwrap(), ["New Title", "PREF: New Title"]);
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn test_identical_renders_yield_empty_diff() {
        let html = r#"<h1 property="title">Same</h1>"#;
        assert!(diff(&map(html), &map(html), RemovedFieldPolicy::Drop).is_empty());
    }

    #[test]
    fn test_new_field_emits_single_fragment() {
        let old = map(r#"<h1 property="title">T</h1>"#);
        let new = map(r#"<h1 property="title">T</h1><p property="subtitle">S</p>"#);
        let diff = diff(&old, &new, RemovedFieldPolicy::Drop);
        assert_eq!(diff.get("subtitle").unwrap(), ["S"]);
        assert!(!diff.contains("title"));
    }

    // Removed fields are only reported when the policy asks for tombstones.
    #[test]
    fn test_removed_field_policy() {
        let old = map(r#"<h1 property="title">T</h1><p property="subtitle">S</p>"#);
        let new = map(r#"<h1 property="title">T</h1>"#);
        assert!(diff(&old, &new, RemovedFieldPolicy::Drop).is_empty());
        let tombstones = diff(&old, &new, RemovedFieldPolicy::Tombstone);
        assert_eq!(tombstones.get("subtitle").unwrap(), ["S"]);
    }

    #[test]
    fn test_block_item_subsumes_its_fields() {
        let old = map(
            r#"<div property="block" typeof="collection"><div rel="block"><b property="title">a</b></div><div rel="block"><b property="title">b</b></div></div>"#,
        );
        let new = map(
            r#"<div property="block" typeof="collection"><div rel="block"><b property="title">z</b></div><div rel="block"><b property="title">b</b></div></div>"#,
        );
        let diff = diff(&old, &new, RemovedFieldPolicy::Drop);
        assert_eq!(diff.get("block,0").unwrap(), [r#"<b property="title">z</b>"#]);
        assert!(!diff.contains("block,0,title"));
        assert!(!diff.contains("block,1"));
    }

    #[test]
    fn test_ancestor_check_respects_segment_boundaries() {
        assert!(is_ancestor("block,1", "block,1,title"));
        assert!(!is_ancestor("block,1", "block,10"));
        assert!(!is_ancestor("block,1", "block,1"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let old = map(r#"<h1 property="title">a</h1>"#);
        let new = map(r#"<h1 property="title">b</h1>"#);
        let json = serde_json::to_value(diff(&old, &new, RemovedFieldPolicy::Drop)).unwrap();
        assert_eq!(json, serde_json::json!({"title": ["b"]}));
    }
}

/// Extraction and diffing over full rendered pages
use draftview_crawler::{diff, extract, RemovedFieldPolicy, Vocabulary};

fn page(title: &str, blocks: &[(&str, &[&str])]) -> String {
    let items: String = blocks
        .iter()
        .map(|(block_title, articles)| {
            let articles: String = articles
                .iter()
                .map(|a| format!(r#"<li property="article">{}</li>"#, a))
                .collect();
            format!(
                r#"<div rel="block" typeof="block"><h2 property="title">{}</h2><ul>{}</ul></div>"#,
                block_title, articles
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title><script>var x = "<div property='fake'>";</script></head>
<body>
  <h1 property="title">{title}</h1>
  <div property="block" typeof="collection">{items}</div>
  <footer><span property="title">PREF: {title}</span></footer>
</body>
</html>"#
    )
}

#[test]
fn test_script_contents_are_not_annotations() {
    let map = extract(&page("Test1", &[]), &Vocabulary::default()).unwrap();
    assert!(map.get("fake").is_none());
    assert_eq!(map.get("title").unwrap(), ["Test1", "PREF: Test1"]);
}

#[test]
fn test_block_title_change_only_touches_its_item() {
    let vocabulary = Vocabulary::default();
    let old = extract(
        &page("Test", &[("Block-Title-1", &["a", "b"]), ("Block-Title-2", &["c"])]),
        &vocabulary,
    )
    .unwrap();
    let new = extract(
        &page("Test", &[("New-Block-Title-1", &["a", "b"]), ("Block-Title-2", &["c"])]),
        &vocabulary,
    )
    .unwrap();

    let changes = diff(&old, &new, RemovedFieldPolicy::Drop);
    assert_eq!(changes.len(), 1);
    let item = &changes.get("block,0").unwrap()[0];
    assert!(item.contains("New-Block-Title-1"));
    assert!(item.contains(r#"<li property="article">a</li><li property="article">b</li>"#));
    assert!(!changes.contains("block,1"));
}

#[test]
fn test_added_block_item_is_reported() {
    let vocabulary = Vocabulary::default();
    let old = extract(&page("Test", &[("One", &[])]), &vocabulary).unwrap();
    let new = extract(&page("Test", &[("One", &[]), ("Two", &["x"])]), &vocabulary).unwrap();

    let changes = diff(&old, &new, RemovedFieldPolicy::Drop);
    assert_eq!(changes.len(), 1);
    assert!(changes.get("block,1").unwrap()[0].contains("Two"));
}

#[test]
fn test_removed_block_item_with_tombstones() {
    let vocabulary = Vocabulary::default();
    let old = extract(&page("Test", &[("One", &[]), ("Two", &[])]), &vocabulary).unwrap();
    let new = extract(&page("Test", &[("One", &[])]), &vocabulary).unwrap();

    assert!(diff(&old, &new, RemovedFieldPolicy::Drop).is_empty());

    let changes = diff(&old, &new, RemovedFieldPolicy::Tombstone);
    assert_eq!(changes.len(), 1);
    assert!(changes.get("block,1").unwrap()[0].contains("Two"));
}

#[test]
fn test_custom_vocabulary() {
    let vocabulary = Vocabulary {
        field_attribute: "data-field".to_string(),
        ..Vocabulary::default()
    };
    let map = extract(
        r#"<h1 data-field="title">x</h1><h1 property="title">y</h1>"#,
        &vocabulary,
    )
    .unwrap();
    assert_eq!(map.get("title").unwrap(), ["x"]);
}

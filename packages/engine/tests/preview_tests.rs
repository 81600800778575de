use draftview_engine::{
    AnnotatedTemplateRenderer, BlockType, BoxError, CacheProvider, Document, FieldValue, MemoryBackend,
    MemoryContentMapper, MemoryStructureProvider, Preview, PreviewKey, PreviewOptions, PreviewRenderer,
    PropertyDescriptor, RenderCollaborator, SessionState, Snapshot, Structure,
};
use serde_json::{json, Value};
use std::sync::Arc;

const CONTENT_ID: &str = "123-123-123";

fn structure() -> Structure {
    Structure::new(
        "overview",
        vec![
            PropertyDescriptor::scalar("title").with_tag("h1"),
            PropertyDescriptor::scalar("article").with_markup(),
            PropertyDescriptor::block(
                "block",
                vec![BlockType::new(
                    "type1",
                    vec![
                        PropertyDescriptor::scalar("title").with_tag("h2"),
                        PropertyDescriptor::multi_value("article"),
                    ],
                )],
            ),
        ],
    )
}

fn document() -> Document {
    let fields = json!({
        "title": "Test1",
        "article": "Lorem Ipsum dolorem apsum",
        "block": [
            {"type": "type1", "title": "Block-Title-1", "article": ["Block-Article-1-1", "Block-Article-1-2"]},
            {"type": "type1", "title": "Block-Title-2", "article": ["Block-Article-2-1"]}
        ]
    });
    Document {
        id: CONTENT_ID.to_string(),
        structure_key: "overview".to_string(),
        fields: fields.as_object().cloned().unwrap(),
    }
}

/// Page template carrying the title twice: the heading and a footer line
fn template(snapshot: &Snapshot, _: &Structure, partial: bool) -> Result<String, BoxError> {
    let title = snapshot.get("title").and_then(FieldValue::as_str).unwrap_or_default();
    if title == "boom" {
        return Err("template exploded".into());
    }
    let article = snapshot.get("article").and_then(FieldValue::as_str).unwrap_or_default();
    let body = format!(
        r#"<h1 property="title">{title}</h1>
<div property="article">{article}</div>
<footer><p property="title">PREF: {title}</p></footer>"#
    );
    if partial {
        return Ok(body);
    }
    Ok(format!(
        "<!DOCTYPE html><html><head><title>Preview</title><script>var x = '<b property=\"title\">';</script></head><body>{body}</body></html>"
    ))
}

fn preview_with(renderer: Arc<dyn RenderCollaborator>) -> Preview {
    let content = MemoryContentMapper::new();
    content.insert("sulu_io", "de", document());
    let structures = Arc::new(MemoryStructureProvider::new(vec![structure()]));
    let cache = CacheProvider::new(Arc::new(MemoryBackend::new()), Arc::new(content), structures.clone());
    Preview::new(
        Arc::new(cache),
        structures,
        PreviewRenderer::new(renderer),
        PreviewOptions::default(),
    )
}

fn preview() -> Preview {
    preview_with(Arc::new(template))
}

fn key() -> PreviewKey {
    PreviewKey::new("1", CONTENT_ID, "sulu_io", "de")
}

fn title(value: &str) -> Vec<(String, Value)> {
    vec![("title".to_string(), json!(value))]
}

#[tokio::test]
async fn test_end_to_end_title_change() {
    let preview = preview();

    preview.start(&key(), None).await.unwrap();
    assert!(preview.contains(&key()).unwrap());
    let snapshot = preview.snapshot(&key()).unwrap().unwrap();
    assert_eq!(snapshot.get("title").unwrap().as_str(), Some("Test1"));

    preview.update(&key(), title("New Title"), None).await.unwrap();

    let changes = preview.get_changes(&key()).await.unwrap();
    assert_eq!(
        serde_json::to_value(&changes).unwrap(),
        json!({"title": ["New Title", "PREF: New Title"]})
    );
    assert!(preview.get_changes(&key()).await.unwrap().is_empty());

    let html = preview.render(&key(), false).await.unwrap();
    assert_eq!(html.matches("New Title").count(), 2);
}

#[tokio::test]
async fn test_block_path_changes_only_its_item() {
    let preview = preview_with(Arc::new(AnnotatedTemplateRenderer::default()));
    preview.start(&key(), None).await.unwrap();

    let outcome = preview
        .update(
            &key(),
            vec![("block,0,title".to_string(), json!("New-Block-Title-1"))],
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.touched, ["block"]);

    let changes = preview.get_changes(&key()).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert!(!changes.contains("block,1"));
    assert!(!changes.contains("block,0,title"));

    let fragment = &changes.get("block,0").unwrap()[0];
    assert!(fragment.contains("New-Block-Title-1"));
    assert!(fragment.contains("<li>Block-Article-1-1</li><li>Block-Article-1-2</li>"));
}

#[tokio::test]
async fn test_sequential_updates() {
    let preview = preview();
    preview.start(&key(), None).await.unwrap();

    preview.update(&key(), title("a"), None).await.unwrap();
    preview.update(&key(), title("aaaa"), None).await.unwrap();

    let pending = preview.cache().fetch_changes(&key(), false).unwrap();
    assert_eq!(pending.get("title").unwrap(), [json!("a"), json!("aaaa")]);

    let changes = preview.get_changes(&key()).await.unwrap();
    assert_eq!(changes.get("title").unwrap().last().unwrap(), "PREF: aaaa");
    assert!(preview.get_changes(&key()).await.unwrap().is_empty());
    assert!(preview.cache().fetch_changes(&key(), false).unwrap().is_empty());
}

#[tokio::test]
async fn test_session_state_transitions() {
    let preview = preview();
    assert_eq!(preview.state(&key()).unwrap(), SessionState::Absent);

    let started = preview.start(&key(), None).await.unwrap();
    assert!(started.warmed);
    assert_eq!(preview.state(&key()).unwrap(), SessionState::Warm);

    preview.update(&key(), title("Draft"), None).await.unwrap();
    assert_eq!(preview.state(&key()).unwrap(), SessionState::Dirty);

    // a second start keeps the draft
    let restarted = preview.start(&key(), None).await.unwrap();
    assert!(!restarted.warmed);
    assert_eq!(restarted.snapshot.get("title").unwrap().as_str(), Some("Draft"));

    preview.get_changes(&key()).await.unwrap();
    assert_eq!(preview.state(&key()).unwrap(), SessionState::Warm);

    preview.stop(&key()).await.unwrap();
    assert_eq!(preview.state(&key()).unwrap(), SessionState::Absent);
    assert!(!preview.contains(&key()).unwrap());
}

#[tokio::test]
async fn test_commands_require_started_preview() {
    let preview = preview();
    assert_eq!(preview.render(&key(), false).await.unwrap_err().code(), "state");
    assert_eq!(preview.get_changes(&key()).await.unwrap_err().code(), "state");
    assert_eq!(
        preview.update(&key(), title("x"), None).await.unwrap_err().code(),
        "state"
    );
    assert_eq!(preview.stop(&key()).await.unwrap_err().code(), "state");
}

#[tokio::test]
async fn test_start_unknown_document() {
    let preview = preview();
    let missing = PreviewKey::new("1", "missing", "sulu_io", "de");
    let err = preview.start(&missing, None).await.unwrap_err();
    assert_eq!(err.code(), "document_not_found");
    assert!(!preview.contains(&missing).unwrap());
}

#[tokio::test]
async fn test_failed_render_keeps_the_edit() {
    let preview = preview();
    preview.start(&key(), None).await.unwrap();

    preview.update(&key(), title("boom"), None).await.unwrap();
    let err = preview.get_changes(&key()).await.unwrap_err();
    assert_eq!(err.code(), "render");

    let snapshot = preview.snapshot(&key()).unwrap().unwrap();
    assert_eq!(snapshot.get("title").unwrap().as_str(), Some("boom"));

    preview.update(&key(), title("Recovered"), None).await.unwrap();
    let changes = preview.get_changes(&key()).await.unwrap();
    assert_eq!(changes.get("title").unwrap(), ["Recovered", "PREF: Recovered"]);
}

#[tokio::test]
async fn test_invalid_batch_is_not_applied() {
    let preview = preview();
    preview.start(&key(), None).await.unwrap();

    let err = preview
        .update(
            &key(),
            vec![
                ("title".to_string(), json!("Partial")),
                ("missing".to_string(), json!("x")),
            ],
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unknown_field_path");

    let snapshot = preview.snapshot(&key()).unwrap().unwrap();
    assert_eq!(snapshot.get("title").unwrap().as_str(), Some("Test1"));
    assert_eq!(preview.state(&key()).unwrap(), SessionState::Warm);
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let preview = preview();
    let other = PreviewKey::new("2", CONTENT_ID, "sulu_io", "de");
    preview.start(&key(), None).await.unwrap();
    preview.start(&other, None).await.unwrap();

    preview.update(&key(), title("Mine"), None).await.unwrap();

    let theirs = preview.snapshot(&other).unwrap().unwrap();
    assert_eq!(theirs.get("title").unwrap().as_str(), Some("Test1"));
    assert!(preview.get_changes(&other).await.unwrap().is_empty());

    preview.stop(&key()).await.unwrap();
    assert!(preview.contains(&other).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_serialized() {
    let preview = Arc::new(preview());
    preview.start(&key(), None).await.unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let preview = preview.clone();
            tokio::spawn(async move {
                preview
                    .update(&key(), title(&format!("title-{}", i)), None)
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let pending = preview.cache().fetch_changes(&key(), false).unwrap();
    assert_eq!(pending.get("title").unwrap().len(), 20);
}

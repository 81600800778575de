//! # Renderer
//!
//! Turns a snapshot into HTML through the host application's render
//! collaborator. `partial` asks for the document body only, without the
//! surrounding page.

use crate::error::{BoxError, PreviewError, PreviewResult};
use crate::snapshot::{BlockItem, FieldValue, Fields, Snapshot};
use crate::structure::{FieldKind, PropertyDescriptor, Structure};
use draftview_crawler::Vocabulary;
use serde_json::Value;
use std::sync::Arc;

pub trait RenderCollaborator: Send + Sync {
    fn render(&self, snapshot: &Snapshot, structure: &Structure, partial: bool) -> Result<String, BoxError>;
}

impl<F> RenderCollaborator for F
where
    F: Fn(&Snapshot, &Structure, bool) -> Result<String, BoxError> + Send + Sync,
{
    fn render(&self, snapshot: &Snapshot, structure: &Structure, partial: bool) -> Result<String, BoxError> {
        self(snapshot, structure, partial)
    }
}

#[derive(Clone)]
pub struct PreviewRenderer {
    collaborator: Arc<dyn RenderCollaborator>,
}

impl PreviewRenderer {
    pub fn new(collaborator: Arc<dyn RenderCollaborator>) -> Self {
        Self { collaborator }
    }

    pub fn render(&self, snapshot: &Snapshot, structure: &Structure, partial: bool) -> PreviewResult<String> {
        self.collaborator
            .render(snapshot, structure, partial)
            .map_err(|e| {
                tracing::warn!(structure = %structure.key, error = %e, "render failed");
                PreviewError::Render(e)
            })
    }
}

/// Renders any snapshot straight from its structure, writing the annotation
/// vocabulary onto every field so the crawler can find it again.
#[derive(Debug, Clone, Default)]
pub struct AnnotatedTemplateRenderer {
    vocabulary: Vocabulary,
}

impl AnnotatedTemplateRenderer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    fn write_fields(&self, fields: &Fields, properties: &[PropertyDescriptor], out: &mut String) {
        for property in properties {
            if let Some(value) = fields.get(&property.name) {
                self.write_property(property, value, out);
            }
        }
    }

    fn write_property(&self, property: &PropertyDescriptor, value: &FieldValue, out: &mut String) {
        let v = &self.vocabulary;
        match (&property.kind, value) {
            (FieldKind::Block { types }, FieldValue::Blocks(items)) => {
                let tag = property.tag.as_deref().unwrap_or("div");
                out.push_str(&format!(
                    "<{tag} {}=\"{}\" {}=\"{}\">",
                    v.field_attribute,
                    escape(&property.name),
                    v.type_attribute,
                    v.collection_type
                ));
                for item in items {
                    self.write_item(property, types, item, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
            (_, FieldValue::List(items)) => {
                let tag = property.tag.as_deref().unwrap_or("ul");
                out.push_str(&format!(
                    "<{tag} {}=\"{}\">",
                    v.field_attribute,
                    escape(&property.name)
                ));
                for item in items {
                    out.push_str("<li>");
                    out.push_str(&scalar_text(item, property.markup));
                    out.push_str("</li>");
                }
                out.push_str(&format!("</{tag}>"));
            }
            (_, value) => {
                let tag = property.tag.as_deref().unwrap_or("div");
                let text = match value {
                    FieldValue::Scalar(scalar) => scalar_text(scalar, property.markup),
                    other => escape(&other.to_json().to_string()),
                };
                out.push_str(&format!(
                    "<{tag} {}=\"{}\">{}</{tag}>",
                    v.field_attribute,
                    escape(&property.name),
                    text
                ));
            }
        }
    }

    fn write_item(
        &self,
        property: &PropertyDescriptor,
        types: &[crate::structure::BlockType],
        item: &BlockItem,
        out: &mut String,
    ) {
        let v = &self.vocabulary;
        out.push_str(&format!(
            "<div {}=\"{}\" {}=\"{}\" data-type=\"{}\">",
            v.item_attribute,
            escape(&property.name),
            v.type_attribute,
            v.item_type,
            escape(&item.block_type)
        ));
        if let Some(block_type) = types.iter().find(|t| t.name == item.block_type) {
            self.write_fields(&item.fields, &block_type.properties, out);
        }
        out.push_str("</div>");
    }
}

impl RenderCollaborator for AnnotatedTemplateRenderer {
    fn render(&self, snapshot: &Snapshot, structure: &Structure, partial: bool) -> Result<String, BoxError> {
        let mut body = String::new();
        self.write_fields(&snapshot.fields, &structure.properties, &mut body);

        if partial {
            return Ok(body);
        }

        let title = snapshot
            .get("title")
            .and_then(FieldValue::as_str)
            .unwrap_or(&structure.key);
        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
            escape(title),
            body
        ))
    }
}

fn scalar_text(value: &Value, markup: bool) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) if markup => s.clone(),
        Value::String(s) => escape(s),
        other => escape(&other.to_string()),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Document;
    use crate::structure::BlockType;
    use draftview_crawler::extract;
    use serde_json::json;

    fn structure() -> Structure {
        Structure::new(
            "overview",
            vec![
                PropertyDescriptor::scalar("title").with_tag("h1"),
                PropertyDescriptor::scalar("article").with_markup(),
                PropertyDescriptor::multi_value("tags"),
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

    fn snapshot() -> Snapshot {
        let document = Document {
            id: "1".to_string(),
            structure_key: "overview".to_string(),
            fields: json!({
                "title": "A & B",
                "article": "<p>Lorem</p>",
                "tags": ["x"],
                "block": [{"type": "type1", "title": "Block", "article": ["a", "b"]}]
            })
            .as_object()
            .cloned()
            .unwrap(),
        };
        Snapshot::from_document(&document, &structure()).unwrap()
    }

    #[test]
    fn test_partial_render_has_no_page_chrome() {
        let html = AnnotatedTemplateRenderer::default()
            .render(&snapshot(), &structure(), true)
            .unwrap();
        assert!(html.starts_with(r#"<h1 property="title">A &amp; B</h1>"#));
        assert!(!html.contains("<body>"));
    }

    #[test]
    fn test_full_render_is_crawlable() {
        let html = AnnotatedTemplateRenderer::default()
            .render(&snapshot(), &structure(), false)
            .unwrap();
        assert!(html.contains("<title>A &amp; B</title>"));

        let map = extract(&html, &Vocabulary::default()).unwrap();
        assert_eq!(map.get("title").unwrap(), ["A &amp; B"]);
        assert_eq!(map.get("article").unwrap(), ["<p>Lorem</p>"]);
        assert_eq!(map.get("tags").unwrap(), ["<li>x</li>"]);
        assert_eq!(map.get("block,0,title").unwrap(), ["Block"]);
        assert_eq!(map.get("block,0,article").unwrap(), ["<li>a</li><li>b</li>"]);
    }

    #[test]
    fn test_collaborator_failure_is_wrapped() {
        let failing = |_: &Snapshot, _: &Structure, _: bool| -> Result<String, BoxError> {
            Err("template missing".into())
        };
        let renderer = PreviewRenderer::new(Arc::new(failing));
        let err = renderer.render(&snapshot(), &structure(), false).unwrap_err();
        assert_eq!(err.code(), "render");
        assert!(err.to_string().contains("template missing"));
    }
}

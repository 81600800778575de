use crate::error::{CrawlError, CrawlResult};
use crate::tokenizer::{is_raw_text_element, is_void_element, tokenize, Token};

/// Deepest element nesting accepted by `parse_html`.
pub const MAX_DEPTH: usize = 512;

/// Parsed HTML node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Document {
        doctype: Option<String>,
        children: Vec<Node>,
    },
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    },
    Text(String),
    Comment(String),
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children, .. } | Node::Element { children, .. } => children,
            Node::Text(_) | Node::Comment(_) => &[],
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            Node::Element { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element { .. })
    }

    /// Serialized markup of the node's children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        let raw = self.name().map(is_raw_text_element).unwrap_or(false);
        for child in self.children() {
            write_node(child, raw, &mut out);
        }
        out
    }

    /// Serialized markup of the node itself.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_node(self, false, &mut out);
        out
    }

    /// Concatenated text content of the subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Comment(_) => {}
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Document { doctype, children } => {
            if let Some(doctype) = doctype {
                out.push_str("<!DOCTYPE ");
                out.push_str(doctype);
                out.push('>');
            }
            for child in children {
                write_node(child, false, out);
            }
        }
        Node::Element {
            name,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(name);
            for (key, value) in attributes {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if is_void_element(name) {
                return;
            }
            let raw = is_raw_text_element(name);
            for child in children {
                write_node(child, raw, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

struct OpenElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl OpenElement {
    fn into_node(self) -> Node {
        Node::Element {
            name: self.name,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Parse markup into a `Node::Document`.
///
/// Unmatched end tags are ignored; elements still open at the end of input are
/// closed implicitly.
pub fn parse_html(input: &str) -> CrawlResult<Node> {
    let mut doctype = None;
    let mut root: Vec<Node> = Vec::new();
    let mut open: Vec<OpenElement> = Vec::new();

    for token in tokenize(input) {
        match token {
            Token::Doctype(value) => doctype = Some(value),
            Token::Comment(text) => append(&mut open, &mut root, Node::Comment(text)),
            Token::Text(text) => append(&mut open, &mut root, Node::Text(text)),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                if self_closing || is_void_element(&name) {
                    append(
                        &mut open,
                        &mut root,
                        Node::Element {
                            name,
                            attributes,
                            children: Vec::new(),
                        },
                    );
                } else {
                    if open.len() >= MAX_DEPTH {
                        return Err(CrawlError::NestingTooDeep { limit: MAX_DEPTH });
                    }
                    open.push(OpenElement {
                        name,
                        attributes,
                        children: Vec::new(),
                    });
                }
            }
            Token::EndTag(name) => {
                if !open.iter().any(|element| element.name == name) {
                    continue;
                }
                while let Some(element) = open.pop() {
                    let matched = element.name == name;
                    let node = element.into_node();
                    append(&mut open, &mut root, node);
                    if matched {
                        break;
                    }
                }
            }
        }
    }

    while let Some(element) = open.pop() {
        let node = element.into_node();
        append(&mut open, &mut root, node);
    }

    Ok(Node::Document {
        doctype,
        children: root,
    })
}

fn append(open: &mut [OpenElement], root: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => root.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let doc = parse_html(r#"<div id="a"><p>one<b>two</b></p><br></div>"#).unwrap();
        let div = &doc.children()[0];
        assert_eq!(div.name(), Some("div"));
        assert_eq!(div.attr("id"), Some("a"));
        assert_eq!(div.children().len(), 2);
        assert_eq!(div.inner_html(), "<p>one<b>two</b></p><br>");
        assert_eq!(div.text_content(), "onetwo");
    }

    #[test]
    fn test_unclosed_elements_close_at_end() {
        let doc = parse_html("<ul><li>a<li>b").unwrap();
        assert_eq!(doc.outer_html(), "<ul><li>a<li>b</li></li></ul>");
    }

    #[test]
    fn test_stray_end_tag_is_ignored() {
        let doc = parse_html("<p>x</span>y</p>").unwrap();
        assert_eq!(doc.children()[0].inner_html(), "xy");
    }

    #[test]
    fn test_serialization_escapes_text_and_attributes() {
        let doc = parse_html(r#"<a title="&quot;q&quot;">1 &lt; 2 &amp; 3</a>"#).unwrap();
        assert_eq!(
            doc.outer_html(),
            r#"<a title="&quot;q&quot;">1 &lt; 2 &amp; 3</a>"#
        );
    }

    #[test]
    fn test_depth_limit() {
        let html = "<div>".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            parse_html(&html),
            Err(CrawlError::NestingTooDeep { .. })
        ));
    }
}

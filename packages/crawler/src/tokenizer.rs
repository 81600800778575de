//! Small HTML tokenizer for server-rendered preview markup.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]` and are lowercased.
//! `script` and `style` bodies are raw text. Known limitations:
//! - No HTML5 parse-error recovery beyond skipping stray `<`.
//! - Only the common named entities are decoded (see `decode_entities`).

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag(String),
    Text(String),
    Comment(String),
}

pub fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

pub fn is_raw_text_element(name: &str) -> bool {
    matches!(name, "script" | "style")
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'-')
}

fn starts_with_ignore_ascii_case(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

/// Find `</name` followed by optional whitespace and `>`, case-insensitively.
fn find_raw_text_end(input: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let bytes = input.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        let rel = input[i..].find("</")?;
        i += rel;
        let name_start = i + 2;
        if starts_with_ignore_ascii_case(bytes, name_start, name.as_bytes()) {
            let mut k = name_start + name.len();
            while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < bytes.len() && bytes[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 2;
    }
    None
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    // Slices are only cut at ASCII structural bytes, so they stay on char boundaries.
    while i < bytes.len() {
        if bytes[i] != b'<' {
            let start = i;
            while i < bytes.len() && bytes[i] != b'<' {
                i += 1;
            }
            push_text(&mut out, decode_entities(&input[start..i]));
            continue;
        }

        if input[i..].starts_with(COMMENT_START) {
            let body_start = i + COMMENT_START.len();
            match input[body_start..].find(COMMENT_END) {
                Some(end) => {
                    out.push(Token::Comment(input[body_start..body_start + end].to_string()));
                    i = body_start + end + COMMENT_END.len();
                }
                None => {
                    out.push(Token::Comment(input[body_start..].to_string()));
                    i = bytes.len();
                }
            }
            continue;
        }

        if starts_with_ignore_ascii_case(bytes, i, b"<!doctype") {
            let end = input[i..].find('>').map(|e| i + e).unwrap_or(bytes.len());
            out.push(Token::Doctype(input[i + 9..end].trim().to_string()));
            i = (end + 1).min(bytes.len());
            continue;
        }

        if i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            let name_start = i + 2;
            let mut j = name_start;
            while j < bytes.len() && is_name_byte(bytes[j]) {
                j += 1;
            }
            if j == name_start {
                // `</` not followed by a name is plain text.
                push_text(&mut out, "</".to_string());
                i += 2;
                continue;
            }
            let name = input[name_start..j].to_ascii_lowercase();
            let end = input[j..].find('>').map(|e| j + e + 1).unwrap_or(bytes.len());
            out.push(Token::EndTag(name));
            i = end;
            continue;
        }

        let name_start = i + 1;
        let mut j = name_start;
        while j < bytes.len() && is_name_byte(bytes[j]) {
            j += 1;
        }
        if j == name_start {
            push_text(&mut out, "<".to_string());
            i += 1;
            continue;
        }
        let name = input[name_start..j].to_ascii_lowercase();
        let (attributes, self_closing, next) = read_attributes(input, j);
        i = next;

        let raw_text = is_raw_text_element(&name) && !self_closing;
        out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });

        if raw_text {
            match find_raw_text_end(input, i, &name) {
                Some((body_end, close_end)) => {
                    if body_end > i {
                        out.push(Token::Text(input[i..body_end].to_string()));
                    }
                    out.push(Token::EndTag(name));
                    i = close_end;
                }
                None => {
                    if i < bytes.len() {
                        out.push(Token::Text(input[i..].to_string()));
                    }
                    i = bytes.len();
                }
            }
        }
    }

    out
}

fn push_text(out: &mut Vec<Token>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Text(previous)) = out.last_mut() {
        previous.push_str(&text);
    } else {
        out.push(Token::Text(text));
    }
}

/// Reads attributes starting right after the tag name. Returns the attributes,
/// whether the tag was self-closing and the offset after `>`.
fn read_attributes(input: &str, mut i: usize) -> (Vec<(String, String)>, bool, usize) {
    let bytes = input.as_bytes();
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return (attributes, self_closing, i);
        }
        match bytes[i] {
            b'>' => return (attributes, self_closing, i + 1),
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let name_start = i;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            // Skip a byte we cannot make sense of.
            i += 1;
            continue;
        }
        let name = input[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i] as char;
                let value_start = i + 1;
                let value_end = input[value_start..]
                    .find(quote)
                    .map(|e| value_start + e)
                    .unwrap_or(bytes.len());
                value = decode_entities(&input[value_start..value_end]);
                i = (value_end + 1).min(bytes.len());
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = decode_entities(&input[value_start..i]);
            }
        }

        // First occurrence wins, as in browsers.
        if !attributes.iter().any(|(existing, _)| existing == &name) {
            attributes.push((name, value));
        }
    }
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

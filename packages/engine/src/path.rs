use crate::error::PreviewError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Name(String),
    Index(usize),
}

/// Address of a value in a snapshot, e.g. `block,0,article,1`.
///
/// Segments may be separated by `,` or `.`. Numeric segments address list
/// positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Top-level field the path points into
    pub fn root(&self) -> &str {
        match &self.segments[0] {
            PathSegment::Name(name) => name,
            // parsing guarantees a name first
            PathSegment::Index(_) => "",
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for FieldPath {
    type Err = PreviewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        for part in raw.split([',', '.']) {
            let part = part.trim();
            if part.is_empty() {
                return Err(PreviewError::unknown_path(raw, "empty path segment"));
            }
            let segment = if part.bytes().all(|b| b.is_ascii_digit()) {
                let index = part
                    .parse()
                    .map_err(|_| PreviewError::unknown_path(raw, "index out of range"))?;
                PathSegment::Index(index)
            } else {
                PathSegment::Name(part.to_string())
            };
            segments.push(segment);
        }

        if !matches!(segments.first(), Some(PathSegment::Name(_))) {
            return Err(PreviewError::unknown_path(raw, "path must start with a field name"));
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match segment {
                PathSegment::Name(name) => write!(f, "{}", name)?,
                PathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

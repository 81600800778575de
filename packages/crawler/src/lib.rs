//! # Draftview Crawler
//!
//! Finds the annotated regions of rendered preview markup and diffs them
//! between two renders, so a preview client can patch changed fragments
//! instead of reloading.
//!
//! ```rust
//! use draftview_crawler::{diff, extract, RemovedFieldPolicy, Vocabulary};
//!
//! let vocabulary = Vocabulary::default();
//! let old = extract(r#"<h1 property="title">Test1</h1>"#, &vocabulary).unwrap();
//! let new = extract(r#"<h1 property="title">New Title</h1>"#, &vocabulary).unwrap();
//!
//! let changes = diff(&old, &new, RemovedFieldPolicy::Drop);
//! assert_eq!(changes.get("title").unwrap(), ["New Title"]);
//! ```

pub mod diff;
pub mod dom;
mod error;
pub mod extract;
pub mod tokenizer;
mod vocabulary;

pub use diff::{diff, FragmentDiff, RemovedFieldPolicy};
pub use dom::{parse_html, Node};
pub use error::{CrawlError, CrawlResult};
pub use extract::{extract, extract_document, FragmentMap, PATH_SEPARATOR};
pub use vocabulary::Vocabulary;

//! Error types for the crawler

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("Markup nests deeper than {limit} elements")]
    NestingTooDeep { limit: usize },
}

pub type CrawlResult<T> = Result<T, CrawlError>;

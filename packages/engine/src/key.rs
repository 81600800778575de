use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of isolation for drafts and messaging: every user gets an
/// independent draft per content, webspace and locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewKey {
    pub user_id: String,
    pub content_id: String,
    pub webspace_key: String,
    pub locale: String,
}

impl PreviewKey {
    pub fn new(
        user_id: impl Into<String>,
        content_id: impl Into<String>,
        webspace_key: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            content_id: content_id.into(),
            webspace_key: webspace_key.into(),
            locale: locale.into(),
        }
    }

    /// Stable cache identifier. Components are escaped so that no two keys
    /// share an identifier.
    pub fn cache_id(&self) -> String {
        [
            &self.user_id,
            &self.content_id,
            &self.webspace_key,
            &self.locale,
        ]
        .iter()
        .map(|part| part.replace('\\', "\\\\").replace(':', "\\:"))
        .collect::<Vec<_>>()
        .join(":")
    }
}

impl fmt::Display for PreviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.user_id, self.webspace_key, self.locale, self.content_id
        )
    }
}

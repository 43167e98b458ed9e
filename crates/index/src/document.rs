use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label used when a document carries no `type`.
pub const DEFAULT_TYPE_LABEL: &str = "doc";

/// A retrievable knowledge-base entry. Its embedding lives in the ANN index
/// at the same ordinal position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Recognized metadata keys. All are optional.
///
/// Accessors trim surrounding whitespace, so `type: " faq "` matches
/// `is_type("faq")` and a whitespace-only value counts as absent. A title of
/// `"   "` therefore falls through to `question` in
/// [`Document::display_title`], unlike a plain string comparison on the raw
/// record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// `"faq"`, `"product"` or any other free-form kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Anything else found in the metadata record, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl DocumentMetadata {
    pub fn doc_type(&self) -> Option<&str> {
        present(&self.doc_type)
    }

    pub fn title(&self) -> Option<&str> {
        present(&self.title)
    }

    pub fn question(&self) -> Option<&str> {
        present(&self.question)
    }

    pub fn url(&self) -> Option<&str> {
        present(&self.url)
    }

    /// `type`, or [`DEFAULT_TYPE_LABEL`] when absent.
    pub fn type_label(&self) -> &str {
        self.doc_type().unwrap_or(DEFAULT_TYPE_LABEL)
    }

    /// Whether the trimmed `type` equals `kind`.
    pub fn is_type(&self, kind: &str) -> bool {
        self.doc_type() == Some(kind)
    }
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.metadata.doc_type = Some(kind.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.metadata.question = Some(question.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.metadata.url = Some(url.into());
        self
    }

    /// Title for display: `title`, else `question`, else the document id.
    pub fn display_title(&self) -> &str {
        self.metadata
            .title()
            .or_else(|| self.metadata.question())
            .unwrap_or(&self.id)
    }
}

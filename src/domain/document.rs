use serde::Serialize;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// A rendered, downloadable document.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct Document {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

impl Document {
    pub fn text(file_name: String, body: String) -> Self {
        Self {
            file_name,
            content_type: TEXT_PLAIN,
            body,
        }
    }
}

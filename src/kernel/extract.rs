use serde_json::Value;
use tracing::warn;

const FENCE: &str = "```";

/// Kinds of fenced sub-document the assistant may embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentTag {
    FileOps,
    MentorReport,
}

impl DocumentTag {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentTag::FileOps => "FILE_OPS",
            DocumentTag::MentorReport => "MENTOR_REPORT",
        }
    }

    /// Opening marker, e.g. "```FILE_OPS".
    pub fn opening_fence(&self) -> String {
        format!("{}{}", FENCE, self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedDocument {
    pub tag: DocumentTag,
    pub raw: String,
    pub value: Value,
}

/// Outcome of looking for one tag. Never an error: callers match on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    NotFound,
    /// A fence was located but its body is not JSON.
    Invalid { tag: DocumentTag, raw: String },
    Valid(EmbeddedDocument),
}

impl Extraction {
    pub fn document(&self) -> Option<&EmbeddedDocument> {
        match self {
            Extraction::Valid(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<EmbeddedDocument> {
        match self {
            Extraction::Valid(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Both documents found in one completed assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocuments {
    pub file_ops: Extraction,
    pub mentor_report: Extraction,
}

/// Returns the trimmed text between the first `open` fence and the first
/// closing fence after it.
fn fenced_body<'a>(text: &'a str, tag: DocumentTag) -> Option<&'a str> {
    let open = tag.opening_fence();
    let start = text.find(&open)?;
    let body_start = start + open.len();
    let close = body_start + text[body_start..].find(FENCE)?;
    Some(text[body_start..close].trim())
}

/// Locates and parses the first fenced document carrying `tag`.
pub fn extract(text: &str, tag: DocumentTag) -> Extraction {
    let Some(raw) = fenced_body(text, tag) else {
        return Extraction::NotFound;
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Extraction::Valid(EmbeddedDocument {
            tag,
            raw: raw.to_string(),
            value,
        }),
        Err(e) => {
            warn!("{} parse error: {}", tag.label(), e);
            Extraction::Invalid {
                tag,
                raw: raw.to_string(),
            }
        }
    }
}

/// Runs every tag independently over the same text.
pub fn extract_documents(text: &str) -> ExtractedDocuments {
    ExtractedDocuments {
        file_ops: extract(text, DocumentTag::FileOps),
        mentor_report: extract(text, DocumentTag::MentorReport),
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Action tag of a proposed file operation. Unrecognised tags are kept so
/// they can be reported back per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileAction {
    Create,
    Update,
    Delete,
    Rename,
    Export,
    Unknown(String),
}

impl Default for FileAction {
    fn default() -> Self {
        FileAction::Unknown(String::new())
    }
}

impl From<String> for FileAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create" => FileAction::Create,
            "update" => FileAction::Update,
            "delete" => FileAction::Delete,
            "rename" => FileAction::Rename,
            "export" => FileAction::Export,
            _ => FileAction::Unknown(s),
        }
    }
}

impl From<FileAction> for String {
    fn from(a: FileAction) -> Self {
        match a {
            FileAction::Create => "create".to_string(),
            FileAction::Update => "update".to_string(),
            FileAction::Delete => "delete".to_string(),
            FileAction::Rename => "rename".to_string(),
            FileAction::Export => "export".to_string(),
            FileAction::Unknown(s) => s,
        }
    }
}

/// One entry of a `FILE_OPS` document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOperation {
    #[serde(default)]
    pub action: FileAction,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, alias = "newPath", skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, deserialize_with = "truthy", skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Why the entry could not be read. Applying it reports this as the error.
    #[serde(skip)]
    pub malformed: Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Loosely typed flag: `true`, `"true"` and `1` all count as set.
fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => Some(!s.is_empty() && !s.eq_ignore_ascii_case("false") && s != "0"),
        Value::Array(_) | Value::Object(_) => Some(true),
    })
}

impl FileOperation {
    /// Reads one entry of the document. An entry that does not fit is kept
    /// as a malformed operation so it fails on its own when applied.
    pub fn from_entry(entry: &Value) -> Self {
        match serde_json::from_value::<FileOperation>(entry.clone()) {
            Ok(op) => op,
            Err(e) => {
                let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
                Self {
                    action: text("action").map(FileAction::from).unwrap_or_default(),
                    path: text("path").unwrap_or_default(),
                    malformed: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    pub fn create(path: &str, content: &str) -> Self {
        Self {
            action: FileAction::Create,
            path: path.to_string(),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    pub fn update(path: &str, content: &str) -> Self {
        Self {
            action: FileAction::Update,
            path: path.to_string(),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    pub fn delete(path: &str, recursive: bool) -> Self {
        Self {
            action: FileAction::Delete,
            path: path.to_string(),
            recursive: Some(recursive),
            ..Default::default()
        }
    }

    pub fn rename(path: &str, new_name: &str) -> Self {
        Self {
            action: FileAction::Rename,
            path: path.to_string(),
            new_name: Some(new_name.to_string()),
            ..Default::default()
        }
    }

    pub fn export() -> Self {
        Self {
            action: FileAction::Export,
            ..Default::default()
        }
    }
}

/// Ordered operations proposed in one assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileOpsBatch {
    pub operations: Vec<FileOperation>,
}

impl FileOpsBatch {
    pub fn new(operations: Vec<FileOperation>) -> Self {
        Self { operations }
    }

    /// Accepts either a single operation object or an array of them. Each
    /// entry is read independently.
    pub fn from_value(value: &Value) -> Self {
        let operations = match value {
            Value::Array(items) => items.iter().map(FileOperation::from_entry).collect(),
            other => vec![FileOperation::from_entry(other)],
        };
        Self { operations }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Full batch as shown to the human before confirmation.
    pub fn review_text(&self) -> String {
        serde_json::to_string_pretty(&self.operations).unwrap_or_default()
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::FileSystemError;

/// The project file tree the tutor may propose changes to.
///
/// Only the confirmation gate calls the mutating methods, and only after the
/// human approved the batch.
pub trait ProjectFileSystem {
    fn create_file(&mut self, path: &str, content: &str, language: &str) -> Result<(), FileSystemError>;
    fn update_file(&mut self, path: &str, content: &str) -> Result<(), FileSystemError>;
    fn delete_file(&mut self, path: &str, recursive: bool) -> Result<(), FileSystemError>;
    fn rename_file(&mut self, old_path: &str, new_name: &str) -> Result<(), FileSystemError>;
    /// Serialized snapshot of the whole project, for download.
    fn export_project(&self) -> Result<String, FileSystemError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Manifest line sent to the model: no contents, just shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileManifestEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn file_name(path: &str) -> String {
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("untitled")
        .to_string()
}

/// In-memory file tree keyed by absolute path. Folders are explicit nodes;
/// anything under `folder/` counts as its child.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileSystem {
    nodes: BTreeMap<String, FileNode>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&FileNode> {
        self.nodes.get(path)
    }

    pub fn content(&self, path: &str) -> Option<&str> {
        self.nodes.get(path).and_then(|n| n.content.as_deref())
    }

    pub fn paths(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn create_folder(&mut self, path: &str) -> Result<(), FileSystemError> {
        if self.nodes.contains_key(path) {
            return Err(FileSystemError::AlreadyExists(path.to_string()));
        }
        let now = Utc::now();
        self.nodes.insert(
            path.to_string(),
            FileNode {
                path: path.to_string(),
                name: file_name(path),
                node_type: NodeType::Folder,
                content: None,
                language: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    pub fn manifest(&self) -> Vec<FileManifestEntry> {
        self.nodes
            .values()
            .map(|n| FileManifestEntry {
                path: n.path.clone(),
                node_type: n.node_type.clone(),
                language: n.language.clone(),
            })
            .collect()
    }

    /// Full contents, keyed by path. Only sent when file access is allowed.
    pub fn contents_json(&self) -> String {
        serde_json::to_string(&self.nodes).unwrap_or_default()
    }

    /// Restores a snapshot produced by `export_project`.
    pub fn import_project(&mut self, json: &str) -> Result<(), FileSystemError> {
        let nodes: BTreeMap<String, FileNode> =
            serde_json::from_str(json).map_err(|e| FileSystemError::Serialization(e.to_string()))?;
        self.nodes = nodes;
        Ok(())
    }
}

impl ProjectFileSystem for InMemoryFileSystem {
    fn create_file(&mut self, path: &str, content: &str, language: &str) -> Result<(), FileSystemError> {
        if self.nodes.contains_key(path) {
            return Err(FileSystemError::AlreadyExists(path.to_string()));
        }
        let now = Utc::now();
        self.nodes.insert(
            path.to_string(),
            FileNode {
                path: path.to_string(),
                name: file_name(path),
                node_type: NodeType::File,
                content: Some(content.to_string()),
                language: Some(language.to_string()),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    fn update_file(&mut self, path: &str, content: &str) -> Result<(), FileSystemError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| FileSystemError::NotFound(path.to_string()))?;
        if node.node_type != NodeType::File {
            return Err(FileSystemError::NotAFile(path.to_string()));
        }
        node.content = Some(content.to_string());
        node.updated_at = Utc::now();
        Ok(())
    }

    fn delete_file(&mut self, path: &str, recursive: bool) -> Result<(), FileSystemError> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| FileSystemError::NotFound(path.to_string()))?;

        let mut doomed = vec![path.to_string()];
        if node.node_type == NodeType::Folder {
            let prefix = if path.ends_with('/') {
                path.to_string()
            } else {
                format!("{}/", path)
            };
            doomed.extend(
                self.nodes
                    .keys()
                    .filter(|p| p.as_str() != path && p.starts_with(&prefix))
                    .cloned(),
            );
            if doomed.len() > 1 && !recursive {
                return Err(FileSystemError::NotEmpty(path.to_string()));
            }
        }

        for p in doomed {
            self.nodes.remove(&p);
        }
        Ok(())
    }

    fn rename_file(&mut self, old_path: &str, new_name: &str) -> Result<(), FileSystemError> {
        if !self.nodes.contains_key(old_path) {
            return Err(FileSystemError::NotFound(old_path.to_string()));
        }
        let new_path = match old_path.rsplit_once('/') {
            Some((parent, _)) => format!("{}/{}", parent, new_name),
            None => new_name.to_string(),
        };
        if self.nodes.contains_key(&new_path) {
            return Err(FileSystemError::DestinationExists(new_path));
        }

        if let Some(mut node) = self.nodes.remove(old_path) {
            node.path = new_path.clone();
            node.name = new_name.to_string();
            node.updated_at = Utc::now();
            self.nodes.insert(new_path, node);
        }
        Ok(())
    }

    fn export_project(&self) -> Result<String, FileSystemError> {
        serde_json::to_string_pretty(&self.nodes).map_err(|e| FileSystemError::Serialization(e.to_string()))
    }
}

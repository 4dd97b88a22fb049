use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::StoreError;
use crate::kernel::event::Turn;
use crate::kernel::intake::IntakeRecord;

/// Mentor-facing summary the assistant embedded in its reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorReport {
    pub submission_id: String,
    /// Parsed body, stored verbatim.
    pub report: Value,
    pub raw_text: String,
}

/// Persisted view of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub submission_id: Option<String>,
    pub title: String,
    pub intake: Option<IntakeRecord>,
    pub intake_confirmed: bool,
    pub messages: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    pub fn new(id: Uuid, title: &str, submission_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            submission_id,
            title: title.to_string(),
            intake: None,
            intake_confirmed: false,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            last_message_at: None,
        }
    }
}

/// Trait for the conversation store. Best-effort mirror of the live session.
pub trait ConversationStore {
    fn create(&mut self, record: ConversationRecord) -> Result<(), StoreError>;
    fn add_message(&mut self, conversation_id: Uuid, turn: &Turn) -> Result<(), StoreError>;
    fn save_intake(&mut self, conversation_id: Uuid, intake: &IntakeRecord) -> Result<(), StoreError>;
    fn update_title(&mut self, conversation_id: Uuid, title: &str) -> Result<(), StoreError>;
    fn load(&self, conversation_id: Uuid) -> Result<ConversationRecord, StoreError>;
    /// Most recently updated first.
    fn list(&self) -> Result<Vec<ConversationRecord>, StoreError>;
    fn delete(&mut self, conversation_id: Uuid) -> Result<(), StoreError>;
}

/// Trait for the mentor-report store. Inserts are fire-and-forget for callers.
pub trait MentorReportStore {
    fn insert(&mut self, report: MentorReport) -> Result<(), StoreError>;
    fn all(&self) -> Result<Vec<MentorReport>, StoreError>;
}

/// In-memory implementation of the Conversation Store.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    records: HashMap<Uuid, ConversationRecord>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut ConversationRecord, StoreError> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn create(&mut self, record: ConversationRecord) -> Result<(), StoreError> {
        self.records.insert(record.id, record);
        Ok(())
    }

    fn add_message(&mut self, conversation_id: Uuid, turn: &Turn) -> Result<(), StoreError> {
        let record = self.get_mut(conversation_id)?;
        record.messages.push(turn.clone());
        let now = Utc::now();
        record.updated_at = now;
        record.last_message_at = Some(now);
        Ok(())
    }

    fn save_intake(&mut self, conversation_id: Uuid, intake: &IntakeRecord) -> Result<(), StoreError> {
        let record = self.get_mut(conversation_id)?;
        record.intake = Some(intake.clone());
        record.intake_confirmed = true;
        record.updated_at = Utc::now();
        Ok(())
    }

    fn update_title(&mut self, conversation_id: Uuid, title: &str) -> Result<(), StoreError> {
        let record = self.get_mut(conversation_id)?;
        record.title = title.to_string();
        record.updated_at = Utc::now();
        Ok(())
    }

    fn load(&self, conversation_id: Uuid) -> Result<ConversationRecord, StoreError> {
        self.records
            .get(&conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    fn list(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        let mut all: Vec<_> = self.records.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    fn delete(&mut self, conversation_id: Uuid) -> Result<(), StoreError> {
        self.records
            .remove(&conversation_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }
}

/// File-based Conversation Store. The whole snapshot is rewritten as JSON
/// after every mutation.
pub struct FileConversationStore {
    path: PathBuf,
    inner: InMemoryConversationStore,
}

impl FileConversationStore {
    /// Opens the store, loading the snapshot if the file exists.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let mut store = Self {
            path,
            inner: InMemoryConversationStore::new(),
        };
        store.load_snapshot()?;
        Ok(store)
    }

    fn load_snapshot(&mut self) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)?;
        let records: Vec<ConversationRecord> = serde_json::from_str(&content)?;
        self.inner.records = records.into_iter().map(|r| (r.id, r)).collect();
        Ok(())
    }

    fn save(&self) -> Result<(), StoreError> {
        let records = self.inner.list()?;
        let json = serde_json::to_string_pretty(&records)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl ConversationStore for FileConversationStore {
    fn create(&mut self, record: ConversationRecord) -> Result<(), StoreError> {
        self.inner.create(record)?;
        self.save()
    }

    fn add_message(&mut self, conversation_id: Uuid, turn: &Turn) -> Result<(), StoreError> {
        self.inner.add_message(conversation_id, turn)?;
        self.save()
    }

    fn save_intake(&mut self, conversation_id: Uuid, intake: &IntakeRecord) -> Result<(), StoreError> {
        self.inner.save_intake(conversation_id, intake)?;
        self.save()
    }

    fn update_title(&mut self, conversation_id: Uuid, title: &str) -> Result<(), StoreError> {
        self.inner.update_title(conversation_id, title)?;
        self.save()
    }

    fn load(&self, conversation_id: Uuid) -> Result<ConversationRecord, StoreError> {
        self.inner.load(conversation_id)
    }

    fn list(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        self.inner.list()
    }

    fn delete(&mut self, conversation_id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(conversation_id)?;
        self.save()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMentorReportStore {
    reports: Vec<MentorReport>,
}

impl InMemoryMentorReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MentorReportStore for InMemoryMentorReportStore {
    fn insert(&mut self, report: MentorReport) -> Result<(), StoreError> {
        self.reports.push(report);
        Ok(())
    }

    fn all(&self) -> Result<Vec<MentorReport>, StoreError> {
        Ok(self.reports.clone())
    }
}

/// Append-only JSON-lines file of mentor reports.
pub struct FileMentorReportStore {
    path: PathBuf,
}

impl FileMentorReportStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl MentorReportStore for FileMentorReportStore {
    fn insert(&mut self, report: MentorReport) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(&report)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<MentorReport>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut reports = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            reports.push(serde_json::from_str(&line)?);
        }
        Ok(reports)
    }
}

/// Reads the student's progress entries, a JSON array. A missing file means
/// no entries yet.
pub fn load_progress_entries(path: &Path) -> Result<Vec<Value>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

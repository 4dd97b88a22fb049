use futures_util::StreamExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TutorConfig;
use crate::error::{TransportError, UserNotice};
use crate::kernel::event::{Event, Turn, TurnId};
use crate::kernel::file_ops::FileOpsBatch;
use crate::kernel::gate::OpsLogEntry;
use crate::kernel::reactor::Reactor;
use crate::kernel::scheduler::{ChatMessage, SideEffect};
use crate::kernel::state::ConversationSession;
use crate::services::files::InMemoryFileSystem;
use crate::services::llm::client::ChatClient;
use crate::services::llm::prompt::{build_system_prompt, CompletionRequest, PromptContext};
use crate::services::store::{ConversationRecord, ConversationStore, MentorReportStore};

pub const DEFAULT_TITLE: &str = "New Conversation";

/// What the driver hands back to whoever renders the conversation.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Text streamed into the open assistant turn.
    Delta { id: TurnId, text: String },
    /// A turn was closed and persisted.
    Turn(Turn),
    Notice(UserNotice),
    /// A batch is waiting for `/apply` or `/reject`.
    Review(FileOpsBatch),
    Applied(OpsLogEntry),
}

/// Async shell around the reactor. Executes side effects, owns the
/// collaborators and pumps the model stream back in as events.
pub struct Driver {
    reactor: Reactor,
    client: ChatClient,
    files: InMemoryFileSystem,
    conversations: Box<dyn ConversationStore + Send>,
    reports: Box<dyn MentorReportStore + Send>,
    config: TutorConfig,
    progress_entries: Vec<Value>,
    outbox: Vec<Outbound>,
    live: Option<mpsc::UnboundedSender<Outbound>>,
}

impl Driver {
    /// Starts a brand new conversation and registers it with the store.
    pub fn start(
        config: TutorConfig,
        files: InMemoryFileSystem,
        mut conversations: Box<dyn ConversationStore + Send>,
        reports: Box<dyn MentorReportStore + Send>,
    ) -> Self {
        let session = ConversationSession::new(DEFAULT_TITLE, config.submission_id.clone());
        if let Err(e) = conversations.create(session.to_record()) {
            warn!("Failed to create conversation record: {}", e);
        }
        info!("Conversation {} started", session.id);
        Self::assemble(config, session, files, conversations, reports)
    }

    /// Picks up a persisted conversation where it left off.
    pub fn resume(
        config: TutorConfig,
        record: &ConversationRecord,
        files: InMemoryFileSystem,
        conversations: Box<dyn ConversationStore + Send>,
        reports: Box<dyn MentorReportStore + Send>,
    ) -> Self {
        let session = ConversationSession::restore(record);
        info!("Conversation {} resumed with {} turns", session.id, record.messages.len());
        Self::assemble(config, session, files, conversations, reports)
    }

    fn assemble(
        config: TutorConfig,
        session: ConversationSession,
        files: InMemoryFileSystem,
        conversations: Box<dyn ConversationStore + Send>,
        reports: Box<dyn MentorReportStore + Send>,
    ) -> Self {
        Self {
            reactor: Reactor::new(session),
            client: ChatClient::new(&config),
            files,
            conversations,
            reports,
            config,
            progress_entries: Vec::new(),
            outbox: Vec::new(),
            live: None,
        }
    }

    pub fn session(&self) -> &ConversationSession {
        &self.reactor.session
    }

    pub fn files(&self) -> &InMemoryFileSystem {
        &self.files
    }

    pub fn set_progress_entries(&mut self, entries: Vec<Value>) {
        self.progress_entries = entries;
    }

    /// Everything produced for the UI since the last drain. Empty while a
    /// subscriber is attached.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Routes every outbound item to the returned receiver as soon as it is
    /// produced, including stream deltas while `submit` is still running.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.live = Some(tx);
        rx
    }

    fn emit(&mut self, out: Outbound) {
        let out = match &self.live {
            Some(tx) => match tx.send(out) {
                Ok(()) => return,
                Err(mpsc::error::SendError(out)) => {
                    debug!("Outbound subscriber dropped, falling back to the outbox");
                    out
                }
            },
            None => out,
        };
        self.live = None;
        self.outbox.push(out);
    }

    pub fn rename(&mut self, title: &str) {
        self.reactor.session.title = title.to_string();
        if let Err(e) = self.conversations.update_title(self.reactor.session.id, title) {
            warn!("Failed to update conversation title: {}", e);
        }
    }

    /// Feeds one user message through the kernel and runs whatever it asks
    /// for, including a full model stream. Cancelling `cancel` stops the
    /// stream and discards the partial reply.
    pub async fn submit(&mut self, text: &str, cancel: &CancellationToken) {
        let effects = self.reactor.step(Event::user(text));
        self.run(effects, cancel).await;
    }

    pub async fn confirm_file_ops(&mut self, cancel: &CancellationToken) {
        let effects = self.reactor.confirm_file_ops(&mut self.files);
        self.run(effects, cancel).await;
    }

    pub async fn reject_file_ops(&mut self, cancel: &CancellationToken) {
        let effects = self.reactor.reject_file_ops();
        self.run(effects, cancel).await;
    }

    async fn run(&mut self, effects: Vec<SideEffect>, cancel: &CancellationToken) {
        let mut queue: VecDeque<SideEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                SideEffect::RequestCompletion(history) => {
                    let produced = self.stream_completion(history, cancel).await;
                    queue.extend(produced);
                }
                other => self.execute(other),
            }
        }
    }

    fn execute(&mut self, effect: SideEffect) {
        let conversation_id = self.reactor.session.id;
        match effect {
            SideEffect::PersistTurn(turn) => {
                if let Err(e) = self.conversations.add_message(conversation_id, &turn) {
                    warn!("Failed to persist turn {}: {}", turn.id, e);
                }
                self.emit(Outbound::Turn(turn));
            }
            SideEffect::ShowDelta { id, text } => self.emit(Outbound::Delta { id, text }),
            SideEffect::PersistIntake(intake) => {
                if let Err(e) = self.conversations.save_intake(conversation_id, &intake) {
                    warn!("Failed to persist intake: {}", e);
                }
            }
            SideEffect::PersistMentorReport(report) => {
                debug!("Storing mentor report for submission {}", report.submission_id);
                if let Err(e) = self.reports.insert(report) {
                    warn!("Failed to store mentor report: {}", e);
                }
            }
            SideEffect::ReviewFileOps(batch) => self.emit(Outbound::Review(batch)),
            SideEffect::FileOpsApplied(entry) => {
                for export in &entry.exports {
                    self.write_export(&export.filename, &export.contents);
                }
                info!(
                    "File operations applied: {} ok, {} failed",
                    entry.succeeded(),
                    entry.failed()
                );
                self.emit(Outbound::Applied(entry));
            }
            SideEffect::Notify(notice) => self.emit(Outbound::Notice(notice)),
            SideEffect::RequestCompletion(_) => {
                warn!("Completion request reached the effect executor directly");
            }
        }
    }

    fn write_export(&self, filename: &str, contents: &str) {
        let path: PathBuf = self.config.data_dir.join("exports").join(filename);
        let written = path
            .parent()
            .map_or(Ok(()), |dir| fs::create_dir_all(dir))
            .and_then(|_| fs::write(&path, contents));
        match written {
            Ok(()) => info!("Project exported to {}", path.display()),
            Err(e) => warn!("Failed to write export {}: {}", path.display(), e),
        }
    }

    fn prompt_context(&self) -> PromptContext {
        let current_code = self
            .config
            .current_code_path()
            .and_then(|path| self.files.content(path).map(str::to_string));
        PromptContext {
            current_task: self.config.current_task.clone(),
            current_code,
            project_files: self.files.paths(),
            project_structure: self.files.manifest(),
            project_files_content: self
                .config
                .allow_file_access
                .then(|| self.files.contents_json()),
            progress_entries: self
                .config
                .allow_progress_access
                .then(|| self.progress_entries.clone()),
        }
    }

    /// Opens the model stream and steps every chunk through the reactor.
    async fn stream_completion(
        &mut self,
        history: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Vec<SideEffect> {
        let system_prompt = build_system_prompt(&self.prompt_context(), self.config.code_snippet_limit);
        let request = CompletionRequest::new(&self.config.model, system_prompt, &history);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            opened = self.client.open_stream(&request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                let mut effects = Vec::new();
                let produced = self.reactor.step(Event::StreamFailed(e));
                self.absorb(produced, &mut effects);
                return effects;
            }
        };

        let mut effects = Vec::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Err(TransportError::Cancelled)),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(bytes)) => {
                    let produced = self.reactor.step(Event::StreamChunk(bytes));
                    self.absorb(produced, &mut effects);
                    if !self.reactor.session.is_streaming() {
                        // [DONE] seen; whatever follows is ignored
                        break;
                    }
                }
                Some(Err(e)) => {
                    let produced = self.reactor.step(Event::StreamFailed(e));
                    self.absorb(produced, &mut effects);
                    break;
                }
                None => {
                    let produced = self.reactor.step(Event::StreamEnded);
                    self.absorb(produced, &mut effects);
                    break;
                }
            }
        }
        effects
    }

    /// Deltas go out immediately; everything else waits for the stream to
    /// settle, in order.
    fn absorb(&mut self, produced: Vec<SideEffect>, effects: &mut Vec<SideEffect>) {
        for effect in produced {
            match effect {
                SideEffect::ShowDelta { .. } => self.execute(effect),
                other => effects.push(other),
            }
        }
    }
}

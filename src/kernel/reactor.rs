use tracing::{debug, info, warn};

use super::event::{Event, TurnId};
use super::extract::{extract_documents, Extraction};
use super::file_ops::FileOpsBatch;
use super::gate::apply_batch;
use super::guard::CodeRequestGuard;
use super::intake::parse_intake;
use super::scheduler::{ChatMessage, Reply, Scheduler, SideEffect};
use super::state::{ConversationSession, StateDelta};
use super::stream::{StreamFrame, StreamReassembler};
use crate::error::{TransportError, UserNotice};
use crate::services::files::ProjectFileSystem;
use crate::services::store::MentorReport;

/// The conversation controller.
///
/// `step` is the only entry point for events. It never awaits and never
/// touches I/O: it reduces the session and returns the side effects the
/// driver has to carry out.
pub struct Reactor {
    pub session: ConversationSession,
    guard: CodeRequestGuard,
    scheduler: Scheduler,
    reassembler: StreamReassembler,
}

impl Reactor {
    /// Wraps a session. A fresh session gets the greeting turn.
    pub fn new(mut session: ConversationSession) -> Self {
        if session.transcript().is_empty() {
            let (delta, _) = Scheduler.reply(Reply::Greeting);
            session.reduce(delta);
        }
        Self {
            session,
            guard: CodeRequestGuard::new(),
            scheduler: Scheduler,
            reassembler: StreamReassembler::new(),
        }
    }

    pub fn step(&mut self, event: Event) -> Vec<SideEffect> {
        match event {
            Event::UserMessage(text) => self.on_user_message(&text),
            Event::StreamChunk(bytes) => self.on_chunk(&bytes),
            Event::StreamEnded => self.on_stream_end(),
            Event::StreamFailed(err) => self.on_stream_failed(err),
        }
    }

    /// Human approved the pending batch.
    pub fn confirm_file_ops(&mut self, fs: &mut dyn ProjectFileSystem) -> Vec<SideEffect> {
        let Some(batch) = self.session.pending_file_ops().cloned() else {
            return vec![SideEffect::Notify(UserNotice::new(
                "Nothing to apply",
                "There are no pending file operations.",
            ))];
        };
        let entry = apply_batch(&batch, fs);
        self.session.reduce(StateDelta::FileOpsApplied(entry.clone()));
        vec![SideEffect::FileOpsApplied(entry)]
    }

    /// Human declined the pending batch. The file system is never called.
    pub fn reject_file_ops(&mut self) -> Vec<SideEffect> {
        if self.session.pending_file_ops().is_none() {
            return Vec::new();
        }
        self.session.reduce(StateDelta::FileOpsRejected);
        vec![SideEffect::Notify(UserNotice::new(
            "Discarded",
            "The proposed file operations were not applied.",
        ))]
    }

    fn apply(&mut self, effects: &mut Vec<SideEffect>, (delta, effect): (StateDelta, SideEffect)) {
        self.session.reduce(delta);
        effects.push(effect);
    }

    fn on_user_message(&mut self, raw: &str) -> Vec<SideEffect> {
        let text = raw.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if self.session.is_streaming() {
            return vec![SideEffect::Notify(UserNotice::new(
                "Busy",
                "Wait for the current response to finish.",
            ))];
        }

        let mut effects = Vec::new();

        // === 1. GUARD (absolute priority) ===
        if self.guard.is_code_request(text) {
            info!("Code request refused");
            self.apply(&mut effects, self.scheduler.user_turn(text));
            self.apply(&mut effects, self.scheduler.reply(Reply::Refusal));
            return effects;
        }

        self.apply(&mut effects, self.scheduler.user_turn(text));

        // === 2. INTAKE or MODEL ===
        if self.session.phase().is_confirmed() {
            self.session.reduce(StateDelta::CompletionRequested);
            let history = self
                .session
                .transcript()
                .closed()
                .iter()
                .map(ChatMessage::from)
                .collect();
            effects.push(SideEffect::RequestCompletion(history));
            return effects;
        }

        let awaiting = self.session.pending_intake().cloned();

        if let Some(record) = parse_intake(text) {
            info!("Intake parsed, awaiting confirmation");
            self.session.reduce(StateDelta::IntakeParsed(record.clone()));
            self.apply(&mut effects, self.scheduler.reply(Reply::ConfirmIntake(record)));
        } else if let (Some(record), true) = (&awaiting, text.eq_ignore_ascii_case("yes")) {
            info!("Intake confirmed");
            self.session.reduce(StateDelta::IntakeConfirmed);
            self.apply(&mut effects, self.scheduler.reply(Reply::IntakeConfirmed));
            effects.push(SideEffect::PersistIntake(record.clone()));
        } else if awaiting.is_some() && text.eq_ignore_ascii_case("no") {
            info!("Intake discarded");
            self.session.reduce(StateDelta::IntakeDiscarded);
            self.apply(&mut effects, self.scheduler.reply(Reply::IntakeReentry));
        } else {
            debug!("No intake found in message, re-prompting");
            self.apply(&mut effects, self.scheduler.reply(Reply::FormatReminder));
        }

        effects
    }

    fn on_chunk(&mut self, bytes: &[u8]) -> Vec<SideEffect> {
        if !self.session.is_streaming() {
            debug!("Stream chunk with no request in flight ignored");
            return Vec::new();
        }
        let frames = self.reassembler.push(bytes);
        let mut effects = Vec::new();
        if self.apply_frames(frames, &mut effects) {
            self.complete_turn(&mut effects);
        }
        effects
    }

    fn on_stream_end(&mut self) -> Vec<SideEffect> {
        if !self.session.is_streaming() {
            return Vec::new();
        }
        let frames = self.reassembler.finish();
        let mut effects = Vec::new();
        self.apply_frames(frames, &mut effects);
        self.complete_turn(&mut effects);
        effects
    }

    fn on_stream_failed(&mut self, err: TransportError) -> Vec<SideEffect> {
        warn!("Model stream failed: {}", err);
        self.reassembler = StreamReassembler::new();
        if self.session.is_streaming() {
            self.session.reduce(StateDelta::AssistantTurnAbandoned);
        }
        vec![SideEffect::Notify(err.notice())]
    }

    /// Applies frames in arrival order. Returns true once `[DONE]` was seen.
    fn apply_frames(&mut self, frames: Vec<StreamFrame>, effects: &mut Vec<SideEffect>) -> bool {
        for frame in frames {
            match frame {
                StreamFrame::Delta(text) => {
                    let open = self.session.transcript().open_turn().map(|t| t.id);
                    let id = match open {
                        Some(id) => id,
                        None => {
                            let id = TurnId::new();
                            self.session.reduce(StateDelta::AssistantTurnOpened(id));
                            id
                        }
                    };
                    self.session.reduce(StateDelta::AssistantDelta { id, text: text.clone() });
                    effects.push(SideEffect::ShowDelta { id, text });
                }
                StreamFrame::Done => return true,
            }
        }
        false
    }

    fn complete_turn(&mut self, effects: &mut Vec<SideEffect>) {
        self.reassembler = StreamReassembler::new();
        let turn = self.session.transcript().open_turn().cloned();
        self.session.reduce(StateDelta::AssistantTurnClosed);

        let Some(turn) = turn.filter(|t| !t.content.is_empty()) else {
            debug!("Stream completed without assistant content");
            return;
        };
        effects.push(SideEffect::PersistTurn(turn.clone()));

        // === EXTRACT embedded documents ===
        let docs = extract_documents(&turn.content);

        if let Extraction::Valid(doc) = docs.file_ops {
            let batch = FileOpsBatch::from_value(&doc.value);
            if batch.is_empty() {
                debug!("FILE_OPS document held no operations");
            } else {
                let malformed = batch.operations.iter().filter(|op| op.malformed.is_some()).count();
                if malformed > 0 {
                    warn!("{} proposed file operation(s) could not be read", malformed);
                }
                info!("Assistant proposed {} file operation(s)", batch.len());
                self.session.reduce(StateDelta::FileOpsProposed(batch.clone()));
                effects.push(SideEffect::ReviewFileOps(batch));
            }
        }

        if let Extraction::Valid(doc) = docs.mentor_report {
            match &self.session.submission_id {
                Some(submission_id) => effects.push(SideEffect::PersistMentorReport(MentorReport {
                    submission_id: submission_id.clone(),
                    report: doc.value,
                    raw_text: doc.raw,
                })),
                None => debug!("MENTOR_REPORT found but conversation has no submission"),
            }
        }
    }
}

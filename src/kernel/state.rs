use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::event::{Role, Turn, TurnId, TurnKind};
use super::file_ops::FileOpsBatch;
use super::gate::{ConfirmationGate, OpsLogEntry};
use super::intake::IntakeRecord;
use crate::services::store::ConversationRecord;

/// Intake lifecycle. `Confirmed` is terminal for the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakePhase {
    NoIntake,
    AwaitingConfirmation(IntakeRecord),
    Confirmed(IntakeRecord),
}

impl IntakePhase {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, IntakePhase::Confirmed(_))
    }
}

/// Arena of closed turns plus at most one open assistant turn.
///
/// Closed turns are never touched again. The open turn is only reachable by
/// its id while the stream that owns it is running.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    closed: Vec<Turn>,
    open: Option<Turn>,
}

impl Transcript {
    pub fn closed(&self) -> &[Turn] {
        &self.closed
    }

    pub fn open_turn(&self) -> Option<&Turn> {
        self.open.as_ref()
    }

    /// Everything visible right now, including the partial assistant turn.
    pub fn visible(&self) -> impl Iterator<Item = &Turn> {
        self.closed.iter().chain(self.open.iter())
    }

    pub fn len(&self) -> usize {
        self.closed.len() + usize::from(self.open.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<&Turn> {
        self.open.as_ref().or_else(|| self.closed.last())
    }
}

/// Strict state delta. This is the ONLY way a session mutates.
#[derive(Debug, Clone)]
pub enum StateDelta {
    TurnAppended(Turn),
    IntakeParsed(IntakeRecord),
    IntakeConfirmed,
    IntakeDiscarded,
    CompletionRequested,
    AssistantTurnOpened(TurnId),
    AssistantDelta { id: TurnId, text: String },
    AssistantTurnClosed,
    AssistantTurnAbandoned,
    FileOpsProposed(FileOpsBatch),
    FileOpsApplied(OpsLogEntry),
    FileOpsRejected,
}

/// Everything one conversation owns.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: Uuid,
    pub submission_id: Option<String>,
    pub title: String,
    phase: IntakePhase,
    transcript: Transcript,
    gate: ConfirmationGate,
    in_flight: bool,
    // Monotonic version, bumped by every reduction
    pub version: u64,
}

impl ConversationSession {
    pub fn new(title: &str, submission_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            title: title.to_string(),
            phase: IntakePhase::NoIntake,
            transcript: Transcript::default(),
            gate: ConfirmationGate::new(),
            in_flight: false,
            version: 0,
        }
    }

    /// Rebuilds a session from its persisted record. Only a confirmed intake
    /// survives; an unconfirmed one has to be submitted again.
    pub fn restore(record: &ConversationRecord) -> Self {
        let phase = match (&record.intake, record.intake_confirmed) {
            (Some(intake), true) => IntakePhase::Confirmed(intake.clone()),
            _ => IntakePhase::NoIntake,
        };
        Self {
            id: record.id,
            submission_id: record.submission_id.clone(),
            title: record.title.clone(),
            phase,
            transcript: Transcript {
                closed: record.messages.clone(),
                open: None,
            },
            gate: ConfirmationGate::new(),
            in_flight: false,
            version: 0,
        }
    }

    /// Empty persisted record for a brand new conversation.
    pub fn to_record(&self) -> ConversationRecord {
        let mut record = ConversationRecord::new(self.id, &self.title, self.submission_id.clone());
        if let IntakePhase::Confirmed(intake) = &self.phase {
            record.intake = Some(intake.clone());
            record.intake_confirmed = true;
        }
        record
    }

    pub fn phase(&self) -> &IntakePhase {
        &self.phase
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    pub fn pending_intake(&self) -> Option<&IntakeRecord> {
        match &self.phase {
            IntakePhase::AwaitingConfirmation(record) => Some(record),
            _ => None,
        }
    }

    pub fn confirmed_intake(&self) -> Option<&IntakeRecord> {
        match &self.phase {
            IntakePhase::Confirmed(record) => Some(record),
            _ => None,
        }
    }

    pub fn pending_file_ops(&self) -> Option<&FileOpsBatch> {
        self.gate.pending()
    }

    /// True from the moment a completion is requested until its stream ends.
    pub fn is_streaming(&self) -> bool {
        self.in_flight
    }

    /// Pure reduction: Session + Delta -> Mutated Session
    pub fn reduce(&mut self, delta: StateDelta) {
        self.version += 1;

        match delta {
            StateDelta::TurnAppended(turn) => {
                self.transcript.closed.push(turn);
            }
            StateDelta::IntakeParsed(record) => {
                if self.phase.is_confirmed() {
                    warn!("Ignoring parsed intake: conversation already confirmed");
                    return;
                }
                self.phase = IntakePhase::AwaitingConfirmation(record);
            }
            StateDelta::IntakeConfirmed => {
                let phase = std::mem::replace(&mut self.phase, IntakePhase::NoIntake);
                self.phase = match phase {
                    IntakePhase::AwaitingConfirmation(record) => IntakePhase::Confirmed(record),
                    other => {
                        warn!("Confirmation without a pending intake ignored");
                        other
                    }
                };
            }
            StateDelta::IntakeDiscarded => {
                if let IntakePhase::AwaitingConfirmation(_) = self.phase {
                    self.phase = IntakePhase::NoIntake;
                }
            }
            StateDelta::CompletionRequested => {
                self.in_flight = true;
            }
            StateDelta::AssistantTurnOpened(id) => {
                if self.transcript.open.is_some() {
                    warn!("Opening a new assistant turn while one is still open");
                }
                let mut turn = Turn::assistant("", TurnKind::Explanation);
                turn.id = id;
                self.transcript.open = Some(turn);
            }
            StateDelta::AssistantDelta { id, text } => match self.transcript.open.as_mut() {
                Some(turn) if turn.id == id && turn.role == Role::Assistant => {
                    turn.content.push_str(&text);
                }
                _ => debug!("Delta for turn {} arrived with no matching open turn", id),
            },
            StateDelta::AssistantTurnClosed => {
                if let Some(turn) = self.transcript.open.take() {
                    self.transcript.closed.push(turn);
                }
                self.in_flight = false;
            }
            StateDelta::AssistantTurnAbandoned => {
                self.transcript.open = None;
                self.in_flight = false;
            }
            StateDelta::FileOpsProposed(batch) => {
                self.gate.propose(batch);
            }
            StateDelta::FileOpsApplied(entry) => {
                self.gate.record(entry);
            }
            StateDelta::FileOpsRejected => {
                self.gate.reject();
            }
        }
    }
}

use serde::Serialize;

use super::event::{Role, Turn, TurnId, TurnKind};
use super::file_ops::FileOpsBatch;
use super::gate::OpsLogEntry;
use super::guard::REFUSAL_TEXT;
use super::intake::IntakeRecord;
use super::state::StateDelta;
use crate::error::UserNotice;
use crate::services::store::MentorReport;

pub const GREETING_TEXT: &str = "You are talking to a project-skill tutor. My role: teach, guide, and evaluate your project work; I will NOT write code for you.

Before I create milestones or give guidance, provide all of these inputs (I will NOT proceed until confirmed):
- Project idea (one-line description)
- Tech stack / language (primary)
- Skill level (beginner / intermediate / advanced)
- Timeline (weeks or target date)

Please provide the four fields in one message in this format:
Project idea: ...
Tech stack: ...
Skill level: ...
Timeline: ...

After you provide and confirm these, I will propose a numbered sequence of milestones. I will not produce runnable code. I will only explain concepts, ask guiding questions, and produce verifiable milestone plans.";

pub const FORMAT_REMINDER_TEXT: &str = "Please provide the required intake fields in this exact format:
Project idea: ...
Tech stack: ...
Skill level: ...
Timeline: ...

Or confirm the parsed intake with 'yes'/'no'.";

pub const INTAKE_CONFIRMED_TEXT: &str =
    "Intake confirmed. Tell me which milestone you'd like to start with, or ask me to create the full milestone sequence.";

pub const INTAKE_REENTRY_TEXT: &str = "Okay, please re-enter the intake fields in the required format.";

/// One role/content pair of the history sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Work the kernel asks the driver to perform. The kernel never does I/O.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Mirror a closed turn to the conversation store.
    PersistTurn(Turn),
    PersistIntake(IntakeRecord),
    /// Open the model stream with this history.
    RequestCompletion(Vec<ChatMessage>),
    /// Text just appended to the open assistant turn.
    ShowDelta { id: TurnId, text: String },
    /// Show the full pending batch to the human and wait for a decision.
    ReviewFileOps(FileOpsBatch),
    PersistMentorReport(MentorReport),
    /// Outcome of a confirmed batch, for display and export handling.
    FileOpsApplied(OpsLogEntry),
    Notify(UserNotice),
}

/// Canned assistant replies that never involve the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Greeting,
    Refusal,
    ConfirmIntake(IntakeRecord),
    IntakeConfirmed,
    IntakeReentry,
    FormatReminder,
}

impl Reply {
    pub fn kind(&self) -> TurnKind {
        match self {
            Reply::Refusal => TurnKind::Warning,
            Reply::ConfirmIntake(_) | Reply::FormatReminder => TurnKind::Question,
            Reply::Greeting | Reply::IntakeConfirmed | Reply::IntakeReentry => TurnKind::Explanation,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Reply::Greeting => GREETING_TEXT.to_string(),
            Reply::Refusal => REFUSAL_TEXT.to_string(),
            Reply::ConfirmIntake(record) => format!(
                "I parsed your intake as:\n{}\n\nPlease reply with **yes** to confirm or **no** to re-enter the details.",
                record.summary()
            ),
            Reply::IntakeConfirmed => INTAKE_CONFIRMED_TEXT.to_string(),
            Reply::IntakeReentry => INTAKE_REENTRY_TEXT.to_string(),
            Reply::FormatReminder => FORMAT_REMINDER_TEXT.to_string(),
        }
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Pure Projection: Reply -> (StateDelta, SideEffect)
    pub fn reply(&self, reply: Reply) -> (StateDelta, SideEffect) {
        let turn = Turn::assistant(&reply.text(), reply.kind());
        (StateDelta::TurnAppended(turn.clone()), SideEffect::PersistTurn(turn))
    }

    /// A user turn is appended and mirrored the same way in every phase.
    pub fn user_turn(&self, text: &str) -> (StateDelta, SideEffect) {
        let turn = Turn::user(text);
        (StateDelta::TurnAppended(turn.clone()), SideEffect::PersistTurn(turn))
    }
}

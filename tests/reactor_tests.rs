use guided_tutor::error::TransportError;
use guided_tutor::kernel::event::{Event, Role, TurnKind};
use guided_tutor::kernel::guard::REFUSAL_TEXT;
use guided_tutor::kernel::reactor::Reactor;
use guided_tutor::kernel::scheduler::{SideEffect, FORMAT_REMINDER_TEXT, GREETING_TEXT, INTAKE_REENTRY_TEXT};
use guided_tutor::kernel::state::{ConversationSession, IntakePhase};
use guided_tutor::services::files::InMemoryFileSystem;

const INTAKE: &str = "Project idea: Build a chat app\nTech stack: Node.js\nSkill level: beginner\nTimeline: 2 weeks";

fn reactor() -> Reactor {
    Reactor::new(ConversationSession::new("New Conversation", Some("sub-1".into())))
}

fn confirmed() -> Reactor {
    let mut r = reactor();
    r.step(Event::user(INTAKE));
    r.step(Event::user("yes"));
    assert!(r.session.phase().is_confirmed());
    r
}

fn delta_line(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}

fn last_text(r: &Reactor) -> String {
    r.session.transcript().closed().last().unwrap().content.clone()
}

fn completion_requested(effects: &[SideEffect]) -> bool {
    effects.iter().any(|e| matches!(e, SideEffect::RequestCompletion(_)))
}

#[test]
fn test_fresh_session_starts_with_greeting() {
    let r = reactor();
    let turns = r.session.transcript().closed();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::Assistant);
    assert_eq!(turns[0].content, GREETING_TEXT);
    assert_eq!(r.session.phase(), &IntakePhase::NoIntake);
}

#[test]
fn test_intake_then_yes_confirms() {
    let mut r = reactor();

    let effects = r.step(Event::user(INTAKE));
    assert!(matches!(r.session.phase(), IntakePhase::AwaitingConfirmation(_)));
    assert!(last_text(&r).contains("Project idea: Build a chat app"));
    assert!(!completion_requested(&effects));

    let effects = r.step(Event::user("YES"));
    let record = r.session.confirmed_intake().expect("confirmed");
    assert_eq!(record.tech_stack, "Node.js");
    assert!(effects.iter().any(|e| matches!(e, SideEffect::PersistIntake(i) if i.timeline == "2 weeks")));
    assert!(!completion_requested(&effects));
}

#[test]
fn test_no_discards_pending_intake() {
    let mut r = reactor();
    r.step(Event::user(INTAKE));

    r.step(Event::user("no"));
    assert_eq!(r.session.phase(), &IntakePhase::NoIntake);
    assert_eq!(last_text(&r), INTAKE_REENTRY_TEXT);

    // The discarded record cannot be confirmed any more
    r.step(Event::user("yes"));
    assert_eq!(r.session.phase(), &IntakePhase::NoIntake);
    assert_eq!(last_text(&r), FORMAT_REMINDER_TEXT);
}

#[test]
fn test_yes_without_pending_intake_reminds_format() {
    let mut r = reactor();
    let effects = r.step(Event::user("yes"));
    assert_eq!(last_text(&r), FORMAT_REMINDER_TEXT);
    assert!(!completion_requested(&effects));
}

#[test]
fn test_retyped_intake_replaces_pending() {
    let mut r = reactor();
    r.step(Event::user(INTAKE));
    r.step(Event::user(&INTAKE.replace("2 weeks", "8 weeks")));
    r.step(Event::user("yes"));

    assert_eq!(r.session.confirmed_intake().unwrap().timeline, "8 weeks");
}

#[test]
fn test_guard_wins_in_every_phase() {
    let mut fresh = reactor();
    let mut awaiting = reactor();
    awaiting.step(Event::user(INTAKE));
    let mut done = confirmed();

    for r in [&mut fresh, &mut awaiting, &mut done] {
        let phase_before = r.session.phase().clone();
        let effects = r.step(Event::user("Give me the code for the server"));

        assert!(!completion_requested(&effects));
        let last = r.session.transcript().closed().last().unwrap();
        assert_eq!(last.content, REFUSAL_TEXT);
        assert_eq!(last.kind, Some(TurnKind::Warning));
        assert_eq!(r.session.phase(), &phase_before);
    }
}

#[test]
fn test_guard_blocks_intake_shaped_code_request() {
    let mut r = reactor();
    let text = format!("{}\nAlso write the code please", INTAKE);
    r.step(Event::user(&text));
    assert_eq!(r.session.phase(), &IntakePhase::NoIntake);
    assert_eq!(last_text(&r), REFUSAL_TEXT);
}

#[test]
fn test_confirmed_message_requests_completion_with_history() {
    let mut r = confirmed();
    let effects = r.step(Event::user("How should I split my modules?"));

    let history = effects
        .iter()
        .find_map(|e| match e {
            SideEffect::RequestCompletion(h) => Some(h.clone()),
            _ => None,
        })
        .expect("model request");
    assert_eq!(history.last().unwrap().content, "How should I split my modules?");
    assert_eq!(history.last().unwrap().role, Role::User);
    assert!(r.session.is_streaming());
}

#[test]
fn test_streamed_reply_is_closed_and_persisted() {
    let mut r = confirmed();
    r.step(Event::user("Explain milestones"));

    r.step(Event::chunk(delta_line("Start ")));
    let partial = r.session.transcript().open_turn().unwrap().content.clone();
    assert_eq!(partial, "Start ");

    r.step(Event::chunk(delta_line("small.")));
    let effects = r.step(Event::chunk("data: [DONE]\n\n"));

    assert!(!r.session.is_streaming());
    assert!(r.session.transcript().open_turn().is_none());
    assert_eq!(last_text(&r), "Start small.");
    assert!(effects
        .iter()
        .any(|e| matches!(e, SideEffect::PersistTurn(t) if t.content == "Start small.")));
}

#[test]
fn test_stream_end_without_done_still_closes() {
    let mut r = confirmed();
    r.step(Event::user("Go on"));
    r.step(Event::chunk(delta_line("partial")));
    let effects = r.step(Event::StreamEnded);

    assert_eq!(last_text(&r), "partial");
    assert!(effects.iter().any(|e| matches!(e, SideEffect::PersistTurn(_))));
}

#[test]
fn test_failed_stream_is_not_persisted() {
    let mut r = confirmed();
    r.step(Event::user("Go on"));
    let before = r.session.transcript().closed().len();
    r.step(Event::chunk(delta_line("half an ans")));

    let effects = r.step(Event::StreamFailed(TransportError::RateLimited("slow down".into())));

    assert_eq!(r.session.transcript().closed().len(), before);
    assert!(r.session.transcript().open_turn().is_none());
    assert!(!r.session.is_streaming());
    assert!(!effects.iter().any(|e| matches!(e, SideEffect::PersistTurn(_))));
    assert!(effects
        .iter()
        .any(|e| matches!(e, SideEffect::Notify(n) if n.title == "Rate Limited")));
}

#[test]
fn test_empty_stream_leaves_no_turn() {
    let mut r = confirmed();
    r.step(Event::user("Hello?"));
    let before = r.session.transcript().closed().len();
    let effects = r.step(Event::chunk("data: [DONE]\n"));

    assert_eq!(r.session.transcript().closed().len(), before);
    assert!(effects.is_empty());
    assert!(!r.session.is_streaming());
}

#[test]
fn test_busy_while_streaming() {
    let mut r = confirmed();
    r.step(Event::user("First"));
    let before = r.session.transcript().len();

    let effects = r.step(Event::user("Second"));

    assert_eq!(r.session.transcript().len(), before);
    assert!(matches!(&effects[..], [SideEffect::Notify(n)] if n.title == "Busy"));
}

#[test]
fn test_chunks_without_request_are_ignored() {
    let mut r = reactor();
    let effects = r.step(Event::chunk(delta_line("stray")));
    assert!(effects.is_empty());
    assert!(r.session.transcript().open_turn().is_none());
}

#[test]
fn test_reply_with_documents_produces_review_and_report() {
    let mut r = confirmed();
    r.step(Event::user("I finished milestone 1"));

    let reply = "Validated.\n```MENTOR_REPORT\n{\"milestone_name\":\"X\"}\n```\n```FILE_OPS\n[{\"action\":\"create\",\"path\":\"tests/app.test.js\"}]\n```";
    r.step(Event::chunk(delta_line(reply)));
    let effects = r.step(Event::chunk("data: [DONE]\n"));

    let report = effects
        .iter()
        .find_map(|e| match e {
            SideEffect::PersistMentorReport(report) => Some(report.clone()),
            _ => None,
        })
        .expect("mentor report");
    assert_eq!(report.submission_id, "sub-1");
    assert_eq!(report.report, serde_json::json!({"milestone_name": "X"}));

    assert!(effects.iter().any(|e| matches!(e, SideEffect::ReviewFileOps(b) if b.len() == 1)));
    assert_eq!(r.session.pending_file_ops().unwrap().operations[0].path, "tests/app.test.js");
}

#[test]
fn test_report_without_submission_is_skipped() {
    let session = ConversationSession::new("New Conversation", None);
    let mut r = Reactor::new(session);
    r.step(Event::user(INTAKE));
    r.step(Event::user("yes"));
    r.step(Event::user("done"));

    r.step(Event::chunk(delta_line("```MENTOR_REPORT\n{\"a\":1}\n```")));
    let effects = r.step(Event::chunk("data: [DONE]\n"));

    assert!(!effects.iter().any(|e| matches!(e, SideEffect::PersistMentorReport(_))));
}

#[test]
fn test_invalid_file_ops_proposes_nothing() {
    let mut r = confirmed();
    r.step(Event::user("done"));
    r.step(Event::chunk(delta_line("```FILE_OPS\nnot json\n```")));
    let effects = r.step(Event::chunk("data: [DONE]\n"));

    assert!(r.session.pending_file_ops().is_none());
    assert!(!effects.iter().any(|e| matches!(e, SideEffect::ReviewFileOps(_))));
}

#[test]
fn test_confirm_and_reject_file_ops() {
    let mut r = confirmed();
    r.step(Event::user("done"));
    r.step(Event::chunk(delta_line(
        "```FILE_OPS\n{\"action\":\"create\",\"path\":\"notes.md\",\"content\":\"plan\"}\n```",
    )));
    r.step(Event::chunk("data: [DONE]\n"));

    let mut fs = InMemoryFileSystem::new();
    let effects = r.confirm_file_ops(&mut fs);
    assert!(matches!(&effects[..], [SideEffect::FileOpsApplied(entry)] if entry.succeeded() == 1));
    assert_eq!(fs.content("notes.md"), Some("plan"));
    assert!(r.session.pending_file_ops().is_none());
    assert_eq!(r.session.gate().log().len(), 1);

    assert!(r.reject_file_ops().is_empty());
}

#[test]
fn test_versions_increase() {
    let mut r = reactor();
    let v0 = r.session.version;
    r.step(Event::user(INTAKE));
    assert!(r.session.version > v0);
}

#[test]
fn test_unterminated_tail_is_flushed_on_stream_end() {
    let mut r = confirmed();
    r.step(Event::user("Go on"));
    r.step(Event::chunk(delta_line("Head, ")));
    let tail = delta_line("tail.");
    r.step(Event::chunk(tail.trim_end().to_string()));
    assert_eq!(r.session.transcript().open_turn().unwrap().content, "Head, ");

    let effects = r.step(Event::StreamEnded);

    assert_eq!(last_text(&r), "Head, tail.");
    assert!(!r.session.is_streaming());
    assert!(effects
        .iter()
        .any(|e| matches!(e, SideEffect::PersistTurn(t) if t.content == "Head, tail.")));
}

#[test]
fn test_loose_file_ops_still_reach_review() {
    let mut r = confirmed();
    r.step(Event::user("done"));
    let reply = "```FILE_OPS\n[{\"action\":\"create\",\"path\":\"a.txt\"},{\"action\":\"delete\",\"path\":\"b\",\"recursive\":\"true\"}]\n```";
    r.step(Event::chunk(delta_line(reply)));
    let effects = r.step(Event::chunk("data: [DONE]\n"));

    assert!(effects.iter().any(|e| matches!(e, SideEffect::ReviewFileOps(b) if b.len() == 2)));
    let pending = r.session.pending_file_ops().unwrap();
    assert_eq!(pending.operations[1].recursive, Some(true));
}

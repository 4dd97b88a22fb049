use guided_tutor::kernel::extract::{extract, extract_documents, DocumentTag, Extraction};
use guided_tutor::kernel::file_ops::{FileAction, FileOpsBatch};
use serde_json::json;

#[test]
fn test_mentor_report_is_extracted() {
    let text = "Good work on milestone one.\n```MENTOR_REPORT\n{\"milestone_name\":\"X\"}\n```\nNext, think about tests.";

    let doc = extract(text, DocumentTag::MentorReport)
        .into_document()
        .expect("valid report");
    assert_eq!(doc.value, json!({"milestone_name": "X"}));
    assert_eq!(doc.raw, "{\"milestone_name\":\"X\"}");
}

#[test]
fn test_both_documents_in_any_order() {
    let report = "```MENTOR_REPORT\n{\"understanding\":\"high\"}\n```";
    let ops = "```FILE_OPS\n[{\"action\":\"create\",\"path\":\"src/main.rs\"}]\n```";

    for text in [format!("{}\ntext\n{}", report, ops), format!("{}\ntext\n{}", ops, report)] {
        let docs = extract_documents(&text);
        assert_eq!(docs.mentor_report.document().unwrap().value, json!({"understanding": "high"}));
        let batch = FileOpsBatch::from_value(&docs.file_ops.document().unwrap().value);
        assert_eq!(batch.operations[0].action, FileAction::Create);
    }
}

#[test]
fn test_first_block_wins() {
    let text = "```MENTOR_REPORT\n{\"n\":1}\n```\n```MENTOR_REPORT\n{\"n\":2}\n```";
    let doc = extract(text, DocumentTag::MentorReport).into_document().unwrap();
    assert_eq!(doc.value, json!({"n": 1}));
}

#[test]
fn test_invalid_json_is_reported_not_raised() {
    let text = "```FILE_OPS\n{ action: create }\n```";
    match extract(text, DocumentTag::FileOps) {
        Extraction::Invalid { tag, raw } => {
            assert_eq!(tag, DocumentTag::FileOps);
            assert_eq!(raw, "{ action: create }");
        }
        other => panic!("expected Invalid, got {:?}", other),
    }
}

#[test]
fn test_missing_or_unclosed_block_is_not_found() {
    assert_eq!(extract("no blocks here", DocumentTag::FileOps), Extraction::NotFound);
    assert_eq!(
        extract("```FILE_OPS\n{\"action\":\"export\"}", DocumentTag::FileOps),
        Extraction::NotFound
    );
    assert_eq!(
        extract("```json\n{\"a\":1}\n```", DocumentTag::MentorReport),
        Extraction::NotFound
    );
}

#[test]
fn test_single_operation_object_and_aliases() {
    let value = json!({"action": "rename", "path": "a/old.rs", "newPath": "new.rs"});
    let batch = FileOpsBatch::from_value(&value);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.operations[0].new_name.as_deref(), Some("new.rs"));

    let value = json!([{"action": "chmod", "path": "x"}]);
    let batch = FileOpsBatch::from_value(&value);
    assert_eq!(batch.operations[0].action, FileAction::Unknown("chmod".into()));
}

#[test]
fn test_loosely_typed_entries_are_read_one_by_one() {
    let value = json!([
        {"action": "create", "path": "a.txt"},
        {"action": "delete", "path": "b", "recursive": "true"},
        {"action": "export", "path": null},
        {"action": "update", "path": "c.txt", "content": 42},
        "not an operation"
    ]);
    let batch = FileOpsBatch::from_value(&value);

    assert_eq!(batch.len(), 5);
    assert!(batch.operations[0].malformed.is_none());
    assert_eq!(batch.operations[1].recursive, Some(true));
    assert!(batch.operations[1].malformed.is_none());
    assert_eq!(batch.operations[2].action, FileAction::Export);
    assert_eq!(batch.operations[2].path, "");
    assert!(batch.operations[2].malformed.is_none());

    assert_eq!(batch.operations[3].action, FileAction::Update);
    assert_eq!(batch.operations[3].path, "c.txt");
    assert!(batch.operations[3].malformed.is_some());
    assert!(batch.operations[4].malformed.is_some());
}

#[test]
fn test_recursive_flag_spellings() {
    for (raw, expected) in [
        (json!(true), Some(true)),
        (json!("yes"), Some(true)),
        (json!(1), Some(true)),
        (json!(false), Some(false)),
        (json!("false"), Some(false)),
        (json!(0), Some(false)),
        (json!(""), Some(false)),
        (json!(null), None),
    ] {
        let batch = FileOpsBatch::from_value(&json!({"action": "delete", "path": "d", "recursive": raw}));
        assert_eq!(batch.operations[0].recursive, expected, "recursive = {}", raw);
    }
}

use guided_tutor::kernel::guard::{CodeRequestGuard, REFUSAL_TEXT};

#[test]
fn test_code_requests_are_detected() {
    let guard = CodeRequestGuard::new();
    for text in [
        "give me the code",
        "Can you GIVE ME THE CODE please",
        "just paste the code here",
        "implement for me the login page",
        "write the code for milestone 2",
        "I want the full implementation",
        "send me a complete solution",
    ] {
        assert!(guard.is_code_request(text), "should refuse: {}", text);
    }
}

#[test]
fn test_ordinary_questions_pass() {
    let guard = CodeRequestGuard::new();
    for text in [
        "How should I structure my routes?",
        "What does a hash map do?",
        "I wrote the tests, can you review my approach?",
        "Project idea: code review tool",
    ] {
        assert!(!guard.is_code_request(text), "should pass: {}", text);
    }
}

#[test]
fn test_refusal_text_is_fixed() {
    assert!(REFUSAL_TEXT.starts_with("I cannot provide code."));
}

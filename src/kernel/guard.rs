use regex::Regex;
use std::sync::LazyLock;

/// Reply emitted whenever the guard fires.
pub const REFUSAL_TEXT: &str =
    "I cannot provide code. Describe your intended approach and I will guide the logic, tests, and structure.";

static CODE_REQUEST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)give me the code",
        r"(?i)paste the code",
        r"(?i)implement for me",
        r"(?i)write the code",
        r"(?i)full implementation",
        r"(?i)complete solution",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("code request pattern must compile"))
    .collect()
});

/// Client-side refusal of code-completion requests.
///
/// Runs before any other routing, whatever phase the conversation is in.
pub struct CodeRequestGuard;

impl CodeRequestGuard {
    pub fn new() -> Self {
        Self
    }

    /// True when the text asks for a finished implementation.
    pub fn is_code_request(&self, text: &str) -> bool {
        CODE_REQUEST_PATTERNS.iter().any(|re| re.is_match(text))
    }
}

impl Default for CodeRequestGuard {
    fn default() -> Self {
        Self::new()
    }
}

use serde::Serialize;
use serde_json::Value;

use crate::kernel::scheduler::ChatMessage;
use crate::services::files::FileManifestEntry;

pub const SYSTEM_PROMPT: &str = "You are a project-skill tutor. You teach, guide, and evaluate students through milestone-based project work. You MUST NOT do the work for the student or provide runnable code.

RULES:
1) NO-EXECUTION: never provide full code blocks, complete implementations, or step-by-step code to copy. If asked for code, refuse and redirect to logic, algorithm design, tests, or debugging approach.
2) INTAKE: before anything else, collect and confirm the project idea, primary tech stack, skill level (beginner / intermediate / advanced) and timeline. Do not create milestones until all four are provided and confirmed.
3) MILESTONES: produce an ordered, numbered list of sequential milestones of about 2-3 weeks each, verifiable, with measurable success criteria and no implementation code. For each milestone give: Objective, Concepts Involved, Expected Output, File/Folder Structure (names only), Success Criteria.
4) GUIDANCE: explain what to think about at each step, ask the student to explain their planned approach before the next hint, use hints and leading questions, never code.
5) VALIDATION: when the student reports milestone work, ask what they implemented in their own words, check it against the success criteria, point out gaps, and only move on once they demonstrate understanding.
6) MENTOR REPORT: after each validated milestone, output a single JSON object inside a fenced block labelled MENTOR_REPORT with: milestone name, understanding level (low/medium/high), strengths, weak areas, red flags, recommended mentor actions. Nothing else goes in that block.
7) FILE OPERATIONS: if project files are shared and a structural change (create, update, delete, rename, export) would help, propose it as JSON inside a fenced block labelled FILE_OPS, either one operation object or an array of them with fields action, path, content, newName, recursive. The student confirms before anything is applied.
8) ANTI-SHORTCUT: if the student tries to skip milestones or asks for a finished solution, stop and ask what they think the issue is and what they already tried.
9) TONE: direct, instructional, firm. No praise or motivational fluff.

Always use the student's current task and current code for context, but never complete, fix, or produce code from it.";

/// Context sent alongside the turn history.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub current_task: Option<String>,
    pub current_code: Option<String>,
    pub project_files: Vec<String>,
    pub project_structure: Vec<FileManifestEntry>,
    /// Full file contents; only set when file access is allowed.
    pub project_files_content: Option<String>,
    /// Progress entries; only set when progress access is allowed.
    pub progress_entries: Option<Vec<Value>>,
}

/// Truncates to `limit` characters, always marking the cut.
pub fn code_snippet(code: &str, limit: usize) -> String {
    let snippet: String = code.chars().take(limit).collect();
    format!("{}...", snippet)
}

/// PURE FUNCTION: tutoring rules plus whatever context is available.
pub fn build_system_prompt(ctx: &PromptContext, snippet_limit: usize) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();

    if let Some(task) = ctx.current_task.as_deref().filter(|t| !t.is_empty()) {
        prompt.push_str(&format!("\n\nCurrent Task: {}", task));
    }
    if let Some(code) = ctx.current_code.as_deref().filter(|c| !c.is_empty()) {
        prompt.push_str(&format!(
            "\n\nStudent's Current Code (for context, do NOT complete it for them):\n```\n{}\n```",
            code_snippet(code, snippet_limit)
        ));
    }
    if !ctx.project_files.is_empty() {
        let list = ctx
            .project_files
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n");
        prompt.push_str(&format!("\n\nProject Files Available:\n{}", list));
    }
    if !ctx.project_structure.is_empty() {
        if let Ok(structure) = serde_json::to_string(&ctx.project_structure) {
            prompt.push_str(&format!("\n\nProject Structure:\n{}", structure));
        }
    }
    if let Some(contents) = &ctx.project_files_content {
        prompt.push_str(&format!("\n\nProject File Contents (read-only):\n{}", contents));
    }
    if let Some(entries) = &ctx.progress_entries {
        if let Ok(json) = serde_json::to_string(entries) {
            prompt.push_str(&format!("\n\nStudent Progress Entries:\n{}", json));
        }
    }

    prompt
}

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
}

impl CompletionRequest {
    /// System prompt first, then the history in order.
    pub fn new(model: &str, system_prompt: String, history: &[ChatMessage]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage {
            role: "system".to_string(),
            content: system_prompt,
        });
        messages.extend(history.iter().map(|m| WireMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));
        Self {
            model: model.to_string(),
            messages,
            stream: true,
        }
    }
}

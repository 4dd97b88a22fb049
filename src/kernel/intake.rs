use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The four project-context fields collected before tutoring starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRecord {
    pub project_idea: String,
    pub tech_stack: String,
    pub skill_level: String,
    pub timeline: String,
}

/// Accepted labels per canonical field, in priority order.
const PROJECT_IDEA: &[&str] = &["project idea", "project"];
const TECH_STACK: &[&str] = &["tech stack", "tech"];
const SKILL_LEVEL: &[&str] = &["skill level", "skill"];
const TIMELINE: &[&str] = &["timeline", "timeframe"];

impl IntakeRecord {
    /// Format used when echoing a parsed record back for confirmation.
    pub fn summary(&self) -> String {
        format!(
            "Project idea: {}\nTech stack: {}\nSkill level: {}\nTimeline: {}",
            self.project_idea, self.tech_stack, self.skill_level, self.timeline
        )
    }
}

/// PURE FUNCTION: scans `Label: value` lines and builds a record.
///
/// Returns `None` unless all four fields resolve to non-empty values. Labels
/// match case-insensitively; when a label repeats, the last line wins.
pub fn parse_intake(text: &str) -> Option<IntakeRecord> {
    let mut fields: HashMap<String, String> = HashMap::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label.trim();
        let value = value.trim();
        if label.is_empty() || value.is_empty() {
            continue;
        }
        fields.insert(label.to_lowercase(), value.to_string());
    }

    let resolve = |labels: &[&str]| -> Option<String> {
        labels
            .iter()
            .find_map(|l| fields.get(*l).filter(|v| !v.is_empty()).cloned())
    };

    Some(IntakeRecord {
        project_idea: resolve(PROJECT_IDEA)?,
        tech_stack: resolve(TECH_STACK)?,
        skill_level: resolve(SKILL_LEVEL)?,
        timeline: resolve(TIMELINE)?,
    })
}

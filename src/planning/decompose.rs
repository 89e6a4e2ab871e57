//! Task decomposition strategies.
//!
//! Turning a free-text request into subtasks is a pluggable, domain-specific
//! concern. The planning core only requires that a strategy return typed
//! task records; the default `KeywordDecomposer` is a deliberately simple
//! keyword heuristic. Richer strategies (a generative model, a rules
//! engine) implement the same trait.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::core::task::Task;
use crate::error::Result;
use crate::tlog_debug;

static CODING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(code|program|develop|implement)\w*\b").unwrap()
});

static RESEARCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(research|find|search|locate)\w*\b").unwrap()
});

static SYSTEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(system|file|directory|process|os)\b").unwrap()
});

/// A strategy that decomposes a request into subtasks.
///
/// Implementations must be deterministic for a given input if plan
/// reproducibility matters to the caller. Failures surface as
/// `Error::Decomposition` and abort plan creation.
pub trait Decomposer: Send + Sync {
    fn decompose(&self, description: &str, context: &HashMap<String, Value>) -> Result<Vec<Task>>;
}

/// Keyword-based decomposition heuristic.
///
/// Classifies the request into one of three categories by keyword match
/// and emits the canonical subtask breakdown for that category. Requests
/// matching nothing become a single general-purpose task, so the result
/// is never empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordDecomposer;

impl Decomposer for KeywordDecomposer {
    fn decompose(&self, description: &str, context: &HashMap<String, Value>) -> Result<Vec<Task>> {
        let mut subtasks = if CODING_RE.is_match(description) {
            tlog_debug!("Decomposing as coding request: {}", description);
            vec![
                Task::new("Analyze requirements and plan the implementation")
                    .with_capabilities(vec!["analysis".to_string(), "planning".to_string()])
                    .with_complexity(0.7),
                Task::new(&format!("Implement a solution for: {}", description))
                    .with_capabilities(vec![
                        "code_generation".to_string(),
                        "problem_solving".to_string(),
                    ])
                    .with_complexity(1.2),
                Task::new(&format!("Test and verify the implementation for: {}", description))
                    .with_capabilities(vec!["testing".to_string(), "verification".to_string()])
                    .with_complexity(0.8),
            ]
        } else if RESEARCH_RE.is_match(description) {
            tlog_debug!("Decomposing as research request: {}", description);
            vec![
                Task::new(&format!("Search for information on: {}", description))
                    .with_capabilities(vec![
                        "search".to_string(),
                        "information_retrieval".to_string(),
                    ])
                    .with_complexity(0.9),
                Task::new(&format!("Analyze and summarize findings for: {}", description))
                    .with_capabilities(vec!["analysis".to_string(), "summarization".to_string()])
                    .with_complexity(0.8),
            ]
        } else if SYSTEM_RE.is_match(description) {
            tlog_debug!("Decomposing as system request: {}", description);
            vec![
                Task::new(&format!("Run system operations for: {}", description))
                    .with_capabilities(vec![
                        "system_operations".to_string(),
                        "file_management".to_string(),
                    ])
                    .with_complexity(0.7),
            ]
        } else {
            tlog_debug!("No category matched, single task: {}", description);
            vec![Task::new(description)
                .with_capabilities(vec!["general_processing".to_string()])]
        };

        for task in &mut subtasks {
            task.merge_context(context);
        }

        Ok(subtasks)
    }
}

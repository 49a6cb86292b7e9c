//! Response synthesis
//!
//! Merges tool invocations into one `Answer`. Results are ordered by registry
//! declaration order, only successes are cited, and failures become caveats.
//! The body comes from a deterministic template unless a `ProseWriter` is set, in
//! which case its output replaces the body and the template is the fallback.

mod prose;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RagsqlError;
use crate::question::Question;
use crate::tools::{
    Capability, PassageResult, TabularResult, ToolError, ToolInvocation, ToolRegistry, ToolResult,
};

pub use prose::{LlmProseWriter, ProseWriter};

pub const NO_DOCUMENT_CAVEAT: &str = "No matching document was found for this question.";
pub const NOT_UNDERSTOOD_CAVEAT: &str =
    "I couldn't understand the question well enough to query the database.";
const NO_ANSWER: &str = "I couldn't find an answer to that question.";
const NO_ROWS: &str = "No matching records were found in the database.";
/// Passages quoted in the answer text by default
pub const DEFAULT_PASSAGES_IN_TEXT: usize = 3;

/// The final answer to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Tools invoked, in registry order
    pub tools_used: Vec<String>,
    /// Locators cited, first occurrence order, no duplicates
    pub sources: Vec<String>,
    pub caveats: Vec<String>,
}

/// Name following a store cause, e.g. "birthday" from "no such column: birthday"
fn cause_detail(message: &str, cause: &str) -> String {
    let lower = message.to_lowercase();
    lower
        .find(cause)
        .and_then(|pos| message.get(pos + cause.len()..))
        .map(|rest| {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix("name").unwrap_or(rest);
            rest.trim_start_matches([':', ' '])
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .unwrap_or_default()
}

/// Caveat sentence for one failed invocation
pub fn caveat_for(err: &ToolError, capability: Capability) -> String {
    let label = capability.label();
    if !err.is_reportable() {
        return format!(
            "The {} capability is unavailable right now, so this answer may be incomplete.",
            label
        );
    }

    match err {
        ToolError::NoDocumentsIndexed => NO_DOCUMENT_CAVEAT.to_string(),
        ToolError::GenerationError(_) => NOT_UNDERSTOOD_CAVEAT.to_string(),
        ToolError::ExecutionError(msg) => {
            let cause = err.recognized_cause().unwrap_or_default();
            let detail = cause_detail(msg, cause);
            match cause {
                "no such column" => format!("I couldn't find that column in the database: {}", detail),
                "no such table" => format!("I couldn't find that table in the database: {}", detail),
                "ambiguous column" => format!(
                    "The question matched more than one column in the database: {}",
                    detail
                ),
                _ => format!("The database couldn't run the query it needed: {}", detail),
            }
        }
        ToolError::ToolTimeout(limit) => format!(
            "The {} took longer than {} ms and was skipped.",
            label,
            limit.as_millis()
        ),
        ToolError::Llm(_) => format!("The {} is busy right now; please try again shortly.", label),
        other => format!("The {} reported a problem: {}", label, other),
    }
}

fn join_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Render a fatal error as an apology naming what was unavailable
pub fn apology(err: &RagsqlError) -> String {
    match err {
        RagsqlError::AllToolsFailed(_) => {
            let caps = err.unavailable_capabilities();
            let labels: Vec<&str> = caps.iter().map(|c| c.label()).collect();
            let verb = if labels.len() == 1 { "is" } else { "are" };
            format!(
                "Sorry, I can't answer that right now because the {} {} unavailable.",
                join_and(&labels),
                verb
            )
        }
        RagsqlError::Cancelled => "The question was cancelled before an answer was ready.".to_string(),
        RagsqlError::InvalidQuestion(msg) => format!("Sorry, I couldn't read that question: {}.", msg),
        other => format!("Sorry, something went wrong while answering: {}", other),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(none)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_tabular(t: &TabularResult) -> String {
    if t.rows.is_empty() {
        return NO_ROWS.to_string();
    }

    let render_row = |row: &Vec<Value>| {
        t.columns
            .iter()
            .zip(row)
            .map(|(c, v)| format!("{}: {}", c, format_value(v)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = if t.rows.len() == 1 {
        render_row(&t.rows[0])
    } else {
        let lines: Vec<String> = t.rows.iter().map(|r| format!("- {}", render_row(r))).collect();
        format!("From the database:\n{}", lines.join("\n"))
    };
    if t.truncated {
        out.push_str(&format!("\n(Showing the first {} rows.)", t.rows.len()));
    }
    out
}

fn render_passages(p: &PassageResult, limit: usize) -> String {
    if p.passages.is_empty() {
        return NO_DOCUMENT_CAVEAT.to_string();
    }
    let lines: Vec<String> = p
        .passages
        .iter()
        .take(limit)
        .map(|p| format!("- {} [{}]", p.text.trim(), p.locator))
        .collect();
    format!("From the documents:\n{}", lines.join("\n"))
}

/// Merges invocations into answers
pub struct Synthesizer {
    registry: Arc<ToolRegistry>,
    prose: Option<Arc<dyn ProseWriter>>,
    passages_in_text: usize,
}

impl Synthesizer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            prose: None,
            passages_in_text: DEFAULT_PASSAGES_IN_TEXT,
        }
    }

    pub fn with_prose_writer(mut self, prose: Arc<dyn ProseWriter>) -> Self {
        self.prose = Some(prose);
        self
    }

    pub fn with_passages_in_text(mut self, n: usize) -> Self {
        self.passages_in_text = n.max(1);
        self
    }

    /// Order invocations by registry declaration; unknown ids go last
    fn ordered(&self, mut invocations: Vec<ToolInvocation>) -> Vec<ToolInvocation> {
        invocations.sort_by_key(|i| self.registry.position(&i.tool_id).unwrap_or(usize::MAX));
        invocations
    }

    /// Template answer; no I/O
    pub fn template(&self, invocations: Vec<ToolInvocation>) -> Answer {
        let invocations = self.ordered(invocations);

        let mut tools_used = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        let mut caveats: Vec<String> = Vec::new();
        let mut sections = Vec::new();

        for inv in &invocations {
            if !tools_used.contains(&inv.tool_id) {
                tools_used.push(inv.tool_id.clone());
            }
            match &inv.outcome {
                Ok(result) => {
                    for locator in result.locators() {
                        if !sources.contains(&locator) {
                            sources.push(locator);
                        }
                    }
                    sections.push(match result {
                        ToolResult::Tabular(t) => render_tabular(t),
                        ToolResult::Passages(p) => render_passages(p, self.passages_in_text),
                    });
                }
                Err(err) => {
                    let caveat = caveat_for(err, inv.input.capability());
                    if !caveats.contains(&caveat) {
                        caveats.push(caveat);
                    }
                }
            }
        }

        let text = if !sections.is_empty() {
            sections.join("\n\n")
        } else if !caveats.is_empty() {
            caveats.join(" ")
        } else {
            NO_ANSWER.to_string()
        };

        Answer {
            text,
            tools_used,
            sources,
            caveats,
        }
    }

    /// Merge invocations into an answer, using the prose writer when one is set
    pub async fn merge(&self, question: &Question, invocations: Vec<ToolInvocation>) -> Answer {
        let any_success = invocations.iter().any(|i| i.succeeded());
        let mut answer = self.template(invocations);

        if let (Some(prose), true) = (&self.prose, any_success) {
            match prose.write(question, &answer.text).await {
                Ok(text) if !text.is_empty() => answer.text = text,
                Ok(_) => log::warn!("{}: prose writer returned nothing, keeping template", question.id()),
                Err(e) => log::warn!("{}: prose writer failed, keeping template: {}", question.id(), e),
            }
        }

        answer
    }
}

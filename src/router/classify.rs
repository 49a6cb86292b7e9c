//! Rule-based question classification.
//!
//! Two tiers of signals decide which capabilities a question needs:
//! - strong: field-like terms and aggregate phrases (structured), policy and
//!   narrative terms (unstructured)
//! - weak, only without strong signals: a multi-word proper name (structured) or a
//!   narrative cue like "what is" (unstructured); the proper name wins
//!
//! With no signal at all the question goes to document search. Classification is a
//! pure function of the text and the policy.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RagsqlError, Result};
use crate::tools::Capability;

const STRONG_CONFIDENCE_BASE: f32 = 0.8;
const STRONG_CONFIDENCE_MAX: f32 = 0.95;
const WEAK_CONFIDENCE: f32 = 0.6;
const DEFAULT_CONFIDENCE: f32 = 0.3;

static PROPER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+\b").unwrap());

/// Capitalized words that start questions rather than names
const SENTENCE_STARTERS: &[&str] = &[
    "What", "Who", "Whom", "Whose", "Where", "When", "Why", "How", "Which", "Is", "Are", "Was", "Were", "Do",
    "Does", "Did", "Can", "Could", "Should", "Would", "Will", "Tell", "Show", "List", "Give", "Find", "Please",
    "The", "A", "An", "And", "Or", "In", "On", "For", "Of", "To",
];

/// How strongly the question pointed at its route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingTier {
    Strong,
    Weak,
    Default,
    Llm,
    /// Tools named by the caller
    Explicit,
}

impl fmt::Display for RoutingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutingTier::Strong => "strong",
            RoutingTier::Weak => "weak",
            RoutingTier::Default => "default",
            RoutingTier::Llm => "llm",
            RoutingTier::Explicit => "explicit",
        };
        write!(f, "{}", s)
    }
}

/// Term lists that define the classification boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPolicy {
    /// Column-like terms that point at a lookup (email, phone, ...)
    #[serde(rename = "field-terms")]
    pub field_terms: Vec<String>,

    /// Phrases asking for counts, statistics or listings
    #[serde(rename = "aggregate-phrases")]
    pub aggregate_phrases: Vec<String>,

    /// Terms that point at policy or narrative documents
    #[serde(rename = "policy-terms")]
    pub policy_terms: Vec<String>,

    /// Weak cues for a narrative answer
    #[serde(rename = "narrative-cues")]
    pub narrative_cues: Vec<String>,

    /// Treat multi-word capitalized names as a weak structured signal
    #[serde(rename = "detect-proper-names")]
    pub detect_proper_names: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            field_terms: strings(&[
                "email",
                "e-mail",
                "email address",
                "phone",
                "phone number",
                "address",
                "birthday",
                "birth date",
                "date of birth",
                "dob",
                "gpa",
                "grade",
                "grades",
                "price",
                "salary",
                "age",
                "zip code",
                "student id",
                "enrollment date",
            ]),
            aggregate_phrases: strings(&[
                "how many",
                "how much",
                "average",
                "count",
                "total number",
                "number of",
                "list all",
                "list every",
                "sum of",
                "maximum",
                "minimum",
                "highest",
                "lowest",
                "oldest",
                "youngest",
            ]),
            policy_terms: strings(&[
                "policy",
                "policies",
                "terms",
                "conditions",
                "procedure",
                "procedures",
                "guideline",
                "guidelines",
                "privacy",
                "explain",
                "describe",
                "rules",
                "regulations",
                "principles",
                "handbook",
                "code of conduct",
            ]),
            narrative_cues: strings(&[
                "what is",
                "what are",
                "tell me about",
                "how does",
                "how do",
                "why",
                "overview",
                "summarize",
            ]),
            detect_proper_names: true,
        }
    }
}

/// Signals found in one question
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub structured: Vec<String>,
    pub unstructured: Vec<String>,
    pub proper_names: Vec<String>,
    pub narrative: Vec<String>,
}

/// Capabilities chosen for a question and why
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub capabilities: Vec<Capability>,
    pub tier: RoutingTier,
    pub confidence: f32,
    pub rationale: String,
    pub signals: Signals,
}

/// Compiled routing policy
#[derive(Debug, Clone)]
pub struct Classifier {
    field: Option<Regex>,
    aggregate: Option<Regex>,
    policy: Option<Regex>,
    narrative: Option<Regex>,
    detect_proper_names: bool,
}

/// One case-insensitive, word-bounded alternation; None for an empty list
fn compile_terms(terms: &[String]) -> Result<Option<Regex>> {
    let mut alternatives: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    // longest first so "phone number" wins over "phone"
    alternatives.sort_by_key(|a| std::cmp::Reverse(a.len()));

    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| RagsqlError::Config(format!("invalid routing term list: {}", e)))
}

fn matches(re: &Option<Regex>, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    if let Some(re) = re {
        for m in re.find_iter(text) {
            let term = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
            if !found.contains(&term) {
                found.push(term);
            }
        }
    }
    found
}

/// Multi-word capitalized names, ignoring leading question words
pub fn proper_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for m in PROPER_NAME_RE.find_iter(text) {
        let words: Vec<&str> = m
            .as_str()
            .split_whitespace()
            .skip_while(|w| SENTENCE_STARTERS.contains(w))
            .collect();
        if words.len() >= 2 {
            let name = words.join(" ");
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn strong_confidence(hits: usize) -> f32 {
    (STRONG_CONFIDENCE_BASE + 0.05 * hits as f32).min(STRONG_CONFIDENCE_MAX)
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

impl Classifier {
    pub fn new(policy: &RoutingPolicy) -> Result<Self> {
        Ok(Self {
            field: compile_terms(&policy.field_terms)?,
            aggregate: compile_terms(&policy.aggregate_phrases)?,
            policy: compile_terms(&policy.policy_terms)?,
            narrative: compile_terms(&policy.narrative_cues)?,
            detect_proper_names: policy.detect_proper_names,
        })
    }

    /// Collect every signal in `text`
    pub fn signals(&self, text: &str) -> Signals {
        let mut structured = matches(&self.field, text);
        for term in matches(&self.aggregate, text) {
            if !structured.contains(&term) {
                structured.push(term);
            }
        }
        Signals {
            structured,
            unstructured: matches(&self.policy, text),
            proper_names: if self.detect_proper_names {
                proper_names(text)
            } else {
                Vec::new()
            },
            narrative: matches(&self.narrative, text),
        }
    }

    pub fn classify(&self, text: &str) -> Classification {
        let signals = self.signals(text);
        let has_structured = !signals.structured.is_empty();
        let has_unstructured = !signals.unstructured.is_empty();

        let (capabilities, tier, confidence, rationale) = if has_structured || has_unstructured {
            let mut caps = Vec::new();
            if has_structured {
                caps.push(Capability::Structured);
            }
            if has_unstructured {
                caps.push(Capability::Unstructured);
            }
            let rationale = format!(
                "strong structured signals: {}; strong unstructured signals: {}",
                list_or_none(&signals.structured),
                list_or_none(&signals.unstructured)
            );
            let hits = signals.structured.len() + signals.unstructured.len();
            (caps, RoutingTier::Strong, strong_confidence(hits), rationale)
        } else if !signals.proper_names.is_empty() {
            let rationale = format!("proper name: {}", signals.proper_names.join(", "));
            (vec![Capability::Structured], RoutingTier::Weak, WEAK_CONFIDENCE, rationale)
        } else if !signals.narrative.is_empty() {
            let rationale = format!("narrative cue: {}", signals.narrative.join(", "));
            (vec![Capability::Unstructured], RoutingTier::Weak, WEAK_CONFIDENCE, rationale)
        } else {
            (
                vec![Capability::Unstructured],
                RoutingTier::Default,
                DEFAULT_CONFIDENCE,
                "no routing signal; defaulting to document search".to_string(),
            )
        };

        Classification {
            capabilities,
            tier,
            confidence,
            rationale,
            signals,
        }
    }
}

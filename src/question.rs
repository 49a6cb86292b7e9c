//! Questions and the prior turns that travel with them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RagsqlError, Result};
use crate::id::generate_query_id;

/// A completed question/answer pair from earlier in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

/// An immutable natural-language question
#[derive(Debug, Clone)]
pub struct Question {
    id: String,
    text: String,
    context: Vec<Turn>,
}

impl Question {
    /// Create a question; blank text is rejected
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RagsqlError::InvalidQuestion("question text is empty".to_string()));
        }
        Ok(Self {
            id: generate_query_id(),
            text: trimmed.to_string(),
            context: Vec::new(),
        })
    }

    /// Attach prior turns, oldest first
    pub fn with_context(mut self, context: Vec<Turn>) -> Self {
        self.context = context;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn context(&self) -> &[Turn] {
        &self.context
    }

    /// Render the question for an LLM prompt, preceded by prior turns if any
    pub fn render_with_context(&self) -> String {
        if self.context.is_empty() {
            return self.text.clone();
        }

        let mut out = String::from("Previous conversation:\n");
        for turn in &self.context {
            out.push_str(&format!("Q: {}\nA: {}\n", turn.question, turn.answer));
        }
        out.push_str(&format!("\nCurrent question: {}", self.text));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_trims_text() {
        let q = Question::new("  What is the privacy policy?  ").unwrap();
        assert_eq!(q.text(), "What is the privacy policy?");
        assert!(q.context().is_empty());
        assert!(q.id().starts_with("q-"));
    }

    #[test]
    fn test_blank_question_rejected() {
        let err = Question::new("   ").unwrap_err();
        assert!(matches!(err, RagsqlError::InvalidQuestion(_)));
    }

    #[test]
    fn test_render_without_context() {
        let q = Question::new("How many students are there?").unwrap();
        assert_eq!(q.render_with_context(), "How many students are there?");
    }

    #[test]
    fn test_render_with_context() {
        let q = Question::new("And her phone?")
            .unwrap()
            .with_context(vec![Turn::new(
                "What is Paula Walker's email?",
                "paula@example.com",
            )]);

        let rendered = q.render_with_context();
        assert!(rendered.starts_with("Previous conversation:\n"));
        assert!(rendered.contains("Q: What is Paula Walker's email?\nA: paula@example.com\n"));
        assert!(rendered.ends_with("Current question: And her phone?"));
    }
}

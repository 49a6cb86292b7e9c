//! Document retrieval tool: question -> ranked passages

use std::sync::Arc;

use async_trait::async_trait;

use crate::index::{Embedder, VectorIndex};
use crate::question::Question;

use super::descriptor::DOCUMENT_TOOL_ID;
use super::error::ToolError;
use super::result::{PassageResult, ToolInput, ToolResult};
use super::QueryTool;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 50;

pub struct UnstructuredRetrievalTool {
    id: String,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl UnstructuredRetrievalTool {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            id: DOCUMENT_TOOL_ID.to_string(),
            embedder,
            index,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Passages requested per question
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Up to `top_k` passages with a positive score, best first; equal scores keep index order
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<PassageResult, ToolError> {
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(ToolError::InvalidParameter(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_TOP_K, top_k
            )));
        }
        if question.trim().is_empty() {
            return Err(ToolError::InvalidParameter("question is empty".to_string()));
        }
        if self.index.is_empty() {
            return Err(ToolError::NoDocumentsIndexed);
        }

        let embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| ToolError::Backend(e.to_string()))?;

        let mut passages = self
            .index
            .search(&embedding, top_k)
            .map_err(|e| ToolError::Backend(e.to_string()))?;
        passages.retain(|p| p.score > 0.0);
        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        passages.truncate(top_k);

        log::debug!("{}: {} passage(s) for top_k={}", self.id, passages.len(), top_k);
        Ok(PassageResult { passages })
    }
}

#[async_trait]
impl QueryTool for UnstructuredRetrievalTool {
    fn id(&self) -> &str {
        &self.id
    }

    fn prepare(&self, question: &Question) -> ToolInput {
        ToolInput::Unstructured {
            question: question.text().to_string(),
            top_k: self.top_k,
        }
    }

    async fn run(&self, input: &ToolInput) -> Result<ToolResult, ToolError> {
        match input {
            ToolInput::Unstructured { question, top_k } => {
                self.retrieve(question, *top_k).await.map(ToolResult::Passages)
            }
            other => Err(ToolError::InvalidParameter(format!(
                "{} expects unstructured input, got {:?}",
                self.id, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{HashingEmbedder, IndexError, InMemoryIndex, Passage};

    fn policy_index(embedder: &HashingEmbedder) -> InMemoryIndex {
        let mut index = InMemoryIndex::new(embedder.dimensions());
        for (text, locator) in [
            ("The privacy policy explains how personal data is stored.", "privacy.md#chunk-1"),
            ("Refunds follow the tuition refund procedure.", "refunds.md#chunk-1"),
            ("Library opening hours are posted weekly.", "library.txt#chunk-1"),
        ] {
            index.insert(text, locator, embedder.embed_text(text)).unwrap();
        }
        index
    }

    fn tool_with(index: InMemoryIndex) -> UnstructuredRetrievalTool {
        UnstructuredRetrievalTool::new(Arc::new(HashingEmbedder::default()), Arc::new(index))
    }

    #[tokio::test]
    async fn test_retrieve_ranks_relevant_first() {
        let tool = tool_with(policy_index(&HashingEmbedder::default()));
        let result = tool.retrieve("What is the privacy policy?", 2).await.unwrap();
        assert!(!result.passages.is_empty());
        assert_eq!(result.passages[0].locator, "privacy.md#chunk-1");
        assert!(result.passages.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(result.passages.iter().all(|p| p.score > 0.0));
    }

    struct FixedIndex(Vec<(&'static str, f32)>);

    impl VectorIndex for FixedIndex {
        fn search(&self, _embedding: &[f32], _top_k: usize) -> Result<Vec<Passage>, IndexError> {
            Ok(self
                .0
                .iter()
                .map(|(locator, score)| Passage {
                    text: String::new(),
                    locator: locator.to_string(),
                    score: *score,
                })
                .collect())
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    #[tokio::test]
    async fn test_unrelated_passages_are_dropped() {
        let index = FixedIndex(vec![("match", 0.4), ("orthogonal", 0.0), ("opposite", -0.3)]);
        let tool = UnstructuredRetrievalTool::new(Arc::new(HashingEmbedder::default()), Arc::new(index));
        let result = tool.retrieve("anything", 5).await.unwrap();
        let locators: Vec<_> = result.passages.iter().map(|p| p.locator.as_str()).collect();
        assert_eq!(locators, vec!["match"]);
    }

    #[tokio::test]
    async fn test_no_related_passage_is_empty_result() {
        let index = FixedIndex(vec![("orthogonal", 0.0), ("opposite", -0.3)]);
        let tool = UnstructuredRetrievalTool::new(Arc::new(HashingEmbedder::default()), Arc::new(index));
        let result = tool.retrieve("anything", 5).await.unwrap();
        assert!(result.passages.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_bounds() {
        let tool = tool_with(policy_index(&HashingEmbedder::default()));
        for bad in [0, 51] {
            let err = tool.retrieve("privacy", bad).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidParameter(_)), "top_k={}", bad);
        }
        assert!(tool.retrieve("privacy", 1).await.is_ok());
        assert!(tool.retrieve("privacy", 50).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_index() {
        let tool = tool_with(InMemoryIndex::new(256));
        let err = tool.retrieve("What is the privacy policy?", 5).await.unwrap_err();
        assert_eq!(err, ToolError::NoDocumentsIndexed);
        assert!(err.is_reportable());
    }

    struct UnsortedIndex;

    impl VectorIndex for UnsortedIndex {
        fn search(&self, _embedding: &[f32], _top_k: usize) -> Result<Vec<Passage>, IndexError> {
            let p = |locator: &str, score: f32| Passage {
                text: String::new(),
                locator: locator.to_string(),
                score,
            };
            Ok(vec![p("low", 0.1), p("tie-first", 0.5), p("high", 0.9), p("tie-second", 0.5)])
        }

        fn len(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn test_results_sorted_stably() {
        let tool = UnstructuredRetrievalTool::new(Arc::new(HashingEmbedder::default()), Arc::new(UnsortedIndex));
        let result = tool.retrieve("anything", 3).await.unwrap();
        let locators: Vec<_> = result.passages.iter().map(|p| p.locator.as_str()).collect();
        assert_eq!(locators, vec!["high", "tie-first", "tie-second"]);
    }

    #[tokio::test]
    async fn test_prepare_uses_default_top_k() {
        let tool = tool_with(InMemoryIndex::new(256)).with_top_k(7);
        let question = Question::new("Explain the refund procedure").unwrap();
        assert_eq!(
            tool.prepare(&question),
            ToolInput::Unstructured {
                question: "Explain the refund procedure".to_string(),
                top_k: 7,
            }
        );
    }
}

//! In-memory vector index with cosine similarity
//!
//! Built once during ingest, then shared read-only.

use super::{IndexError, Passage, VectorIndex, cosine_similarity};

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    locator: String,
    embedding: Vec<f32>,
}

/// Brute-force cosine index
#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    dims: usize,
    entries: Vec<Entry>,
}

impl InMemoryIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: Vec::new(),
        }
    }

    pub fn insert(
        &mut self,
        text: impl Into<String>,
        locator: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Result<(), IndexError> {
        if embedding.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: embedding.len(),
            });
        }
        self.entries.push(Entry {
            text: text.into(),
            locator: locator.into(),
            embedding,
        });
        Ok(())
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }
}

impl VectorIndex for InMemoryIndex {
    fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<Passage>, IndexError> {
        if embedding.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<Passage> = self
            .entries
            .iter()
            .map(|e| Passage {
                text: e.text.clone(),
                locator: e.locator.clone(),
                score: cosine_similarity(embedding, &e.embedding),
            })
            .collect();

        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> InMemoryIndex {
        let mut index = InMemoryIndex::new(2);
        index.insert("east", "a.txt#chunk-1", vec![1.0, 0.0]).unwrap();
        index.insert("north", "a.txt#chunk-2", vec![0.0, 1.0]).unwrap();
        index.insert("north-east", "b.txt#chunk-1", vec![1.0, 1.0]).unwrap();
        index.insert("also east", "b.txt#chunk-2", vec![2.0, 0.0]).unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_score() {
        let results = index().search(&[1.0, 0.1], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
        assert_eq!(results[2].locator, "b.txt#chunk-1");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let results = index().search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].locator, "a.txt#chunk-1");
        assert_eq!(results[1].locator, "b.txt#chunk-2");
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut idx = InMemoryIndex::new(2);
        assert!(idx.insert("x", "x", vec![1.0]).is_err());
        assert!(matches!(
            index().search(&[1.0, 0.0, 0.0], 1),
            Err(IndexError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_empty() {
        let idx = InMemoryIndex::new(4);
        assert!(idx.is_empty());
        assert!(idx.search(&[0.0; 4], 5).unwrap().is_empty());
    }
}

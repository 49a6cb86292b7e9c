//! Document ingest: load text files, chunk them, build the vector index

use std::path::{Path, PathBuf};

use crate::error::{RagsqlError, Result};
use crate::id::content_id;
use crate::index::{Embedder, InMemoryIndex, IndexError};

pub const DEFAULT_CHUNK_CHARS: usize = 1000;

const DOCUMENT_PATTERNS: &[&str] = &["*.txt", "*.md"];

/// A piece of a document with its locator
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// `file#chunk-N`, N from 1
    pub locator: String,
}

/// Document files directly under `dir`, sorted by name
pub fn document_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagsqlError::Storage(format!(
            "document directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for pattern in DOCUMENT_PATTERNS {
        let full = dir.join(pattern);
        let entries = glob::glob(&full.to_string_lossy())
            .map_err(|e| RagsqlError::Config(format!("bad document pattern: {}", e)))?;
        for entry in entries {
            let path = entry.map_err(|e| RagsqlError::Storage(e.to_string()))?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Split text into paragraph-aligned chunks of roughly `max_chars`
///
/// Paragraphs are merged until the next one would overflow; a single paragraph
/// longer than `max_chars` becomes its own chunk.
pub fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let text = text.replace("\r\n", "\n");
    let paragraphs = text
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// File contents as text; invalid UTF-8 is replaced rather than failing the load
fn read_text(path: &Path, name: &str) -> Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            log::warn!("{} is not valid UTF-8; undecodable bytes were replaced", name);
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Chunk every document under `dir`
pub fn load_directory(dir: &Path, chunk_chars: usize) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for path in document_files(dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let content = read_text(&path, &name)?;

        let pieces = split_paragraphs(&content, chunk_chars.max(1));
        log::debug!("{}: {} chunks", name, pieces.len());
        for (i, text) in pieces.into_iter().enumerate() {
            chunks.push(Chunk {
                id: content_id(&text),
                locator: format!("{}#chunk-{}", name, i + 1),
                text,
            });
        }
    }
    log::info!("loaded {} chunks from {}", chunks.len(), dir.display());
    Ok(chunks)
}

/// Embed chunks into a fresh index
pub async fn build_index(chunks: &[Chunk], embedder: &dyn Embedder) -> std::result::Result<InMemoryIndex, IndexError> {
    let mut index = InMemoryIndex::new(embedder.dimensions());
    if chunks.is_empty() {
        return Ok(index);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        index.insert(chunk.text.clone(), chunk.locator.clone(), embedding)?;
    }
    log::info!("indexed {} chunks with {}", chunks.len(), embedder.model_name());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{HashingEmbedder, VectorIndex};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_merges_short_paragraphs() {
        let text = "one\n\ntwo\n\nthree";
        assert_eq!(split_paragraphs(text, 100), vec!["one\n\ntwo\n\nthree"]);
        assert_eq!(split_paragraphs(text, 8), vec!["one\n\ntwo", "three"]);
    }

    #[test]
    fn test_split_keeps_long_paragraph_whole() {
        let long = "x".repeat(50);
        let chunks = split_paragraphs(&format!("short\n\n{}", long), 10);
        assert_eq!(chunks, vec!["short".to_string(), long]);
    }

    #[test]
    fn test_split_skips_blank() {
        assert!(split_paragraphs("\n\n  \n\n", 100).is_empty());
    }

    #[test]
    fn test_load_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("privacy.md"), "We keep data safe.\n\nWe never sell it.").unwrap();
        fs::write(dir.path().join("about.txt"), "Founded in 1901.").unwrap();
        fs::write(dir.path().join("data.csv"), "a,b").unwrap();

        let chunks = load_directory(dir.path(), 20).unwrap();
        let locators: Vec<_> = chunks.iter().map(|c| c.locator.as_str()).collect();
        assert_eq!(locators, vec!["about.txt#chunk-1", "privacy.md#chunk-1", "privacy.md#chunk-2"]);
        assert_eq!(chunks[2].text, "We never sell it.");
        assert_eq!(chunks[0].id.len(), 12);
    }

    #[test]
    fn test_split_handles_crlf() {
        let text = "one\r\n\r\ntwo\r\n\r\nthree";
        assert_eq!(split_paragraphs(text, 8), vec!["one\n\ntwo", "three"]);
    }

    #[test]
    fn test_load_directory_with_non_utf8_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("privacy.md"), "Privacy policy: records are never shared.").unwrap();
        fs::write(dir.path().join("legacy.txt"), [0x50, 0x6f, 0xe9, 0x20, 0xff]).unwrap();

        let chunks = load_directory(dir.path(), 100).unwrap();
        let locators: Vec<_> = chunks.iter().map(|c| c.locator.as_str()).collect();
        assert_eq!(locators, vec!["legacy.txt#chunk-1", "privacy.md#chunk-1"]);
        assert!(chunks[0].text.starts_with("Po"));
        assert!(chunks[0].text.contains('\u{FFFD}'));
        assert_eq!(chunks[1].text, "Privacy policy: records are never shared.");
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = load_directory(&dir.path().join("nope"), 100).unwrap_err();
        assert!(matches!(err, RagsqlError::Storage(_)));
    }

    #[tokio::test]
    async fn test_build_index() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("privacy.md"),
            "Our privacy policy protects student records.\n\nParking permits cost ten dollars.",
        )
        .unwrap();
        let chunks = load_directory(dir.path(), 10).unwrap();
        let embedder = HashingEmbedder::default();

        let index = build_index(&chunks, &embedder).await.unwrap();
        assert_eq!(index.len(), 2);

        let query = embedder.embed_text("privacy policy");
        let hits = index.search(&query, 1).unwrap();
        assert_eq!(hits[0].locator, "privacy.md#chunk-1");
    }

    #[tokio::test]
    async fn test_build_empty_index() {
        let index = build_index(&[], &HashingEmbedder::default()).await.unwrap();
        assert!(index.is_empty());
    }
}

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{FileReference, SourceFileEmbedding};

/// In-memory embedding store with disk persistence and cosine similarity
/// search. Rows are append-only; similarity queries are always scoped by
/// project id.
pub struct EmbeddingStore {
    entries: RwLock<Vec<SourceFileEmbedding>>,
    persist_path: PathBuf,
}

impl EmbeddingStore {
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let persist_path = dir.join("embeddings.json");

        let entries = if persist_path.exists() {
            let raw = std::fs::read_to_string(&persist_path)
                .context("Failed to read embedding store")?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    /// Append one row and flush. Each file of an indexing run lands through
    /// its own call so a write failure stays contained to that row.
    pub fn add_row(&self, row: SourceFileEmbedding) -> Result<()> {
        let mut entries = self.entries.write();
        entries.push(row);

        let raw = serde_json::to_string(&*entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &raw)?;
        std::fs::rename(&tmp_path, &self.persist_path)?;
        Ok(())
    }

    /// Cosine-similarity search over one project's rows. Results above
    /// `threshold` come back ordered by similarity descending, capped at
    /// `limit`. Rows of other projects are never considered.
    pub fn search(
        &self,
        project_id: Uuid,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Vec<FileReference> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &SourceFileEmbedding)> = entries
            .iter()
            .filter(|e| e.project_id == project_id)
            .map(|e| (cosine_similarity(query, &e.embedding), e))
            .filter(|(score, _)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| FileReference {
                file_path: e.file_path.clone(),
                source_code: e.source_code.clone(),
                summary: e.summary.clone(),
                similarity: score,
            })
            .collect()
    }

    pub fn count_for_project(&self, project_id: Uuid) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|e| e.project_id == project_id)
            .count()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Provenance attached to every stored chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message_ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata,
        }
    }
}

/// SQLite-backed chunk store with embedded vectors.
///
/// Vectors are stored as little-endian f32 blobs. The connection is behind
/// a mutex: ingestion and search are both short, coarse operations.
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id        TEXT PRIMARY KEY,
                content   TEXT NOT NULL,
                metadata  TEXT NOT NULL,
                embedding BLOB NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert(&self, document: &Document, embedding: &[f32]) -> Result<()> {
        let metadata = serde_json::to_string(&document.metadata)?;
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO documents (id, content, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                document.id,
                document.content,
                metadata,
                embedding_to_blob(embedding)
            ],
        )?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the `k` documents closest to the query vector by cosine
    /// similarity, best first.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(Document, f32)>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare("SELECT id, content, metadata, embedding FROM documents")?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let metadata: String = row.get(2)?;
            let blob: Vec<u8> = row.get(3)?;
            Ok((id, content, metadata, blob))
        })?;

        let mut scored: Vec<(Document, f32)> = Vec::new();
        for row in rows {
            let (id, content, metadata, blob) = row?;
            let metadata: DocumentMetadata = serde_json::from_str(&metadata)?;
            let embedding = blob_to_embedding(&blob);
            let score = cosine_similarity(query, &embedding);
            scored.push((
                Document {
                    id,
                    content,
                    metadata,
                },
                score,
            ));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> Document {
        Document::new(content, DocumentMetadata::default())
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn nearest_ranks_by_similarity() {
        let store = DocumentStore::open_in_memory().unwrap();
        store.insert(&doc("about cats"), &[1.0, 0.0]).unwrap();
        store.insert(&doc("about dogs"), &[0.0, 1.0]).unwrap();
        store.insert(&doc("about pets"), &[0.7, 0.7]).unwrap();

        let results = store.nearest(&[1.0, 0.1], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.content, "about cats");
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn embedding_blob_round_trip() {
        let embedding = vec![0.25f32, -1.5, 3.0];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn metadata_survives_storage() {
        let store = DocumentStore::open_in_memory().unwrap();
        let metadata = DocumentMetadata {
            permalink: Some("https://workspace.slack.com/p1".to_string()),
            channel: Some("social".to_string()),
            ..Default::default()
        };
        store
            .insert(&Document::new("text", metadata.clone()), &[1.0])
            .unwrap();

        let results = store.nearest(&[1.0], 1).unwrap();
        assert_eq!(results[0].0.metadata, metadata);
    }
}

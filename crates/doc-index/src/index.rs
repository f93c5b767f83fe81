use std::sync::Arc;

use agent_llm::EmbeddingProvider;
use tracing::debug;

use crate::chunker::{chunk_text, ChunkingConfig};
use crate::error::Result;
use crate::store::{Document, DocumentMetadata, DocumentStore};

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Embedding-backed similarity search over the document store.
pub struct SearchIndex {
    store: Arc<DocumentStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
}

impl SearchIndex {
    pub fn new(store: Arc<DocumentStore>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embeddings,
            chunking: ChunkingConfig::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Chunks a transcript, embeds every chunk and stores them with the
    /// shared metadata.
    pub async fn add_transcript(
        &self,
        transcript: &str,
        metadata: DocumentMetadata,
    ) -> Result<usize> {
        let chunks = chunk_text(transcript, &self.chunking);
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embeddings.embed(&chunks).await?;
        let stored = chunks.len().min(vectors.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            self.store
                .insert(&Document::new(chunk, metadata.clone()), &vector)?;
        }

        debug!("Indexed {} chunks", stored);
        Ok(stored)
    }

    /// Ranked similarity search with source metadata attached.
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let vectors = self.embeddings.embed(&[query.to_string()]).await?;
        let Some(query_vector) = vectors.into_iter().next() else {
            return Ok(Vec::new());
        };

        Ok(self
            .store
            .nearest(&query_vector, k)?
            .into_iter()
            .map(|(document, score)| ScoredDocument { document, score })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_llm::LLMError;
    use async_trait::async_trait;

    /// Embeds each text as a unit vector keyed by its first word.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, LLMError> {
            Ok(texts
                .iter()
                .map(|text| {
                    if text.contains("cats") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn search_returns_closest_transcript() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let index = SearchIndex::new(store, Arc::new(KeywordEmbedder));

        index
            .add_transcript("talk about cats", DocumentMetadata::default())
            .await
            .unwrap();
        index
            .add_transcript("talk about weather", DocumentMetadata::default())
            .await
            .unwrap();

        let results = index.similarity_search("cats please", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].document.content.contains("cats"));
    }

    #[tokio::test]
    async fn empty_transcript_indexes_nothing() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let index = SearchIndex::new(store, Arc::new(KeywordEmbedder));

        let stored = index
            .add_transcript("", DocumentMetadata::default())
            .await
            .unwrap();
        assert_eq!(stored, 0);
    }
}

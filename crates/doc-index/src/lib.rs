//! Semantic document index over Slack history.
//!
//! Chunks transcripts, embeds them through the configured embedding
//! backend and stores chunk text, metadata and vector in SQLite. Search is
//! cosine similarity over the stored vectors.

pub mod checkpoint;
pub mod chunker;
pub mod error;
pub mod index;
pub mod store;

pub use checkpoint::IngestCheckpoint;
pub use chunker::{chunk_text, ChunkingConfig};
pub use error::{IndexError, Result};
pub use index::{ScoredDocument, SearchIndex};
pub use store::{Document, DocumentMetadata, DocumentStore};

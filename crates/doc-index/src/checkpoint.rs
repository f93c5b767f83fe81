//! Ingestion high-water mark.
//!
//! Remembers the newest message timestamp already indexed so repeated
//! ingestion runs only process new history.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize, Default)]
struct CheckpointFile {
    last_ts: f64,
}

pub struct IngestCheckpoint {
    path: PathBuf,
    last_ts: f64,
}

impl IngestCheckpoint {
    /// Loads the checkpoint, starting from zero if the file is missing or
    /// unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let last_ts = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CheckpointFile>(&content) {
                Ok(file) => file.last_ts,
                Err(e) => {
                    warn!("Ignoring corrupt checkpoint {}: {}", path.display(), e);
                    0.0
                }
            },
            Err(_) => 0.0,
        };
        Self { path, last_ts }
    }

    pub fn last_ts(&self) -> f64 {
        self.last_ts
    }

    /// Records a processed message timestamp, keeping the maximum.
    pub fn observe(&mut self, ts: f64) {
        if ts > self.last_ts {
            self.last_ts = ts;
        }
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string(&CheckpointFile {
            last_ts: self.last_ts,
        })?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

//! Windowed text chunking.
//!
//! Splits a transcript into overlapping character windows, preferring to
//! break on line boundaries so messages stay whole where possible.

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= config.chunk_size {
        return vec![text.to_string()];
    }

    let step = config.chunk_size.saturating_sub(config.chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + config.chunk_size).min(chars.len());
        // Prefer the last newline inside the window, unless it would make
        // the chunk degenerate.
        let end = if hard_end < chars.len() {
            chars[start..hard_end]
                .iter()
                .rposition(|&c| c == '\n')
                .filter(|&pos| pos > config.chunk_size / 2)
                .map(|pos| start + pos + 1)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };

        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }

        if end >= chars.len() {
            break;
        }
        start += step.min(end - start);
    }

    chunks
}

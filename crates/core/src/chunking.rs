use crate::error::RagError;
use crate::models::{Chunk, RagOptions};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub window_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: 180,
            overlap: 30,
        }
    }
}

impl From<&RagOptions> for ChunkingConfig {
    fn from(value: &RagOptions) -> Self {
        Self {
            window_size: value.window_size,
            overlap: value.overlap,
        }
    }
}

impl ChunkingConfig {
    /// Distance in words between the starts of consecutive windows.
    pub fn stride(&self) -> Result<usize, RagError> {
        if self.window_size == 0 {
            return Err(RagError::InvalidChunkConfig(
                "window size must be at least one word".to_string(),
            ));
        }
        if self.overlap >= self.window_size {
            return Err(RagError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than window size {}",
                self.overlap, self.window_size
            )));
        }
        Ok(self.window_size - self.overlap)
    }
}

pub fn normalize_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let cleaned = raw.replace('\r', " ").replace('\u{a0}', " ");
    cleaned
        .lines()
        .map(str::trim)
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn chunk_pages<S: AsRef<str>>(
    pages: &[S],
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, RagError> {
    let stride = config.stride()?;
    let mut chunks = Vec::new();

    for (page_index, page) in pages.iter().enumerate() {
        let words: Vec<&str> = page.as_ref().split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        let page_number = (page_index + 1) as u32;
        let mut start = 0;
        while start < words.len() {
            let end = (start + config.window_size).min(words.len());
            let window = &words[start..end];
            let text = window.join(" ");
            if !text.is_empty() {
                chunks.push(Chunk {
                    id: chunks.len(),
                    page: page_number,
                    char_count: text.chars().count(),
                    word_count: window.len(),
                    text,
                });
            }

            // The window that reaches the last word is the final one for the page.
            if end == words.len() {
                break;
            }
            start += stride;
        }
    }

    debug!(
        pages = pages.len(),
        chunks = chunks.len(),
        window_size = config.window_size,
        overlap = config.overlap,
        "chunked pages"
    );
    Ok(chunks)
}

use crate::error::IngestError;
use crate::models::{GuidelineChunk, PageText};
use regex::Regex;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub window_words: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: 800,
            overlap_words: 100,
        }
    }
}

impl ChunkingConfig {
    /// An overlap at or above the window size would stall the window advance,
    /// so it is rejected before any processing starts.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.window_words == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "window size must be at least one word".to_string(),
            ));
        }
        if self.overlap_words >= self.window_words {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap of {} words must be smaller than the window of {} words",
                self.overlap_words, self.window_words
            )));
        }
        Ok(())
    }
}

pub struct Chunker {
    config: ChunkingConfig,
    numbered_heading: Regex,
    all_caps_heading: Regex,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            config,
            numbered_heading: Regex::new(r"^\d+\.?\s+[A-Z][^.]*$")?,
            all_caps_heading: Regex::new(r"^[A-Z][A-Z\s]{10,}$")?,
        })
    }

    /// Splits each page into overlapping word windows. Chunks never span
    /// pages, and the chunk index restarts at 0 on every page.
    pub fn chunk_pages(&self, document_id: &str, pages: &[PageText]) -> Vec<GuidelineChunk> {
        let mut chunks = Vec::new();
        for page in pages {
            self.chunk_page(document_id, page, &mut chunks);
        }
        chunks
    }

    fn chunk_page(&self, document_id: &str, page: &PageText, chunks: &mut Vec<GuidelineChunk>) {
        let words: Vec<&str> = page.text.split_whitespace().collect();
        let window = self.config.window_words;
        let step = window - self.config.overlap_words;

        let mut start = 0usize;
        let mut chunk_index = 0usize;
        while start < words.len() {
            let end = (start + window).min(words.len());
            let text = words[start..end].join(" ");
            let section_title = self.section_title(&text);

            chunks.push(GuidelineChunk {
                chunk_id: format!(
                    "{document_id}_page{}_chunk{chunk_index}",
                    page.page_number
                ),
                document_id: document_id.to_string(),
                page_number: page.page_number,
                chunk_index,
                word_count: end - start,
                char_count: text.chars().count(),
                text,
                section_title,
            });

            // The final partial window is emitted as-is, never padded.
            if end >= words.len() {
                break;
            }
            start += step;
            chunk_index += 1;
        }
    }

    /// Inspects the first three lines of a chunk for a numbered heading or a
    /// long all-caps run. Falls back to "General".
    fn section_title(&self, text: &str) -> String {
        for line in text.lines().take(3) {
            let line = line.trim();
            if self.numbered_heading.is_match(line) || self.all_caps_heading.is_match(line) {
                return line.to_string();
            }
        }
        "General".to_string()
    }
}

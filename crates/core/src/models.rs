use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of extracted guideline text, as produced by the extraction step.
#[derive(Debug, Clone)]
pub struct PageText {
    pub document_id: String,
    pub page_number: u32,
    pub text: String,
    pub word_count: usize,
}

/// A fixed-size overlapping slice of a single page's text, the unit of
/// retrieval. Immutable once created; its position in the chunk collection
/// is the ordinal used to correlate it with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidelineChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub page_number: u32,
    pub chunk_index: usize,
    pub text: String,
    pub section_title: String,
    pub word_count: usize,
    pub char_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub source_filename: String,
    pub checksum: String,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub processed_timestamp: DateTime<Utc>,
}

/// A scored copy of a chunk returned from a search. Derived and ephemeral;
/// the stored chunk itself is never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub chunk: GuidelineChunk,
    pub similarity_score: f32,
    pub relevance_score: f32,
    pub rank: usize,
    pub highlighted_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub expand: bool,
    /// Case-insensitive substring match against the candidate's document id.
    pub filter_document: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            expand: true,
            filter_document: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionCount {
    pub section_title: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub source_filename: String,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub sections: Vec<SectionCount>,
    pub processed_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentGroup {
    pub document_id: String,
    pub results: Vec<SearchHit>,
}

/// Response shape for clinical-question search: recognized terms plus hits
/// grouped per document in first-seen order.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicalAnswer {
    pub question: String,
    pub medical_terms: Vec<String>,
    pub total_results: usize,
    pub results_by_document: Vec<DocumentGroup>,
    pub all_results: Vec<SearchHit>,
}

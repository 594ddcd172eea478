use crate::artifacts::{load_artifacts, LoadedCorpus};
use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::expand::QueryExpander;
use crate::index::{AnnIndex, AnnIndexConfig};
use crate::models::{
    ClinicalAnswer, DocumentMetadata, DocumentSummary, GuidelineChunk, SearchHit, SearchOptions,
    SectionCount,
};
use crate::present::group_hits_by_document;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// Over-fetch factor: the index is asked for three times the requested
/// result count so post-filtering can drop candidates without a second
/// round-trip.
pub const CANDIDATE_FACTOR: usize = 3;

const MIN_HIGHLIGHT_TERM_CHARS: usize = 2;

/// Everything a query needs, loaded once and read-only afterwards. Passed
/// explicitly so several independent corpora can coexist in one process.
pub struct SearchContext {
    chunks: Vec<GuidelineChunk>,
    metadata: HashMap<String, DocumentMetadata>,
    index: AnnIndex,
    embedder: Box<dyn Embedder + Send + Sync>,
    expander: QueryExpander,
}

impl SearchContext {
    pub fn new(
        chunks: Vec<GuidelineChunk>,
        metadata: HashMap<String, DocumentMetadata>,
        index: AnnIndex,
        embedder: Box<dyn Embedder + Send + Sync>,
        expander: QueryExpander,
    ) -> Result<Self, SearchError> {
        if index.len() != chunks.len() {
            return Err(SearchError::Index(format!(
                "index holds {} vectors but the chunk collection has {}",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            chunks,
            metadata,
            index,
            embedder,
            expander,
        })
    }

    /// Loads the persisted artifact unit from `dir`.
    pub fn load(
        dir: &Path,
        embedder: Box<dyn Embedder + Send + Sync>,
        config: AnnIndexConfig,
    ) -> Result<Self, SearchError> {
        let LoadedCorpus {
            chunks,
            metadata,
            index,
        } = load_artifacts(dir, embedder.dimensions(), config)?;

        tracing::info!(
            chunks = chunks.len(),
            documents = metadata.len(),
            vectors = index.len(),
            "search context loaded"
        );

        Self::new(chunks, metadata, index, embedder, QueryExpander::default())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.metadata.len()
    }

    pub fn index_size(&self) -> usize {
        self.index.len()
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentMetadata> {
        self.metadata.values()
    }

    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let search_query = if options.expand {
            self.expander.expand(query)
        } else {
            query.to_string()
        };
        let query_vector = self.embedder.embed(&search_query)?;

        let fetch = (options.top_k * CANDIDATE_FACTOR).min(self.chunks.len());
        let candidates = self.index.query(&query_vector, fetch)?;

        let filter_lower = options
            .filter_document
            .as_ref()
            .map(|filter| filter.to_lowercase());

        let mut results = Vec::new();
        for candidate in candidates {
            let Some(chunk) = self.chunks.get(candidate.ordinal) else {
                continue;
            };
            if let Some(filter) = &filter_lower {
                if !chunk.document_id.to_lowercase().contains(filter) {
                    continue;
                }
            }

            // Highlighting uses the terms the caller actually typed, not the
            // expanded query.
            let highlighted = highlight_query_terms(&chunk.text, query);
            results.push(SearchHit {
                chunk: chunk.clone(),
                similarity_score: candidate.distance,
                relevance_score: relevance_from_distance(candidate.distance),
                rank: results.len() + 1,
                highlighted_text: Some(highlighted),
            });

            if results.len() >= options.top_k {
                break;
            }
        }

        Ok(results)
    }

    pub fn search_by_document(
        &self,
        document_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.search(
            query,
            &SearchOptions {
                top_k,
                expand: true,
                filter_document: Some(document_id.to_string()),
            },
        )
    }

    /// Chunks most similar to an existing chunk. The originating chunk is
    /// excluded by ordinal, never by text equality, since duplicate text
    /// across chunks is legal. An unknown id means "nothing found".
    pub fn find_similar(&self, chunk_id: &str, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        let Some((target_ordinal, target)) = self
            .chunks
            .iter()
            .enumerate()
            .find(|(_, chunk)| chunk.chunk_id == chunk_id)
        else {
            return Ok(Vec::new());
        };

        let vector = self.embedder.embed(&target.text)?;
        let candidates = self.index.query(&vector, top_k + 1)?;

        let mut results = Vec::new();
        for candidate in candidates {
            if candidate.ordinal == target_ordinal {
                continue;
            }
            let Some(chunk) = self.chunks.get(candidate.ordinal) else {
                continue;
            };
            results.push(SearchHit {
                chunk: chunk.clone(),
                similarity_score: candidate.distance,
                relevance_score: relevance_from_distance(candidate.distance),
                rank: results.len() + 1,
                highlighted_text: None,
            });
        }

        results.truncate(top_k);
        Ok(results)
    }

    pub fn document_summary(&self, document_id: &str) -> Option<DocumentSummary> {
        let meta = self.metadata.get(document_id)?;

        let mut sections: Vec<SectionCount> = Vec::new();
        for chunk in self
            .chunks
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
        {
            match sections
                .iter_mut()
                .find(|section| section.section_title == chunk.section_title)
            {
                Some(section) => section.chunks += 1,
                None => sections.push(SectionCount {
                    section_title: chunk.section_title.clone(),
                    chunks: 1,
                }),
            }
        }

        Some(DocumentSummary {
            document_id: meta.document_id.clone(),
            source_filename: meta.source_filename.clone(),
            total_pages: meta.total_pages,
            total_chunks: meta.total_chunks,
            sections,
            processed_timestamp: meta.processed_timestamp,
        })
    }

    /// Search tuned for clinical questions: recognized medical terms plus
    /// hits grouped per document.
    pub fn clinical_question_search(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<ClinicalAnswer, SearchError> {
        let medical_terms = self.expander.extract_terms(question);
        let results = self.search(
            question,
            &SearchOptions {
                top_k,
                expand: true,
                filter_document: None,
            },
        )?;

        Ok(ClinicalAnswer {
            question: question.to_string(),
            medical_terms,
            total_results: results.len(),
            results_by_document: group_hits_by_document(&results),
            all_results: results,
        })
    }
}

/// Maps raw cosine distance to a bounded relevance score. Distances beyond
/// the nominal [0, 2] band clamp instead of escaping the [0, 1] range.
pub fn relevance_from_distance(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Wraps every query term longer than two characters in `**...**`,
/// case-insensitively, uppercasing the term as the visual marker.
pub fn highlight_query_terms(text: &str, query: &str) -> String {
    let mut highlighted = text.to_string();
    for term in query.to_lowercase().split_whitespace() {
        if term.chars().count() <= MIN_HIGHLIGHT_TERM_CHARS {
            continue;
        }
        let Ok(pattern) = Regex::new(&format!("(?i){}", regex::escape(term))) else {
            continue;
        };
        let marker = format!("**{}**", term.to_uppercase());
        highlighted = pattern
            .replace_all(&highlighted, regex::NoExpand(&marker))
            .into_owned();
    }
    highlighted
}

#[cfg(test)]
mod tests {
    use super::{highlight_query_terms, relevance_from_distance, SearchContext};
    use crate::embeddings::{CharacterNgramEmbedder, Embedder};
    use crate::expand::QueryExpander;
    use crate::index::{AnnIndex, AnnIndexConfig};
    use crate::models::{DocumentMetadata, GuidelineChunk, SearchOptions};
    use std::collections::HashMap;

    const DIMS: usize = 64;

    fn chunk(document_id: &str, page: u32, index: usize, text: &str) -> GuidelineChunk {
        GuidelineChunk {
            chunk_id: format!("{document_id}_page{page}_chunk{index}"),
            document_id: document_id.to_string(),
            page_number: page,
            chunk_index: index,
            text: text.to_string(),
            section_title: "General".to_string(),
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
        }
    }

    fn context(chunks: Vec<GuidelineChunk>) -> SearchContext {
        let embedder = CharacterNgramEmbedder { dimensions: DIMS };
        let embeddings: Vec<Vec<f32>> = chunks
            .iter()
            .map(|chunk| embedder.embed(&chunk.text).unwrap())
            .collect();
        let index = AnnIndex::build(DIMS, AnnIndexConfig::default(), &embeddings).unwrap();

        let mut metadata = HashMap::new();
        for chunk in &chunks {
            metadata
                .entry(chunk.document_id.clone())
                .or_insert_with(|| DocumentMetadata {
                    document_id: chunk.document_id.clone(),
                    source_filename: format!("{}.pdf", chunk.document_id),
                    checksum: "checksum".to_string(),
                    total_pages: 1,
                    total_chunks: 0,
                    processed_timestamp: chrono::Utc::now(),
                });
        }
        for meta in metadata.values_mut() {
            meta.total_chunks = chunks
                .iter()
                .filter(|chunk| chunk.document_id == meta.document_id)
                .count();
        }

        SearchContext::new(
            chunks,
            metadata,
            index,
            Box::new(embedder),
            QueryExpander::default(),
        )
        .unwrap()
    }

    fn corpus() -> SearchContext {
        context(vec![
            chunk(
                "Hypertension_2024",
                1,
                0,
                "blood pressure targets for adults with hypertension",
            ),
            chunk(
                "Hypertension_2024",
                2,
                0,
                "lifestyle interventions reduce elevated blood pressure",
            ),
            chunk(
                "Heart_Failure_2023",
                1,
                0,
                "beta blockers improve outcomes in chronic heart failure",
            ),
            chunk(
                "Heart_Failure_2023",
                1,
                1,
                "diuretics relieve congestion in acute heart failure",
            ),
        ])
    }

    #[test]
    fn search_honors_top_k_and_ranks_from_one() {
        let context = corpus();
        let results = context
            .search("blood pressure", &SearchOptions::default())
            .unwrap();

        assert!(results.len() <= 10);
        assert!(!results.is_empty());
        for (position, hit) in results.iter().enumerate() {
            assert_eq!(hit.rank, position + 1);
        }
    }

    #[test]
    fn search_for_chunk_text_returns_that_chunk_first() {
        let context = corpus();
        let results = context
            .search(
                "beta blockers improve outcomes in chronic heart failure",
                &SearchOptions {
                    top_k: 2,
                    expand: false,
                    filter_document: None,
                },
            )
            .unwrap();

        assert_eq!(results[0].chunk.chunk_id, "Heart_Failure_2023_page1_chunk0");
        assert!(results[0].relevance_score > 0.9);
    }

    #[test]
    fn relevance_scores_stay_in_unit_range() {
        let context = corpus();
        let results = context
            .search("anticoagulation", &SearchOptions::default())
            .unwrap();

        for hit in results {
            assert!((0.0..=1.0).contains(&hit.relevance_score));
        }
    }

    #[test]
    fn document_filter_excludes_other_documents() {
        let context = corpus();
        let results = context
            .search(
                "blood pressure",
                &SearchOptions {
                    top_k: 10,
                    expand: true,
                    filter_document: Some("heart_failure".to_string()),
                },
            )
            .unwrap();

        assert!(!results.is_empty());
        for hit in &results {
            assert_eq!(hit.chunk.document_id, "Heart_Failure_2023");
        }
    }

    #[test]
    fn search_by_document_scopes_results() {
        let context = corpus();
        let results = context
            .search_by_document("Hypertension", "treatment", 10)
            .unwrap();

        for hit in &results {
            assert_eq!(hit.chunk.document_id, "Hypertension_2024");
        }
    }

    #[test]
    fn find_similar_never_returns_the_origin_chunk() {
        let context = corpus();
        let results = context
            .find_similar("Hypertension_2024_page1_chunk0", 3)
            .unwrap();

        assert!(!results.is_empty());
        for hit in &results {
            assert_ne!(hit.chunk.chunk_id, "Hypertension_2024_page1_chunk0");
        }
    }

    #[test]
    fn find_similar_with_unknown_id_is_empty_not_an_error() {
        let context = corpus();
        let results = context.find_similar("nope_page9_chunk9", 3).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn empty_corpus_search_is_empty_not_an_error() {
        let context = context(Vec::new());
        let results = context
            .search("anything", &SearchOptions::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn document_summary_counts_sections_and_unknown_is_none() {
        let context = corpus();
        let summary = context.document_summary("Hypertension_2024").unwrap();

        assert_eq!(summary.total_chunks, 2);
        assert_eq!(summary.sections.len(), 1);
        assert_eq!(summary.sections[0].section_title, "General");
        assert_eq!(summary.sections[0].chunks, 2);

        assert!(context.document_summary("missing").is_none());
    }

    #[test]
    fn clinical_search_extracts_terms_and_groups_by_document() {
        let context = corpus();
        let answer = context
            .clinical_question_search("hypertension and heart failure treatment", 4)
            .unwrap();

        assert_eq!(
            answer.medical_terms,
            vec!["hypertension".to_string(), "heart failure".to_string()]
        );
        assert_eq!(answer.total_results, answer.all_results.len());

        let grouped: usize = answer
            .results_by_document
            .iter()
            .map(|group| group.results.len())
            .sum();
        assert_eq!(grouped, answer.all_results.len());
    }

    #[test]
    fn relevance_clamps_at_both_ends() {
        assert_eq!(relevance_from_distance(-0.5), 1.0);
        assert_eq!(relevance_from_distance(0.25), 0.75);
        assert_eq!(relevance_from_distance(3.0), 0.0);
    }

    #[test]
    fn highlighting_wraps_long_terms_case_insensitively() {
        let highlighted = highlight_query_terms(
            "Beta blockers and beta agonists",
            "beta therapy",
        );
        assert_eq!(
            highlighted,
            "**BETA** blockers and **BETA** agonists"
        );
    }

    #[test]
    fn short_terms_are_not_highlighted() {
        let highlighted = highlight_query_terms("an ace inhibitor", "an ace");
        assert_eq!(highlighted, "an **ACE** inhibitor");
    }
}

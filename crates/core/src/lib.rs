pub mod artifacts;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod expand;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod present;
pub mod retrieval;

pub use artifacts::{
    load_artifacts, save_artifacts, ArtifactPaths, LoadedCorpus, CHUNKS_FILE, INDEX_FILE,
    METADATA_FILE,
};
pub use chunking::{Chunker, ChunkingConfig};
pub use embeddings::{
    embed_corpus, CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    EMBEDDING_BATCH_SIZE,
};
pub use error::{IngestError, SearchError};
pub use expand::{QueryExpander, SynonymEntry};
pub use extractor::{document_id_from_path, LopdfExtractor, PdfExtractor};
pub use index::{build_index, AnnIndex, AnnIndexConfig, ScoredOrdinal};
pub use ingest::{
    build_corpus, digest_file, discover_pdf_files, BuildOptions, BuildReport, SkippedDocument,
};
pub use models::{
    ClinicalAnswer, DocumentGroup, DocumentMetadata, DocumentSummary, GuidelineChunk, PageText,
    SearchHit, SearchOptions, SectionCount,
};
pub use normalize::TextNormalizer;
pub use present::{
    excerpt, format_clinical_answer, format_search_results, group_hits_by_document,
    DETAIL_EXCERPT_CHARS, GENERIC_EXCERPT_CHARS,
};
pub use retrieval::{
    highlight_query_terms, relevance_from_distance, SearchContext, CANDIDATE_FACTOR,
};

use crate::error::{IngestError, SearchError};
use crate::index::{AnnIndex, AnnIndexConfig};
use crate::models::{DocumentMetadata, GuidelineChunk};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CHUNKS_FILE: &str = "chunks.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const INDEX_FILE: &str = "vector_index.usearch";

/// The three co-located files forming one logical unit. They share a
/// chunk-ordinal correlation and are only ever valid together.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub chunks: PathBuf,
    pub metadata: PathBuf,
    pub index: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            chunks: dir.join(CHUNKS_FILE),
            metadata: dir.join(METADATA_FILE),
            index: dir.join(INDEX_FILE),
        }
    }
}

/// Writes all three artifacts, staging each to a temp file first so an
/// interrupted build never leaves a partially replaced unit behind.
pub fn save_artifacts(
    dir: &Path,
    chunks: &[GuidelineChunk],
    metadata: &HashMap<String, DocumentMetadata>,
    index: &AnnIndex,
) -> Result<(), IngestError> {
    fs::create_dir_all(dir)?;
    let paths = ArtifactPaths::new(dir);

    let chunks_tmp = staging_path(&paths.chunks);
    let metadata_tmp = staging_path(&paths.metadata);
    let index_tmp = staging_path(&paths.index);

    fs::write(&chunks_tmp, serde_json::to_vec_pretty(chunks)?)?;
    fs::write(&metadata_tmp, serde_json::to_vec_pretty(metadata)?)?;
    index.save(&index_tmp)?;

    fs::rename(&chunks_tmp, &paths.chunks)?;
    fs::rename(&metadata_tmp, &paths.metadata)?;
    fs::rename(&index_tmp, &paths.index)?;

    tracing::info!(
        dir = %dir.display(),
        chunks = chunks.len(),
        documents = metadata.len(),
        "persisted corpus artifacts"
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

pub struct LoadedCorpus {
    pub chunks: Vec<GuidelineChunk>,
    pub metadata: HashMap<String, DocumentMetadata>,
    pub index: AnnIndex,
}

/// Loads the artifact unit. Any absent or unreadable file is fatal; serving
/// with a partial set would silently return wrong or empty results.
pub fn load_artifacts(
    dir: &Path,
    dimensions: usize,
    config: AnnIndexConfig,
) -> Result<LoadedCorpus, SearchError> {
    let paths = ArtifactPaths::new(dir);

    let chunks: Vec<GuidelineChunk> =
        serde_json::from_slice(&read_artifact(&paths.chunks, CHUNKS_FILE)?)?;
    let metadata: HashMap<String, DocumentMetadata> =
        serde_json::from_slice(&read_artifact(&paths.metadata, METADATA_FILE)?)?;

    if !paths.index.is_file() {
        return Err(SearchError::MissingArtifact {
            name: INDEX_FILE,
            path: paths.index.display().to_string(),
        });
    }
    let index = AnnIndex::load(&paths.index, dimensions, config)?;

    if index.len() != chunks.len() {
        return Err(SearchError::Index(format!(
            "index holds {} vectors but the chunk collection has {}",
            index.len(),
            chunks.len()
        )));
    }

    Ok(LoadedCorpus {
        chunks,
        metadata,
        index,
    })
}

fn read_artifact(path: &Path, name: &'static str) -> Result<Vec<u8>, SearchError> {
    fs::read(path).map_err(|_| SearchError::MissingArtifact {
        name,
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{load_artifacts, save_artifacts, ArtifactPaths, METADATA_FILE};
    use crate::error::SearchError;
    use crate::index::{AnnIndex, AnnIndexConfig};
    use crate::models::{DocumentMetadata, GuidelineChunk};
    use std::collections::HashMap;

    fn chunk(id: &str, hot: usize) -> (GuidelineChunk, Vec<f32>) {
        let mut vector = vec![0f32; 8];
        vector[hot] = 1.0;
        (
            GuidelineChunk {
                chunk_id: id.to_string(),
                document_id: "doc".to_string(),
                page_number: 1,
                chunk_index: hot,
                text: format!("chunk {id}"),
                section_title: "General".to_string(),
                word_count: 2,
                char_count: 8,
            },
            vector,
        )
    }

    fn metadata() -> HashMap<String, DocumentMetadata> {
        let mut map = HashMap::new();
        map.insert(
            "doc".to_string(),
            DocumentMetadata {
                document_id: "doc".to_string(),
                source_filename: "doc.pdf".to_string(),
                checksum: "abc123".to_string(),
                total_pages: 1,
                total_chunks: 2,
                processed_timestamp: chrono::Utc::now(),
            },
        );
        map
    }

    #[test]
    fn artifacts_round_trip_preserves_ordinal_correlation() {
        let dir = tempfile::tempdir().unwrap();
        let (chunk_a, vector_a) = chunk("a", 0);
        let (chunk_b, vector_b) = chunk("b", 5);
        let chunks = vec![chunk_a, chunk_b];
        let vectors = vec![vector_a, vector_b.clone()];
        let index = AnnIndex::build(8, AnnIndexConfig::default(), &vectors).unwrap();

        save_artifacts(dir.path(), &chunks, &metadata(), &index).unwrap();
        let loaded = load_artifacts(dir.path(), 8, AnnIndexConfig::default()).unwrap();

        assert_eq!(loaded.chunks.len(), 2);
        assert_eq!(loaded.metadata.len(), 1);
        let hits = loaded.index.query(&vector_b, 1).unwrap();
        assert_eq!(hits[0].ordinal, 1);
        assert_eq!(loaded.chunks[hits[0].ordinal].chunk_id, "b");
    }

    #[test]
    fn missing_artifact_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let (chunk_a, vector_a) = chunk("a", 0);
        let index = AnnIndex::build(8, AnnIndexConfig::default(), &[vector_a]).unwrap();
        save_artifacts(dir.path(), &[chunk_a], &metadata(), &index).unwrap();

        std::fs::remove_file(ArtifactPaths::new(dir.path()).metadata).unwrap();

        let result = load_artifacts(dir.path(), 8, AnnIndexConfig::default());
        assert!(matches!(
            result,
            Err(SearchError::MissingArtifact {
                name: METADATA_FILE,
                ..
            })
        ));
    }

    #[test]
    fn chunk_and_vector_count_disagreement_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let (chunk_a, vector_a) = chunk("a", 0);
        let (chunk_b, _) = chunk("b", 5);
        let index = AnnIndex::build(8, AnnIndexConfig::default(), &[vector_a]).unwrap();

        save_artifacts(dir.path(), &[chunk_a, chunk_b], &metadata(), &index).unwrap();

        assert!(matches!(
            load_artifacts(dir.path(), 8, AnnIndexConfig::default()),
            Err(SearchError::Index(_))
        ));
    }
}

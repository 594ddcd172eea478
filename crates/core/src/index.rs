use crate::error::{IngestError, SearchError};
use crate::models::GuidelineChunk;
use std::path::Path;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// HNSW parameters. Connectivity is the per-node neighbor-list size,
/// expansion_add the construction-time search breadth.
#[derive(Debug, Clone, Copy)]
pub struct AnnIndexConfig {
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
}

impl Default for AnnIndexConfig {
    fn default() -> Self {
        Self {
            connectivity: 32,
            expansion_add: 40,
            expansion_search: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredOrdinal {
    pub ordinal: usize,
    pub distance: f32,
}

/// Approximate nearest-neighbor index over chunk embeddings. The vector
/// keyed `i` corresponds to the chunk at ordinal `i` in the chunk
/// collection; nothing may mutate either side independently.
pub struct AnnIndex {
    inner: Index,
    dimensions: usize,
}

fn index_options(dimensions: usize, config: AnnIndexConfig) -> IndexOptions {
    let mut options = IndexOptions::default();
    options.dimensions = dimensions;
    options.metric = MetricKind::Cos;
    options.quantization = ScalarKind::F32;
    options.connectivity = config.connectivity;
    options.expansion_add = config.expansion_add;
    options.expansion_search = config.expansion_search;
    options
}

impl AnnIndex {
    pub fn build(
        dimensions: usize,
        config: AnnIndexConfig,
        embeddings: &[Vec<f32>],
    ) -> Result<Self, IngestError> {
        let inner = Index::new(&index_options(dimensions, config))
            .map_err(|error| IngestError::IndexBuild(error.to_string()))?;
        inner
            .reserve(embeddings.len())
            .map_err(|error| IngestError::IndexBuild(error.to_string()))?;

        for (ordinal, vector) in embeddings.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(IngestError::IndexBuild(format!(
                    "embedding {ordinal} has dimension {} instead of {dimensions}",
                    vector.len()
                )));
            }
            inner
                .add(ordinal as u64, vector)
                .map_err(|error| IngestError::IndexBuild(error.to_string()))?;
        }

        Ok(Self { inner, dimensions })
    }

    pub fn len(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns up to `k` (ordinal, distance) pairs ordered ascending by
    /// distance.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredOrdinal>, SearchError> {
        if vector.len() != self.dimensions {
            return Err(SearchError::Request(format!(
                "query vector dimension {} is not {}",
                vector.len(),
                self.dimensions
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self
            .inner
            .search(vector, k)
            .map_err(|error| SearchError::Index(error.to_string()))?;

        Ok(matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&key, &distance)| ScoredOrdinal {
                ordinal: key as usize,
                distance,
            })
            .collect())
    }

    pub fn save(&self, path: &Path) -> Result<(), IngestError> {
        let target = path.to_str().ok_or_else(|| {
            IngestError::MissingFileName(format!("non-utf8 index path: {}", path.display()))
        })?;
        self.inner
            .save(target)
            .map_err(|error| IngestError::IndexBuild(error.to_string()))
    }

    pub fn load(
        path: &Path,
        dimensions: usize,
        config: AnnIndexConfig,
    ) -> Result<Self, SearchError> {
        let source = path.to_str().ok_or_else(|| {
            SearchError::Request(format!("non-utf8 index path: {}", path.display()))
        })?;
        let inner = Index::new(&index_options(dimensions, config))
            .map_err(|error| SearchError::Index(error.to_string()))?;
        inner
            .load(source)
            .map_err(|error| SearchError::Index(error.to_string()))?;
        Ok(Self { inner, dimensions })
    }
}

/// Builds the index for a chunk collection. The two collections correlate
/// by ordinal, so their lengths must agree before anything is indexed.
pub fn build_index(
    chunks: &[GuidelineChunk],
    embeddings: &[Vec<f32>],
    dimensions: usize,
    config: AnnIndexConfig,
) -> Result<AnnIndex, IngestError> {
    if chunks.len() != embeddings.len() {
        return Err(IngestError::DimensionMismatch {
            chunks: chunks.len(),
            embeddings: embeddings.len(),
        });
    }
    AnnIndex::build(dimensions, config, embeddings)
}

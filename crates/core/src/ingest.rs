use crate::artifacts::save_artifacts;
use crate::chunking::{Chunker, ChunkingConfig};
use crate::embeddings::{embed_corpus, Embedder};
use crate::error::IngestError;
use crate::extractor::{document_id_from_path, LopdfExtractor, PdfExtractor};
use crate::index::{build_index, AnnIndexConfig};
use crate::models::{DocumentMetadata, GuidelineChunk, PageText};
use crate::normalize::TextNormalizer;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub chunking: ChunkingConfig,
    pub index: AnnIndexConfig,
}

pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// One-shot batch build: extract, normalize, chunk, embed, index, persist.
/// Unreadable documents are skipped and reported; nothing is persisted if
/// the chunk/embedding correlation cannot be established.
pub fn build_corpus(
    folder: &Path,
    out_dir: &Path,
    options: &BuildOptions,
    embedder: &dyn Embedder,
) -> Result<BuildReport, IngestError> {
    let files = discover_pdf_files(folder);
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let normalizer = TextNormalizer::new()?;
    let chunker = Chunker::new(options.chunking)?;
    let extractor = LopdfExtractor;

    let mut all_chunks: Vec<GuidelineChunk> = Vec::new();
    let mut metadata: HashMap<String, DocumentMetadata> = HashMap::new();
    let mut skipped = Vec::new();

    for path in files {
        match process_document(&path, &extractor, &normalizer, &chunker) {
            Ok(processed) => {
                tracing::info!(
                    document_id = %processed.document_id,
                    pages = processed.total_pages,
                    chunks = processed.chunks.len(),
                    "chunked document"
                );
                metadata.insert(
                    processed.document_id.clone(),
                    DocumentMetadata {
                        document_id: processed.document_id,
                        source_filename: processed.source_filename,
                        checksum: digest_file(&path)?,
                        total_pages: processed.total_pages,
                        total_chunks: processed.chunks.len(),
                        processed_timestamp: Utc::now(),
                    },
                );
                all_chunks.extend(processed.chunks);
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping document");
                skipped.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    tracing::info!(
        chunk_count = all_chunks.len(),
        document_count = metadata.len(),
        "embedding corpus"
    );
    let texts: Vec<String> = all_chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let embeddings =
        embed_corpus(embedder, &texts).map_err(|error| IngestError::Embedding(error.to_string()))?;

    let index = build_index(&all_chunks, &embeddings, embedder.dimensions(), options.index)?;
    save_artifacts(out_dir, &all_chunks, &metadata, &index)?;

    Ok(BuildReport {
        documents: metadata.len(),
        chunks: all_chunks.len(),
        skipped,
    })
}

struct ProcessedDocument {
    document_id: String,
    source_filename: String,
    total_pages: usize,
    chunks: Vec<GuidelineChunk>,
}

fn process_document(
    path: &Path,
    extractor: &dyn PdfExtractor,
    normalizer: &TextNormalizer,
    chunker: &Chunker,
) -> Result<ProcessedDocument, IngestError> {
    let document_id = document_id_from_path(path)?;
    let source_filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    let mut pages = Vec::new();
    for page in extractor.extract_pages(path)? {
        let text = normalizer.normalize(&page.text);
        if text.is_empty() {
            continue;
        }
        pages.push(PageText {
            document_id: document_id.clone(),
            page_number: page.page_number,
            word_count: text.split_whitespace().count(),
            text,
        });
    }

    let chunks = chunker.chunk_pages(&document_id, &pages);
    Ok(ProcessedDocument {
        document_id,
        source_filename,
        total_pages: pages.len(),
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::{build_corpus, digest_file, discover_pdf_files, BuildOptions};
    use crate::embeddings::CharacterNgramEmbedder;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discover_pdf_files_is_recursive_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("b.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("a.pdf"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"text"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn build_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let out = tempdir()?;
        let embedder = CharacterNgramEmbedder { dimensions: 16 };

        let result = build_corpus(dir.path(), out.path(), &BuildOptions::default(), &embedder);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn build_skips_unreadable_pdfs_and_reports_them() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let out = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;
        let embedder = CharacterNgramEmbedder { dimensions: 16 };

        let report = build_corpus(dir.path(), out.path(), &BuildOptions::default(), &embedder)?;

        assert_eq!(report.chunks, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }
}

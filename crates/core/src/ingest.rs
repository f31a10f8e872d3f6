use crate::chunking::RecursiveSplitter;
use crate::embeddings::EmbeddingProvider;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::traits::DocumentIndex;
use crate::{Chunk, ChunkDraft, IngestError, IngestionOptions, SourceDocument};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// PDF files directly inside `folder`, sorted by path.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
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

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub documents: Vec<SourceDocument>,
    pub drafts: Vec<ChunkDraft>,
    pub skipped_files: Vec<SkippedPdf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingSummary {
    pub documents: usize,
    pub chunks: usize,
    pub skipped_files: usize,
    pub dimension: usize,
}

/// Reads and splits every PDF in `folder`. Files that cannot be read are
/// reported in `skipped_files` instead of failing the whole run.
pub fn load_folder(folder: &Path, options: IngestionOptions) -> Result<IngestionReport, IngestError> {
    load_folder_with(folder, options, &LopdfExtractor)
}

pub fn load_folder_with<X: PdfExtractor>(
    folder: &Path,
    options: IngestionOptions,
    extractor: &X,
) -> Result<IngestionReport, IngestError> {
    let splitter = RecursiveSplitter::new(options)?;
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut documents = Vec::new();
    let mut drafts = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let build_result = (|| {
            let document = describe_document(&path)?;
            let pages = extractor.extract_pages(&path)?;
            let mut file_drafts = Vec::new();

            for page in pages {
                for text in splitter.split(&page.text) {
                    file_drafts.push(ChunkDraft {
                        source_file: document.source_file.clone(),
                        chunk_index: file_drafts.len() as u64,
                        text,
                    });
                }
            }

            Ok::<_, IngestError>((document, file_drafts))
        })();

        match build_result {
            Ok((document, file_drafts)) => {
                debug!(file = %document.source_file, chunks = file_drafts.len(), "split pdf");
                documents.push(document);
                drafts.extend(file_drafts);
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(IngestionReport {
        documents,
        drafts,
        skipped_files,
    })
}

/// Embeds every draft, requiring one dimension across the batch.
pub async fn embed_drafts<E>(drafts: Vec<ChunkDraft>, embedder: &E) -> Result<Vec<Chunk>, IngestError>
where
    E: EmbeddingProvider + Sync,
{
    let mut chunks = Vec::with_capacity(drafts.len());
    let mut dimension = None;

    for draft in drafts {
        let embedding = embedder.embed(&draft.text).await?;
        let expected = *dimension.get_or_insert(embedding.len());
        if embedding.len() != expected {
            return Err(IngestError::DimensionMismatch {
                source_file: draft.source_file,
                chunk_index: draft.chunk_index,
                expected,
                found: embedding.len(),
            });
        }
        chunks.push(draft.with_embedding(embedding));
    }

    Ok(chunks)
}

/// Full reindex of `folder`: the target index is dropped and rebuilt with the
/// embedding dimension observed on this run.
pub async fn index_folder<I, E>(
    folder: &Path,
    options: IngestionOptions,
    embedder: &E,
    index: &I,
) -> Result<IndexingSummary, IngestError>
where
    I: DocumentIndex + Sync,
    E: EmbeddingProvider + Sync,
{
    let report = load_folder(folder, options)?;
    index_report(report, embedder, index).await
}

pub async fn index_report<I, E>(
    report: IngestionReport,
    embedder: &E,
    index: &I,
) -> Result<IndexingSummary, IngestError>
where
    I: DocumentIndex + Sync,
    E: EmbeddingProvider + Sync,
{
    let IngestionReport {
        documents,
        drafts,
        skipped_files,
    } = report;

    if drafts.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no chunks extracted ({} file(s) skipped)",
            skipped_files.len()
        )));
    }

    info!(documents = documents.len(), chunks = drafts.len(), "embedding chunks");
    let chunks = embed_drafts(drafts, embedder).await?;
    let dimension = chunks.first().map(|chunk| chunk.embedding.len()).unwrap_or_default();

    index.recreate(dimension).await?;
    index.index_chunks(&chunks).await?;
    info!(chunks = chunks.len(), dimension, "indexed chunks");

    Ok(IndexingSummary {
        documents: documents.len(),
        chunks: chunks.len(),
        skipped_files: skipped_files.len(),
        dimension,
    })
}

fn describe_document(path: &Path) -> Result<SourceDocument, IngestError> {
    let checksum = digest_file(path)?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    Ok(SourceDocument {
        source_file: name.to_string(),
        path: path.to_string_lossy().to_string(),
        checksum,
        ingested_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PageText;
    use crate::store::IndexQuery;
    use crate::{Hit, SearchError};
    use async_trait::async_trait;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct CannedExtractor;

    impl PdfExtractor for CannedExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with("broken") {
                return Err(IngestError::PdfParse("no readable text".to_string()));
            }
            Ok(vec![
                PageText {
                    number: 1,
                    text: format!("{name} first page."),
                },
                PageText {
                    number: 2,
                    text: "Second page text.".to_string(),
                },
            ])
        }
    }

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
            if text.contains("ragged") {
                return Ok(vec![1.0]);
            }
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        recreated_with: Mutex<Vec<usize>>,
        indexed: Mutex<Vec<Chunk>>,
    }

    #[async_trait]
    impl DocumentIndex for RecordingIndex {
        async fn recreate(&self, dimension: usize) -> Result<(), SearchError> {
            if let Ok(mut calls) = self.recreated_with.lock() {
                calls.push(dimension);
            }
            Ok(())
        }

        async fn index_chunks(&self, chunks: &[Chunk]) -> Result<(), SearchError> {
            if let Ok(mut indexed) = self.indexed.lock() {
                indexed.extend_from_slice(chunks);
            }
            Ok(())
        }

        async fn search(&self, _query: &IndexQuery) -> Result<Vec<Hit>, SearchError> {
            Ok(Vec::new())
        }
    }

    fn touch(path: &Path) -> std::io::Result<()> {
        File::create(path).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))
    }

    #[test]
    fn discover_only_looks_at_top_level_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        touch(&base.join("b.PDF"))?;
        touch(&base.join("a.pdf"))?;
        touch(&base.join("notes.txt"))?;
        touch(&nested.join("c.pdf"))?;

        let names: Vec<_> = discover_pdf_files(base)
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
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
    fn loading_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = load_folder(dir.path(), IngestionOptions::default());
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn lopdf_loader_skips_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let report = load_folder(dir.path(), IngestionOptions::default())?;

        assert!(report.drafts.is_empty());
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[test]
    fn chunk_index_restarts_per_source_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        touch(&dir.path().join("a.pdf"))?;
        touch(&dir.path().join("b.pdf"))?;
        touch(&dir.path().join("broken.pdf"))?;

        let report = load_folder_with(dir.path(), IngestionOptions::default(), &CannedExtractor)?;

        let layout: Vec<(String, u64)> = report
            .drafts
            .iter()
            .map(|draft| (draft.source_file.clone(), draft.chunk_index))
            .collect();
        assert_eq!(
            layout,
            vec![
                ("a.pdf".to_string(), 0),
                ("a.pdf".to_string(), 1),
                ("b.pdf".to_string(), 0),
                ("b.pdf".to_string(), 1),
            ]
        );
        assert_eq!(report.drafts[1].text, "Second page text.");
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.skipped_files.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn index_report_recreates_with_observed_dimension() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        touch(&dir.path().join("a.pdf"))?;
        let report = load_folder_with(dir.path(), IngestionOptions::default(), &CannedExtractor)?;
        let index = RecordingIndex::default();

        let summary = index_report(report, &LengthEmbedder, &index).await?;

        assert_eq!(
            summary,
            IndexingSummary {
                documents: 1,
                chunks: 2,
                skipped_files: 0,
                dimension: 3,
            }
        );
        assert_eq!(*index.recreated_with.lock().map_err(|e| e.to_string())?, vec![3]);
        let indexed = index.indexed.lock().map_err(|e| e.to_string())?;
        assert_eq!(indexed.len(), 2);
        assert!(indexed.iter().all(|chunk| chunk.embedding.len() == 3));
        Ok(())
    }

    #[tokio::test]
    async fn mixed_embedding_dimensions_are_rejected() {
        let drafts = vec![
            ChunkDraft {
                source_file: "a.pdf".to_string(),
                chunk_index: 0,
                text: "regular".to_string(),
            },
            ChunkDraft {
                source_file: "a.pdf".to_string(),
                chunk_index: 1,
                text: "ragged".to_string(),
            },
        ];

        let result = embed_drafts(drafts, &LengthEmbedder).await;
        assert!(matches!(
            result,
            Err(IngestError::DimensionMismatch {
                chunk_index: 1,
                expected: 3,
                found: 1,
                ..
            })
        ));
    }
}

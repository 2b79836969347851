mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use contract_review_common::ReviewError;

pub use source::{PageSource, PdfPageSource};

/// Extracted plain text of one contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Document {
    pub content: String,
    /// Basename only, for reporting.
    pub filename: String,
}

/// Errors from loading a contract document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document not found or not a readable file: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("No text could be extracted from {filename}")]
    Empty { filename: String },

    #[error("Failed to extract text from {}: {detail}", path.display())]
    Extraction { path: PathBuf, detail: String },

    #[error(
        "Document cache already holds {}; reset it before loading {}",
        cached.display(),
        requested.display()
    )]
    SlotOccupied { cached: PathBuf, requested: PathBuf },
}

impl From<DocumentError> for ReviewError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::NotFound { path } => ReviewError::DocumentNotFound { path },
            DocumentError::Empty { filename } => ReviewError::EmptyDocument { filename },
            DocumentError::Extraction { .. } => ReviewError::Extraction(e.to_string()),
            DocumentError::SlotOccupied { .. } => ReviewError::Internal(e.to_string()),
        }
    }
}

struct CachedDocument {
    path: PathBuf,
    document: Arc<Document>,
}

/// Single-slot cache of one document's extracted text.
///
/// Holds at most one document for its lifetime. Requesting a different file
/// while the slot is filled fails with [`DocumentError::SlotOccupied`]
/// until [`DocumentCache::reset`] is called. Concurrent reviews of distinct
/// documents each need their own cache.
pub struct DocumentCache {
    source: Arc<dyn PageSource>,
    slot: Option<CachedDocument>,
}

impl DocumentCache {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self { source, slot: None }
    }

    /// Cache backed by PDF extraction.
    pub fn pdf() -> Self {
        Self::new(Arc::new(PdfPageSource))
    }

    /// Return the document at `path`, extracting it on first use.
    pub fn get_document(&mut self, path: &Path) -> Result<Arc<Document>, DocumentError> {
        let not_found = || DocumentError::NotFound {
            path: path.to_path_buf(),
        };
        if !path.is_file() {
            return Err(not_found());
        }
        // Different spellings of the same file share the slot.
        let canonical = std::fs::canonicalize(path).map_err(|_| not_found())?;

        if let Some(cached) = &self.slot {
            if cached.path == canonical {
                metrics::counter!("document.cache.hit").increment(1);
                return Ok(Arc::clone(&cached.document));
            }
            return Err(DocumentError::SlotOccupied {
                cached: cached.path.clone(),
                requested: canonical,
            });
        }

        metrics::counter!("document.cache.miss").increment(1);

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pages = self.source.extract_pages(path)?;
        let page_count = pages.len();
        let content: String = pages.into_iter().flatten().collect();

        if content.trim().is_empty() {
            tracing::warn!(filename = %filename, pages = page_count, "Document has no text layer");
            return Err(DocumentError::Empty { filename });
        }

        tracing::info!(
            filename = %filename,
            pages = page_count,
            chars = content.len(),
            "Document text extracted"
        );

        let document = Arc::new(Document { content, filename });
        self.slot = Some(CachedDocument {
            path: canonical,
            document: Arc::clone(&document),
        });

        Ok(document)
    }

    /// Basename of the cached document, if any.
    pub fn cached_filename(&self) -> Option<&str> {
        self.slot.as_ref().map(|c| c.document.filename.as_str())
    }

    /// Empty the slot so another document can be loaded.
    pub fn reset(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Page source returning canned pages and counting extractions.
    struct CountingSource {
        pages: Vec<Option<String>>,
        calls: AtomicU32,
    }

    impl CountingSource {
        fn new(pages: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(Self {
                pages: pages.into_iter().map(|p| p.map(String::from)).collect(),
                calls: AtomicU32::new(0),
            })
        }
    }

    impl PageSource for CountingSource {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<Option<String>>, DocumentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.clone())
        }
    }

    fn contract_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.4 placeholder").unwrap();
        path
    }

    #[test]
    fn test_second_call_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = contract_file(&dir, "ServicesAgreement.pdf");
        let source = CountingSource::new(vec![Some("Page one. "), Some("Page two.")]);
        let mut cache = DocumentCache::new(source.clone());

        let first = cache.get_document(&path).unwrap();
        let second = cache.get_document(&path).unwrap();

        assert_eq!(first.content, "Page one. Page two.");
        assert_eq!(first.content, second.content);
        assert_eq!(first.filename, "ServicesAgreement.pdf");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_filename(), Some("ServicesAgreement.pdf"));
    }

    #[test]
    fn test_reset_forces_reextraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = contract_file(&dir, "nda.pdf");
        let source = CountingSource::new(vec![Some("Confidential information")]);
        let mut cache = DocumentCache::new(source.clone());

        cache.get_document(&path).unwrap();
        cache.reset();
        assert_eq!(cache.cached_filename(), None);
        cache.get_document(&path).unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_textless_pages_count_as_empty_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = contract_file(&dir, "mixed.pdf");
        let source = CountingSource::new(vec![None, Some("Only page two has text"), None]);
        let mut cache = DocumentCache::new(source);

        let doc = cache.get_document(&path).unwrap();
        assert_eq!(doc.content, "Only page two has text");
    }

    #[test]
    fn test_all_pages_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = contract_file(&dir, "scanned.pdf");
        let source = CountingSource::new(vec![None, Some(""), Some("  \n")]);
        let mut cache = DocumentCache::new(source);

        let err = cache.get_document(&path).unwrap_err();
        match err {
            DocumentError::Empty { filename } => assert_eq!(filename, "scanned.pdf"),
            other => panic!("Expected Empty, got {:?}", other),
        }
        assert_eq!(cache.cached_filename(), None);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let source = CountingSource::new(vec![Some("text")]);
        let mut cache = DocumentCache::new(source.clone());

        let err = cache
            .get_document(Path::new("/nonexistent/contract.pdf"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        let review_err: ReviewError = err.into();
        assert!(review_err.is_fatal());
    }

    #[test]
    fn test_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DocumentCache::new(CountingSource::new(vec![Some("text")]));
        let err = cache.get_document(dir.path()).unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }

    #[test]
    fn test_distinct_path_rejected_while_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let first = contract_file(&dir, "first.pdf");
        let second = contract_file(&dir, "second.pdf");
        let source = CountingSource::new(vec![Some("text")]);
        let mut cache = DocumentCache::new(source.clone());

        cache.get_document(&first).unwrap();
        let err = cache.get_document(&second).unwrap_err();
        assert!(matches!(err, DocumentError::SlotOccupied { .. }));

        cache.reset();
        let doc = cache.get_document(&second).unwrap();
        assert_eq!(doc.filename, "second.pdf");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_same_file_through_parent_dir_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let path = contract_file(&dir, "contract.pdf");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let roundabout = dir.path().join("sub").join("..").join("contract.pdf");
        let source = CountingSource::new(vec![Some("Master services terms")]);
        let mut cache = DocumentCache::new(source.clone());

        let first = cache.get_document(&path).unwrap();
        let second = cache.get_document(&roundabout).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}

use std::path::Path;

use super::DocumentError;

/// Extracts raw text from a document, one entry per page.
///
/// `None` marks a page with no extractable text layer; it is not an error.
pub trait PageSource: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Option<String>>, DocumentError>;
}

/// Page source backed by `lopdf`. Plain-text files (`.txt`, `.md`) are read
/// whole as a single page.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfPageSource;

impl PageSource for PdfPageSource {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Option<String>>, DocumentError> {
        if is_plain_text(path) {
            let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Extraction {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            return Ok(vec![Some(text)]);
        }

        let pdf = lopdf::Document::load(path).map_err(|e| DocumentError::Extraction {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let pages = pdf
            .get_pages()
            .into_keys()
            .map(|page_number| match pdf.extract_text(&[page_number]) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::debug!(
                        page = page_number,
                        error = %e,
                        "Page has no extractable text"
                    );
                    None
                }
            })
            .collect();

        Ok(pages)
    }
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agreement.txt");
        std::fs::write(&path, "1. Services. Provider shall perform the services.").unwrap();

        let pages = PdfPageSource.extract_pages(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].as_deref().unwrap().starts_with("1. Services."));
    }

    #[test]
    fn test_garbage_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = PdfPageSource.extract_pages(&path).unwrap_err();
        assert!(matches!(err, DocumentError::Extraction { .. }));
    }
}

use crate::error::RagError;
use lopdf::Document;
use std::path::Path;
use tracing::warn;

/// Turns a document on disk into raw page texts, one entry per page in order.
pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, RagError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, RagError> {
        let document =
            Document::load(path).map_err(|error| RagError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for page_no in document.get_pages().into_keys() {
            // A page we cannot decode still occupies its slot so page numbers stay aligned.
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(path = %path.display(), page = page_no, %error, "page text unreadable");
                    String::new()
                }
            };
            pages.push(text);
        }

        Ok(pages)
    }
}

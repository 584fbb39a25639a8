use crate::chunking::normalize_text;
use crate::error::RagError;
use crate::extractor::PdfExtractor;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::info;

/// Normalized pages of a document read from disk, plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub title: String,
    pub checksum: String,
    pub pages: Vec<String>,
}

pub fn digest_file(path: &Path) -> Result<String, RagError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn load_pdf<X: PdfExtractor + ?Sized>(
    extractor: &X,
    path: &Path,
) -> Result<LoadedDocument, RagError> {
    let title = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| RagError::PdfParse(format!("path has no file name: {}", path.display())))?
        .to_string();
    let checksum = digest_file(path)?;

    let pages: Vec<String> = extractor
        .extract_pages(path)?
        .iter()
        .map(|page| normalize_text(page))
        .collect();

    info!(path = %path.display(), pages = pages.len(), "loaded pdf");
    Ok(LoadedDocument {
        title,
        checksum,
        pages,
    })
}

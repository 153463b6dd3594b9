//! PDF text extraction using lopdf.
//!
//! The segmenter needs text per page, not a single document-wide blob, so
//! extraction goes page by page in page-number order.

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::PdfError;

/// Extract the text of every page, 1-indexed, in page order.
///
/// A page whose content cannot be decoded yields an empty string rather than
/// failing the whole document; the segmenter treats empty pages as
/// continuations.
pub fn extract_page_texts(data: &[u8]) -> Result<Vec<String>, PdfError> {
    let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

    // Some scanners produce PDFs encrypted with an empty password.
    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| PdfError::Parse(e.to_string()))?;
    }

    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(PdfError::NoPages);
    }

    let mut texts = Vec::with_capacity(page_count as usize);
    for page_no in 1..=page_count {
        let text = match doc.extract_text(&[page_no]) {
            Ok(text) => text,
            Err(e) => {
                warn!(page = page_no, error = %e, "Page text extraction failed");
                String::new()
            }
        };
        texts.push(text);
    }

    debug!(
        pages = page_count,
        chars = texts.iter().map(String::len).sum::<usize>(),
        "PDF text extracted"
    );
    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let err = extract_page_texts(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }

    #[test]
    fn empty_input_fails_to_parse() {
        assert!(extract_page_texts(&[]).is_err());
    }
}

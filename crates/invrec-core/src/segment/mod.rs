//! Document segmentation: partition a document's pages into page groups,
//! each believed to represent one logical invoice.

pub mod patterns;

use tracing::{debug, info};

use crate::error::SegmentError;
use crate::models::document::PageGroup;
use crate::models::config::SegmenterConfig;

pub use patterns::detect_invoice_number;

/// Result of segmenting one document.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Page groups in original page order.
    pub groups: Vec<PageGroup>,

    /// Non-fatal warnings, e.g. pages dropped by the page cap.
    pub warnings: Vec<String>,
}

/// Partition per-page text into ordered page groups.
///
/// A new invoice boundary is declared when a page carries an
/// invoice-number-like token differing from the open group's working number,
/// or when the group hits the safety ceiling. Pages without a boundary
/// marker are appended to the open group; empty pages are never dropped and
/// never start a group on their own. A document with no markers at all
/// becomes a single group.
pub fn segment(pages: &[String], config: &SegmenterConfig) -> Result<Segmentation, SegmentError> {
    if pages.is_empty() {
        return Err(SegmentError::EmptyDocument);
    }

    let mut warnings = Vec::new();
    let page_count = if pages.len() > config.max_pages {
        warnings.push(format!(
            "document has {} pages; only the first {} were segmented",
            pages.len(),
            config.max_pages
        ));
        config.max_pages
    } else {
        pages.len()
    };

    let mut groups: Vec<PageGroup> = Vec::new();
    let mut open: Option<OpenGroup> = None;

    for (i, text) in pages[..page_count].iter().enumerate() {
        let page_no = (i + 1) as u32;
        let marker = detect_invoice_number(text);

        let boundary = match (&open, &marker) {
            // Ceiling hit: force a boundary regardless of markers.
            (Some(g), _) if g.pages.len() >= config.max_group_pages => true,
            // A marker differing from the working number opens a new group.
            (Some(g), Some(m)) => g
                .working_invoice_number
                .as_deref()
                .is_some_and(|current| current != m),
            _ => false,
        };

        if boundary {
            let group = open.take().map(|g| g.into_page_group(groups.len()));
            if let Some(group) = group {
                groups.push(group);
            }
        }

        match &mut open {
            Some(g) => {
                g.pages.push(page_no);
                g.texts.push(text.as_str());
                // A marker-less group adopts the first marker it sees.
                if g.working_invoice_number.is_none() {
                    g.working_invoice_number = marker;
                }
            }
            None => {
                open = Some(OpenGroup {
                    pages: vec![page_no],
                    texts: vec![text.as_str()],
                    working_invoice_number: marker,
                });
            }
        }
    }

    if let Some(g) = open {
        groups.push(g.into_page_group(groups.len()));
    }

    info!(
        pages = page_count,
        groups = groups.len(),
        "Document segmented"
    );
    for group in &groups {
        debug!(
            index = group.index,
            pages = ?group.pages,
            marker = group.working_invoice_number.as_deref().unwrap_or("-"),
            "Page group"
        );
    }

    Ok(Segmentation { groups, warnings })
}

struct OpenGroup<'a> {
    pages: Vec<u32>,
    texts: Vec<&'a str>,
    working_invoice_number: Option<String>,
}

impl OpenGroup<'_> {
    fn into_page_group(self, index: usize) -> PageGroup {
        PageGroup {
            index,
            pages: self.pages,
            working_invoice_number: self.working_invoice_number,
            text: self.texts.join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    /// Union of groups covers every page exactly once, in order.
    fn assert_coverage(groups: &[PageGroup], page_count: u32) {
        let covered: Vec<u32> = groups.iter().flat_map(|g| g.pages.iter().copied()).collect();
        let expected: Vec<u32> = (1..=page_count).collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn zero_pages_fails_with_empty_document() {
        let err = segment(&[], &SegmenterConfig::default()).unwrap_err();
        assert!(matches!(err, SegmentError::EmptyDocument));
    }

    #[test]
    fn two_markers_yield_two_single_page_groups() {
        let input = pages(&[
            "ACME Corp\nInvoice #A100\nTotal: 1200.00",
            "ACME Corp\nInvoice #B200\nTotal: 800.00",
        ]);
        let result = segment(&input, &SegmenterConfig::default()).unwrap();

        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.groups[0].pages, vec![1]);
        assert_eq!(result.groups[1].pages, vec![2]);
        assert_eq!(
            result.groups[0].working_invoice_number.as_deref(),
            Some("A100")
        );
        assert_eq!(
            result.groups[1].working_invoice_number.as_deref(),
            Some("B200")
        );
        assert_coverage(&result.groups, 2);
    }

    #[test]
    fn no_markers_yield_one_group() {
        let input = pages(&["first page", "second page", "third page"]);
        let result = segment(&input, &SegmenterConfig::default()).unwrap();

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].pages, vec![1, 2, 3]);
        assert!(result.groups[0].working_invoice_number.is_none());
        assert_coverage(&result.groups, 3);
    }

    #[test]
    fn repeated_marker_stays_in_one_group() {
        let input = pages(&[
            "Invoice #A100\npage one",
            "Invoice #A100\npage two (continuation)",
        ]);
        let result = segment(&input, &SegmenterConfig::default()).unwrap();

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].pages, vec![1, 2]);
    }

    #[test]
    fn empty_page_joins_current_group() {
        let input = pages(&["Invoice #A100", "", "Invoice #B200"]);
        let result = segment(&input, &SegmenterConfig::default()).unwrap();

        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.groups[0].pages, vec![1, 2]);
        assert_eq!(result.groups[1].pages, vec![3]);
        assert_coverage(&result.groups, 3);
    }

    #[test]
    fn leading_unmarked_pages_adopt_first_marker() {
        let input = pages(&["cover letter, no marker", "Invoice #A100\ndetails"]);
        let result = segment(&input, &SegmenterConfig::default()).unwrap();

        assert_eq!(result.groups.len(), 1);
        assert_eq!(
            result.groups[0].working_invoice_number.as_deref(),
            Some("A100")
        );
    }

    #[test]
    fn page_cap_truncates_with_warning() {
        let input: Vec<String> = (0..25).map(|i| format!("page {}", i + 1)).collect();
        let config = SegmenterConfig::default();
        let result = segment(&input, &config).unwrap();

        assert_eq!(result.warnings.len(), 1);
        let total: usize = result.groups.iter().map(|g| g.pages.len()).sum();
        assert_eq!(total, config.max_pages);
    }

    #[test]
    fn group_ceiling_forces_boundary() {
        let config = SegmenterConfig {
            max_pages: 20,
            max_group_pages: 3,
        };
        let input = pages(&["a", "b", "c", "d", "e"]);
        let result = segment(&input, &config).unwrap();

        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.groups[0].pages, vec![1, 2, 3]);
        assert_eq!(result.groups[1].pages, vec![4, 5]);
        assert_coverage(&result.groups, 5);
    }

    #[test]
    fn group_text_joins_pages() {
        let input = pages(&["Invoice #A100", "line items"]);
        let result = segment(&input, &SegmenterConfig::default()).unwrap();
        assert_eq!(result.groups[0].text, "Invoice #A100\nline items");
    }
}

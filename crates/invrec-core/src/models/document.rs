//! Uploaded document and page group models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel a document arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadChannel {
    /// Internal dashboard upload.
    Dashboard,
    /// External supplier portal upload.
    SupplierPortal,
}

/// An uploaded supplier document. Immutable once created; retained for audit
/// and re-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedDocument {
    /// Document identifier.
    pub id: Uuid,

    /// Original filename.
    pub filename: String,

    /// Size of the original byte stream.
    pub size_bytes: u64,

    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,

    /// Originating channel.
    pub channel: UploadChannel,
}

impl UploadedDocument {
    /// Describe a new upload.
    pub fn new(filename: impl Into<String>, size_bytes: u64, channel: UploadChannel) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            size_bytes,
            uploaded_at: Utc::now(),
            channel,
        }
    }
}

/// An ordered, non-empty, non-overlapping subset of a document's pages
/// believed to represent one invoice.
///
/// Invariant: the union of all page groups for a document covers every
/// (non-truncated) page exactly once, in original page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageGroup {
    /// Position of this group within the document's group list.
    pub index: usize,

    /// 1-indexed page numbers, in original order.
    pub pages: Vec<u32>,

    /// Invoice-number-like token that opened this group, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_invoice_number: Option<String>,

    /// Concatenated text of the group's pages.
    pub text: String,
}

impl PageGroup {
    /// First and last page of the group.
    pub fn page_range(&self) -> (u32, u32) {
        let first = self.pages.first().copied().unwrap_or(0);
        let last = self.pages.last().copied().unwrap_or(first);
        (first, last)
    }
}

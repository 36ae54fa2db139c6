//! Text segments produced by the segmentation collaborator.
//!
//! Segments are immutable units of source text with a stable ordinal and
//! byte-offset locator within a document version. The resolution core
//! reads them as-is and never re-segments or re-normalizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Byte-offset locator of a segment within its normalized document text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    /// Byte offset of the segment text in the normalized document
    pub offset: usize,

    /// Byte length of the segment text
    pub length: usize,
}

/// An immutable unit of source text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Unique identifier for this segment
    pub id: Uuid,

    /// Document version this segment was cut from
    pub version_id: Uuid,

    /// Chapter heading, when the segment is one
    pub chapter_label: Option<String>,

    /// Position within the document version (dense from 0)
    pub ordinal: usize,

    /// The segment text
    pub text: String,

    /// Where the text sits in the normalized document
    pub locator: SourceLocator,

    /// When the segment was created
    pub created_at: DateTime<Utc>,
}

impl Segment {
    /// Create a new segment
    pub fn new(
        version_id: Uuid,
        ordinal: usize,
        text: impl Into<String>,
        locator: SourceLocator,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            version_id,
            chapter_label: None,
            ordinal,
            text: text.into(),
            locator,
            created_at: Utc::now(),
        }
    }

    /// Attach a chapter label
    pub fn with_chapter_label(mut self, label: impl Into<String>) -> Self {
        self.chapter_label = Some(label.into());
        self
    }
}

//! Document intake: normalization and paragraph segmentation.
//!
//! Produces the ordered, immutable segments the pipeline core consumes.

pub mod segmenter;

pub use segmenter::{ingest_hash, normalize_text, segment_text};

//! Uplink Processing Library
//!
//! Post-upload media handling: content-type sniffing, MP4 faststart layout
//! rewriting, ffprobe metadata extraction, and the per-upload routine that
//! ties them together.

pub mod faststart;
pub mod pipeline;
pub mod probe;
pub mod sniff;

pub use pipeline::{process_upload, ProcessingTools};
pub use sniff::detect_content_type;

// crates/core/src/lib.rs
//! Framework-free building blocks for the media download service: request
//! validation and tool arguments, progress-line parsing, cookie conversion
//! and metadata summaries.

pub mod cookies;
pub mod error;
pub mod invocation;
pub mod media_info;
pub mod progress;

pub use error::*;
pub use invocation::{DownloadRequest, MediaKind, DEFAULT_SUB_LANG};
pub use media_info::MediaInfo;
pub use progress::{observe_line, LineObservation, Stage};

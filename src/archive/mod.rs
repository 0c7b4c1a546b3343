//! Archive handling: classification, external extraction, recursive
//! expansion.

pub mod classify;
pub mod extract;
pub mod walk;

pub use classify::{is_archive, kind_from_extension, sniff_kind, ArchiveKind, HEADER_LEN};
pub use extract::{ExtractError, Extractor, UnarExtractor};
pub use walk::{extraction_dir, spawn_walk, WalkResult, UNAR_SUFFIX};

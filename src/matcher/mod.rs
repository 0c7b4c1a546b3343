//! Multi-pattern matching: double-array trie + Aho-Corasick scan.
//!
//! The trie ([`darts`]) is the transition table; the machine ([`machine`])
//! adds failure links and the scan loops. Both in-memory and streaming
//! scans emit [`Term`]s with byte-accurate, always-copied context.

pub mod darts;
pub mod machine;

use std::sync::Arc;

pub use darts::{DoubleArrayTrie, FAIL_STATE, MAX_KEYWORD_LEN, ROOT_STATE};
pub use machine::{Machine, STREAM_BUF_LEN};

/// A single match emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    /// Absolute byte position of the first keyword byte in the stream.
    pub pos: usize,
    /// The matched keyword bytes.
    pub word: Arc<[u8]>,
    /// Up to `context` bytes either side of the keyword, clipped at the
    /// stream boundaries. Always an owned copy.
    pub context: Vec<u8>,
}

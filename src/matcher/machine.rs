//! Aho-Corasick matcher over the double-array trie.
//!
//! # Invariants
//! - Output lists are pre-unioned at build time: the list at a state holds
//!   the state's own keyword followed by every keyword reachable along its
//!   failure chain, so the scan loop consults only the current state.
//! - The scan loop can never observe `FAIL_STATE` after a transition: the
//!   root absorbs unmatched bytes, and the while-fail loop walks the
//!   failure chain before consuming the byte.
//! - Context bytes are always copied, never aliased; scan buffers are
//!   reused across reads.
//!
//! # Algorithm
//! Failure links are built breadth-first: depth-1 states fail to the root;
//! deeper states follow the parent's failure chain until the incoming byte
//! has a live transition. The streaming scan keeps three sliding buffers
//! (`prev`, `curr`, `next`) so a match near a buffer edge can draw its
//! context from the neighbors, while automaton state simply persists
//! across buffer boundaries.

use std::io::{self, Read};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::matcher::darts::{DoubleArrayTrie, FAIL_STATE, ROOT_STATE};
use crate::matcher::Term;

/// Size of each of the three sliding buffers used by the streaming scan.
pub const STREAM_BUF_LEN: usize = 64 * 1024;

/// Compiled multi-pattern matcher.
#[derive(Debug)]
pub struct Machine {
    trie: DoubleArrayTrie,
    failure: Vec<i32>,
    /// Terminal (and failure-reachable) keyword indices per state.
    output: AHashMap<i32, Vec<u32>>,
    words: Vec<Arc<[u8]>>,
    longest_len: usize,
}

impl Machine {
    /// Compile a keyword list. Rejects empty lists, empty words, and words
    /// longer than [`crate::matcher::MAX_KEYWORD_LEN`].
    pub fn build(words: &[&[u8]]) -> Result<Machine, Error> {
        let (trie, terminals) = DoubleArrayTrie::build(words)?;

        let owned: Vec<Arc<[u8]>> = words.iter().map(|w| Arc::from(*w)).collect();
        let longest_len = words.iter().map(|w| w.len()).max().unwrap_or(0);

        let mut output: AHashMap<i32, Vec<u32>> = AHashMap::new();
        for (state, word_idx) in terminals {
            output.entry(state).or_default().push(word_idx as u32);
        }

        let mut machine = Machine {
            trie,
            failure: Vec::new(),
            output,
            words: owned,
            longest_len,
        };
        machine.build_failure_links(words);
        Ok(machine)
    }

    /// BFS failure-link construction with output pre-union.
    fn build_failure_links(&mut self, words: &[&[u8]]) {
        let mut failure = vec![0i32; self.trie.len()];
        failure[ROOT_STATE as usize] = ROOT_STATE;

        // (state, depth) pairs discovered by walking every keyword; the trie
        // has no child iterator, so reachable states are enumerated through
        // the words that define them.
        let mut depth_of: AHashMap<i32, usize> = AHashMap::new();
        let mut parent_edge: AHashMap<i32, (i32, u8)> = AHashMap::new();
        for word in words {
            let mut state = ROOT_STATE;
            for (depth, &b) in word.iter().enumerate() {
                let next = self.trie.transition(state, b);
                debug_assert!(next > 0, "keyword path must stay live");
                depth_of.entry(next).or_insert(depth + 1);
                parent_edge.entry(next).or_insert((state, b));
                state = next;
            }
        }

        // Breadth-first by depth so a parent's failure link is resolved
        // before its children ask for it.
        let mut states: Vec<i32> = depth_of.keys().copied().collect();
        states.sort_by_key(|s| (depth_of[s], *s));

        for &state in &states {
            let (parent, byte) = parent_edge[&state];
            if depth_of[&state] == 1 {
                failure[state as usize] = ROOT_STATE;
                continue;
            }
            let mut probe = failure[parent as usize];
            let target = loop {
                let out = self.trie.transition(probe, byte);
                if out != FAIL_STATE {
                    break out;
                }
                probe = failure[probe as usize];
            };
            failure[state as usize] = target;

            // Pre-union: own keyword first, then everything the failure
            // target already collected.
            if let Some(inherited) = self.output.get(&target).cloned() {
                let entry = self.output.entry(state).or_default();
                entry.extend(inherited);
            }
        }

        self.failure = failure;
    }

    /// Longest keyword length, in bytes.
    #[inline]
    pub fn longest_len(&self) -> usize {
        self.longest_len
    }

    /// Largest context the streaming scan can serve exactly.
    #[inline]
    pub fn max_stream_context(&self) -> usize {
        STREAM_BUF_LEN - self.longest_len + 1
    }

    #[inline]
    fn goto(&self, state: i32, input: u8) -> i32 {
        self.trie.transition(state, input)
    }

    /// Scan an in-memory buffer, emitting every keyword occurrence with up
    /// to `context` bytes on each side. With `stop_on_first`, returns after
    /// the first emission.
    pub fn find_in(&self, content: &[u8], context: usize, stop_on_first: bool) -> Vec<Term> {
        let mut terms = Vec::new();
        let mut state = ROOT_STATE;
        for (pos, &b) in content.iter().enumerate() {
            while self.goto(state, b) == FAIL_STATE {
                state = self.failure[state as usize];
            }
            state = self.goto(state, b);
            let Some(word_idxs) = self.output.get(&state) else {
                continue;
            };
            for &wi in word_idxs {
                let word = &self.words[wi as usize];
                let start = pos + 1 - word.len();
                let ctx_begin = start.saturating_sub(context);
                let ctx_end = (pos + 1 + context).min(content.len());
                terms.push(Term {
                    pos: start,
                    word: Arc::clone(word),
                    context: content[ctx_begin..ctx_end].to_vec(),
                });
                if stop_on_first {
                    return terms;
                }
            }
        }
        terms
    }

    /// Scan a byte stream without loading it whole.
    ///
    /// Produces the same multiset of terms (contexts included) as
    /// [`Machine::find_in`] over the concatenated stream, for any `context`
    /// up to [`Machine::max_stream_context`]. Emitted terms are
    /// deduplicated by `(position, keyword)`.
    pub fn find_in_reader<R: Read>(
        &self,
        reader: R,
        context: usize,
        stop_on_first: bool,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Term>, Error> {
        let max = self.max_stream_context();
        if context > max {
            return Err(Error::ContextTooLarge { context, max });
        }

        let mut reader = reader;
        let mut prev = vec![0u8; STREAM_BUF_LEN];
        let mut curr = vec![0u8; STREAM_BUF_LEN];
        let mut next = vec![0u8; STREAM_BUF_LEN];
        let mut prev_len = 0usize;
        let mut curr_len = read_full(&mut reader, &mut curr)?;
        let mut next_len;

        let mut terms = Vec::new();
        let mut seen: AHashSet<(u64, u32)> = AHashSet::new();
        let mut state = ROOT_STATE;
        // Absolute stream offset of curr[0].
        let mut base: u64 = 0;

        while curr_len > 0 {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }
            next_len = read_full(&mut reader, &mut next)?;

            for pos in 0..curr_len {
                let b = curr[pos];
                while self.goto(state, b) == FAIL_STATE {
                    state = self.failure[state as usize];
                }
                state = self.goto(state, b);
                let Some(word_idxs) = self.output.get(&state) else {
                    continue;
                };
                for &wi in word_idxs {
                    let word = &self.words[wi as usize];
                    let abs = base + pos as u64 + 1 - word.len() as u64;
                    if !seen.insert((abs, wi)) {
                        continue;
                    }
                    let ctx = window_context(
                        &prev[..prev_len],
                        &curr[..curr_len],
                        &next[..next_len],
                        pos,
                        word,
                        context,
                        base,
                    );
                    terms.push(Term {
                        pos: abs as usize,
                        word: Arc::clone(word),
                        context: ctx,
                    });
                    if stop_on_first {
                        return Ok(terms);
                    }
                }
            }

            base += curr_len as u64;
            // Rotate: prev <- curr <- next <- (recycled prev).
            std::mem::swap(&mut prev, &mut curr);
            std::mem::swap(&mut curr, &mut next);
            prev_len = curr_len;
            curr_len = next_len;
        }

        Ok(terms)
    }
}

/// Assemble the context slice for a match ending at `pos` within `curr`.
///
/// Coordinates are relative to `curr[0]`; negative offsets index the tail
/// of `prev`, offsets past `curr` index into `next`. The keyword bytes are
/// taken from the keyword itself, so a match straddling the `prev`/`curr`
/// boundary needs no special casing. The window is clipped at the true
/// stream boundaries.
fn window_context(
    prev: &[u8],
    curr: &[u8],
    next: &[u8],
    pos: usize,
    word: &[u8],
    context: usize,
    base: u64,
) -> Vec<u8> {
    let word_end = pos as i64 + 1;
    let word_begin = word_end - word.len() as i64;

    // Clip backwards at both the stream start and the window start.
    let mut ctx_begin = word_begin - context as i64;
    if base as i64 + ctx_begin < 0 {
        ctx_begin = -(base as i64);
    }
    if ctx_begin < -(prev.len() as i64) {
        ctx_begin = -(prev.len() as i64);
    }
    let ctx_end = (word_end + context as i64).min((curr.len() + next.len()) as i64);

    let mut out = Vec::with_capacity((ctx_end - ctx_begin) as usize);
    copy_window(&mut out, prev, curr, next, ctx_begin, word_begin);
    out.extend_from_slice(word);
    copy_window(&mut out, prev, curr, next, word_end, ctx_end);
    out
}

/// Copy window-relative range `[from, to)` into `out`.
fn copy_window(out: &mut Vec<u8>, prev: &[u8], curr: &[u8], next: &[u8], from: i64, to: i64) {
    let mut i = from;
    while i < to {
        let b = if i < 0 {
            prev[(prev.len() as i64 + i) as usize]
        } else if (i as usize) < curr.len() {
            curr[i as usize]
        } else {
            next[i as usize - curr.len()]
        };
        out.push(b);
        i += 1;
    }
}

/// Fill `buf` completely unless the stream ends first.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

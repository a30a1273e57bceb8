//! Per-line tokenizer state bookkeeping.
//!
//! [`LineStateCache`] tracks, for every buffer line, the grammar state the
//! line is entered with and whether the tokens currently attached to the
//! line were produced from that state. A single cursor, the *invalid
//! frontier*, marks the first line not yet known to be valid; the scheduler
//! always works at the frontier.
//!
//! The cache is what makes tokenization incremental: after an edit only the
//! touched lines are invalidated, and the skip-ahead check in
//! [`LineStateCache::set_end_state`] stops re-tokenization as soon as a
//! line's fresh end state matches the cached entry state of the next line.

use crate::buffer::LineRange;
use crate::tokenizer::TokenizerState;

#[derive(Debug)]
struct CachedLineState {
    begin_state: Option<Box<dyn TokenizerState>>,
    valid: bool,
}

impl CachedLineState {
    fn empty() -> Self {
        Self {
            begin_state: None,
            valid: false,
        }
    }
}

/// Ordered per-line cache of `(begin state, valid)` pairs plus the invalid
/// frontier.
///
/// Indices are 0-based; index `i` describes buffer line `i + 1`. Entries
/// beyond the current length behave as absent: no state, not valid. The
/// cache's length may lag the buffer's line count between an edit and the
/// next scheduler pass.
#[derive(Debug, Default)]
pub struct LineStateCache {
    entries: Vec<CachedLineState>,
    invalid_frontier: usize,
}

impl LineStateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The smallest index whose entry is not yet known to be valid.
    pub fn invalid_frontier(&self) -> usize {
        self.invalid_frontier
    }

    /// Discard all entries and reseed.
    ///
    /// With `initial` given, entry 0 receives the grammar's initial state
    /// (still marked invalid: line 1 has not been tokenized yet). Without
    /// it the cache stays empty, the shape used when no tokenizer is
    /// installed.
    pub fn flush(&mut self, initial: Option<Box<dyn TokenizerState>>) {
        self.entries.clear();
        if let Some(state) = initial {
            self.entries.push(CachedLineState {
                begin_state: Some(state),
                valid: false,
            });
        }
        self.invalid_frontier = 0;
    }

    /// The cached entry state for index `i`, or `None` when absent.
    pub fn begin_state(&self, index: usize) -> Option<&dyn TokenizerState> {
        self.entries.get(index).and_then(|e| e.begin_state.as_deref())
    }

    /// Whether the entry at `index` is currently marked valid.
    pub fn is_valid(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| e.valid)
    }

    /// Record the result of successfully tokenizing the line at `index`.
    ///
    /// Marks the entry valid and advances the frontier. Unless `index` is
    /// the buffer's last line, `end_state` is compared against the cached
    /// entry state of `index + 1`:
    ///
    /// - on a mismatch (or absence) the state is adopted there and the next
    ///   pass continues at `index + 1`;
    /// - on a match the frontier skips ahead over every downstream entry
    ///   still marked valid. Typing inside a string literal does not force
    ///   re-tokenizing the rest of the document when the downstream states
    ///   are unchanged.
    pub fn set_end_state(
        &mut self,
        buffer_line_count: usize,
        index: usize,
        end_state: Box<dyn TokenizerState>,
    ) {
        self.ensure_len(index + 1);
        self.entries[index].valid = true;
        self.invalid_frontier = index + 1;

        if index + 1 >= buffer_line_count {
            return;
        }

        let matches = self
            .begin_state(index + 1)
            .is_some_and(|prev| end_state.same_state(prev));
        if !matches {
            self.ensure_len(index + 2);
            let entry = &mut self.entries[index + 1];
            entry.begin_state = Some(end_state);
            entry.valid = false;
            return;
        }

        let mut next = index + 1;
        while next < buffer_line_count && self.entries.get(next).is_some_and(|e| e.valid) {
            next += 1;
        }
        self.invalid_frontier = next;
    }

    /// Mark the entry at `index` as not valid without touching its entry
    /// state or the frontier.
    ///
    /// Used for viewport tokenization, whose results are rendered but
    /// known-provisional: the background pass must still visit the line.
    pub fn mark_provisional(&mut self, index: usize) {
        self.ensure_len(index + 1);
        self.entries[index].valid = false;
    }

    /// Patch the cache for a buffer edit.
    ///
    /// `range` is the 1-based line range the edit covered before it was
    /// applied; `inserted_line_count` is the number of line breaks in the
    /// inserted text. The edited lines are invalidated against their
    /// pre-edit indices first, then deleted entries are spliced out and
    /// fresh absent entries spliced in. Entries shifted by the splice stay
    /// valid relative to their (moved) entry states; the skip-ahead check
    /// revalidates them on the next pass.
    pub fn apply_edit(&mut self, range: &LineRange, inserted_line_count: usize) {
        let deleted_line_count = range.deleted_line_count();
        let edited_line_count = deleted_line_count.min(inserted_line_count);

        for j in (0..=edited_line_count).rev() {
            if let Some(index) = (range.start_line + j).checked_sub(1) {
                self.invalidate_line(index);
            }
        }

        if range.start_line - 1 < self.entries.len() && deleted_line_count > 0 {
            let start = range.start_line.min(self.entries.len());
            let end = (start + deleted_line_count).min(self.entries.len());
            self.entries.drain(start..end);
        }

        if range.start_line - 1 < self.entries.len() && inserted_line_count > 0 {
            let at = range.start_line.min(self.entries.len());
            self.entries
                .splice(at..at, (0..inserted_line_count).map(|_| CachedLineState::empty()));
        }
    }

    fn invalidate_line(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.valid = false;
        }
        if index < self.invalid_frontier {
            self.invalid_frontier = index;
        }
    }

    fn ensure_len(&mut self, len: usize) {
        while self.entries.len() < len {
            self.entries.push(CachedLineState::empty());
        }
    }
}

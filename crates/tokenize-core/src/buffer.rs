//! Buffer surface consumed by the engine, plus a rope-backed in-memory
//! implementation.
//!
//! The engine holds a handle to a [`TextBuffer`] and subscribes to its
//! events; there is no back-reference from the buffer to the engine beyond
//! the subscription record, which the engine releases on disposal. Buffers
//! receive tokens through the [`TextBuffer::set_tokens`] /
//! [`TextBuffer::clear_tokens`] sinks.
//!
//! [`InMemoryBuffer`] stores its text in a [`ropey::Rope`] and keeps
//! per-line token bookkeeping in sync with edits, which makes it suitable
//! for tests, benchmarks, and headless embedding.

use crate::tokens::{LineTokens, MultilineTokens};
use ropey::Rope;
use std::cell::{Cell, RefCell};

/// Identifies one listener registration on a buffer or registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// A 1-based line range touched by an edit.
///
/// `end_line - start_line` is the number of line breaks the edit removed;
/// an edit confined to one line has `start_line == end_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    /// First line of the range.
    pub start_line: usize,
    /// Last line of the range.
    pub end_line: usize,
}

impl LineRange {
    /// Create a range. `start_line` must be at least 1 and no greater than
    /// `end_line`.
    pub fn new(start_line: usize, end_line: usize) -> Self {
        debug_assert!(start_line >= 1 && start_line <= end_line);
        Self {
            start_line,
            end_line,
        }
    }

    /// Number of line breaks removed by an edit covering this range.
    pub fn deleted_line_count(&self) -> usize {
        self.end_line - self.start_line
    }
}

/// One incremental content change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentChange {
    /// The pre-edit line range the change covered.
    pub range: LineRange,
    /// Number of line breaks in the inserted text.
    pub inserted_eol_count: usize,
}

/// Events a buffer delivers to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    /// The content changed. With `is_flush` the whole document was
    /// replaced and per-change patching is pointless.
    ContentsChanged {
        /// The individual changes, in application order.
        changes: Vec<ContentChange>,
        /// Whether this was a full-document replacement.
        is_flush: bool,
    },
    /// The buffer's language id changed.
    LanguageChanged,
    /// The buffer was attached to or detached from a view.
    AttachedChanged,
}

/// Callback invoked for every [`BufferEvent`].
pub type BufferListener = Box<dyn Fn(&BufferEvent)>;

/// The buffer surface the engine consumes.
///
/// Lines are 1-based. All text measurements are in chars.
pub trait TextBuffer {
    /// Number of lines in the buffer (at least 1).
    fn line_count(&self) -> usize;

    /// Text of a line, without its terminator.
    fn line_text(&self, line_number: usize) -> String;

    /// Char length of a line, without its terminator.
    fn line_length(&self, line_number: usize) -> usize;

    /// 1-based column of the first non-whitespace char of a line, or 0
    /// when the line is empty or whitespace-only.
    fn first_non_whitespace_column(&self, line_number: usize) -> usize;

    /// The buffer's current language id.
    fn language_id(&self) -> String;

    /// Whether the buffer is attached to a view. Unattached buffers
    /// receive no background tokenization.
    fn is_attached(&self) -> bool;

    /// Whether the buffer is too large for tokenization to be worthwhile.
    fn is_too_large_for_tokenization(&self) -> bool;

    /// Receive freshly produced tokens. `completed` signals that the whole
    /// buffer is now tokenized.
    fn set_tokens(&self, blocks: Vec<MultilineTokens>, completed: bool);

    /// Drop all stored tokens.
    fn clear_tokens(&self);

    /// Subscribe to buffer events.
    fn subscribe(&self, listener: BufferListener) -> SubscriptionId;

    /// Release a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

struct BufferInner {
    rope: Rope,
    language_id: String,
    attached: bool,
    too_large: bool,
    tokens: Vec<Option<LineTokens>>,
    tokens_completed: bool,
}

impl BufferInner {
    fn line_char_len(&self, line_index: usize) -> usize {
        let line = self.rope.line(line_index);
        let mut len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && line.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        len
    }

    fn char_offset(&self, line_number: usize, column: usize) -> usize {
        let line_index = line_number - 1;
        let start = self.rope.line_to_char(line_index);
        let column = (column - 1).min(self.line_char_len(line_index));
        start + column
    }

    fn splice_tokens(&mut self, start_line: usize, deleted: usize, inserted: usize) {
        let merged_index = start_line - 1;
        if merged_index >= self.tokens.len() {
            return;
        }
        self.tokens[merged_index] = None;
        let drain_start = start_line.min(self.tokens.len());
        let drain_end = (drain_start + deleted).min(self.tokens.len());
        self.tokens.drain(drain_start..drain_end);
        let at = start_line.min(self.tokens.len());
        self.tokens.splice(at..at, (0..inserted).map(|_| None));
        self.tokens_completed = false;
    }
}

/// Rope-backed [`TextBuffer`] for tests, benchmarks, and headless hosts.
///
/// Mutations go through [`InMemoryBuffer::apply_edit`] and friends, which
/// update the rope, splice the per-line token store, and then notify
/// subscribers. Events are delivered after internal borrows are released,
/// so listeners may freely query the buffer or push tokens back into it.
pub struct InMemoryBuffer {
    inner: RefCell<BufferInner>,
    listeners: RefCell<Vec<(SubscriptionId, BufferListener)>>,
    next_subscription: Cell<u64>,
}

impl InMemoryBuffer {
    /// Create a buffer over `text` with the given language id, attached
    /// and within the tokenization size limit.
    pub fn new(text: &str, language_id: &str) -> Self {
        let rope = Rope::from_str(text);
        let line_count = rope.len_lines();
        Self {
            inner: RefCell::new(BufferInner {
                rope,
                language_id: language_id.to_string(),
                attached: true,
                too_large: false,
                tokens: vec![None; line_count],
                tokens_completed: false,
            }),
            listeners: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
        }
    }

    /// Attach or detach the buffer, notifying subscribers on a change.
    pub fn set_attached(&self, attached: bool) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let changed = inner.attached != attached;
            inner.attached = attached;
            changed
        };
        if changed {
            self.emit(&BufferEvent::AttachedChanged);
        }
    }

    /// Mark the buffer as beyond the tokenization size limit. The
    /// predicate is consulted when an engine (re-)resolves its tokenizer.
    pub fn set_too_large_for_tokenization(&self, too_large: bool) {
        self.inner.borrow_mut().too_large = too_large;
    }

    /// Change the language id, notifying subscribers on a change.
    pub fn set_language_id(&self, language_id: &str) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let changed = inner.language_id != language_id;
            inner.language_id = language_id.to_string();
            changed
        };
        if changed {
            self.emit(&BufferEvent::LanguageChanged);
        }
    }

    /// Replace the whole document, dropping all tokens, and emit a flush
    /// change.
    pub fn set_text(&self, text: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.rope = Rope::from_str(text);
            let line_count = inner.rope.len_lines();
            inner.tokens = vec![None; line_count];
            inner.tokens_completed = false;
        }
        self.emit(&BufferEvent::ContentsChanged {
            changes: Vec::new(),
            is_flush: true,
        });
    }

    /// Replace the char range between two 1-based line/column positions
    /// with `text` and emit the corresponding incremental change.
    ///
    /// Columns are 1-based char positions; column 1 addresses the start of
    /// the line and `line_length + 1` the end. Positions are clamped to
    /// the current document.
    pub fn apply_edit(
        &self,
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
        text: &str,
    ) {
        let change = {
            let mut inner = self.inner.borrow_mut();
            let line_count = inner.rope.len_lines();
            let start_line = start_line.clamp(1, line_count);
            let end_line = end_line.clamp(start_line, line_count);
            let start = inner.char_offset(start_line, start_column);
            let end = inner.char_offset(end_line, end_column).max(start);

            inner.rope.remove(start..end);
            inner.rope.insert(start, text);

            let inserted_eol_count = text.matches('\n').count();
            let deleted = end_line - start_line;
            inner.splice_tokens(start_line, deleted, inserted_eol_count);

            ContentChange {
                range: LineRange::new(start_line, end_line),
                inserted_eol_count,
            }
        };
        self.emit(&BufferEvent::ContentsChanged {
            changes: vec![change],
            is_flush: false,
        });
    }

    /// Replace the content of one line, keeping its terminator.
    pub fn set_line_text(&self, line_number: usize, text: &str) {
        let end_column = self.line_length(line_number) + 1;
        self.apply_edit(line_number, 1, line_number, end_column, text);
    }

    /// The stored tokens for a line, if any were delivered.
    pub fn line_tokens(&self, line_number: usize) -> Option<LineTokens> {
        self.inner
            .borrow()
            .tokens
            .get(line_number - 1)
            .and_then(|t| t.clone())
    }

    /// Whether the last token delivery signalled a fully tokenized buffer.
    pub fn tokens_completed(&self) -> bool {
        self.inner.borrow().tokens_completed
    }

    /// Number of lines that currently have stored tokens.
    pub fn tokenized_line_count(&self) -> usize {
        self.inner
            .borrow()
            .tokens
            .iter()
            .filter(|t| t.is_some())
            .count()
    }

    fn emit(&self, event: &BufferEvent) {
        let listeners = self.listeners.borrow();
        for (_, listener) in listeners.iter() {
            listener(event);
        }
    }
}

impl TextBuffer for InMemoryBuffer {
    fn line_count(&self) -> usize {
        self.inner.borrow().rope.len_lines()
    }

    fn line_text(&self, line_number: usize) -> String {
        let inner = self.inner.borrow();
        let line_index = line_number - 1;
        if line_index >= inner.rope.len_lines() {
            return String::new();
        }
        let len = inner.line_char_len(line_index);
        let start = inner.rope.line_to_char(line_index);
        inner.rope.slice(start..start + len).to_string()
    }

    fn line_length(&self, line_number: usize) -> usize {
        let inner = self.inner.borrow();
        let line_index = line_number - 1;
        if line_index >= inner.rope.len_lines() {
            return 0;
        }
        inner.line_char_len(line_index)
    }

    fn first_non_whitespace_column(&self, line_number: usize) -> usize {
        let text = self.line_text(line_number);
        text.chars()
            .position(|c| !c.is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn language_id(&self) -> String {
        self.inner.borrow().language_id.clone()
    }

    fn is_attached(&self) -> bool {
        self.inner.borrow().attached
    }

    fn is_too_large_for_tokenization(&self) -> bool {
        self.inner.borrow().too_large
    }

    fn set_tokens(&self, blocks: Vec<MultilineTokens>, completed: bool) {
        let mut inner = self.inner.borrow_mut();
        for block in blocks {
            let start_index = block.start_line_number - 1;
            for (offset, line_tokens) in block.lines.into_iter().enumerate() {
                if let Some(slot) = inner.tokens.get_mut(start_index + offset) {
                    *slot = Some(line_tokens);
                }
            }
        }
        inner.tokens_completed = completed;
    }

    fn clear_tokens(&self) {
        let mut inner = self.inner.borrow_mut();
        for slot in &mut inner.tokens {
            *slot = None;
        }
        inner.tokens_completed = false;
    }

    fn subscribe(&self, listener: BufferListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

//! The tokenization engine: lifecycle management plus the three scheduling
//! modes that share one state cache.
//!
//! - **Background**: idle-deadline slices subdivided into ~1 ms bursts with
//!   zero-delay yields in between, so the host can interleave input
//!   handling and paints inside a single idle window.
//! - **Synchronous**: [`TokenizationEngine::force_tokenization`] walks the
//!   cache frontier up to a target line before returning.
//! - **Viewport**: [`TokenizationEngine::tokenize_viewport`] produces
//!   provisional highlighting for a visible window without tokenizing the
//!   gap above it, deriving a plausible entry state from less-indented
//!   lines.
//!
//! The engine is single-threaded and cooperative: every suspension point
//! (idle callback delivery, zero-delay yield) re-validates disposal,
//! attachment, and remaining work before touching the cache again.

use crate::buffer::{BufferEvent, SubscriptionId, TextBuffer};
use crate::errors::{EngineError, ErrorSink};
use crate::host::{Host, IdleDeadline};
use crate::safe_tokenizer::safe_tokenize;
use crate::state_cache::LineStateCache;
use crate::tokenizer::{Tokenizer, TokenizerRegistry, TokenizerState};
use crate::tokens::{LanguageIdCodec, MultilineTokensBuilder, StandardTokenType};
use std::cell::RefCell;
use std::rc::Rc;

/// Char length at and above which a line is not considered cheap to
/// tokenize synchronously.
pub const CHEAP_TOKENIZATION_LENGTH_LIMIT: usize = 2048;

/// Minimum wall-clock time spent per background burst before yielding, in
/// milliseconds. The comparison is strict so that millisecond-granular
/// clocks cannot produce zero-length slices.
const BURST_MIN_MS: f64 = 1.0;

/// Drives a pluggable line-oriented tokenizer across an editable buffer.
///
/// The engine subscribes to its buffer and registry on construction,
/// patches its [`LineStateCache`] on every edit, and keeps background
/// tokenization scheduled while there is work to do. Synchronous entry
/// points bypass the pacing but reuse the same tokenization routine.
///
/// Dropping the engine disposes it: subscriptions are released and any
/// in-flight slice exits at its next suspension check without publishing
/// tokens.
pub struct TokenizationEngine {
    core: Rc<RefCell<EngineCore>>,
    buffer: Rc<dyn TextBuffer>,
    registry: Rc<TokenizerRegistry>,
    buffer_subscription: Option<SubscriptionId>,
    registry_subscription: Option<SubscriptionId>,
}

struct EngineCore {
    buffer: Rc<dyn TextBuffer>,
    registry: Rc<TokenizerRegistry>,
    host: Rc<dyn Host>,
    sink: Rc<dyn ErrorSink>,
    codec: Rc<LanguageIdCodec>,
    tokenizer: Option<Rc<dyn Tokenizer>>,
    cache: LineStateCache,
    scheduled: bool,
    disposed: bool,
}

impl TokenizationEngine {
    /// Create an engine over `buffer`, resolving its tokenizer from
    /// `registry`, and start background tokenization.
    pub fn new(
        buffer: Rc<dyn TextBuffer>,
        registry: Rc<TokenizerRegistry>,
        codec: Rc<LanguageIdCodec>,
        host: Rc<dyn Host>,
        sink: Rc<dyn ErrorSink>,
    ) -> Self {
        let core = Rc::new(RefCell::new(EngineCore {
            buffer: buffer.clone(),
            registry: registry.clone(),
            host,
            sink,
            codec,
            tokenizer: None,
            cache: LineStateCache::new(),
            scheduled: false,
            disposed: false,
        }));

        EngineCore::reset_tokenization(&core, false);

        let weak = Rc::downgrade(&core);
        let buffer_subscription = buffer.subscribe(Box::new(move |event| {
            if let Some(core) = weak.upgrade() {
                EngineCore::on_buffer_event(&core, event);
            }
        }));

        let weak = Rc::downgrade(&core);
        let registry_subscription = registry.on_changed(Box::new(move |changed| {
            if let Some(core) = weak.upgrade() {
                EngineCore::on_registry_changed(&core, changed);
            }
        }));

        Self {
            core,
            buffer,
            registry,
            buffer_subscription: Some(buffer_subscription),
            registry_subscription: Some(registry_subscription),
        }
    }

    /// Re-resolve the tokenizer, clear and reseed the cache, drop the
    /// buffer's tokens, and restart background tokenization.
    pub fn reset(&self) {
        EngineCore::reset_tokenization(&self.core, true);
    }

    /// Ensure lines `1..=line_number` are tokenized before returning.
    ///
    /// The driving loop refreshes its position from the invalid frontier
    /// after every line, because the skip-ahead check may advance it past
    /// the target.
    pub fn force_tokenization(&self, line_number: usize) {
        EngineCore::force_tokenization(&self.core, line_number);
    }

    /// Provisionally tokenize the visible window `start_line..=end_line`.
    ///
    /// Lines already covered by the frontier are left alone; a window
    /// straddling the frontier degrades to
    /// [`TokenizationEngine::force_tokenization`]. Otherwise a synthetic
    /// prefix of less-indented lines above the window supplies a plausible
    /// entry state, the window's tokens are published, and its cache
    /// entries stay invalid so the background pass revisits them.
    pub fn tokenize_viewport(&self, start_line: usize, end_line: usize) {
        EngineCore::tokenize_viewport(&self.core, start_line, end_line);
    }

    /// Whether tokenizing up to `line_number` would be perceptibly cheap:
    /// the line is already tokenized, or it is the next invalid line and
    /// shorter than [`CHEAP_TOKENIZATION_LENGTH_LIMIT`].
    pub fn is_cheap_to_tokenize(&self, line_number: usize) -> bool {
        let core = self.core.borrow();
        if core.tokenizer.is_none() {
            return true;
        }
        let first_invalid_line = core.cache.invalid_frontier() + 1;
        if line_number < first_invalid_line {
            return true;
        }
        line_number == first_invalid_line
            && core.buffer.line_length(line_number) < CHEAP_TOKENIZATION_LENGTH_LIMIT
    }

    /// The token type the caret position would land in if `ch` were
    /// inserted at the 1-based `column` of `line_number`.
    ///
    /// Tokenizes a synthetic copy of the line using its cached entry state
    /// and never writes results back; with no cached state (or no
    /// tokenizer) the answer is [`StandardTokenType::Other`].
    pub fn standard_token_type_if_inserting(
        &self,
        line_number: usize,
        column: usize,
        ch: char,
    ) -> StandardTokenType {
        EngineCore::standard_token_type_if_inserting(&self.core, line_number, column, ch)
    }

    /// Number of leading buffer lines whose tokens are known up to date.
    pub fn tokenized_line_count(&self) -> usize {
        self.core.borrow().cache.invalid_frontier()
    }

    /// Whether the cache claims the tokens of `line_number` as
    /// authoritative. Viewport results are rendered but never claimed.
    pub fn line_tokens_valid(&self, line_number: usize) -> bool {
        line_number >= 1 && self.core.borrow().cache.is_valid(line_number - 1)
    }

    /// Whether the engine has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.core.borrow().disposed
    }

    /// Stop the engine: release subscriptions and make every pending
    /// scheduled callback exit without publishing. Idempotent.
    pub fn dispose(&mut self) {
        {
            let mut core = self.core.borrow_mut();
            if core.disposed {
                return;
            }
            core.disposed = true;
        }
        if let Some(id) = self.buffer_subscription.take() {
            self.buffer.unsubscribe(id);
        }
        if let Some(id) = self.registry_subscription.take() {
            self.registry.remove_listener(id);
        }
    }
}

impl Drop for TokenizationEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl EngineCore {
    /// Resolve the tokenizer for the buffer's current language and reseed
    /// the cache with its initial state.
    ///
    /// A too-large buffer, an unregistered language, or a failing
    /// `initial_state` all leave the engine a no-op: lines simply stay
    /// un-highlighted until the registry or language changes again.
    fn reset_tokenization(core: &Rc<RefCell<Self>>, clear_tokens: bool) {
        {
            let mut c = core.borrow_mut();
            if c.disposed {
                return;
            }
            c.tokenizer = None;
            let language_id = c.buffer.language_id();
            if !c.buffer.is_too_large_for_tokenization() {
                if let Some(tokenizer) = c.registry.get(&language_id) {
                    match tokenizer.initial_state() {
                        Ok(initial) => {
                            c.cache.flush(Some(initial));
                            c.tokenizer = Some(tokenizer);
                        }
                        Err(source) => {
                            c.sink.report(&EngineError::InitialState {
                                language_id,
                                source,
                            });
                            c.cache.flush(None);
                        }
                    }
                } else {
                    c.cache.flush(None);
                }
            } else {
                c.cache.flush(None);
            }
            if clear_tokens {
                c.buffer.clear_tokens();
            }
        }
        Self::schedule_background(core);
    }

    fn on_buffer_event(core: &Rc<RefCell<Self>>, event: &BufferEvent) {
        match event {
            BufferEvent::ContentsChanged { changes, is_flush } => {
                if *is_flush {
                    Self::reset_tokenization(core, false);
                    return;
                }
                {
                    let mut c = core.borrow_mut();
                    if c.disposed {
                        return;
                    }
                    for change in changes {
                        c.cache.apply_edit(&change.range, change.inserted_eol_count);
                    }
                }
                Self::schedule_background(core);
            }
            BufferEvent::LanguageChanged => Self::reset_tokenization(core, false),
            BufferEvent::AttachedChanged => Self::schedule_background(core),
        }
    }

    fn on_registry_changed(core: &Rc<RefCell<Self>>, changed: &[String]) {
        let affected = {
            let c = core.borrow();
            if c.disposed {
                return;
            }
            let language_id = c.buffer.language_id();
            changed.iter().any(|id| *id == language_id)
        };
        if affected {
            Self::reset_tokenization(core, true);
        }
    }

    /// Request the next idle window, unless one is already requested or
    /// there is nothing to do.
    fn schedule_background(core: &Rc<RefCell<Self>>) {
        let host = {
            let mut c = core.borrow_mut();
            if c.disposed || c.scheduled {
                return;
            }
            if !c.buffer.is_attached() {
                return;
            }
            if c.tokenizer.is_none() {
                return;
            }
            if c.cache.invalid_frontier() >= c.buffer.line_count() {
                return;
            }
            c.scheduled = true;
            c.host.clone()
        };
        let weak = Rc::downgrade(core);
        host.request_idle_callback(Box::new(move |deadline| {
            let Some(core) = weak.upgrade() else {
                return;
            };
            EngineCore::on_idle(&core, deadline);
        }));
    }

    fn on_idle(core: &Rc<RefCell<Self>>, deadline: &dyn IdleDeadline) {
        let end_time = {
            let mut c = core.borrow_mut();
            c.scheduled = false;
            if c.disposed {
                return;
            }
            c.host.now() + deadline.time_remaining()
        };
        Self::run_background_slice(core, end_time);
    }

    /// One burst of the current idle window. Yields with a zero-delay
    /// continuation while the window has budget left; otherwise requests
    /// the next window.
    fn run_background_slice(core: &Rc<RefCell<Self>>, end_time: f64) {
        let has_more = Self::tokenize_for_at_least_1ms(core);

        let (disposed, now, host) = {
            let c = core.borrow();
            (c.disposed, c.host.now(), c.host.clone())
        };
        if disposed || !has_more {
            return;
        }

        if now < end_time {
            let weak = Rc::downgrade(core);
            host.schedule_task(Box::new(move || {
                let Some(core) = weak.upgrade() else {
                    return;
                };
                if core.borrow().disposed {
                    return;
                }
                EngineCore::run_background_slice(&core, end_time);
            }));
        } else {
            Self::schedule_background(core);
        }
    }

    /// Pull invalid lines one at a time until just over 1 ms has elapsed,
    /// then flush the accumulated tokens to the buffer. Returns whether
    /// invalid lines remain.
    fn tokenize_for_at_least_1ms(core: &Rc<RefCell<Self>>) -> bool {
        let mut c = core.borrow_mut();
        if c.disposed || !c.buffer.is_attached() {
            return false;
        }
        let slice_start = c.host.now();
        let mut builder = MultilineTokensBuilder::new();

        let has_more = loop {
            if c.disposed {
                // Exit without publishing anything from this slice.
                return false;
            }
            if c.tokenizer.is_none() {
                break false;
            }
            let line_count = c.buffer.line_count();
            if c.cache.invalid_frontier() >= line_count {
                break false;
            }
            c.tokenize_one_line(&mut builder);
            if c.host.now() - slice_start > BURST_MIN_MS {
                break c.cache.invalid_frontier() < c.buffer.line_count();
            }
        };

        let completed = c.cache.invalid_frontier() >= c.buffer.line_count();
        let blocks = builder.finish();
        let buffer = c.buffer.clone();
        drop(c);
        buffer.set_tokens(blocks, completed);
        has_more
    }

    /// Tokenize the line at the invalid frontier and run the propagation
    /// protocol on the result.
    fn tokenize_one_line(&mut self, builder: &mut MultilineTokensBuilder) {
        let Some(tokenizer) = self.tokenizer.clone() else {
            return;
        };
        let index = self.cache.invalid_frontier();
        let line_number = index + 1;
        let text = self.buffer.line_text(line_number);
        let language_id = self.buffer.language_id();

        let begin = match self.cache.begin_state(index) {
            Some(state) => state.clone_boxed(),
            // A spliced-in entry can reach the frontier without ever having
            // received a state; re-enter from the grammar's initial state.
            None => match tokenizer.initial_state() {
                Ok(state) => state,
                Err(source) => {
                    self.sink.report(&EngineError::InitialState {
                        language_id,
                        source,
                    });
                    self.tokenizer = None;
                    return;
                }
            },
        };

        let result = safe_tokenize(
            tokenizer.as_ref(),
            self.codec.as_ref(),
            &language_id,
            line_number,
            &text,
            true,
            begin.as_ref(),
            self.sink.as_ref(),
        );
        builder.add(line_number, result.tokens);
        let line_count = self.buffer.line_count();
        self.cache.set_end_state(line_count, index, result.end_state);
    }

    fn force_tokenization(core: &Rc<RefCell<Self>>, line_number: usize) {
        let mut c = core.borrow_mut();
        if c.disposed || c.tokenizer.is_none() {
            return;
        }
        let line_number = line_number.min(c.buffer.line_count());
        if line_number == 0 || c.cache.invalid_frontier() >= line_number {
            return;
        }

        let mut builder = MultilineTokensBuilder::new();
        while c.cache.invalid_frontier() < line_number {
            c.tokenize_one_line(&mut builder);
            if c.tokenizer.is_none() {
                break;
            }
        }

        let completed = c.cache.invalid_frontier() >= c.buffer.line_count();
        let blocks = builder.finish();
        let buffer = c.buffer.clone();
        drop(c);
        buffer.set_tokens(blocks, completed);
    }

    fn tokenize_viewport(core: &Rc<RefCell<Self>>, start_line: usize, end_line: usize) {
        let mut c = core.borrow_mut();
        if c.disposed {
            return;
        }
        let Some(tokenizer) = c.tokenizer.clone() else {
            return;
        };
        let line_count = c.buffer.line_count();
        let start_line = start_line.max(1);
        let end_line = end_line.min(line_count);
        if start_line > end_line {
            return;
        }

        let frontier = c.cache.invalid_frontier();
        if end_line <= frontier {
            // The whole window is already tokenized.
            return;
        }
        if start_line <= frontier {
            // The window straddles the frontier; the normal path will
            // reach it quickly.
            drop(c);
            Self::force_tokenization(core, end_line);
            return;
        }

        let language_id = c.buffer.language_id();

        // Walk backwards over less-indented lines to find either a cached
        // entry state or a plausible restart point. Less indentation
        // usually means a statement or block boundary, where grammar state
        // tends to be simple.
        let mut anchor_column = c.buffer.first_non_whitespace_column(start_line);
        let mut prefix: Vec<(usize, String)> = Vec::new();
        let mut entry_state: Option<Box<dyn TokenizerState>> = None;
        let mut line = start_line - 1;
        while anchor_column > 0 && line >= 1 {
            let column = c.buffer.first_non_whitespace_column(line);
            if column != 0 && column < anchor_column {
                if let Some(state) = c.cache.begin_state(line - 1) {
                    entry_state = Some(state.clone_boxed());
                    break;
                }
                prefix.push((line, c.buffer.line_text(line)));
                anchor_column = column;
            }
            line -= 1;
        }

        let mut state = match entry_state {
            Some(state) => state,
            None => match tokenizer.initial_state() {
                Ok(state) => state,
                Err(source) => {
                    c.sink.report(&EngineError::InitialState {
                        language_id,
                        source,
                    });
                    c.tokenizer = None;
                    return;
                }
            },
        };

        // The prefix lines were collected bottom-up; run them top-down,
        // keeping only the resulting state.
        for (prefix_line, text) in prefix.iter().rev() {
            let result = safe_tokenize(
                tokenizer.as_ref(),
                c.codec.as_ref(),
                &language_id,
                *prefix_line,
                text,
                false,
                state.as_ref(),
                c.sink.as_ref(),
            );
            state = result.end_state;
        }

        let mut builder = MultilineTokensBuilder::new();
        for line_number in start_line..=end_line {
            let text = c.buffer.line_text(line_number);
            let result = safe_tokenize(
                tokenizer.as_ref(),
                c.codec.as_ref(),
                &language_id,
                line_number,
                &text,
                true,
                state.as_ref(),
                c.sink.as_ref(),
            );
            builder.add(line_number, result.tokens);
            c.cache.mark_provisional(line_number - 1);
            state = result.end_state;
        }

        let blocks = builder.finish();
        let buffer = c.buffer.clone();
        drop(c);
        buffer.set_tokens(blocks, false);
    }

    fn standard_token_type_if_inserting(
        core: &Rc<RefCell<Self>>,
        line_number: usize,
        column: usize,
        ch: char,
    ) -> StandardTokenType {
        let c = core.borrow();
        if c.disposed {
            return StandardTokenType::Other;
        }
        let Some(tokenizer) = c.tokenizer.clone() else {
            return StandardTokenType::Other;
        };
        if line_number == 0 || line_number > c.buffer.line_count() {
            return StandardTokenType::Other;
        }
        let Some(state) = c.cache.begin_state(line_number - 1) else {
            return StandardTokenType::Other;
        };
        let state = state.clone_boxed();

        let text = c.buffer.line_text(line_number);
        let offset = (column.saturating_sub(1)).min(text.chars().count());
        let byte = text
            .char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(text.len());
        let mut probe = String::with_capacity(text.len() + ch.len_utf8());
        probe.push_str(&text[..byte]);
        probe.push(ch);
        probe.push_str(&text[byte..]);

        let result = safe_tokenize(
            tokenizer.as_ref(),
            c.codec.as_ref(),
            &c.buffer.language_id(),
            line_number,
            &probe,
            true,
            state.as_ref(),
            c.sink.as_ref(),
        );
        result.tokens.standard_token_type_at(offset)
    }
}

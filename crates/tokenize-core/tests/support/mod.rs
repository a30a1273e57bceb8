//! Shared doubles and fixtures for the engine integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokenize_core::{
    EngineError, ErrorSink, GrammarError, InMemoryBuffer, LanguageIdCodec, LineTokens, ManualHost,
    TokenizationEngine, TokenizationResult, Tokenizer, TokenizerRegistry, TokenizerState,
};

/// Everything a test needs to drive one engine.
pub struct Fixture {
    pub buffer: Rc<InMemoryBuffer>,
    pub registry: Rc<TokenizerRegistry>,
    pub codec: Rc<LanguageIdCodec>,
    pub host: Rc<ManualHost>,
    pub sink: Rc<CollectingSink>,
    pub engine: TokenizationEngine,
}

/// Build an engine over a fresh buffer, registry, and host.
pub fn fixture(text: &str, language: &str, tokenizer: Rc<dyn Tokenizer>) -> Fixture {
    fixture_on(Rc::new(ManualHost::new()), text, language, tokenizer)
}

/// Build an engine on a caller-supplied host (for clock-driven doubles).
pub fn fixture_on(
    host: Rc<ManualHost>,
    text: &str,
    language: &str,
    tokenizer: Rc<dyn Tokenizer>,
) -> Fixture {
    let buffer = Rc::new(InMemoryBuffer::new(text, language));
    let registry = Rc::new(TokenizerRegistry::new());
    registry.register(language, tokenizer);
    let codec = Rc::new(LanguageIdCodec::new());
    let sink = Rc::new(CollectingSink::default());
    let engine = TokenizationEngine::new(
        buffer.clone(),
        registry.clone(),
        codec.clone(),
        host.clone(),
        sink.clone(),
    );
    Fixture {
        buffer,
        registry,
        codec,
        host,
        sink,
        engine,
    }
}

/// Sink that records every report as its display string.
#[derive(Default)]
pub struct CollectingSink {
    pub reports: RefCell<Vec<String>>,
}

impl CollectingSink {
    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, error: &EngineError) {
        self.reports.borrow_mut().push(error.to_string());
    }
}

/// Counts tokenize calls, delegating to an inner grammar.
pub struct CountingTokenizer {
    inner: Rc<dyn Tokenizer>,
    calls: Rc<Cell<usize>>,
}

impl CountingTokenizer {
    pub fn new(inner: Rc<dyn Tokenizer>) -> (Rc<Self>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Rc::new(Self {
                inner,
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

impl Tokenizer for CountingTokenizer {
    fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError> {
        self.inner.initial_state()
    }
    fn tokenize(
        &self,
        text: &str,
        has_eol: bool,
        state: Box<dyn TokenizerState>,
    ) -> Result<TokenizationResult, GrammarError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.tokenize(text, has_eol, state)
    }
}

/// Simulates per-line tokenization cost by advancing the manual clock.
pub struct TimedTokenizer {
    inner: Rc<dyn Tokenizer>,
    host: Rc<ManualHost>,
    cost_ms: f64,
}

impl TimedTokenizer {
    pub fn new(inner: Rc<dyn Tokenizer>, host: Rc<ManualHost>, cost_ms: f64) -> Rc<Self> {
        Rc::new(Self {
            inner,
            host,
            cost_ms,
        })
    }
}

impl Tokenizer for TimedTokenizer {
    fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError> {
        self.inner.initial_state()
    }
    fn tokenize(
        &self,
        text: &str,
        has_eol: bool,
        state: Box<dyn TokenizerState>,
    ) -> Result<TokenizationResult, GrammarError> {
        self.host.advance(self.cost_ms);
        self.inner.tokenize(text, has_eol, state)
    }
}

/// Fails on any line containing `marker`, delegating otherwise.
pub struct FailingTokenizer {
    inner: Rc<dyn Tokenizer>,
    marker: String,
}

impl FailingTokenizer {
    pub fn new(inner: Rc<dyn Tokenizer>, marker: &str) -> Rc<Self> {
        Rc::new(Self {
            inner,
            marker: marker.to_string(),
        })
    }
}

impl Tokenizer for FailingTokenizer {
    fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError> {
        self.inner.initial_state()
    }
    fn tokenize(
        &self,
        text: &str,
        has_eol: bool,
        state: Box<dyn TokenizerState>,
    ) -> Result<TokenizationResult, GrammarError> {
        if text.contains(&self.marker) {
            return Err(GrammarError::new("marked line"));
        }
        self.inner.tokenize(text, has_eol, state)
    }
}

/// A grammar whose initial state cannot be produced.
pub struct BadInitTokenizer;

impl Tokenizer for BadInitTokenizer {
    fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError> {
        Err(GrammarError::new("no initial state"))
    }
    fn tokenize(
        &self,
        _text: &str,
        _has_eol: bool,
        state: Box<dyn TokenizerState>,
    ) -> Result<TokenizationResult, GrammarError> {
        Ok(TokenizationResult {
            tokens: LineTokens::default(),
            end_state: state,
        })
    }
}

/// Tokens produced by running `tokenizer` over `lines` from its initial
/// state, the way a from-scratch pass would.
pub fn reference_tokens(tokenizer: &dyn Tokenizer, lines: &[String]) -> Vec<LineTokens> {
    let mut state = tokenizer
        .initial_state()
        .expect("reference grammar must produce an initial state");
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let result = tokenizer
            .tokenize(line, true, state.clone_boxed())
            .expect("reference grammar must tokenize");
        state = result.end_state;
        out.push(result.tokens);
    }
    out
}

/// All line texts of a buffer, top to bottom.
pub fn buffer_lines(buffer: &InMemoryBuffer) -> Vec<String> {
    use tokenize_core::TextBuffer;
    (1..=buffer.line_count())
        .map(|n| buffer.line_text(n))
        .collect()
}

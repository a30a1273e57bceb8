#![warn(missing_docs)]
//! Tokenize Core - Incremental Background Tokenization Engine
//!
//! # Overview
//!
//! `tokenize-core` drives a pluggable line-oriented tokenizer across an
//! editable text buffer, producing per-line token streams for a syntax
//! highlighting pipeline. It is headless: rendering, grammars, and the
//! buffer implementation are collaborators reached through small traits.
//!
//! Three pressures are honoured simultaneously:
//!
//! - **Correctness under edits** - the buffer mutates concurrently with
//!   tokenization; every line's tokens eventually reflect its current
//!   content.
//! - **UI responsiveness** - background work runs in small slices bounded
//!   by host idle deadlines, subdivided into ~1 ms bursts with cooperative
//!   yields.
//! - **On-demand freshness** - synchronous entry points guarantee fresh
//!   tokens for a line range *right now* (caret queries, freshly scrolled
//!   viewports).
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  TokenizationEngine (lifecycle + modes)     │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Scheduling (Host: idle slices + yields)    │  ← Pacing
//! ├─────────────────────────────────────────────┤
//! │  safe_tokenize (clone, catch, normalise)    │  ← Grammar isolation
//! ├─────────────────────────────────────────────┤
//! │  LineStateCache (states + invalid frontier) │  ← Incrementality
//! ├─────────────────────────────────────────────┤
//! │  TextBuffer / TokenizerRegistry / ErrorSink │  ← Collaborators
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The cache is what makes the engine incremental: a line's tokens depend
//! on the opaque grammar state it is entered with, so without per-line
//! state bookkeeping every edit would force a full re-scan from line 1.
//!
//! # Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use tokenize_core::{
//!     InMemoryBuffer, LanguageIdCodec, LogErrorSink, ManualHost,
//!     TokenizationEngine, TokenizerRegistry,
//! };
//! # use std::any::Any;
//! # use tokenize_core::{
//! #     GrammarError, LineTokens, StandardTokenType, Token, TokenMetadata,
//! #     TokenizationResult, Tokenizer, TokenizerState,
//! # };
//! # #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! # struct Flat;
//! # impl TokenizerState for Flat {
//! #     fn clone_boxed(&self) -> Box<dyn TokenizerState> { Box::new(*self) }
//! #     fn same_state(&self, other: &dyn TokenizerState) -> bool {
//! #         other.as_any().downcast_ref::<Flat>().is_some()
//! #     }
//! #     fn as_any(&self) -> &dyn Any { self }
//! # }
//! # struct FlatTokenizer;
//! # impl Tokenizer for FlatTokenizer {
//! #     fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError> {
//! #         Ok(Box::new(Flat))
//! #     }
//! #     fn tokenize(
//! #         &self,
//! #         text: &str,
//! #         _has_eol: bool,
//! #         state: Box<dyn TokenizerState>,
//! #     ) -> Result<TokenizationResult, GrammarError> {
//! #         Ok(TokenizationResult {
//! #             tokens: LineTokens::new(vec![Token {
//! #                 end_offset: text.chars().count(),
//! #                 metadata: TokenMetadata::new(0, StandardTokenType::Other, 0),
//! #             }]),
//! #             end_state: state,
//! #         })
//! #     }
//! # }
//!
//! let buffer = Rc::new(InMemoryBuffer::new("fn main() {\n    body();\n}", "demo"));
//! let registry = Rc::new(TokenizerRegistry::new());
//! registry.register("demo", Rc::new(FlatTokenizer));
//! let host = Rc::new(ManualHost::new());
//!
//! let engine = TokenizationEngine::new(
//!     buffer.clone(),
//!     registry,
//!     Rc::new(LanguageIdCodec::new()),
//!     host.clone(),
//!     Rc::new(LogErrorSink),
//! );
//!
//! // Pump the host until background tokenization finishes.
//! host.run_until_idle();
//! assert_eq!(engine.tokenized_line_count(), 3);
//! assert!(buffer.line_tokens(1).is_some());
//! ```
//!
//! # Concurrency Model
//!
//! Single-threaded cooperative. The engine time-slices within the host's
//! interactive thread; the only suspension points are the idle callback
//! boundary and the zero-delay yield inside a slice. After any suspension
//! the engine re-validates that it is not disposed, still attached, and
//! still has work to do. No types in this crate are `Send`.
//!
//! # Module Description
//!
//! - [`tokens`] - per-line token model, metadata packing, language codec
//! - [`tokenizer`] - grammar traits ([`Tokenizer`], [`TokenizerState`]) and
//!   the [`TokenizerRegistry`]
//! - [`state_cache`] - [`LineStateCache`]: per-line states + invalid
//!   frontier
//! - [`safe_tokenizer`] - grammar failure isolation
//! - [`buffer`] - the [`TextBuffer`] trait and [`InMemoryBuffer`]
//! - [`host`] - idle scheduling abstraction and the deterministic
//!   [`ManualHost`]
//! - [`errors`] - non-fatal error reporting ([`ErrorSink`])
//! - [`engine`] - the [`TokenizationEngine`]

pub mod buffer;
pub mod engine;
pub mod errors;
pub mod host;
pub mod safe_tokenizer;
pub mod state_cache;
pub mod tokenizer;
pub mod tokens;

pub use buffer::{
    BufferEvent, BufferListener, ContentChange, InMemoryBuffer, LineRange, SubscriptionId,
    TextBuffer,
};
pub use engine::{CHEAP_TOKENIZATION_LENGTH_LIMIT, TokenizationEngine};
pub use errors::{EngineError, ErrorSink, LogErrorSink};
pub use host::{Host, IdleCallback, IdleDeadline, ManualHost, Task};
pub use safe_tokenizer::{null_tokenize, safe_tokenize};
pub use state_cache::LineStateCache;
pub use tokenizer::{
    GrammarError, RegistryListener, TokenizationResult, Tokenizer, TokenizerRegistry,
    TokenizerState,
};
pub use tokens::{
    LanguageIdCodec, LineTokens, MultilineTokens, MultilineTokensBuilder, StandardTokenType,
    StyleId, Token, TokenMetadata,
};

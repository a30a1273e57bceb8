//! Failure-isolating wrapper around grammar calls.
//!
//! Grammars are untrusted with respect to both the state object and their
//! own success: [`safe_tokenize`] clones the caller's state before handing
//! it over, normalises reported token offsets, and substitutes a
//! [`null_tokenize`] result when the grammar fails, reporting the error to
//! the sink. The wrapper is memoryless; it holds no state across calls.

use crate::errors::{EngineError, ErrorSink};
use crate::tokenizer::{TokenizationResult, Tokenizer, TokenizerState};
use crate::tokens::{LanguageIdCodec, LineTokens, StandardTokenType, Token, TokenMetadata};

/// Tokenize one line, guarding against a misbehaving grammar.
///
/// The grammar receives a deep copy of `state`, so the caller's cached
/// state cannot be corrupted. On success the returned token end offsets
/// are capped at the line's char length. On failure the error is reported
/// to `sink` (with `line_number` for context) and the null tokenization is
/// substituted: the caller's state flows through unchanged and scheduling
/// continues.
#[allow(clippy::too_many_arguments)]
pub fn safe_tokenize(
    tokenizer: &dyn Tokenizer,
    codec: &LanguageIdCodec,
    language_id: &str,
    line_number: usize,
    text: &str,
    has_eol: bool,
    state: &dyn TokenizerState,
    sink: &dyn ErrorSink,
) -> TokenizationResult {
    match tokenizer.tokenize(text, has_eol, state.clone_boxed()) {
        Ok(mut result) => {
            result.tokens.cap_end_offsets(text.chars().count());
            result
        }
        Err(source) => {
            sink.report(&EngineError::Tokenize {
                line_number,
                source,
            });
            null_tokenize(codec, language_id, text, state)
        }
    }
}

/// The fallback tokenization: a single token covering the whole line with
/// default attributes, and the caller's state passed through unchanged.
pub fn null_tokenize(
    codec: &LanguageIdCodec,
    language_id: &str,
    text: &str,
    state: &dyn TokenizerState,
) -> TokenizationResult {
    let metadata = TokenMetadata::new(codec.encode(language_id), StandardTokenType::Other, 0);
    TokenizationResult {
        tokens: LineTokens::new(vec![Token {
            end_offset: text.chars().count(),
            metadata,
        }]),
        end_state: state.clone_boxed(),
    }
}

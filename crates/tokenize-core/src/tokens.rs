//! Per-line token model shared by the engine, grammars, and buffers.
//!
//! All offsets are **character offsets** (Unicode scalar values), consistent
//! with the rest of the crate. A line's tokens are stored as a run of
//! exclusive end offsets plus packed metadata; the renderer-facing compact
//! encoding is out of scope here.

use std::cell::RefCell;
use std::collections::HashMap;

/// Style identifier carried in token metadata.
///
/// These are only identifiers. The UI/theme layer is expected to map them to
/// actual colors.
pub type StyleId = u32;

/// Coarse, grammar-independent token classification.
///
/// Editors use this for decisions that must not depend on a concrete grammar,
/// e.g. whether auto-closing pairs apply at the caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StandardTokenType {
    /// Anything that is not one of the special classes below.
    #[default]
    Other = 0,
    /// Line or block comment content.
    Comment = 1,
    /// String literal content.
    String = 2,
    /// Regular-expression literal content.
    Regex = 3,
}

impl StandardTokenType {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            1 => Self::Comment,
            2 => Self::String,
            3 => Self::Regex,
            _ => Self::Other,
        }
    }
}

/// Packed per-token metadata.
///
/// Layout: bits 0..8 encoded language id, bits 8..10 [`StandardTokenType`],
/// bits 10..32 [`StyleId`]. Style ids above 22 bits are truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMetadata(u32);

impl TokenMetadata {
    /// Pack language id, token type, and style id into one word.
    pub fn new(language_id: u8, token_type: StandardTokenType, style_id: StyleId) -> Self {
        Self(u32::from(language_id) | ((token_type as u32) << 8) | ((style_id & 0x003F_FFFF) << 10))
    }

    /// The encoded language id (see [`LanguageIdCodec`]).
    pub fn language_id(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// The coarse token classification.
    pub fn standard_token_type(self) -> StandardTokenType {
        StandardTokenType::from_bits((self.0 >> 8) & 0b11)
    }

    /// The style id for theming.
    pub fn style_id(self) -> StyleId {
        self.0 >> 10
    }

    /// The raw packed word.
    pub fn bits(self) -> u32 {
        self.0
    }
}

/// A single token: an exclusive end offset (chars) plus packed metadata.
///
/// A token's start offset is the end offset of its predecessor (0 for the
/// first token of a line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Exclusive end offset within the line, in chars.
    pub end_offset: usize,
    /// Packed metadata for this token.
    pub metadata: TokenMetadata,
}

/// The tokens covering one line, ordered by end offset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineTokens {
    tokens: Vec<Token>,
}

impl LineTokens {
    /// Wrap a token run. Callers are expected to supply tokens ordered by
    /// end offset.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Whether the line has no tokens at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens on the line.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// The tokens in order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Index of the token containing the given char offset.
    ///
    /// Offsets at or beyond the last token's end clamp to the last token.
    /// Returns `None` only when the line has no tokens.
    pub fn token_index_at_offset(&self, offset: usize) -> Option<usize> {
        if self.tokens.is_empty() {
            return None;
        }
        let index = self
            .tokens
            .iter()
            .position(|t| t.end_offset > offset)
            .unwrap_or(self.tokens.len() - 1);
        Some(index)
    }

    /// The [`StandardTokenType`] at the given char offset, or
    /// [`StandardTokenType::Other`] for an empty line.
    pub fn standard_token_type_at(&self, offset: usize) -> StandardTokenType {
        self.token_index_at_offset(offset)
            .map(|i| self.tokens[i].metadata.standard_token_type())
            .unwrap_or(StandardTokenType::Other)
    }

    /// Clamp every token's end offset to `max_end`.
    ///
    /// Grammars report offsets relative to the text they were handed; a
    /// misbehaving grammar must not be able to produce tokens that extend
    /// past the line.
    pub fn cap_end_offsets(&mut self, max_end: usize) {
        for token in &mut self.tokens {
            if token.end_offset > max_end {
                token.end_offset = max_end;
            }
        }
    }
}

/// Tokens for a contiguous block of lines, as handed to a buffer's token
/// sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultilineTokens {
    /// 1-based number of the first line in the block.
    pub start_line_number: usize,
    /// One entry per line, starting at `start_line_number`.
    pub lines: Vec<LineTokens>,
}

impl MultilineTokens {
    /// 1-based number of the last line in the block.
    pub fn end_line_number(&self) -> usize {
        self.start_line_number + self.lines.len().saturating_sub(1)
    }
}

/// Accumulates per-line tokens into contiguous [`MultilineTokens`] blocks.
///
/// The scheduler collects tokens into one builder per work slice and flushes
/// the resulting blocks to the buffer in a single call.
#[derive(Debug, Default)]
pub struct MultilineTokensBuilder {
    blocks: Vec<MultilineTokens>,
}

impl MultilineTokensBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append tokens for a 1-based line, merging into the previous block
    /// when the line directly follows it.
    pub fn add(&mut self, line_number: usize, tokens: LineTokens) {
        if let Some(last) = self.blocks.last_mut() {
            if last.start_line_number + last.lines.len() == line_number {
                last.lines.push(tokens);
                return;
            }
        }
        self.blocks.push(MultilineTokens {
            start_line_number: line_number,
            lines: vec![tokens],
        });
    }

    /// Whether nothing was added.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Consume the builder and return the accumulated blocks.
    pub fn finish(self) -> Vec<MultilineTokens> {
        self.blocks
    }
}

/// Interning codec between string language ids and the 8-bit ids stored in
/// [`TokenMetadata`].
///
/// Id 0 is reserved for "unknown"; real languages are assigned 1, 2, … in
/// registration order. The codec saturates: once 255 languages are interned,
/// further languages encode as 0.
#[derive(Debug, Default)]
pub struct LanguageIdCodec {
    inner: RefCell<CodecInner>,
}

#[derive(Debug, Default)]
struct CodecInner {
    by_name: HashMap<String, u8>,
    names: Vec<String>,
}

impl LanguageIdCodec {
    /// Create an empty codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the encoded id for `language_id`, interning it on first use.
    pub fn encode(&self, language_id: &str) -> u8 {
        let mut inner = self.inner.borrow_mut();
        if let Some(&id) = inner.by_name.get(language_id) {
            return id;
        }
        if inner.names.len() >= 255 {
            return 0;
        }
        let id = (inner.names.len() + 1) as u8;
        inner.names.push(language_id.to_string());
        inner.by_name.insert(language_id.to_string(), id);
        id
    }

    /// Return the language id string for an encoded id, if interned.
    pub fn decode(&self, encoded: u8) -> Option<String> {
        if encoded == 0 {
            return None;
        }
        self.inner
            .borrow()
            .names
            .get(usize::from(encoded) - 1)
            .cloned()
    }
}

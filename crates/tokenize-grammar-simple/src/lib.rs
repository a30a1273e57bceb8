//! `tokenize-grammar-simple` - rule-based line grammars for `tokenize-core`.
//!
//! This crate is intended for lightweight languages and demos where a full
//! grammar system is unnecessary: comments and strings are recognised by a
//! small scanner, everything else is classified by regex rules. The grammar
//! is genuinely stateful - a block comment opened on one line carries into
//! the next through [`RuleState`] - which makes it a realistic workload for
//! the engine's incremental machinery.

use regex::Regex;
use std::any::Any;
use tokenize_core::{
    GrammarError, LanguageIdCodec, LineTokens, StandardTokenType, StyleId, Token, TokenMetadata,
    TokenizationResult, Tokenizer, TokenizerState,
};

/// Default style id (plain text).
pub const SIMPLE_STYLE_DEFAULT: StyleId = 0;
/// Style id for keywords.
pub const SIMPLE_STYLE_KEYWORD: StyleId = 1;
/// Style id for string literals.
pub const SIMPLE_STYLE_STRING: StyleId = 2;
/// Style id for numbers.
pub const SIMPLE_STYLE_NUMBER: StyleId = 3;
/// Style id for comments.
pub const SIMPLE_STYLE_COMMENT: StyleId = 4;

/// Per-line entry state for [`RuleBasedTokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleState {
    /// Whether the previous line ended inside a block comment.
    pub in_block_comment: bool,
}

impl TokenizerState for RuleState {
    fn clone_boxed(&self) -> Box<dyn TokenizerState> {
        Box::new(*self)
    }

    fn same_state(&self, other: &dyn TokenizerState) -> bool {
        other.as_any().downcast_ref::<RuleState>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A single regex classification rule, applied outside comments and
/// strings.
#[derive(Debug, Clone)]
pub struct TokenRule {
    regex: Regex,
    style_id: StyleId,
}

impl TokenRule {
    /// Compile a rule from a regex pattern.
    pub fn new(pattern: &str, style_id: StyleId) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            style_id,
        })
    }

    /// The style this rule assigns.
    pub fn style_id(&self) -> StyleId {
        self.style_id
    }
}

/// A rule-based, stateful line tokenizer.
///
/// Designed for simple languages. A scanner handles line comments, block
/// comments (which may span lines), and single-line double-quoted strings;
/// [`TokenRule`]s classify the rest of the line.
#[derive(Debug)]
pub struct RuleBasedTokenizer {
    language_encoded: u8,
    line_comment: Option<String>,
    block_comment: Option<(String, String)>,
    string_delimiter: Option<char>,
    rules: Vec<TokenRule>,
}

impl RuleBasedTokenizer {
    /// Create a tokenizer with the given classification rules and no
    /// comment or string handling.
    pub fn new(codec: &LanguageIdCodec, language_id: &str, rules: Vec<TokenRule>) -> Self {
        Self {
            language_encoded: codec.encode(language_id),
            line_comment: None,
            block_comment: None,
            string_delimiter: None,
            rules,
        }
    }

    /// Recognise a line comment token (e.g. `//`, `#`).
    pub fn with_line_comment(mut self, token: impl Into<String>) -> Self {
        self.line_comment = Some(token.into());
        self
    }

    /// Recognise block comments between `start` and `end`; block comments
    /// may span lines.
    pub fn with_block_comment(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.block_comment = Some((start.into(), end.into()));
        self
    }

    /// Recognise single-line string literals delimited by `delimiter`,
    /// with backslash escapes.
    pub fn with_string_delimiter(mut self, delimiter: char) -> Self {
        self.string_delimiter = Some(delimiter);
        self
    }

    /// A small C-like grammar: `//` line comments, `/* */` block comments,
    /// double-quoted strings, common keywords, and numbers.
    pub fn c_like(codec: &LanguageIdCodec, language_id: &str) -> Result<Self, regex::Error> {
        let rules = vec![
            TokenRule::new(
                r"\b(?:break|const|continue|else|enum|fn|for|if|impl|let|loop|match|pub|return|struct|use|while)\b",
                SIMPLE_STYLE_KEYWORD,
            )?,
            TokenRule::new(r"\b\d[\d_]*(?:\.\d+)?\b", SIMPLE_STYLE_NUMBER)?,
        ];
        Ok(Self::new(codec, language_id, rules)
            .with_line_comment("//")
            .with_block_comment("/*", "*/")
            .with_string_delimiter('"'))
    }

    /// A single-state plain-text grammar: every line becomes one default
    /// token.
    pub fn plain(codec: &LanguageIdCodec, language_id: &str) -> Self {
        Self::new(codec, language_id, Vec::new())
    }

    fn metadata(&self, token_type: StandardTokenType, style_id: StyleId) -> TokenMetadata {
        TokenMetadata::new(self.language_encoded, token_type, style_id)
    }

    /// Classify one plain stretch of text with the regex rules, filling
    /// gaps with the default style. Byte offsets, relative to the line.
    fn push_plain_segments(&self, slice: &str, base: usize, segments: &mut Vec<Segment>) {
        if slice.is_empty() {
            return;
        }
        let mut matches: Vec<(usize, usize, StyleId)> = Vec::new();
        for rule in &self.rules {
            for m in rule.regex.find_iter(slice) {
                if m.end() > m.start() {
                    matches.push((m.start(), m.end(), rule.style_id));
                }
            }
        }
        matches.sort_by_key(|&(start, end, _)| (start, end));

        let mut cursor = 0;
        for (start, end, style_id) in matches {
            if start < cursor {
                continue;
            }
            if start > cursor {
                segments.push(Segment {
                    end_byte: base + start,
                    style_id: SIMPLE_STYLE_DEFAULT,
                    token_type: StandardTokenType::Other,
                });
            }
            segments.push(Segment {
                end_byte: base + end,
                style_id,
                token_type: StandardTokenType::Other,
            });
            cursor = end;
        }
        if cursor < slice.len() {
            segments.push(Segment {
                end_byte: base + slice.len(),
                style_id: SIMPLE_STYLE_DEFAULT,
                token_type: StandardTokenType::Other,
            });
        }
    }

    /// Find the earliest special region opener at or after `pos`.
    fn find_special(&self, text: &str, pos: usize) -> Option<(usize, Special)> {
        let mut best: Option<(usize, Special)> = None;
        let mut consider = |found: Option<usize>, special: Special| {
            if let Some(at) = found {
                if best.map_or(true, |(best_at, _)| at < best_at) {
                    best = Some((at, special));
                }
            }
        };
        consider(
            self.line_comment
                .as_deref()
                .and_then(|t| text[pos..].find(t).map(|i| pos + i)),
            Special::LineComment,
        );
        consider(
            self.block_comment
                .as_ref()
                .and_then(|(start, _)| text[pos..].find(start.as_str()).map(|i| pos + i)),
            Special::BlockComment,
        );
        consider(
            self.string_delimiter
                .and_then(|d| text[pos..].find(d).map(|i| pos + i)),
            Special::String,
        );
        best
    }

    /// Byte offset just past the closing delimiter of a string starting at
    /// `open` (the delimiter itself), honouring backslash escapes. Strings
    /// do not span lines: an unterminated string ends at the line end.
    fn string_end(&self, text: &str, open: usize, delimiter: char) -> usize {
        let body = &text[open + delimiter.len_utf8()..];
        let mut escaped = false;
        for (i, c) in body.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            if c == '\\' {
                escaped = true;
            } else if c == delimiter {
                return open + delimiter.len_utf8() + i + c.len_utf8();
            }
        }
        text.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum Special {
    LineComment,
    BlockComment,
    String,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    end_byte: usize,
    style_id: StyleId,
    token_type: StandardTokenType,
}

impl Tokenizer for RuleBasedTokenizer {
    fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError> {
        Ok(Box::new(RuleState::default()))
    }

    fn tokenize(
        &self,
        text: &str,
        _has_eol: bool,
        state: Box<dyn TokenizerState>,
    ) -> Result<TokenizationResult, GrammarError> {
        let mut rule_state = *state
            .as_any()
            .downcast_ref::<RuleState>()
            .ok_or_else(|| GrammarError::new("unexpected state type"))?;

        let mut segments: Vec<Segment> = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            if rule_state.in_block_comment {
                let Some((_, end_token)) = self.block_comment.as_ref() else {
                    return Err(GrammarError::new("in a block comment without delimiters"));
                };
                match text[pos..].find(end_token.as_str()) {
                    Some(rel) => {
                        let end = pos + rel + end_token.len();
                        segments.push(Segment {
                            end_byte: end,
                            style_id: SIMPLE_STYLE_COMMENT,
                            token_type: StandardTokenType::Comment,
                        });
                        rule_state.in_block_comment = false;
                        pos = end;
                    }
                    None => {
                        segments.push(Segment {
                            end_byte: text.len(),
                            style_id: SIMPLE_STYLE_COMMENT,
                            token_type: StandardTokenType::Comment,
                        });
                        pos = text.len();
                    }
                }
                continue;
            }

            let special = self.find_special(text, pos);
            let plain_end = special.map(|(at, _)| at).unwrap_or(text.len());
            if plain_end > pos {
                self.push_plain_segments(&text[pos..plain_end], pos, &mut segments);
                pos = plain_end;
            }

            match special {
                None => {}
                Some((_, Special::LineComment)) => {
                    segments.push(Segment {
                        end_byte: text.len(),
                        style_id: SIMPLE_STYLE_COMMENT,
                        token_type: StandardTokenType::Comment,
                    });
                    pos = text.len();
                }
                Some((at, Special::BlockComment)) => {
                    let Some((start_token, end_token)) = self.block_comment.as_ref() else {
                        return Err(GrammarError::new("block comment match without delimiters"));
                    };
                    match text[at + start_token.len()..].find(end_token.as_str()) {
                        Some(rel) => {
                            let end = at + start_token.len() + rel + end_token.len();
                            segments.push(Segment {
                                end_byte: end,
                                style_id: SIMPLE_STYLE_COMMENT,
                                token_type: StandardTokenType::Comment,
                            });
                            pos = end;
                        }
                        None => {
                            segments.push(Segment {
                                end_byte: text.len(),
                                style_id: SIMPLE_STYLE_COMMENT,
                                token_type: StandardTokenType::Comment,
                            });
                            rule_state.in_block_comment = true;
                            pos = text.len();
                        }
                    }
                }
                Some((at, Special::String)) => {
                    let Some(delimiter) = self.string_delimiter else {
                        return Err(GrammarError::new("string match without a delimiter"));
                    };
                    let end = self.string_end(text, at, delimiter);
                    segments.push(Segment {
                        end_byte: end,
                        style_id: SIMPLE_STYLE_STRING,
                        token_type: StandardTokenType::String,
                    });
                    pos = end;
                }
            }
        }

        if segments.is_empty() {
            segments.push(Segment {
                end_byte: 0,
                style_id: SIMPLE_STYLE_DEFAULT,
                token_type: StandardTokenType::Other,
            });
        }

        // Convert byte cut points to char offsets in one pass.
        let mut tokens = Vec::with_capacity(segments.len());
        let mut char_count = 0;
        let mut byte_pos = 0;
        for segment in segments {
            char_count += text[byte_pos..segment.end_byte].chars().count();
            byte_pos = segment.end_byte;
            tokens.push(Token {
                end_offset: char_count,
                metadata: self.metadata(segment.token_type, segment.style_id),
            });
        }

        Ok(TokenizationResult {
            tokens: LineTokens::new(tokens),
            end_state: Box::new(rule_state),
        })
    }
}

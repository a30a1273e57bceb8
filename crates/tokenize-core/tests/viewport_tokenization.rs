//! Viewport mode: provisional highlighting for a scrolled-to window
//! without tokenizing the gap above it.

mod support;

use std::rc::Rc;
use support::fixture;
use tokenize_core::StandardTokenType;
use tokenize_grammar_simple::RuleBasedTokenizer;

/// A 1000-line document with a block every 10 lines: an unindented header
/// line followed by indented body lines.
fn blocky_text(line_count: usize) -> String {
    (1..=line_count)
        .map(|i| {
            if i % 10 == 1 {
                format!("fn block_{i}() {{")
            } else {
                format!("    body_{i}();")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_viewport_emits_provisional_tokens_without_moving_frontier() {
    let codec = tokenize_core::LanguageIdCodec::new();
    let tokenizer = Rc::new(RuleBasedTokenizer::c_like(&codec, "c").unwrap());
    let f = fixture(&blocky_text(1000), "c", tokenizer);

    f.engine.force_tokenization(10);
    assert_eq!(f.engine.tokenized_line_count(), 10);

    f.engine.tokenize_viewport(500, 520);

    // The window is rendered now...
    for line in 500..=520 {
        assert!(f.buffer.line_tokens(line).is_some(), "line {line}");
    }
    // ...but the gap was skipped and the cache claims nothing new.
    assert!(f.buffer.line_tokens(499).is_none());
    assert_eq!(f.engine.tokenized_line_count(), 10);
    for line in 500..=520 {
        assert!(!f.engine.line_tokens_valid(line), "line {line}");
    }
    assert!(!f.buffer.tokens_completed());

    // The background pass still revisits the viewport lines properly.
    f.host.run_until_idle();
    assert_eq!(f.engine.tokenized_line_count(), 1000);
    assert!(f.engine.line_tokens_valid(500));
}

#[test]
fn test_viewport_prefix_derives_state_from_less_indented_lines() {
    let text = "\
fn top() {
    filler();
    filler();
/* comment opens
    inside();
still inside";
    let codec = tokenize_core::LanguageIdCodec::new();
    let tokenizer = Rc::new(RuleBasedTokenizer::c_like(&codec, "c").unwrap());
    let f = fixture(text, "c", tokenizer);

    f.engine.force_tokenization(1);
    assert_eq!(f.engine.tokenized_line_count(), 1);

    // Line 5 is indented; the walk upward finds the unindented line 4,
    // whose entry state is not cached, so it becomes the synthetic prefix.
    // Tokenizing it reveals the open block comment.
    f.engine.tokenize_viewport(5, 5);

    let tokens = f.buffer.line_tokens(5).unwrap();
    assert_eq!(
        tokens.tokens()[0].metadata.standard_token_type(),
        StandardTokenType::Comment
    );
    // The prefix line's own tokens were discarded.
    assert!(f.buffer.line_tokens(4).is_none());
    assert_eq!(f.engine.tokenized_line_count(), 1);
}

#[test]
fn test_viewport_straddling_frontier_degrades_to_force() {
    let codec = tokenize_core::LanguageIdCodec::new();
    let tokenizer = Rc::new(RuleBasedTokenizer::c_like(&codec, "c").unwrap());
    let f = fixture(&blocky_text(100), "c", tokenizer);

    f.engine.force_tokenization(10);
    f.engine.tokenize_viewport(5, 20);

    // The window began below the frontier: the normal path ran up to its
    // end and the results are authoritative.
    assert_eq!(f.engine.tokenized_line_count(), 20);
    assert!(f.engine.line_tokens_valid(15));
}

#[test]
fn test_viewport_below_frontier_is_a_noop() {
    let codec = tokenize_core::LanguageIdCodec::new();
    let tokenizer = Rc::new(RuleBasedTokenizer::c_like(&codec, "c").unwrap());
    let f = fixture(&blocky_text(100), "c", tokenizer);

    f.engine.force_tokenization(50);
    let before = f.buffer.tokenized_line_count();

    f.engine.tokenize_viewport(10, 30);
    assert_eq!(f.engine.tokenized_line_count(), 50);
    assert_eq!(f.buffer.tokenized_line_count(), before);
}

#[test]
fn test_viewport_without_tokenizer_is_a_noop() {
    let codec = tokenize_core::LanguageIdCodec::new();
    let tokenizer = Rc::new(RuleBasedTokenizer::c_like(&codec, "c").unwrap());
    let f = fixture(&blocky_text(50), "unregistered", tokenizer);

    f.engine.tokenize_viewport(10, 20);
    assert_eq!(f.buffer.tokenized_line_count(), 0);
}

#[test]
fn test_viewport_clamps_to_buffer() {
    let codec = tokenize_core::LanguageIdCodec::new();
    let tokenizer = Rc::new(RuleBasedTokenizer::c_like(&codec, "c").unwrap());
    let f = fixture(&blocky_text(30), "c", tokenizer);

    f.engine.force_tokenization(5);
    f.engine.tokenize_viewport(25, 4000);

    for line in 25..=30 {
        assert!(f.buffer.line_tokens(line).is_some(), "line {line}");
    }
    assert_eq!(f.engine.tokenized_line_count(), 5);
}

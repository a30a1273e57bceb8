//! The pluggable grammar seam: tokenizer states, the tokenizer trait, and
//! the registry mapping language ids to installed tokenizers.
//!
//! Line-oriented grammars are **stateful**: the tokens of a line depend on
//! the state the grammar is entered with (e.g. "inside a block comment").
//! The engine therefore threads an opaque state value from each line into
//! the next and never inspects its contents; it only requires the two
//! capabilities expressed by [`TokenizerState`].

use crate::buffer::SubscriptionId;
use crate::tokens::LineTokens;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Opaque per-line grammar state.
///
/// Concrete grammars supply their own representation; the engine stores it
/// behind this capability set. `clone_boxed` must deep-copy (the engine
/// clones before handing a state to a grammar so the grammar cannot corrupt
/// the cached copy), and `same_state` must be structural equality (it drives
/// the skip-ahead optimisation after edits).
pub trait TokenizerState: fmt::Debug {
    /// Deep-copy this state.
    fn clone_boxed(&self) -> Box<dyn TokenizerState>;

    /// Structural equality against another state, typically via
    /// [`TokenizerState::as_any`] downcasting.
    fn same_state(&self, other: &dyn TokenizerState) -> bool;

    /// Downcasting support for concrete grammars.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn TokenizerState> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Error raised by a grammar while producing a state or tokenizing a line.
///
/// Grammar failures are non-fatal to the engine: they are reported to the
/// configured sink and a fallback tokenization is substituted.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GrammarError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl GrammarError {
    /// Create an error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The outcome of tokenizing one line.
#[derive(Debug)]
pub struct TokenizationResult {
    /// Tokens covering the line.
    pub tokens: LineTokens,
    /// The state the grammar is in entering the *next* line.
    pub end_state: Box<dyn TokenizerState>,
}

/// A line-oriented tokenizer for one language.
pub trait Tokenizer {
    /// The state the grammar is in before the first line of a document.
    fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError>;

    /// Tokenize a single line.
    ///
    /// `has_eol` hints whether the line is terminated in the buffer; some
    /// grammars distinguish a final partial line from a terminated one.
    /// `state` is the caller's own copy and may be consumed or mutated
    /// freely.
    fn tokenize(
        &self,
        text: &str,
        has_eol: bool,
        state: Box<dyn TokenizerState>,
    ) -> Result<TokenizationResult, GrammarError>;
}

/// Listener invoked with the language ids whose registration changed.
pub type RegistryListener = Box<dyn Fn(&[String])>;

/// Maps language ids to installed tokenizers and notifies listeners when a
/// registration changes.
///
/// Single-threaded: registrations and notifications happen on the thread
/// that owns the registry.
#[derive(Default)]
pub struct TokenizerRegistry {
    tokenizers: RefCell<HashMap<String, Rc<dyn Tokenizer>>>,
    listeners: RefCell<Vec<(SubscriptionId, RegistryListener)>>,
    next_subscription: Cell<u64>,
}

impl TokenizerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a tokenizer for a language, replacing any previous binding,
    /// and notify listeners.
    pub fn register(&self, language_id: impl Into<String>, tokenizer: Rc<dyn Tokenizer>) {
        let language_id = language_id.into();
        self.tokenizers
            .borrow_mut()
            .insert(language_id.clone(), tokenizer);
        self.notify(&[language_id]);
    }

    /// Remove the tokenizer for a language. Returns whether a binding
    /// existed; listeners are notified only if it did.
    pub fn unregister(&self, language_id: &str) -> bool {
        let existed = self.tokenizers.borrow_mut().remove(language_id).is_some();
        if existed {
            self.notify(&[language_id.to_string()]);
        }
        existed
    }

    /// The tokenizer currently installed for a language, if any.
    pub fn get(&self, language_id: &str) -> Option<Rc<dyn Tokenizer>> {
        self.tokenizers.borrow().get(language_id).cloned()
    }

    /// Subscribe to registration changes.
    pub fn on_changed(&self, listener: RegistryListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Drop a listener registration. Unknown ids are ignored.
    pub fn remove_listener(&self, id: SubscriptionId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }

    fn notify(&self, changed: &[String]) {
        let listeners = self.listeners.borrow();
        for (_, listener) in listeners.iter() {
            listener(changed);
        }
    }
}

impl fmt::Debug for TokenizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerRegistry")
            .field("languages", &self.tokenizers.borrow().len())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{StandardTokenType, Token, TokenMetadata};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flat;

    impl TokenizerState for Flat {
        fn clone_boxed(&self) -> Box<dyn TokenizerState> {
            Box::new(*self)
        }
        fn same_state(&self, other: &dyn TokenizerState) -> bool {
            other.as_any().downcast_ref::<Flat>().is_some()
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct FlatTokenizer;

    impl Tokenizer for FlatTokenizer {
        fn initial_state(&self) -> Result<Box<dyn TokenizerState>, GrammarError> {
            Ok(Box::new(Flat))
        }
        fn tokenize(
            &self,
            text: &str,
            _has_eol: bool,
            state: Box<dyn TokenizerState>,
        ) -> Result<TokenizationResult, GrammarError> {
            Ok(TokenizationResult {
                tokens: LineTokens::new(vec![Token {
                    end_offset: text.chars().count(),
                    metadata: TokenMetadata::new(0, StandardTokenType::Other, 0),
                }]),
                end_state: state,
            })
        }
    }

    #[test]
    fn test_register_replaces_and_notifies() {
        let registry = TokenizerRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::<String>::new()));
        let seen_clone = seen.clone();
        registry.on_changed(Box::new(move |changed| {
            seen_clone.borrow_mut().extend(changed.iter().cloned());
        }));

        registry.register("ini", Rc::new(FlatTokenizer));
        assert!(registry.get("ini").is_some());
        assert!(registry.get("toml").is_none());
        registry.register("ini", Rc::new(FlatTokenizer));
        assert!(registry.unregister("ini"));
        assert!(!registry.unregister("ini"));
        assert_eq!(seen.borrow().as_slice(), ["ini", "ini", "ini"]);
    }

    #[test]
    fn test_remove_listener_stops_notifications() {
        let registry = TokenizerRegistry::new();
        let count = Rc::new(Cell::new(0usize));
        let count_clone = count.clone();
        let id = registry.on_changed(Box::new(move |_| {
            count_clone.set(count_clone.get() + 1);
        }));
        registry.register("a", Rc::new(FlatTokenizer));
        registry.remove_listener(id);
        registry.register("b", Rc::new(FlatTokenizer));
        assert_eq!(count.get(), 1);
    }
}

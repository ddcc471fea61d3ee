//! Script evaluation seam
//!
//! The engine never interprets grouping or formatting expressions itself.
//! Callers supply a [`ScriptEvaluator`] (compile once, evaluate per track)
//! and a [`TextFormatter`] (post-processing of raw evaluator output into
//! rich-text blocks). Both are treated as opaque collaborators; an
//! evaluation that yields `None` means "no value" and the affected level is
//! simply omitted, never an error.

use crate::types::Track;
use std::collections::HashMap;
use std::sync::Arc;

/// Separator the evaluator may embed in its output to return multiple
/// independent values from one multi-value field (ASCII unit separator).
pub const FIELD_SEPARATOR: char = '\u{1F}';

/// Positional context passed into every per-track evaluation call.
///
/// Explicit rather than ambient so populators stay reentrant: the evaluator
/// sees the track's batch-relative index and its nesting depth without any
/// shared mutable registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalContext {
    /// Index of the track in the order it will appear.
    pub index: usize,
    /// Number of header/subheader levels above the track so far.
    pub depth: usize,
}

impl EvalContext {
    pub fn new(index: usize, depth: usize) -> Self {
        Self { index, depth }
    }
}

/// Compiles and evaluates grouping/formatting expressions.
///
/// `compile` must be referentially stable: the same expression text may be
/// compiled once and the result reused across tracks and runs (see
/// [`ScriptCache`]).
pub trait ScriptEvaluator {
    /// Compiled form of an expression, reusable across evaluations.
    type Compiled: Send + Sync;

    /// Compile an expression from its textual form.
    fn compile(&self, text: &str) -> Self::Compiled;

    /// Evaluate a compiled expression against one track.
    ///
    /// `None` means the expression has no value for this track
    /// (semantically null); `Some("")` means it rendered nothing.
    fn evaluate(&self, script: &Self::Compiled, track: &Track, ctx: &EvalContext)
        -> Option<String>;

    /// Evaluate a compiled expression against a whole group of tracks,
    /// used for aggregate header text (summary statistics over the group).
    fn evaluate_group(&self, script: &Self::Compiled, tracks: &[Track]) -> Option<String>;
}

/// Assembles raw evaluator output into rendered rich text. Pure function.
pub trait TextFormatter {
    fn evaluate(&self, raw: &str) -> RichText;
}

/// Formatter that passes evaluator output through as a single text block.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl TextFormatter for PlainFormatter {
    fn evaluate(&self, raw: &str) -> RichText {
        RichText {
            blocks: vec![raw.to_string()],
        }
    }
}

/// Rendered text as an ordered list of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    pub blocks: Vec<String>,
}

impl RichText {
    /// Concatenate all blocks into one plain string.
    pub fn plain(&self) -> String {
        self.blocks.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_empty())
    }
}

/// An expression text paired with its most recent rendered output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichScript {
    /// Textual form of the expression.
    pub script: String,
    /// Rendered output of the last evaluation.
    pub text: RichText,
}

impl RichScript {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            text: RichText::default(),
        }
    }

    pub fn rendered(script: impl Into<String>, text: RichText) -> Self {
        Self {
            script: script.into(),
            text,
        }
    }
}

/// Compile-once cache keyed by expression text.
///
/// Re-parsing only happens when a previously unseen expression text shows
/// up; repeated runs with the same preset reuse the compiled forms.
pub struct ScriptCache<E: ScriptEvaluator> {
    compiled: HashMap<String, Arc<E::Compiled>>,
}

impl<E: ScriptEvaluator> ScriptCache<E> {
    pub fn new() -> Self {
        Self {
            compiled: HashMap::new(),
        }
    }

    /// Fetch the compiled form for `text`, compiling it on first sight.
    pub fn get_or_compile(&mut self, evaluator: &E, text: &str) -> Arc<E::Compiled> {
        if let Some(compiled) = self.compiled.get(text) {
            return Arc::clone(compiled);
        }
        let compiled = Arc::new(evaluator.compile(text));
        self.compiled.insert(text.to_string(), Arc::clone(&compiled));
        compiled
    }

    pub fn clear(&mut self) {
        self.compiled.clear();
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

impl<E: ScriptEvaluator> Default for ScriptCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

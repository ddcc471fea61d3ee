//! Shared test fixtures: a scriptable stub evaluator and track builders.

use crate::script::{EvalContext, ScriptEvaluator};
use crate::types::{Track, TrackId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Evaluator backed by a (track, expression) -> value table.
///
/// Unknown lookups yield `None` (semantically null). Two expressions are
/// interpreted specially: `%index%` and `%depth%` echo the evaluation
/// context, and `%count%` renders the group size in group evaluation.
#[derive(Default)]
pub(crate) struct StubEvaluator {
    fields: HashMap<(i64, String), String>,
    compiles: AtomicUsize,
}

impl StubEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value the evaluator returns for `(track, script)`.
    pub fn set(&mut self, track: TrackId, script: &str, value: &str) {
        self.fields
            .insert((track.0, script.to_string()), value.to_string());
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }
}

impl ScriptEvaluator for StubEvaluator {
    type Compiled = String;

    fn compile(&self, text: &str) -> String {
        self.compiles.fetch_add(1, Ordering::Relaxed);
        text.to_string()
    }

    fn evaluate(&self, script: &String, track: &Track, ctx: &EvalContext) -> Option<String> {
        match script.as_str() {
            "%index%" => Some(ctx.index.to_string()),
            "%depth%" => Some(ctx.depth.to_string()),
            _ => self.fields.get(&(track.id().0, script.clone())).cloned(),
        }
    }

    fn evaluate_group(&self, script: &String, tracks: &[Track]) -> Option<String> {
        if script == "%count%" {
            return Some(format!("{} tracks", tracks.len()));
        }
        tracks
            .first()
            .and_then(|t| self.evaluate(script, t, &EvalContext::default()))
    }
}

/// Library track with a fingerprint derived from its id.
pub(crate) fn track(id: i64) -> Track {
    Track::new(TrackId(id), format!("hash-{id}"), true)
}

/// Track outside the library (excluded from grouping trees).
pub(crate) fn outside_track(id: i64) -> Track {
    Track::new(TrackId(id), format!("hash-{id}"), false)
}

//! Single-axis grouping tree populator
//!
//! Builds a grouping tree (e.g. genre -> sub-genre) from one grouping
//! expression. The expression yields, per track, a string of one or more
//! `\u{1F}`-separated paths, each path being a `||`-delimited chain of
//! level titles; a track whose expression yields no value is left out of
//! the tree entirely.

use super::batch::TrackBatcher;
use crate::keys;
use crate::script::{EvalContext, ScriptEvaluator, FIELD_SEPARATOR};
use crate::tree::{GroupItem, NodePayload, PendingTreeData, TreeNode};
use crate::types::Track;
use crossbeam::channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// First batch is larger to front-load visible content.
pub const INITIAL_BATCH_SIZE: usize = 3000;
/// Steady-state batch size after the first emission.
pub const BATCH_SIZE: usize = 4000;

/// Delimiter between nesting levels within one grouping path.
const LEVEL_DELIMITER: &str = "||";

/// Events emitted while building a grouping tree.
#[derive(Debug, Clone)]
pub enum GroupingEvent {
    /// A batch finished; the snapshot carries every node touched in it.
    Populated(PendingTreeData),
    /// The run reached a terminal state (also fires after cancellation).
    Finished,
}

/// Builds a single-axis grouping tree in batches.
///
/// One instance is one logical worker: runs are sequential, a new `run`
/// call is expected only after the previous one finished.
pub struct GroupingPopulator<E: ScriptEvaluator> {
    evaluator: E,
    events: Sender<GroupingEvent>,
    cancel: Arc<AtomicBool>,
    current_grouping: String,
    script: Option<E::Compiled>,
    root: TreeNode,
    data: PendingTreeData,
    initial_batch_size: usize,
    batch_size: usize,
}

impl<E: ScriptEvaluator> GroupingPopulator<E> {
    pub fn new(evaluator: E, events: Sender<GroupingEvent>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            evaluator,
            events,
            cancel,
            current_grouping: String::new(),
            script: None,
            root: TreeNode::root(),
            data: PendingTreeData::default(),
            initial_batch_size: INITIAL_BATCH_SIZE,
            batch_size: BATCH_SIZE,
        }
    }

    /// Override the default batch sizes (tuning and tests). A size of zero
    /// ends a run before the corresponding batch.
    pub fn set_batch_sizes(&mut self, initial: usize, steady: usize) {
        self.initial_batch_size = initial;
        self.batch_size = steady;
    }

    /// Build the grouping tree for `tracks`, emitting one
    /// [`GroupingEvent::Populated`] snapshot per completed batch and a
    /// terminal [`GroupingEvent::Finished`].
    ///
    /// The grouping expression is recompiled only when its text changed
    /// since the previous run. Tracks not in the library are skipped.
    pub fn run(&mut self, grouping: &str, tracks: Vec<Track>) {
        log::debug!("run: Grouping {} tracks", tracks.len());

        self.data.clear();
        self.root = TreeNode::root();

        if self.current_grouping != grouping {
            self.current_grouping = grouping.to_string();
            self.script = Some(self.evaluator.compile(grouping));
        }

        let mut batcher = TrackBatcher::new(tracks, self.initial_batch_size, self.batch_size);

        'run: while let Some((_, batch)) = batcher.next_batch() {
            for track in batch {
                if !self.may_run() {
                    log::debug!("run: Cancelled mid-batch");
                    break 'run;
                }
                if track.is_in_library() {
                    self.iterate_track(track);
                }
            }

            if !self.may_run() {
                log::debug!("run: Cancelled before emission");
                break 'run;
            }

            let snapshot = std::mem::take(&mut self.data);
            log::debug!("run: Emitting snapshot with {} items", snapshot.items.len());
            let _ = self.events.send(GroupingEvent::Populated(snapshot));
        }

        let _ = self.events.send(GroupingEvent::Finished);
    }

    fn may_run(&self) -> bool {
        !self.cancel.load(Ordering::Relaxed)
    }

    fn iterate_track(&mut self, track: &Track) {
        let Some(script) = &self.script else {
            return;
        };
        // No value means the track belongs to no group at all
        let Some(field) = self
            .evaluator
            .evaluate(script, track, &EvalContext::default())
        else {
            return;
        };

        for path in field.split(FIELD_SEPARATOR).filter(|p| !p.is_empty()) {
            let mut parent_key = self.root.key().to_string();

            for (level, part) in path.split(LEVEL_DELIMITER).enumerate() {
                let title = part.trim();
                let key = keys::hash_key(&[&parent_key, title]);

                let node = self.data.get_or_insert(&key, &parent_key, || {
                    TreeNode::new(
                        NodePayload::Group(GroupItem::new(title)),
                        parent_key.clone(),
                        level,
                    )
                });
                if let NodePayload::Group(group) = &mut node.payload {
                    group.add_track(track.clone());
                }

                self.data.record_parent(track.id(), &key);
                parent_key = key;
            }
        }
    }
}

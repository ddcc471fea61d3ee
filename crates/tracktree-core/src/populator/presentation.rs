//! Header/subheader/track tree populator
//!
//! Builds the richer presentation tree from a declarative
//! [`TreePreset`]: an optional header level, zero or more subheader
//! levels and a leaf track row (per-column or left/right text).
//!
//! Consecutive tracks that render identical header content collapse under
//! one header node. The rule is a narrow adjacency heuristic, not a tree
//! diff: a track reuses the previous header/subheader key only when its
//! index immediately follows the previous track's and the content-derived
//! base key matches. Non-adjacent identical runs deliberately do not
//! merge, so callers must submit tracks in display order.

use super::batch::TrackBatcher;
use crate::keys;
use crate::preset::{Column, TreePreset};
use crate::script::{EvalContext, RichScript, RichText, ScriptCache, ScriptEvaluator, TextFormatter};
use crate::tree::{ContainerItem, NodePayload, PendingData, TrackItem, TreeNode};
use crate::types::Track;
use crossbeam::channel::Sender;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Size of the first batch; the remainder follows in a single batch.
pub const TRACK_PRELOAD_SIZE: usize = 2000;

/// Events emitted while building or updating a presentation tree.
#[derive(Debug, Clone)]
pub enum PresentationEvent {
    /// A batch finished. `items` and `track_parents` cover the whole run
    /// so far; `nodes` covers only the batch just completed.
    Populated(PendingData),
    /// Grouped-update run finished; the snapshot carries `index_nodes`.
    PopulatedGroup(PendingData),
    /// Re-rendered track nodes from [`PresentationPopulator::update_tracks`].
    TracksUpdated(Vec<TreeNode>),
    /// Re-rendered container nodes from
    /// [`PresentationPopulator::update_headers`], keyed by node key.
    HeadersUpdated(HashMap<String, TreeNode>),
    /// The run reached a terminal state (also fires after cancellation).
    Finished,
}

/// An existing track node scheduled for text re-rendering.
#[derive(Debug, Clone)]
pub struct TrackUpdate {
    pub track: Track,
    /// The track's row index, exposed to the evaluator as context.
    pub index: usize,
    pub node: TreeNode,
}

/// Current insertion point while descending through a track's levels.
struct ParentRef {
    key: String,
    base_key: String,
}

/// Builds a presentation tree in batches.
///
/// One instance is one logical worker: runs are sequential, a new run is
/// expected only after the previous one finished. The root node and the
/// live container registry stay private; consumers only ever see the
/// emitted snapshots.
pub struct PresentationPopulator<E: ScriptEvaluator, F: TextFormatter> {
    evaluator: E,
    formatter: F,
    events: Sender<PresentationEvent>,
    cancel: Arc<AtomicBool>,
    scripts: ScriptCache<E>,

    preset: TreePreset,
    columns: Vec<Column>,

    track_depth: usize,
    prev_base_header_key: String,
    prev_header_key: String,
    prev_index: usize,
    prev_base_subheader_keys: Vec<String>,
    prev_subheader_keys: Vec<String>,

    root: TreeNode,
    data: PendingData,
    /// Keys of containers created during the current run.
    containers: HashSet<String>,
    preload_size: usize,
}

impl<E, F> PresentationPopulator<E, F>
where
    E: ScriptEvaluator,
    F: TextFormatter,
{
    pub fn new(
        evaluator: E,
        formatter: F,
        events: Sender<PresentationEvent>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            evaluator,
            formatter,
            events,
            cancel,
            scripts: ScriptCache::new(),
            preset: TreePreset::default(),
            columns: Vec::new(),
            track_depth: 0,
            prev_base_header_key: String::new(),
            prev_header_key: String::new(),
            prev_index: 0,
            prev_base_subheader_keys: Vec::new(),
            prev_subheader_keys: Vec::new(),
            root: TreeNode::root(),
            data: PendingData::default(),
            containers: HashSet::new(),
            preload_size: TRACK_PRELOAD_SIZE,
        }
    }

    /// Override the preload batch size (tuning and tests).
    pub fn set_preload_size(&mut self, size: usize) {
        self.preload_size = size;
    }

    /// Build the presentation tree for `tracks` in display order.
    ///
    /// Emits one [`PresentationEvent::Populated`] snapshot per completed
    /// batch and a terminal [`PresentationEvent::Finished`]. A cancelled
    /// in-flight batch emits nothing; the terminal event still fires.
    pub fn run(&mut self, preset: TreePreset, columns: Vec<Column>, tracks: Vec<Track>) {
        log::debug!(
            "run: Presenting {} tracks with preset '{}'",
            tracks.len(),
            preset.name
        );

        self.reset();
        self.preset = preset;
        self.columns = columns;

        let mut batcher = TrackBatcher::new(tracks, self.preload_size, usize::MAX);

        'run: while let Some((start, batch)) = batcher.next_batch() {
            for (offset, track) in batch.iter().enumerate() {
                if !self.may_run() {
                    log::debug!("run: Cancelled mid-batch");
                    break 'run;
                }
                self.iterate_track(track, start + offset);
            }

            self.update_containers();

            if !self.may_run() {
                log::debug!("run: Cancelled before emission");
                break 'run;
            }

            log::debug!("run: Emitting snapshot with {} items", self.data.items.len());
            let _ = self
                .events
                .send(PresentationEvent::Populated(self.data.clone()));
            // Containers stay addressable across batches; only the child
            // lists already handed to the consumer are dropped
            self.data.nodes.clear();
        }

        let _ = self.events.send(PresentationEvent::Finished);
    }

    /// Build disjoint, pre-partitioned playlist regions in one pass.
    ///
    /// Each map entry is a region starting at the given absolute index.
    /// Exactly one [`PresentationEvent::PopulatedGroup`] snapshot is
    /// emitted after all regions are processed, carrying `index_nodes`
    /// with the produced track keys per region.
    pub fn run_indexed(
        &mut self,
        preset: TreePreset,
        columns: Vec<Column>,
        groups: BTreeMap<usize, Vec<Track>>,
    ) {
        log::debug!("run_indexed: Presenting {} track regions", groups.len());

        self.reset();
        self.preset = preset;
        self.columns = columns;

        for (start, group) in &groups {
            let mut track_keys = Vec::with_capacity(group.len());

            for (offset, track) in group.iter().enumerate() {
                if !self.may_run() {
                    log::debug!("run_indexed: Cancelled");
                    let _ = self.events.send(PresentationEvent::Finished);
                    return;
                }
                if let Some(key) = self.iterate_track(track, start + offset) {
                    track_keys.push(key);
                }
            }

            self.data.index_nodes.insert(*start, track_keys);
        }

        self.update_containers();

        if self.may_run() {
            let snapshot = std::mem::take(&mut self.data);
            self.containers.clear();
            let _ = self
                .events
                .send(PresentationEvent::PopulatedGroup(snapshot));
        }
        let _ = self.events.send(PresentationEvent::Finished);
    }

    /// Re-render the text of already-materialized track nodes.
    ///
    /// Structure and keys are untouched; emits one
    /// [`PresentationEvent::TracksUpdated`] with the affected nodes.
    pub fn update_tracks(
        &mut self,
        preset: TreePreset,
        columns: Vec<Column>,
        tracks: Vec<TrackUpdate>,
    ) {
        log::debug!("update_tracks: Re-rendering {} track rows", tracks.len());

        self.preset = preset;
        self.columns = columns;

        let mut updated = Vec::with_capacity(tracks.len());

        for TrackUpdate {
            track,
            index,
            mut node,
        } in tracks
        {
            let depth = match &node.payload {
                NodePayload::Track(item) => item.depth,
                _ => continue,
            };
            let ctx = EvalContext::new(index, depth);

            if self.columns.is_empty() {
                let row = self.preset.track.clone();
                let (_, left) = self.evaluate_rich(&row.left_text, &track, &ctx);
                let (_, right) = self.evaluate_rich(&row.right_text, &track, &ctx);
                if let NodePayload::Track(item) = &mut node.payload {
                    item.left_text = RichScript::rendered(row.left_text.clone(), left);
                    item.right_text = RichScript::rendered(row.right_text.clone(), right);
                }
            } else {
                let columns = self.columns.clone();
                let mut cells = Vec::with_capacity(columns.len());
                for column in &columns {
                    let (_, text) = self.evaluate_rich(&column.field, &track, &ctx);
                    cells.push(RichScript::rendered(column.field.clone(), text));
                }
                if let NodePayload::Track(item) = &mut node.payload {
                    item.columns = cells;
                }
            }

            updated.push(node);
        }

        let _ = self.events.send(PresentationEvent::TracksUpdated(updated));
    }

    /// Re-render the aggregate text of already-materialized containers.
    ///
    /// Emits one [`PresentationEvent::HeadersUpdated`] with the affected
    /// nodes keyed by node key. Non-container nodes are ignored.
    pub fn update_headers(&mut self, headers: Vec<TreeNode>) {
        log::debug!("update_headers: Re-rendering {} containers", headers.len());

        let mut updated = HashMap::with_capacity(headers.len());

        for mut node in headers {
            match &mut node.payload {
                NodePayload::Header(container) | NodePayload::Subheader(container) => {
                    container.update_group_text(&self.evaluator, &mut self.scripts, &self.formatter);
                }
                _ => continue,
            }
            updated.insert(node.key().to_string(), node);
        }

        let _ = self.events.send(PresentationEvent::HeadersUpdated(updated));
    }

    fn reset(&mut self) {
        self.data.clear();
        self.containers.clear();
        self.root = TreeNode::root();
        self.track_depth = 0;
        self.prev_base_header_key.clear();
        self.prev_header_key.clear();
        self.prev_index = 0;
        self.prev_base_subheader_keys.clear();
        self.prev_subheader_keys.clear();
    }

    fn may_run(&self) -> bool {
        !self.cancel.load(Ordering::Relaxed)
    }

    /// Evaluate one expression for one track, returning the raw output
    /// (for key derivation) alongside its formatted rendering.
    fn evaluate_rich(
        &mut self,
        script: &str,
        track: &Track,
        ctx: &EvalContext,
    ) -> (String, RichText) {
        if script.trim().is_empty() {
            return (String::new(), RichText::default());
        }
        let compiled = self.scripts.get_or_compile(&self.evaluator, script);
        let raw = self
            .evaluator
            .evaluate(&compiled, track, ctx)
            .unwrap_or_default();
        let text = if raw.is_empty() {
            RichText::default()
        } else {
            self.formatter.evaluate(&raw)
        };
        (raw, text)
    }

    /// Process one track: header, subheaders, then the track row itself.
    /// Returns the track node's key when a row was produced.
    fn iterate_track(&mut self, track: &Track, index: usize) -> Option<String> {
        let mut parent = ParentRef {
            key: self.root.key().to_string(),
            base_key: String::new(),
        };

        self.iterate_header(track, &mut parent, index);
        self.iterate_subheaders(track, &mut parent, index);

        if self.columns.is_empty() && !self.preset.track.is_valid() {
            // Row level is skipped, but continuity state must stay
            // index-accurate for the following tracks
            self.track_depth = 0;
            self.prev_index = index;
            return None;
        }

        let ctx = EvalContext::new(index, self.track_depth);
        let row = self.preset.track.clone();

        let mut item = if self.columns.is_empty() {
            let (_, left) = self.evaluate_rich(&row.left_text, track, &ctx);
            let (_, right) = self.evaluate_rich(&row.right_text, track, &ctx);
            TrackItem::with_text(
                RichScript::rendered(row.left_text.clone(), left),
                RichScript::rendered(row.right_text.clone(), right),
                track.clone(),
            )
        } else {
            let columns = self.columns.clone();
            let mut cells = Vec::with_capacity(columns.len());
            for column in &columns {
                let (_, text) = self.evaluate_rich(&column.field, track, &ctx);
                cells.push(RichScript::rendered(column.field.clone(), text));
            }
            TrackItem::with_columns(cells, track.clone())
        };
        item.row_height = row.row_height;
        item.depth = self.track_depth;

        // Stable for the same track at the same position, distinct for
        // repeats of one track at different positions
        let base_key = keys::hash_key(&[&parent.key, track.hash(), &index.to_string()]);
        // Track rows are never merged or reused across runs
        let key = keys::random_key();

        let level = self.track_depth;
        let parent_key = parent.key.clone();
        self.data.get_or_insert(&key, &parent.key, || {
            let mut node = TreeNode::new(NodePayload::Track(item), parent_key, level);
            node.set_base_key(&base_key);
            node
        });
        self.data.record_parent(track.id(), &key);

        self.track_depth = 0;
        self.prev_index = index;
        Some(key)
    }

    fn iterate_header(&mut self, track: &Track, parent: &mut ParentRef, index: usize) {
        let header = self.preset.header.clone();
        if !header.is_valid() {
            return;
        }

        let ctx = EvalContext::new(index, self.track_depth);
        let (title_raw, title_text) = self.evaluate_rich(&header.title, track, &ctx);
        let (subtitle_raw, subtitle_text) = self.evaluate_rich(&header.subtitle, track, &ctx);
        let (side_raw, side_text) = self.evaluate_rich(&header.side_text, track, &ctx);
        let (info_raw, info_text) = self.evaluate_rich(&header.info, track, &ctx);

        let base_key = keys::hash_key(&[&title_raw, &subtitle_raw, &side_raw, &info_raw]);

        // Adjacent track with identical header content joins the previous
        // header; anything else starts a fresh one
        let key = if !self.prev_header_key.is_empty()
            && self.prev_base_header_key == base_key
            && index == self.prev_index + 1
        {
            self.prev_header_key.clone()
        } else {
            keys::random_key()
        };
        self.prev_base_header_key = base_key.clone();
        self.prev_header_key = key.clone();

        if !self.containers.contains(&key) {
            let container = ContainerItem {
                simple: header.simple,
                title: RichScript::rendered(header.title.clone(), title_text),
                subtitle: RichScript::rendered(header.subtitle.clone(), subtitle_text),
                side_text: RichScript::rendered(header.side_text.clone(), side_text),
                info: RichScript::rendered(header.info.clone(), info_text),
                row_height: header.row_height,
                tracks: Vec::new(),
            };
            let level = self.track_depth;
            let parent_key = parent.key.clone();
            self.data.get_or_insert(&key, &parent.key, || {
                let mut node = TreeNode::new(NodePayload::Header(container), parent_key, level);
                node.set_base_key(&base_key);
                node
            });
            self.containers.insert(key.clone());
        }

        if let Some(node) = self.data.items.get_mut(&key) {
            if let NodePayload::Header(container) = &mut node.payload {
                container.add_track(track.clone());
            }
        }
        self.data.record_parent(track.id(), &key);

        parent.key = key;
        parent.base_key = base_key;
        self.track_depth += 1;
    }

    fn iterate_subheaders(&mut self, track: &Track, parent: &mut ParentRef, index: usize) {
        if self.preset.subheaders.is_empty() {
            return;
        }
        let subheaders = self.preset.subheaders.clone();
        let ctx = EvalContext::new(index, self.track_depth);

        let mut candidates = Vec::with_capacity(subheaders.len());
        for subheader in &subheaders {
            let (_, left_text) = self.evaluate_rich(&subheader.left_text, track, &ctx);
            let (_, right_text) = self.evaluate_rich(&subheader.right_text, track, &ctx);
            candidates.push(ContainerItem {
                simple: false,
                title: RichScript::rendered(subheader.left_text.clone(), left_text),
                subtitle: RichScript::rendered(subheader.right_text.clone(), right_text),
                side_text: RichScript::default(),
                info: RichScript::default(),
                row_height: subheader.row_height,
                tracks: Vec::new(),
            });
        }

        self.prev_base_subheader_keys
            .resize(candidates.len(), String::new());
        self.prev_subheader_keys
            .resize(candidates.len(), String::new());

        for (slot, container) in candidates.into_iter().enumerate() {
            let content_key = format!(
                "{}{}",
                container.title.text.plain(),
                container.subtitle.text.plain()
            );
            if content_key.is_empty() {
                // No subheader at this level for this track; adjacency
                // tracking restarts behind it
                self.prev_base_subheader_keys[slot].clear();
                self.prev_subheader_keys[slot].clear();
                continue;
            }

            // Scoped within the parent so equal subheader text under
            // different headers stays distinct
            let base_key = keys::hash_key(&[&parent.base_key, &content_key]);

            let key = if self.prev_base_subheader_keys[slot] == base_key
                && index == self.prev_index + 1
            {
                self.prev_subheader_keys[slot].clone()
            } else {
                keys::random_key()
            };
            self.prev_base_subheader_keys[slot] = base_key.clone();
            self.prev_subheader_keys[slot] = key.clone();

            if !self.containers.contains(&key) {
                let level = self.track_depth;
                let parent_key = parent.key.clone();
                self.data.get_or_insert(&key, &parent.key, || {
                    let mut node =
                        TreeNode::new(NodePayload::Subheader(container), parent_key, level);
                    node.set_base_key(&base_key);
                    node
                });
                self.containers.insert(key.clone());
            }

            if let Some(node) = self.data.items.get_mut(&key) {
                if let NodePayload::Subheader(container) = &mut node.payload {
                    container.add_track(track.clone());
                }
            }
            self.data.record_parent(track.id(), &key);

            parent.key = key;
            parent.base_key = base_key;
            self.track_depth += 1;
        }
    }

    /// Re-render every live container's aggregate text from its
    /// accumulated tracks. Deferred to batch end: per-track recomputation
    /// would redo the same text once per contained track.
    fn update_containers(&mut self) {
        for key in &self.containers {
            if let Some(node) = self.data.items.get_mut(key) {
                if let NodePayload::Header(container) | NodePayload::Subheader(container) =
                    &mut node.payload
                {
                    container.update_group_text(&self.evaluator, &mut self.scripts, &self.formatter);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{HeaderRow, SubheaderRow, TrackRow};
    use crate::test_util::{track, StubEvaluator};
    use crate::tree::ROOT_KEY;
    use crate::types::TrackId;

    const ALBUM: &str = "%album%";
    const DISC: &str = "%disc%";
    const TITLE: &str = "%title%";

    fn preset() -> TreePreset {
        TreePreset {
            name: "test".to_string(),
            header: HeaderRow {
                title: ALBUM.to_string(),
                info: "%count%".to_string(),
                row_height: 48,
                ..HeaderRow::default()
            },
            subheaders: Vec::new(),
            track: TrackRow {
                left_text: TITLE.to_string(),
                row_height: 22,
                ..TrackRow::default()
            },
        }
    }

    fn preset_with_subheader() -> TreePreset {
        let mut preset = preset();
        preset.subheaders.push(SubheaderRow {
            left_text: DISC.to_string(),
            right_text: String::new(),
            row_height: 20,
        });
        preset
    }

    fn populator(
        evaluator: StubEvaluator,
    ) -> (
        PresentationPopulator<StubEvaluator, crate::script::PlainFormatter>,
        crossbeam::channel::Receiver<PresentationEvent>,
    ) {
        let (tx, rx) = crossbeam::channel::unbounded();
        let populator = PresentationPopulator::new(
            evaluator,
            crate::script::PlainFormatter,
            tx,
            Arc::new(AtomicBool::new(false)),
        );
        (populator, rx)
    }

    fn final_snapshot(rx: &crossbeam::channel::Receiver<PresentationEvent>) -> PendingData {
        rx.try_iter()
            .filter_map(|event| match event {
                PresentationEvent::Populated(data) | PresentationEvent::PopulatedGroup(data) => {
                    Some(data)
                }
                _ => None,
            })
            .last()
            .expect("no snapshot emitted")
    }

    fn header_keys(data: &PendingData) -> Vec<String> {
        data.container_order
            .iter()
            .filter(|key| matches!(data.items[key.as_str()].payload, NodePayload::Header(_)))
            .cloned()
            .collect()
    }

    fn album_evaluator(albums: &[(i64, &str)]) -> StubEvaluator {
        let mut evaluator = StubEvaluator::new();
        for (id, album) in albums {
            evaluator.set(TrackId(*id), ALBUM, album);
            evaluator.set(TrackId(*id), TITLE, &format!("Track {id}"));
        }
        evaluator
    }

    #[test]
    fn test_adjacent_identical_headers_merge() {
        let evaluator = album_evaluator(&[(1, "X"), (2, "X"), (3, "Y")]);
        let (mut populator, rx) = populator(evaluator);

        populator.run(preset(), Vec::new(), vec![track(1), track(2), track(3)]);

        let data = final_snapshot(&rx);
        let headers = header_keys(&data);
        assert_eq!(headers.len(), 2);

        assert_eq!(
            data.track_parents[&TrackId(1)][0],
            data.track_parents[&TrackId(2)][0]
        );
        assert_ne!(
            data.track_parents[&TrackId(2)][0],
            data.track_parents[&TrackId(3)][0]
        );

        // Both tracks aggregated under the shared header
        match &data.items[&headers[0]].payload {
            NodePayload::Header(container) => assert_eq!(container.tracks.len(), 2),
            other => panic!("Expected header payload, got {other:?}"),
        }
    }

    #[test]
    fn test_non_adjacent_identical_headers_stay_apart() {
        let evaluator = album_evaluator(&[(1, "X"), (2, "Y"), (3, "X")]);
        let (mut populator, rx) = populator(evaluator);

        populator.run(preset(), Vec::new(), vec![track(1), track(2), track(3)]);

        let data = final_snapshot(&rx);
        let headers = header_keys(&data);
        assert_eq!(headers.len(), 3);

        let first = &data.items[&headers[0]];
        let third = &data.items[&headers[2]];
        // Same content means same base key, but the live keys differ
        assert_eq!(first.base_key(), third.base_key());
        assert_ne!(first.key(), third.key());
    }

    #[test]
    fn test_subheader_scoping_and_continuity_reset() {
        let mut evaluator = album_evaluator(&[(1, "X"), (2, "X"), (3, "X")]);
        evaluator.set(TrackId(1), DISC, "1");
        // Track 2 renders no subheader; track 3 repeats disc 1
        evaluator.set(TrackId(3), DISC, "1");
        let (mut populator, rx) = populator(evaluator);

        populator.run(
            preset_with_subheader(),
            Vec::new(),
            vec![track(1), track(2), track(3)],
        );

        let data = final_snapshot(&rx);

        // Track 2 skipped the subheader level entirely
        assert_eq!(data.track_parents[&TrackId(2)].len(), 2);
        assert_eq!(data.track_parents[&TrackId(1)].len(), 3);
        assert_eq!(data.track_parents[&TrackId(3)].len(), 3);

        // Identical content around the gap does not merge
        let sub_1 = &data.track_parents[&TrackId(1)][1];
        let sub_3 = &data.track_parents[&TrackId(3)][1];
        assert_ne!(sub_1, sub_3);
        assert_eq!(
            data.items[sub_1.as_str()].base_key(),
            data.items[sub_3.as_str()].base_key()
        );
    }

    #[test]
    fn test_equal_subheader_under_different_headers_is_distinct() {
        let mut evaluator = album_evaluator(&[(1, "X"), (2, "Y")]);
        evaluator.set(TrackId(1), DISC, "1");
        evaluator.set(TrackId(2), DISC, "1");
        let (mut populator, rx) = populator(evaluator);

        populator.run(preset_with_subheader(), Vec::new(), vec![track(1), track(2)]);

        let data = final_snapshot(&rx);
        let sub_1 = &data.track_parents[&TrackId(1)][1];
        let sub_2 = &data.track_parents[&TrackId(2)][1];
        assert_ne!(
            data.items[sub_1.as_str()].base_key(),
            data.items[sub_2.as_str()].base_key()
        );
    }

    #[test]
    fn test_track_rows_and_depth() {
        let mut evaluator = album_evaluator(&[(1, "X")]);
        evaluator.set(TrackId(1), DISC, "1");
        let (mut populator, rx) = populator(evaluator);

        populator.run(preset_with_subheader(), Vec::new(), vec![track(1)]);

        let data = final_snapshot(&rx);
        let parents = &data.track_parents[&TrackId(1)];
        assert_eq!(parents.len(), 3);

        let leaf = &data.items[parents[2].as_str()];
        match &leaf.payload {
            NodePayload::Track(item) => {
                assert_eq!(item.depth, 2);
                assert_eq!(item.left_text.text.plain(), "Track 1");
                assert_eq!(item.row_height, 22);
            }
            other => panic!("Expected track payload, got {other:?}"),
        }
        // Ancestry runs root to leaf
        assert_eq!(leaf.parent_key(), &parents[1]);
        assert_eq!(data.items[parents[1].as_str()].parent_key(), &parents[0]);
        assert_eq!(data.items[parents[0].as_str()].parent_key(), ROOT_KEY);
    }

    #[test]
    fn test_columns_mode_renders_cells_with_context() {
        let mut evaluator = album_evaluator(&[(1, "X")]);
        evaluator.set(TrackId(1), "%artist%", "Camel");
        let (mut populator, rx) = populator(evaluator);

        let columns = vec![
            Column {
                name: "Artist".to_string(),
                field: "%artist%".to_string(),
            },
            Column {
                name: "Depth".to_string(),
                field: "%depth%".to_string(),
            },
        ];
        populator.run(preset(), columns, vec![track(1)]);

        let data = final_snapshot(&rx);
        let leaf_key = &data.track_parents[&TrackId(1)][1];
        match &data.items[leaf_key.as_str()].payload {
            NodePayload::Track(item) => {
                assert_eq!(item.columns.len(), 2);
                assert_eq!(item.columns[0].text.plain(), "Camel");
                // The evaluator sees the nesting depth as context
                assert_eq!(item.columns[1].text.plain(), "1");
                assert!(item.left_text.text.is_empty());
            }
            other => panic!("Expected track payload, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_text_recomputed_at_batch_end() {
        let evaluator = album_evaluator(&[(1, "X"), (2, "X")]);
        let (mut populator, rx) = populator(evaluator);

        populator.run(preset(), Vec::new(), vec![track(1), track(2)]);

        let data = final_snapshot(&rx);
        let headers = header_keys(&data);
        match &data.items[&headers[0]].payload {
            NodePayload::Header(container) => {
                assert_eq!(container.info.text.plain(), "2 tracks");
            }
            other => panic!("Expected header payload, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_boundary_keeps_continuity_and_accumulates_items() {
        let evaluator = album_evaluator(&[(1, "X"), (2, "X"), (3, "X")]);
        let (mut populator, rx) = populator(evaluator);
        populator.set_preload_size(2);

        populator.run(preset(), Vec::new(), vec![track(1), track(2), track(3)]);

        let snapshots: Vec<PendingData> = rx
            .try_iter()
            .filter_map(|event| match event {
                PresentationEvent::Populated(data) => Some(data),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 2);

        let first = &snapshots[0];
        let second = &snapshots[1];

        let header_key = first.track_parents[&TrackId(1)][0].clone();
        // Track 3 joined the same header across the batch boundary
        assert_eq!(second.track_parents[&TrackId(3)][0], header_key);

        // First batch splices the header under the root; the second batch
        // only carries the new track row under the existing header
        assert_eq!(first.nodes[ROOT_KEY], vec![header_key.clone()]);
        assert!(!second.nodes.contains_key(ROOT_KEY));
        assert_eq!(second.nodes[&header_key].len(), 1);

        // Items accumulate across batches within the run
        assert!(second.items.len() > first.items.len());
        match &second.items[&header_key].payload {
            NodePayload::Header(container) => assert_eq!(container.tracks.len(), 3),
            other => panic!("Expected header payload, got {other:?}"),
        }
    }

    #[test]
    fn test_track_base_key_stable_across_runs_same_position() {
        // Without a header level the parent key is the stable root, so the
        // content-derived base key must repeat across runs
        let mut no_header = preset();
        no_header.header = HeaderRow::default();

        let base_key_of_first = |rx: &crossbeam::channel::Receiver<PresentationEvent>| {
            let data = final_snapshot(rx);
            let leaf_key = &data.track_parents[&TrackId(1)][0];
            let node = &data.items[leaf_key.as_str()];
            (node.key().to_string(), node.base_key().to_string())
        };

        let evaluator = album_evaluator(&[(1, "X")]);
        let (mut populator, rx) = populator(evaluator);

        populator.run(no_header.clone(), Vec::new(), vec![track(1)]);
        let (key_a, base_a) = base_key_of_first(&rx);

        populator.run(no_header, Vec::new(), vec![track(1)]);
        let (key_b, base_b) = base_key_of_first(&rx);

        assert_eq!(base_a, base_b);
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn test_run_indexed_emits_single_snapshot_with_index_nodes() {
        let evaluator = album_evaluator(&[(1, "X"), (2, "X"), (3, "X")]);
        let (mut populator, rx) = populator(evaluator);

        let mut groups = BTreeMap::new();
        groups.insert(0, vec![track(1), track(2)]);
        groups.insert(10, vec![track(3)]);
        populator.run_indexed(preset(), Vec::new(), groups);

        let events: Vec<PresentationEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        let data = match &events[0] {
            PresentationEvent::PopulatedGroup(data) => data,
            other => panic!("Expected grouped snapshot, got {other:?}"),
        };
        assert!(matches!(events[1], PresentationEvent::Finished));

        assert_eq!(data.index_nodes[&0].len(), 2);
        assert_eq!(data.index_nodes[&10].len(), 1);

        // Regions are discontiguous, so the shared album still produces
        // two separate headers
        assert_ne!(
            data.track_parents[&TrackId(2)][0],
            data.track_parents[&TrackId(3)][0]
        );
    }

    #[test]
    fn test_cancelled_before_run_emits_only_finished() {
        let evaluator = album_evaluator(&[(1, "X")]);
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut populator = PresentationPopulator::new(
            evaluator,
            crate::script::PlainFormatter,
            tx,
            Arc::new(AtomicBool::new(true)),
        );

        populator.run(preset(), Vec::new(), vec![track(1)]);

        let events: Vec<PresentationEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PresentationEvent::Finished));
    }

    #[test]
    fn test_invalid_track_row_skips_rows_but_keeps_headers() {
        let evaluator = album_evaluator(&[(1, "X"), (2, "X")]);
        let (mut populator, rx) = populator(evaluator);

        let mut no_rows = preset();
        no_rows.track = TrackRow::default();
        populator.run(no_rows, Vec::new(), vec![track(1), track(2)]);

        let data = final_snapshot(&rx);
        let headers = header_keys(&data);
        // Continuity survives the skipped rows: one shared header
        assert_eq!(headers.len(), 1);
        assert!(data
            .items
            .values()
            .all(|node| !matches!(node.payload, NodePayload::Track(_))));
    }

    #[test]
    fn test_update_tracks_rerenders_text_only() {
        let mut evaluator = album_evaluator(&[(1, "X")]);
        evaluator.set(TrackId(1), "%title2%", "Renamed");
        let (mut populator, rx) = populator(evaluator);

        populator.run(preset(), Vec::new(), vec![track(1)]);
        let data = final_snapshot(&rx);
        let leaf_key = data.track_parents[&TrackId(1)][1].clone();
        let node = data.items[leaf_key.as_str()].clone();

        let mut new_preset = preset();
        new_preset.track.left_text = "%title2%".to_string();
        populator.update_tracks(
            new_preset,
            Vec::new(),
            vec![TrackUpdate {
                track: track(1),
                index: 0,
                node,
            }],
        );

        let updated = rx
            .try_iter()
            .find_map(|event| match event {
                PresentationEvent::TracksUpdated(nodes) => Some(nodes),
                _ => None,
            })
            .expect("no tracks-updated event");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].key(), leaf_key);
        match &updated[0].payload {
            NodePayload::Track(item) => {
                assert_eq!(item.left_text.text.plain(), "Renamed");
            }
            other => panic!("Expected track payload, got {other:?}"),
        }
    }

    #[test]
    fn test_update_headers_rerenders_aggregate_text() {
        let evaluator = album_evaluator(&[(1, "X"), (2, "X")]);
        let (mut populator, rx) = populator(evaluator);

        populator.run(preset(), Vec::new(), vec![track(1), track(2)]);
        let data = final_snapshot(&rx);
        let header_key = header_keys(&data)[0].clone();
        let mut node = data.items[header_key.as_str()].clone();

        // Simulate underlying track data changing
        if let NodePayload::Header(container) = &mut node.payload {
            container.tracks.pop();
        }
        populator.update_headers(vec![node]);

        let updated = rx
            .try_iter()
            .find_map(|event| match event {
                PresentationEvent::HeadersUpdated(nodes) => Some(nodes),
                _ => None,
            })
            .expect("no headers-updated event");
        match &updated[&header_key].payload {
            NodePayload::Header(container) => {
                assert_eq!(container.info.text.plain(), "1 tracks");
            }
            other => panic!("Expected header payload, got {other:?}"),
        }
    }
}

//! Tree node model for grouped track views
//!
//! Nodes are addressed by string keys (see [`crate::keys`]) and carry a
//! type-tagged payload. Parents own children through the per-batch
//! `nodes` map in [`pending::PendingData`]; a node only keeps a key
//! back-reference to its parent.

pub mod pending;

pub use pending::{PendingData, PendingTreeData};

use crate::script::{RichScript, RichText, ScriptCache, ScriptEvaluator, TextFormatter};
use crate::types::Track;

/// Key of the long-lived root node. The root is owned by a populator and
/// never appears in pending data; top-level children are registered under
/// this key.
pub const ROOT_KEY: &str = "root";

/// A grouping level in a single-axis tree (e.g. one genre).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupItem {
    pub title: String,
    /// Tracks aggregated under this group, in discovery order.
    pub tracks: Vec<Track>,
}

impl GroupItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tracks: Vec::new(),
        }
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }
}

/// A header or subheader row in a presentation tree.
///
/// Carries the rendering scripts alongside their most recent output so the
/// aggregate text can be re-rendered from the accumulated tracks after a
/// batch completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerItem {
    /// Simple headers render title-only, without the subtitle/info block.
    pub simple: bool,
    pub title: RichScript,
    pub subtitle: RichScript,
    pub side_text: RichScript,
    pub info: RichScript,
    pub row_height: u32,
    /// Tracks aggregated under this container, in discovery order.
    pub tracks: Vec<Track>,
}

impl ContainerItem {
    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Re-render the container's text from its accumulated tracks.
    ///
    /// Group evaluation sees the whole track list, so summary fields
    /// (counts, total duration) come out right. Deferred to batch end by
    /// the populator: doing this per track would recompute the same text
    /// once per contained track.
    pub fn update_group_text<E, F>(
        &mut self,
        evaluator: &E,
        scripts: &mut ScriptCache<E>,
        formatter: &F,
    ) where
        E: ScriptEvaluator,
        F: TextFormatter,
    {
        let fields = [
            &mut self.title,
            &mut self.subtitle,
            &mut self.side_text,
            &mut self.info,
        ];
        for field in fields {
            if field.script.is_empty() {
                continue;
            }
            let compiled = scripts.get_or_compile(evaluator, &field.script);
            let raw = evaluator
                .evaluate_group(&compiled, &self.tracks)
                .unwrap_or_default();
            field.text = if raw.is_empty() {
                RichText::default()
            } else {
                formatter.evaluate(&raw)
            };
        }
    }
}

/// A leaf track row in a presentation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackItem {
    /// Per-column renderings when explicit columns are configured.
    pub columns: Vec<RichScript>,
    /// Left-aligned free text (fallback when no columns are configured).
    pub left_text: RichScript,
    /// Right-aligned free text (fallback when no columns are configured).
    pub right_text: RichScript,
    pub row_height: u32,
    /// Number of header/subheader levels above this row.
    pub depth: usize,
    pub track: Track,
}

impl TrackItem {
    pub fn with_columns(columns: Vec<RichScript>, track: Track) -> Self {
        Self {
            columns,
            left_text: RichScript::default(),
            right_text: RichScript::default(),
            row_height: 0,
            depth: 0,
            track,
        }
    }

    pub fn with_text(left_text: RichScript, right_text: RichScript, track: Track) -> Self {
        Self {
            columns: Vec::new(),
            left_text,
            right_text,
            row_height: 0,
            depth: 0,
            track,
        }
    }
}

/// Type-tagged node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    /// Single-axis grouping level.
    Group(GroupItem),
    /// Presentation header row.
    Header(ContainerItem),
    /// Presentation subheader row, scoped within its header.
    Subheader(ContainerItem),
    /// Leaf track row.
    Track(TrackItem),
}

impl NodePayload {
    /// Containers can have children; track rows cannot.
    pub fn is_container(&self) -> bool {
        !matches!(self, NodePayload::Track(_))
    }
}

/// A node in a populated tree.
///
/// `key` addresses the node in the current tree and is assigned once.
/// `base_key` is content-derived: identical semantic content always yields
/// an identical base key, which is how continuity across batches and
/// update-in-place calls find existing nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    key: String,
    base_key: String,
    parent_key: String,
    level: usize,
    pending: bool,
    pub payload: NodePayload,
}

impl TreeNode {
    pub fn new(payload: NodePayload, parent_key: impl Into<String>, level: usize) -> Self {
        Self {
            key: String::new(),
            base_key: String::new(),
            parent_key: parent_key.into(),
            level,
            pending: false,
            payload,
        }
    }

    /// The long-lived root node owned by a populator.
    pub fn root() -> Self {
        let mut node = Self::new(NodePayload::Group(GroupItem::default()), "", 0);
        node.key = ROOT_KEY.to_string();
        node
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn set_key(&mut self, key: &str) {
        self.key = key.to_string();
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub(crate) fn set_base_key(&mut self, base_key: &str) {
        self.base_key = base_key.to_string();
    }

    pub fn parent_key(&self) -> &str {
        &self.parent_key
    }

    /// Nesting depth of the node, used for indentation.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Whether the node was already inserted during the current run.
    pub fn pending(&self) -> bool {
        self.pending
    }

    pub(crate) fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }
}

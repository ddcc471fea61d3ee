//! Per-batch snapshot data handed to consumers
//!
//! A populator accumulates touched nodes into one of these structures
//! while processing a batch, then emits it and clears the per-batch maps.
//! The consumer splices `nodes[parent]` child lists under already
//! materialized parents and uses `track_parents` to locate every tree
//! position a track occupies.

use super::{NodePayload, TreeNode};
use crate::types::TrackId;
use std::collections::{BTreeMap, HashMap};

/// Snapshot emitted by the grouping populator. Fully cleared between
/// batches: every emission carries only the nodes touched since the last.
#[derive(Debug, Clone, Default)]
pub struct PendingTreeData {
    /// All nodes touched in this batch, keyed by node key.
    pub items: HashMap<String, TreeNode>,
    /// Ordered child keys per parent key, in discovery order.
    pub nodes: HashMap<String, Vec<String>>,
    /// Ancestor keys (root to leaf) per track id.
    pub track_parents: HashMap<TrackId, Vec<String>>,
}

impl PendingTreeData {
    /// Fetch or create the node for `key`, registering it as a child of
    /// `parent_key` exactly once per run (guarded by the pending flag).
    pub fn get_or_insert(
        &mut self,
        key: &str,
        parent_key: &str,
        build: impl FnOnce() -> TreeNode,
    ) -> &mut TreeNode {
        let node = self.items.entry(key.to_string()).or_insert_with(|| {
            let mut node = build();
            node.set_key(key);
            node
        });
        if !node.pending() {
            node.set_pending(true);
            self.nodes
                .entry(parent_key.to_string())
                .or_default()
                .push(key.to_string());
        }
        node
    }

    /// Record `key` as one more ancestor of `track`.
    pub fn record_parent(&mut self, track: TrackId, key: &str) {
        self.track_parents
            .entry(track)
            .or_default()
            .push(key.to_string());
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.nodes.clear();
        self.track_parents.clear();
    }
}

/// Snapshot emitted by the presentation populator.
///
/// Unlike [`PendingTreeData`], `items` and `track_parents` accumulate for
/// the whole run; only `nodes` is cleared between batches, so continuity
/// logic can keep addressing containers created in earlier batches.
#[derive(Debug, Clone, Default)]
pub struct PendingData {
    /// All nodes touched in this run so far, keyed by node key.
    pub items: HashMap<String, TreeNode>,
    /// Ordered child keys per parent key, cleared after each emission.
    pub nodes: HashMap<String, Vec<String>>,
    /// Header/subheader keys in the order first encountered.
    pub container_order: Vec<String>,
    /// Ancestor keys (root to leaf) per track id.
    pub track_parents: HashMap<TrackId, Vec<String>>,
    /// Produced track keys per batch-start index (grouped-update mode only).
    pub index_nodes: BTreeMap<usize, Vec<String>>,
}

impl PendingData {
    /// Fetch or create the node for `key`, registering it under its parent
    /// exactly once. Containers are additionally appended to
    /// `container_order` on first registration.
    pub fn get_or_insert(
        &mut self,
        key: &str,
        parent_key: &str,
        build: impl FnOnce() -> TreeNode,
    ) -> &mut TreeNode {
        let node = self.items.entry(key.to_string()).or_insert_with(|| {
            let mut node = build();
            node.set_key(key);
            node
        });
        if !node.pending() {
            node.set_pending(true);
            self.nodes
                .entry(parent_key.to_string())
                .or_default()
                .push(key.to_string());
            if !matches!(node.payload, NodePayload::Track(_)) {
                self.container_order.push(key.to_string());
            }
        }
        node
    }

    /// Record `key` as one more ancestor of `track`.
    pub fn record_parent(&mut self, track: TrackId, key: &str) {
        self.track_parents
            .entry(track)
            .or_default()
            .push(key.to_string());
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.nodes.clear();
        self.container_order.clear();
        self.track_parents.clear();
        self.index_nodes.clear();
    }
}

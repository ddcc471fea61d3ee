//! Tracktree Core - incremental grouping engine for hierarchical track views
//!
//! Turns a flat list of tracks into a stably-keyed tree, built in bounded
//! batches so a consuming UI can splice results in as they arrive. Two
//! populators share the same node store and key scheme:
//!
//! - [`populator::GroupingPopulator`] builds a single-axis grouping tree
//!   (e.g. genre -> sub-genre) from one grouping expression per track.
//! - [`populator::PresentationPopulator`] builds a header/subheader/track
//!   tree from a declarative [`preset::TreePreset`], merging runs of
//!   adjacent tracks that render the same header content.
//!
//! Script evaluation is an external concern: callers plug in a
//! [`script::ScriptEvaluator`] and a [`script::TextFormatter`]. Snapshots
//! are delivered over crossbeam channels; cancellation is a shared
//! `AtomicBool` polled once per track and once per batch boundary.

pub mod keys;
pub mod populator;
pub mod preset;
pub mod script;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use types::*;

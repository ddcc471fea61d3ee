//! Batch-driven tree populators
//!
//! Each populator is a single logical worker: it owns its evaluator, its
//! long-lived root node and its in-progress pending data, processes tracks
//! strictly in order, and hands per-batch snapshots to the consumer over a
//! crossbeam channel. The only cross-thread signal is a shared cancel
//! flag, polled once per track and once per batch boundary.

pub mod batch;
pub mod grouping;
pub mod presentation;

pub use batch::TrackBatcher;
pub use grouping::{GroupingEvent, GroupingPopulator};
pub use presentation::{PresentationEvent, PresentationPopulator, TrackUpdate};

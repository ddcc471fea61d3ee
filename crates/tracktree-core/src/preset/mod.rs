//! Declarative presets for the presentation tree
//!
//! A preset describes how header, subheader and track rows are rendered:
//! which expressions produce their text and how tall each row is. Presets
//! are plain data, (de)serializable as YAML through [`io`].

pub mod io;

pub use io::{load_preset, save_preset, PresetError};

use serde::{Deserialize, Serialize};

/// Rendering rules for the header row of a presentation tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderRow {
    /// Title expression. A header with a blank title is skipped entirely.
    pub title: String,
    pub subtitle: String,
    pub side_text: String,
    pub info: String,
    pub row_height: u32,
    /// Simple headers render title-only.
    pub simple: bool,
}

impl HeaderRow {
    /// A header level is only built when it has a usable title expression.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Rendering rules for one subheader level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubheaderRow {
    pub left_text: String,
    pub right_text: String,
    pub row_height: u32,
}

/// Rendering rules for track rows (left/right fallback when no explicit
/// columns are supplied to the populator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRow {
    pub left_text: String,
    pub right_text: String,
    pub row_height: u32,
}

impl TrackRow {
    /// Track rows need at least one side with an expression.
    pub fn is_valid(&self) -> bool {
        !self.left_text.trim().is_empty() || !self.right_text.trim().is_empty()
    }
}

/// An explicit track column: a display name and the expression producing
/// the cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Column {
    pub name: String,
    pub field: String,
}

/// Complete description of a presentation tree's rendering rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreePreset {
    pub name: String,
    pub header: HeaderRow,
    /// Zero or more subheader levels, outermost first.
    pub subheaders: Vec<SubheaderRow>,
    pub track: TrackRow,
}

use crate::editor::CustomCell;
use crate::value::Value;
use std::fmt;
use std::ops::Range;

/// Highest selection level a cell can show (overlapping ranges stack up to this).
pub const MAX_SELECTION_LEVEL: u8 = 5;

/// Visual state flags of a rendered cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellState {
    /// Number of selection ranges covering the cell, capped at [`MAX_SELECTION_LEVEL`].
    pub selected: u8,
    pub focused: bool,
    pub disabled: bool,
    pub checked: bool,
}

/// What a materialized cell shows.
#[derive(Default)]
pub enum CellContent {
    #[default]
    Empty,
    Text {
        text: String,
        /// Byte ranges in `text` matching the active search term.
        highlights: Vec<Range<usize>>,
    },
    Checkbox(bool),
    Boolean(bool),
    Reference(String),
    /// The cell hosts the active inline editor.
    Editor,
    Custom(Box<dyn CustomCell>),
}

impl CellContent {
    pub fn is_editor(&self) -> bool {
        matches!(self, CellContent::Editor)
    }
}

impl fmt::Debug for CellContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellContent::Empty => f.write_str("Empty"),
            CellContent::Text { text, highlights } => f
                .debug_struct("Text")
                .field("text", text)
                .field("highlights", highlights)
                .finish(),
            CellContent::Checkbox(v) => f.debug_tuple("Checkbox").field(v).finish(),
            CellContent::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            CellContent::Reference(v) => f.debug_tuple("Reference").field(v).finish(),
            CellContent::Editor => f.write_str("Editor"),
            CellContent::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One cell of a rendered row.
#[derive(Debug, Default)]
pub struct RenderedCell {
    pub field: String,
    /// Value at the time the cell was last filled.
    pub value: Value,
    pub displayed: String,
    /// Outside the horizontal render window and represented by a spacer run.
    pub skipped: bool,
    pub state: CellState,
    pub content: CellContent,
}

impl RenderedCell {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }
}

/// A contiguous run of skipped cells painted as one blank block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpacerRun {
    pub start: usize,
    pub len: usize,
    pub width: u32,
}

impl SpacerRun {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

/// Search-term matches in `text`, case-insensitive, as byte ranges.
pub fn highlight_ranges(text: &str, term: Option<&str>) -> Vec<Range<usize>> {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return Vec::new();
    };
    let hay = text.to_lowercase();
    let needle = term.to_lowercase();
    // Lowercasing can change byte lengths for some scripts; only highlight when it does not.
    if hay.len() != text.len() {
        return Vec::new();
    }
    hay.match_indices(&needle)
        .map(|(start, m)| start..start + m.len())
        .collect()
}

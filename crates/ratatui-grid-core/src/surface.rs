//! Retained-tree patch operations.
//!
//! Row views keep their cells in memory and describe every change they make as a [`PatchOp`].
//! A [`Surface`] receives those operations; the terminal painter reads the retained row views
//! directly, so the default [`PatchLog`] surface only counts and optionally records them.

use crate::cell::CellState;
use crate::column::Region;
use crate::record::RowId;

/// Identifies one row's part inside a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub row: RowId,
    pub region: Region,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PatchOp {
    /// The row part was emptied ahead of a full rebuild.
    ClearRow { key: RowKey },
    /// The row part left the render window.
    DestroyRow { key: RowKey },
    InsertCell { key: RowKey, at: usize },
    RemoveCell { key: RowKey, at: usize },
    SetContent { key: RowKey, at: usize },
    ClearContent { key: RowKey, at: usize },
    SetState { key: RowKey, at: usize, state: CellState },
    InsertSpacer { key: RowKey, start: usize, len: usize, width: u32 },
    ResizeSpacer { key: RowKey, start: usize, len: usize, width: u32 },
    RemoveSpacer { key: RowKey, start: usize },
}

pub trait Surface {
    fn apply(&mut self, op: PatchOp);
}

/// Counts patch operations and keeps the most recent ones when recording is enabled.
#[derive(Clone, Debug, Default)]
pub struct PatchLog {
    count: usize,
    recording: bool,
    ops: Vec<PatchOp>,
}

impl PatchLog {
    pub fn recording() -> Self {
        Self {
            recording: true,
            ..Self::default()
        }
    }

    /// Total operations applied since creation.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn take(&mut self) -> Vec<PatchOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Surface for PatchLog {
    fn apply(&mut self, op: PatchOp) {
        self.count += 1;
        if self.recording {
            self.ops.push(op);
        }
    }
}

//! Focus and rectangular selection ranges anchored to row identity.
//!
//! Ranges name rows by [`RowId`] and columns by field, so they survive sorting and column
//! reordering. After the result set changes they must be [`remap`](Selection::remap)ped: a
//! range never refers to a row absent from the current result.

use crate::cell::MAX_SELECTION_LEVEL;
use crate::column::Layouts;
use crate::query::ResultSet;
use crate::record::RowId;
use std::collections::HashMap;
use std::ops::Range;

/// A cell addressed by row identity and field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellAddr {
    pub row: RowId,
    pub field: String,
}

impl CellAddr {
    pub fn new(row: RowId, field: impl Into<String>) -> Self {
        Self {
            row,
            field: field.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: CellAddr,
    pub head: CellAddr,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<SelectionRange>,
    focus: Option<CellAddr>,
}

/// Selection resolved against the current result rows and display columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    /// `(result rows, display columns)` per range.
    pub rects: Vec<(Range<usize>, Range<usize>)>,
    /// `(result index, display index)` of the focused cell.
    pub focus: Option<(usize, usize)>,
}

impl ResolvedSelection {
    /// Number of ranges covering the cell, capped at [`MAX_SELECTION_LEVEL`].
    pub fn level(&self, row: usize, col: usize) -> u8 {
        let n = self
            .rects
            .iter()
            .filter(|(rows, cols)| rows.contains(&row) && cols.contains(&col))
            .count();
        n.min(MAX_SELECTION_LEVEL as usize) as u8
    }

    pub fn is_focused(&self, row: usize, col: usize) -> bool {
        self.focus == Some((row, col))
    }
}

impl Selection {
    pub fn focus(&self) -> Option<&CellAddr> {
        self.focus.as_ref()
    }

    pub fn ranges(&self) -> &[SelectionRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.focus.is_none()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.focus = None;
    }

    pub fn set_focus(&mut self, focus: Option<CellAddr>) {
        self.focus = focus;
    }

    /// Focuses `addr` and makes it the only selected cell.
    pub fn select_single(&mut self, addr: CellAddr) {
        self.ranges = vec![SelectionRange {
            anchor: addr.clone(),
            head: addr.clone(),
        }];
        self.focus = Some(addr);
    }

    /// Moves the head of the newest range to `addr`, anchoring at the old focus if there is none.
    pub fn extend_to(&mut self, addr: CellAddr) {
        match self.ranges.last_mut() {
            Some(r) => r.head = addr.clone(),
            None => {
                let anchor = self.focus.clone().unwrap_or_else(|| addr.clone());
                self.ranges.push(SelectionRange {
                    anchor,
                    head: addr.clone(),
                });
            }
        }
        self.focus = Some(addr);
    }

    /// Adds another range (multi-select).
    pub fn add_range(&mut self, range: SelectionRange) {
        self.focus = Some(range.head.clone());
        self.ranges.push(range);
    }

    /// Selects whole rows `[anchor, head]` across every display column.
    pub fn select_rows(&mut self, anchor: RowId, head: RowId, layouts: &Layouts) {
        let (Some(first), Some(last)) = (
            layouts.display_columns().next(),
            layouts.display_columns().last(),
        ) else {
            return;
        };
        self.ranges = vec![SelectionRange {
            anchor: CellAddr::new(anchor, first.field.clone()),
            head: CellAddr::new(head, last.field.clone()),
        }];
        self.focus = Some(CellAddr::new(head, first.field.clone()));
    }

    pub fn resolve(&self, result: &ResultSet, layouts: &Layouts) -> ResolvedSelection {
        let index = position_index(result);
        let rects = self
            .ranges
            .iter()
            .filter_map(|r| {
                let a = *index.get(&r.anchor.row)?;
                let h = *index.get(&r.head.row)?;
                let ca = layouts.display_index(&r.anchor.field)?;
                let ch = layouts.display_index(&r.head.field)?;
                Some((a.min(h)..a.max(h) + 1, ca.min(ch)..ca.max(ch) + 1))
            })
            .collect();
        let focus = self.focus.as_ref().and_then(|f| {
            Some((
                *index.get(&f.row)?,
                layouts.display_index(&f.field)?,
            ))
        });
        ResolvedSelection { rects, focus }
    }

    /// Re-anchors every range to the first and last of its rows that survive in `new`, dropping
    /// ranges with no survivors. Focus on a vanished row is cleared. Returns whether anything
    /// changed.
    pub fn remap(&mut self, old: &ResultSet, new: &ResultSet) -> bool {
        let old_index = position_index(old);
        let new_index = position_index(new);
        let before = self.clone();

        self.ranges.retain_mut(|r| {
            let (Some(&a), Some(&h)) = (old_index.get(&r.anchor.row), old_index.get(&r.head.row))
            else {
                return false;
            };
            let (lo, hi) = (a.min(h), a.max(h));
            let survivors: Vec<RowId> = old.rows[lo..=hi]
                .iter()
                .filter_map(|row| row.row_id())
                .filter(|id| new_index.contains_key(id))
                .collect();
            let (Some(&first), Some(&last)) = (survivors.first(), survivors.last()) else {
                return false;
            };
            if a <= h {
                r.anchor.row = first;
                r.head.row = last;
            } else {
                r.anchor.row = last;
                r.head.row = first;
            }
            true
        });
        if self
            .focus
            .as_ref()
            .is_some_and(|f| !new_index.contains_key(&f.row))
        {
            self.focus = None;
        }
        *self != before
    }

    /// Drops ranges and focus naming fields that no longer exist.
    pub fn retain_fields(&mut self, layouts: &Layouts) -> bool {
        let before = self.clone();
        let known = |f: &str| layouts.display_index(f).is_some();
        self.ranges
            .retain(|r| known(&r.anchor.field) && known(&r.head.field));
        if self.focus.as_ref().is_some_and(|f| !known(&f.field)) {
            self.focus = None;
        }
        *self != before
    }
}

fn position_index(result: &ResultSet) -> HashMap<RowId, usize> {
    result
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| Some((r.row_id()?, i)))
        .collect()
}

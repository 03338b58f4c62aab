//! Vertical render window computation.
//!
//! [`RowRenderCalculator`] maps row indexes to vertical offsets and decides which contiguous
//! range of result rows must be materialized for a viewport. Offsets come from a
//! [`Virtualizer`] sized with the configured row height; painted heights that differ are fed
//! back through [`RowRenderCalculator::measure`].
//!
//! The calculator never detects that its measurements went stale. Callers must [`clear`] it
//! after any operation that changes row membership or order (sort, filter, column change, group
//! toggle).
//!
//! [`clear`]: RowRenderCalculator::clear

use tracing::trace;
use virtualizer::Virtualizer;
use virtualizer::VirtualizerOptions;

/// The materialized row range plus the spacer extents above and below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderWindow {
    /// First materialized row (inclusive).
    pub from: usize,
    /// Last materialized row (inclusive).
    pub to: usize,
    pub space_before: u64,
    pub space_after: u64,
}

impl RenderWindow {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.from && index <= self.to
    }

    pub fn len(&self) -> usize {
        self.to + 1 - self.from
    }
}

#[derive(Clone, Debug)]
pub struct RowRenderCalculator {
    row_height: u32,
    rows: Virtualizer,
    /// Some row was measured at a height other than `row_height`.
    measured: bool,
    window: Option<RenderWindow>,
}

impl Default for RowRenderCalculator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RowRenderCalculator {
    pub fn new(row_height: u32) -> Self {
        let row_height = row_height.max(1);
        Self {
            row_height,
            rows: Self::virtualizer(0, row_height),
            measured: false,
            window: None,
        }
    }

    fn virtualizer(count: usize, row_height: u32) -> Virtualizer {
        Virtualizer::new(VirtualizerOptions::new(count, move |_| row_height))
    }

    pub fn row_height(&self) -> u32 {
        self.row_height
    }

    /// Changes the uniform row height. Drops measurements and the current window.
    pub fn set_row_height(&mut self, row_height: u32) {
        self.row_height = row_height.max(1);
        self.rows = Self::virtualizer(self.rows.count(), self.row_height);
        self.measured = false;
        self.window = None;
    }

    /// Forgets measured heights and the current window.
    pub fn clear(&mut self) {
        if self.measured {
            self.rows.reset_measurements();
            self.measured = false;
        }
        self.window = None;
    }

    pub fn is_uniform(&self) -> bool {
        !self.measured
    }

    pub fn window(&self) -> Option<RenderWindow> {
        self.window
    }

    pub fn rendered_from(&self) -> Option<usize> {
        self.window.map(|w| w.from)
    }

    pub fn rendered_to(&self) -> Option<usize> {
        self.window.map(|w| w.to)
    }

    pub fn count(&self) -> usize {
        self.rows.count()
    }

    /// Records the painted height of row `index`.
    ///
    /// Heights equal to the uniform height are ignored while nothing else was measured, so
    /// uniform grids keep their estimates.
    pub fn measure(&mut self, index: usize, height: u32) {
        if index >= self.count() {
            return;
        }
        let height = height.max(1);
        if !self.measured && height == self.row_height {
            return;
        }
        self.measured = true;
        self.rows.measure(index, height);
    }

    pub fn height_of(&self, index: usize) -> u32 {
        self.rows.item_size(index).unwrap_or(self.row_height)
    }

    /// Vertical offset of the top edge of row `index` (`index == count` gives the total height).
    pub fn row_offset(&self, index: usize) -> u64 {
        self.rows
            .item_start(index)
            .unwrap_or_else(|| self.total_height())
    }

    pub fn total_height(&self) -> u64 {
        self.rows.total_size()
    }

    /// Row covering vertical `offset`, or `None` past the last row.
    pub fn index_at_offset(&self, offset: u64) -> Option<usize> {
        if offset >= self.total_height() {
            return None;
        }
        self.rows.index_at_offset(offset)
    }

    /// Recomputes the render window for a viewport.
    ///
    /// Returns `true` when the window or its spacer extents changed and rows need
    /// re-rendering. Scrolling inside an already covered window returns `false`.
    pub fn update_render_info(
        &mut self,
        total_rows: usize,
        scroll_top: u64,
        viewport_height: u32,
        overwork: usize,
    ) -> bool {
        self.rows.set_count(total_rows);
        self.rows.set_overscan(overwork);

        let next = self.compute_window(scroll_top, viewport_height, overwork);
        let changed = next != self.window;
        if changed {
            trace!(
                target: "ratatui_grid::render_calc",
                from = next.map(|w| w.from),
                to = next.map(|w| w.to),
                "render window changed"
            );
        }
        self.window = next;
        changed
    }

    fn compute_window(
        &self,
        scroll_top: u64,
        viewport_height: u32,
        overwork: usize,
    ) -> Option<RenderWindow> {
        let count = self.count();
        let visible = self.rows.visible_range_for(scroll_top, viewport_height);
        if count == 0 || visible.is_empty() {
            return None;
        }
        let (first_visible, last_visible) = (visible.start_index, visible.end_index - 1);

        let keep = self.window.filter(|w| {
            w.to < count
                && w.from <= first_visible
                && w.to >= last_visible
                && w.len() <= (last_visible - first_visible + 1) + 2 * overwork
        });
        let (from, to) = match keep {
            Some(w) => (w.from, w.to),
            None => {
                let range = self.rows.virtual_range_for(scroll_top, viewport_height);
                (range.start_index, range.end_index - 1)
            }
        };

        let space_before = self.row_offset(from);
        let space_after = self.total_height() - self.row_offset(to + 1);
        Some(RenderWindow {
            from,
            to,
            space_before,
            space_after,
        })
    }
}

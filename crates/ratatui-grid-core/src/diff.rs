//! Incremental row patching.
//!
//! [`RowView::check`] decides whether a rendered row can be brought up to date with targeted
//! patches or needs a full [`RowView::render_row`]. A row is rebuilt only when its columns changed
//! beyond the recognized deltas, a value changed outside the active editor, or the appearance
//! epoch moved. Everything else is a column patch, viewport re-render, editor swap or selection
//! repaint, in that order.
//!
//! Column deltas are recognized in a single forward pass with bounded lookahead: a cell may be
//! dropped when the next one or two cells match the wanted column, and a column may be inserted
//! when the current cell matches the next wanted column. At most two removals and one insertion
//! are accepted, which covers adding or removing a column and dragging one column to a new slot.
//! Anything else, such as swapping two distant columns, is left to a full rebuild.

use crate::cell::RenderedCell;
use crate::materializer::RenderContext;
use crate::materializer::RowView;
use crate::materializer::release_content;
use crate::surface::PatchOp;
use crate::surface::Surface;
use tracing::trace;

const MAX_REMOVED: usize = 2;
const MAX_INSERTED: usize = 1;

/// The most expensive work a [`RowView::sync`] performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RowPatch {
    None,
    Selection,
    Editor,
    Viewport,
    Columns,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Keep,
    Remove,
    Insert,
}

fn plan_column_patch(old: &[&str], new: &[&str]) -> Option<Vec<Step>> {
    let (mut i, mut j) = (0usize, 0usize);
    let (mut removed, mut inserted) = (0usize, 0usize);
    let mut steps = Vec::with_capacity(old.len().max(new.len()));

    while i < old.len() || j < new.len() {
        match (old.get(i), new.get(j)) {
            (Some(a), Some(b)) if a == b => {
                steps.push(Step::Keep);
                i += 1;
                j += 1;
            }
            (Some(_), Some(b)) if old.get(i + 1) == Some(b) => {
                steps.push(Step::Remove);
                i += 1;
                removed += 1;
            }
            (Some(_), Some(b)) if old.get(i + 2) == Some(b) => {
                steps.extend([Step::Remove, Step::Remove]);
                i += 2;
                removed += 2;
            }
            (Some(a), Some(_)) if new.get(j + 1) == Some(a) => {
                steps.push(Step::Insert);
                j += 1;
                inserted += 1;
            }
            (Some(_), None) => {
                steps.push(Step::Remove);
                i += 1;
                removed += 1;
            }
            (None, Some(_)) => {
                steps.push(Step::Insert);
                j += 1;
                inserted += 1;
            }
            _ => return None,
        }
        if removed > MAX_REMOVED || inserted > MAX_INSERTED {
            return None;
        }
    }
    Some(steps)
}

impl RowView {
    /// Brings the cell list in line with the layout's column sequence.
    ///
    /// Returns `false` when the change is outside the recognized deltas (or the row is a tree
    /// row) and a full rebuild is required. Cells are left untouched in that case.
    pub fn check_columns(&mut self, ctx: &mut RenderContext<'_>, surface: &mut dyn Surface) -> bool {
        let layout = ctx.layout;
        let wanted: Vec<&str> = layout.columns().iter().map(|c| c.field.as_str()).collect();
        if self.fields().eq(wanted.iter().copied()) {
            return true;
        }
        if ctx.tree {
            return false;
        }
        let steps = {
            let current: Vec<&str> = self.fields().collect();
            plan_column_patch(&current, &wanted)
        };
        let Some(steps) = steps else {
            trace!(
                target: "ratatui_grid::diff",
                row = self.key().row.0,
                "column change outside patchable deltas"
            );
            return false;
        };

        let key = self.key();
        let mut old = std::mem::take(&mut self.cells).into_iter();
        let mut cells: Vec<RenderedCell> = Vec::with_capacity(layout.len());
        for step in steps {
            match step {
                Step::Keep => cells.extend(old.next()),
                Step::Remove => {
                    if let Some(mut cell) = old.next() {
                        release_content(&mut cell, key.row, ctx.edit.as_deref_mut());
                        surface.apply(PatchOp::RemoveCell {
                            key,
                            at: cells.len(),
                        });
                    }
                }
                Step::Insert => {
                    let at = cells.len();
                    let Some(column) = layout.columns().get(at) else {
                        break;
                    };
                    let mut cell = RenderedCell::new(column.field.clone());
                    if ctx.is_visible(at) {
                        Self::materialize(&mut cell, column, at, ctx);
                    } else {
                        cell.skipped = true;
                    }
                    surface.apply(PatchOp::InsertCell { key, at });
                    cells.push(cell);
                }
            }
        }
        self.cells = cells;
        trace!(target: "ratatui_grid::diff", row = key.row.0, "columns patched");
        self.cells.len() == layout.len()
    }

    /// Whether every rendered cell still shows the live field value.
    ///
    /// A mismatch in the cell hosting the active editor is tolerated.
    pub fn check_values(&self, ctx: &RenderContext<'_>) -> bool {
        self.cells
            .iter()
            .filter(|c| !c.skipped && !c.content.is_editor())
            .all(|c| *ctx.record.get(&c.field) == c.value)
    }

    /// Swaps editor content in or out when this row enters or leaves edit mode.
    ///
    /// Returns whether a swap happened.
    pub fn check_editor(&mut self, ctx: &mut RenderContext<'_>, surface: &mut dyn Surface) -> bool {
        let target = ctx.editor_field().map(str::to_owned);
        if target == self.editing {
            return false;
        }
        if let Some(field) = self.editing.take() {
            self.clear_editor(&field, ctx, surface);
        }
        if let Some(field) = &target {
            self.render_row_editor(field, ctx, surface);
        }
        self.editing = target;
        true
    }

    fn clear_editor(&mut self, field: &str, ctx: &mut RenderContext<'_>, surface: &mut dyn Surface) {
        let layout = ctx.layout;
        let Some(at) = layout.position(field) else {
            return;
        };
        let key = self.key();
        let Some(cell) = self.cells.get_mut(at) else {
            return;
        };
        release_content(cell, key.row, ctx.edit.as_deref_mut());
        if !cell.skipped {
            Self::materialize(cell, &layout.columns()[at], at, ctx);
        }
        surface.apply(PatchOp::SetContent { key, at });
    }

    fn render_row_editor(
        &mut self,
        field: &str,
        ctx: &mut RenderContext<'_>,
        surface: &mut dyn Surface,
    ) {
        let layout = ctx.layout;
        let Some(at) = layout.position(field) else {
            return;
        };
        let key = self.key();
        let Some(cell) = self.cells.get_mut(at) else {
            return;
        };
        if cell.skipped {
            return;
        }
        release_content(cell, key.row, None);
        Self::materialize(cell, &layout.columns()[at], at, ctx);
        surface.apply(PatchOp::SetContent { key, at });
    }

    /// Repaints cell state flags (selection level, focus, disabled, checked).
    fn repaint_states(&mut self, ctx: &RenderContext<'_>, surface: &mut dyn Surface) -> bool {
        let key = self.key();
        let mut changed = false;
        for (at, (cell, column)) in self
            .cells
            .iter_mut()
            .zip(ctx.layout.columns())
            .enumerate()
        {
            if cell.skipped {
                continue;
            }
            let state = ctx.cell_state(at, column, &cell.value);
            if state != cell.state {
                cell.state = state;
                surface.apply(PatchOp::SetState { key, at, state });
                changed = true;
            }
        }
        changed
    }

    /// Applies every targeted patch the row needs.
    ///
    /// Returns `false` if only a full rebuild can bring the row up to date; nothing is rebuilt
    /// here. Calling it again without intervening changes returns `true` and patches nothing.
    pub fn check(&mut self, ctx: &mut RenderContext<'_>, surface: &mut dyn Surface) -> bool {
        self.patch(ctx, surface).is_some()
    }

    /// [`check`](Self::check), falling back to [`render_row`](Self::render_row).
    pub fn sync(&mut self, ctx: &mut RenderContext<'_>, surface: &mut dyn Surface) -> RowPatch {
        match self.patch(ctx, surface) {
            Some(patch) => patch,
            None => {
                self.render_row(ctx, surface);
                RowPatch::Full
            }
        }
    }

    fn patch(&mut self, ctx: &mut RenderContext<'_>, surface: &mut dyn Surface) -> Option<RowPatch> {
        if !self.rendered || self.appearance != ctx.appearance {
            return None;
        }
        let columns_changed = !self
            .fields()
            .eq(ctx.layout.columns().iter().map(|c| c.field.as_str()));
        if !self.check_columns(ctx, surface) {
            return None;
        }
        if !self.check_values(ctx) {
            trace!(
                target: "ratatui_grid::diff",
                row = self.key().row.0,
                "value changed outside editor"
            );
            return None;
        }

        let mut tier = RowPatch::None;
        if self.repaint_states(ctx, surface) {
            tier = RowPatch::Selection;
        }
        if self.check_editor(ctx, surface) {
            tier = tier.max(RowPatch::Editor);
        }
        if (columns_changed || self.window != ctx.window) && self.render_by_viewport(ctx, surface)
        {
            tier = tier.max(RowPatch::Viewport);
        } else if self.update_spacers(ctx.layout, surface) {
            // Widths changed under an unchanged column sequence.
            tier = tier.max(RowPatch::Viewport);
        }
        if columns_changed {
            tier = RowPatch::Columns;
        }
        self.result_index = ctx.result_index;
        Some(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellContent;
    use crate::column::Column;
    use crate::column::Layout;
    use crate::column::Region;
    use crate::editor::ComponentRegistry;
    use crate::editor::EditSession;
    use crate::record::Record;
    use crate::record::RowId;
    use crate::selection::ResolvedSelection;
    use crate::surface::PatchLog;
    use crate::value::Value;
    use std::ops::Range;

    fn cols(fields: &[&str]) -> Vec<Column> {
        fields.iter().map(|f| Column::new(*f, f.to_uppercase(), 4)).collect()
    }

    fn record() -> Record {
        Record::new(1)
            .with("a", "1")
            .with("b", "2")
            .with("c", "3")
            .with("d", "4")
    }

    struct Env {
        record: Record,
        selection: ResolvedSelection,
        registry: ComponentRegistry,
    }

    impl Env {
        fn new() -> Self {
            Self {
                record: record(),
                selection: ResolvedSelection::default(),
                registry: ComponentRegistry::default(),
            }
        }

        fn ctx<'a>(
            &'a self,
            layout: &'a Layout,
            window: Option<Range<usize>>,
            edit: Option<&'a mut EditSession>,
        ) -> RenderContext<'a> {
            RenderContext {
                record: &self.record,
                result_index: 0,
                level: 0,
                layout,
                window,
                selection: &self.selection,
                edit,
                registry: &self.registry,
                search: None,
                row_height: 1,
                legacy: false,
                disabled: false,
                tree: false,
                appearance: 0,
            }
        }
    }

    fn rendered(env: &Env, layout: &Layout) -> RowView {
        let mut view = RowView::new(RowId(1), Region::Center);
        view.render_row(&mut env.ctx(layout, None, None), &mut PatchLog::default());
        view
    }

    #[test]
    fn plan_recognizes_bounded_deltas() {
        assert_eq!(
            plan_column_patch(&["a", "b", "c"], &["a", "c"]),
            Some(vec![Step::Keep, Step::Remove, Step::Keep])
        );
        assert_eq!(
            plan_column_patch(&["a", "b", "c", "d"], &["a", "d"]),
            Some(vec![Step::Keep, Step::Remove, Step::Remove, Step::Keep])
        );
        assert_eq!(
            plan_column_patch(&["a", "c"], &["a", "b", "c"]),
            Some(vec![Step::Keep, Step::Insert, Step::Keep])
        );
        // Dragging one column one slot right.
        assert!(plan_column_patch(&["a", "b", "c"], &["b", "a", "c"]).is_some());
        // Swapping distant columns is punted.
        assert_eq!(plan_column_patch(&["a", "b", "c", "d"], &["d", "b", "c", "a"]), None);
        assert_eq!(plan_column_patch(&["a", "b", "c", "d"], &["d"]), None);
    }

    #[test]
    fn second_check_is_a_no_op() {
        let env = Env::new();
        let layout = Layout::new(Region::Center, cols(&["a", "b", "c"]), 0);
        let mut view = rendered(&env, &layout);

        let mut log = PatchLog::default();
        assert!(view.check(&mut env.ctx(&layout, None, None), &mut log));
        let after_first = log.count();
        assert!(view.check(&mut env.ctx(&layout, None, None), &mut log));
        assert_eq!(log.count(), after_first);
        assert_eq!(after_first, 0);
    }

    #[test]
    fn remove_then_reinsert_round_trips_without_rebuild() {
        let env = Env::new();
        let abc = Layout::new(Region::Center, cols(&["a", "b", "c"]), 0);
        let ac = Layout::new(Region::Center, cols(&["a", "c"]), 0);
        let mut view = rendered(&env, &abc);

        let mut log = PatchLog::recording();
        assert_eq!(
            view.sync(&mut env.ctx(&ac, None, None), &mut log),
            RowPatch::Columns
        );
        assert_eq!(view.fields().collect::<Vec<_>>(), vec!["a", "c"]);

        assert_eq!(
            view.sync(&mut env.ctx(&abc, None, None), &mut log),
            RowPatch::Columns
        );
        assert_eq!(view.fields().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(!log.take().iter().any(|op| matches!(op, PatchOp::ClearRow { .. })));
        assert!(matches!(&view.cells()[1].content, CellContent::Text { text, .. } if text == "2"));
    }

    #[test]
    fn distant_swap_falls_back_to_full_rebuild() {
        let env = Env::new();
        let abcd = Layout::new(Region::Center, cols(&["a", "b", "c", "d"]), 0);
        let dbca = Layout::new(Region::Center, cols(&["d", "b", "c", "a"]), 0);
        let mut view = rendered(&env, &abcd);
        let mut log = PatchLog::default();
        assert!(!view.check(&mut env.ctx(&dbca, None, None), &mut log));
        assert_eq!(view.fields().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
        assert_eq!(view.sync(&mut env.ctx(&dbca, None, None), &mut log), RowPatch::Full);
        assert_eq!(view.fields().collect::<Vec<_>>(), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn tree_rows_always_rebuild_on_column_change() {
        let env = Env::new();
        let abc = Layout::new(Region::Center, cols(&["a", "b", "c"]), 0);
        let ac = Layout::new(Region::Center, cols(&["a", "c"]), 0);
        let mut view = rendered(&env, &abc);
        let mut ctx = env.ctx(&ac, None, None);
        ctx.tree = true;
        assert!(!view.check(&mut ctx, &mut PatchLog::default()));
    }

    #[test]
    fn value_change_forces_rebuild_but_editor_cell_is_tolerated() {
        let mut env = Env::new();
        let layout = Layout::new(Region::Center, cols(&["a", "b"]), 0);
        let mut view = rendered(&env, &layout);

        env.record.set("a", "changed");
        assert!(!view.check_values(&env.ctx(&layout, None, None)));

        let mut session = EditSession::new(RowId(1), "a", Value::from("changed"));
        let mut log = PatchLog::default();
        assert_eq!(
            view.sync(&mut env.ctx(&layout, None, Some(&mut session)), &mut log),
            RowPatch::Full
        );
        assert!(view.cells()[0].content.is_editor());
        assert!(session.editor.is_some());

        env.record.set("a", "typed elsewhere");
        assert!(view.check_values(&env.ctx(&layout, None, None)));
    }

    #[test]
    fn editor_swap_is_scoped_to_one_cell() {
        let env = Env::new();
        let layout = Layout::new(Region::Center, cols(&["a", "b", "c"]), 0);
        let mut view = rendered(&env, &layout);
        let mut session = EditSession::new(RowId(1), "b", Value::from("2"));

        let mut log = PatchLog::recording();
        assert_eq!(
            view.sync(&mut env.ctx(&layout, None, Some(&mut session)), &mut log),
            RowPatch::Editor
        );
        assert_eq!(
            log.take(),
            vec![PatchOp::SetContent {
                key: view.key(),
                at: 1
            }]
        );
        assert!(view.cells()[1].content.is_editor());

        assert_eq!(
            view.sync(&mut env.ctx(&layout, None, None), &mut log),
            RowPatch::Editor
        );
        assert!(matches!(view.cells()[1].content, CellContent::Text { .. }));
    }

    #[test]
    fn window_change_is_a_viewport_patch() {
        let env = Env::new();
        let layout = Layout::new(Region::Center, cols(&["a", "b", "c", "d"]), 0);
        let mut view = RowView::new(RowId(1), Region::Center);
        view.render_row(&mut env.ctx(&layout, Some(0..2), None), &mut PatchLog::default());
        let mut log = PatchLog::default();
        assert_eq!(
            view.sync(&mut env.ctx(&layout, Some(2..4), None), &mut log),
            RowPatch::Viewport
        );
        assert_eq!(view.materialized(), 2);
        assert!(view.cells()[0].skipped && view.cells()[1].skipped);
        assert!(view.check(&mut env.ctx(&layout, Some(2..4), None), &mut log));
    }

    #[test]
    fn appearance_change_forces_rebuild() {
        let env = Env::new();
        let layout = Layout::new(Region::Center, cols(&["a"]), 0);
        let mut view = rendered(&env, &layout);
        let mut ctx = env.ctx(&layout, None, None);
        ctx.appearance = 1;
        assert!(!view.check(&mut ctx, &mut PatchLog::default()));
    }
}

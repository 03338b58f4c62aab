//! Row cell materialization.
//!
//! A [`RowView`] is the retained cell list of one result row inside one region. It is built by
//! [`RowView::render_row`], adjusted to horizontal scrolling by [`RowView::render_by_viewport`]
//! and patched in place by the diff engine in [`crate::diff`].
//!
//! Cells outside the horizontal render window are kept in the list as *skipped* cells and are
//! represented on the surface by spacer runs. A cell is never both rendered and inside a spacer
//! run.

use crate::cell::CellContent;
use crate::cell::CellState;
use crate::cell::RenderedCell;
use crate::cell::SpacerRun;
use crate::cell::highlight_ranges;
use crate::column::Column;
use crate::column::ColumnType;
use crate::column::Layout;
use crate::column::Region;
use crate::editor::ComponentRegistry;
use crate::editor::EditSession;
use crate::editor::EditorInit;
use crate::record::Record;
use crate::record::RowId;
use crate::selection::ResolvedSelection;
use crate::surface::PatchOp;
use crate::surface::RowKey;
use crate::surface::Surface;
use crate::value::Value;
use std::ops::Range;
use tracing::trace;
use tracing::warn;

/// Indentation per tree level, in display columns.
pub const TREE_INDENT: usize = 2;

/// Everything a row view needs to (re)materialize its cells.
pub struct RenderContext<'a> {
    pub record: &'a Record,
    /// Position of the row in the current result.
    pub result_index: usize,
    /// Nesting depth below group rows.
    pub level: usize,
    pub layout: &'a Layout,
    /// Region-local column indexes inside the horizontal render window; `None` renders all.
    pub window: Option<Range<usize>>,
    pub selection: &'a ResolvedSelection,
    pub edit: Option<&'a mut EditSession>,
    pub registry: &'a ComponentRegistry,
    pub search: Option<&'a str>,
    pub row_height: u32,
    pub legacy: bool,
    pub disabled: bool,
    pub tree: bool,
    /// Bumped whenever appearance or formatting inputs change; a mismatch forces a rebuild.
    pub appearance: u64,
}

impl RenderContext<'_> {
    pub fn is_visible(&self, index: usize) -> bool {
        self.window.as_ref().is_none_or(|w| w.contains(&index))
    }

    /// Field hosting the active editor in this row and region, if any.
    pub fn editor_field(&self) -> Option<&str> {
        let edit = self.edit.as_deref()?;
        if edit.row != self.record.id {
            return None;
        }
        self.layout.position(&edit.field)?;
        Some(edit.field.as_str())
    }

    pub fn cell_state(&self, index: usize, column: &Column, value: &Value) -> CellState {
        let display = self.layout.first_index() + index;
        CellState {
            selected: self.selection.level(self.result_index, display),
            focused: self.selection.is_focused(self.result_index, display),
            disabled: self.disabled,
            checked: column.column_type == ColumnType::Checkbox && value.as_bool(),
        }
    }
}

/// Retained cells of one row in one region.
#[derive(Debug)]
pub struct RowView {
    key: RowKey,
    pub(crate) cells: Vec<RenderedCell>,
    pub(crate) spacers: Vec<SpacerRun>,
    pub(crate) window: Option<Range<usize>>,
    pub(crate) appearance: u64,
    pub(crate) result_index: usize,
    /// Field the active editor targets in this row, as of the last render.
    pub(crate) editing: Option<String>,
    pub(crate) rendered: bool,
}

impl RowView {
    pub fn new(row: RowId, region: Region) -> Self {
        Self {
            key: RowKey { row, region },
            cells: Vec::new(),
            spacers: Vec::new(),
            window: None,
            appearance: 0,
            result_index: 0,
            editing: None,
            rendered: false,
        }
    }

    pub fn key(&self) -> RowKey {
        self.key
    }

    pub fn cells(&self) -> &[RenderedCell] {
        &self.cells
    }

    pub fn spacers(&self) -> &[SpacerRun] {
        &self.spacers
    }

    pub fn result_index(&self) -> usize {
        self.result_index
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Number of materialized (non-skipped) cells.
    pub fn materialized(&self) -> usize {
        self.cells.iter().filter(|c| !c.skipped).count()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|c| c.field.as_str())
    }

    /// Rebuilds every cell against the context's layout.
    pub fn render_row(&mut self, ctx: &mut RenderContext<'_>, surface: &mut dyn Surface) {
        let key = self.key;
        for mut cell in self.cells.drain(..) {
            release_content(&mut cell, key.row, ctx.edit.as_deref_mut());
        }
        surface.apply(PatchOp::ClearRow { key });

        let layout = ctx.layout;
        let mut cells = Vec::with_capacity(layout.len());
        for (i, column) in layout.columns().iter().enumerate() {
            let mut cell = RenderedCell::new(column.field.clone());
            if ctx.is_visible(i) {
                Self::materialize(&mut cell, column, i, ctx);
            } else {
                cell.skipped = true;
            }
            surface.apply(PatchOp::InsertCell { key, at: i });
            cells.push(cell);
        }
        self.cells = cells;
        self.spacers = compute_spacers(&self.cells, layout);
        for s in &self.spacers {
            surface.apply(PatchOp::InsertSpacer {
                key,
                start: s.start,
                len: s.len,
                width: s.width,
            });
        }

        self.window = ctx.window.clone();
        self.appearance = ctx.appearance;
        self.result_index = ctx.result_index;
        self.editing = ctx.editor_field().map(str::to_owned);
        self.rendered = true;
        trace!(
            target: "ratatui_grid::materializer",
            row = key.row.0,
            region = ?key.region,
            cells = self.cells.len(),
            "row rendered"
        );
    }

    /// Materializes cells that scrolled into the window and tears down cells that left it.
    ///
    /// Returns whether anything changed.
    pub fn render_by_viewport(
        &mut self,
        ctx: &mut RenderContext<'_>,
        surface: &mut dyn Surface,
    ) -> bool {
        let key = self.key;
        let layout = ctx.layout;
        let mut changed = false;
        for (i, column) in layout.columns().iter().enumerate() {
            let Some(cell) = self.cells.get_mut(i) else {
                break;
            };
            match (cell.skipped, ctx.is_visible(i)) {
                (true, true) => {
                    Self::materialize(cell, column, i, ctx);
                    surface.apply(PatchOp::SetContent { key, at: i });
                    changed = true;
                }
                (false, false) => {
                    release_content(cell, key.row, ctx.edit.as_deref_mut());
                    cell.skipped = true;
                    surface.apply(PatchOp::ClearContent { key, at: i });
                    changed = true;
                }
                _ => {}
            }
        }
        changed |= self.update_spacers(layout, surface);
        self.window = ctx.window.clone();
        changed
    }

    /// Fills `cell` for `column`, choosing the cell kind by priority: checkbox, boolean,
    /// reference, active editor, custom cell, then text with search highlighting.
    pub fn fill_cell(
        cell: &mut RenderedCell,
        column: &Column,
        ctx: &mut RenderContext<'_>,
        is_first: bool,
        value: Value,
        displayed: String,
    ) {
        let content = match &column.column_type {
            ColumnType::Checkbox => CellContent::Checkbox(value.as_bool()),
            ColumnType::Boolean => CellContent::Boolean(value.as_bool()),
            ColumnType::Reference => CellContent::Reference(displayed.clone()),
            _ if ctx.editor_field() == Some(column.field.as_str()) => {
                mount_editor(column, ctx, &value)
            }
            _ if column.cell_component.is_some() => match ctx.registry.create_cell(column) {
                Ok(mut custom) => {
                    custom.init(&displayed);
                    CellContent::Custom(custom)
                }
                Err(err) => {
                    warn!(
                        target: "ratatui_grid::materializer",
                        field = %column.field,
                        error = %err,
                        "custom cell construction failed"
                    );
                    CellContent::Empty
                }
            },
            _ => {
                let text = if is_first && ctx.tree {
                    format!("{}{displayed}", " ".repeat(ctx.level * TREE_INDENT))
                } else {
                    displayed.clone()
                };
                let highlights = highlight_ranges(&text, ctx.search);
                CellContent::Text { text, highlights }
            }
        };

        if let CellContent::Custom(old) = &mut cell.content {
            old.destroy();
        }
        cell.content = content;
        cell.value = value;
        cell.displayed = displayed;
        cell.skipped = false;
    }

    /// Reads the live value for `column` and fills the cell at region index `index`.
    pub(crate) fn materialize(
        cell: &mut RenderedCell,
        column: &Column,
        index: usize,
        ctx: &mut RenderContext<'_>,
    ) {
        let value = ctx.record.get(&column.field).clone();
        let displayed = value.format(column.format.as_deref());
        let is_first = ctx.layout.first_index() == 0 && index == 0;
        cell.state = ctx.cell_state(index, column, &value);
        Self::fill_cell(cell, column, ctx, is_first, value, displayed);
    }

    /// Recomputes spacer runs from the skipped flags and patches the surface with the delta.
    pub(crate) fn update_spacers(&mut self, layout: &Layout, surface: &mut dyn Surface) -> bool {
        let key = self.key;
        let next = compute_spacers(&self.cells, layout);
        if next == self.spacers {
            return false;
        }
        for old in &self.spacers {
            if !next.iter().any(|s| s.start == old.start) {
                surface.apply(PatchOp::RemoveSpacer {
                    key,
                    start: old.start,
                });
            }
        }
        for s in &next {
            match self.spacers.iter().find(|o| o.start == s.start) {
                Some(o) if o == s => {}
                Some(_) => surface.apply(PatchOp::ResizeSpacer {
                    key,
                    start: s.start,
                    len: s.len,
                    width: s.width,
                }),
                None => surface.apply(PatchOp::InsertSpacer {
                    key,
                    start: s.start,
                    len: s.len,
                    width: s.width,
                }),
            }
        }
        self.spacers = next;
        true
    }

    /// Tears down every cell; used when the row leaves the render window.
    pub fn destroy(&mut self, mut edit: Option<&mut EditSession>, surface: &mut dyn Surface) {
        for cell in &mut self.cells {
            release_content(cell, self.key.row, edit.as_deref_mut());
        }
        self.cells.clear();
        self.spacers.clear();
        self.rendered = false;
        surface.apply(PatchOp::DestroyRow { key: self.key });
    }
}

fn mount_editor(column: &Column, ctx: &mut RenderContext<'_>, value: &Value) -> CellContent {
    let row_height = ctx.row_height;
    let legacy = ctx.legacy;
    let registry = ctx.registry;
    let Some(session) = ctx.edit.as_deref_mut() else {
        return CellContent::Empty;
    };
    if session.editor.is_none() {
        match registry.create_editor(column) {
            Ok(editor) => session.editor = Some(editor),
            Err(err) => {
                warn!(
                    target: "ratatui_grid::materializer",
                    field = %column.field,
                    error = %err,
                    "editor construction failed"
                );
                return CellContent::Empty;
            }
        }
    }
    let init = EditorInit {
        value: value.clone(),
        changed_from_outside: *value != session.committed,
        row_height,
        legacy,
        was_previously_shown: session.shown,
    };
    if let Some(editor) = session.editor.as_mut() {
        editor.init(init);
    }
    session.shown = true;
    CellContent::Editor
}

/// Drops whatever the cell hosts. An editor cell unmounts the session's editor instance if the
/// session still targets this cell.
pub(crate) fn release_content(
    cell: &mut RenderedCell,
    row: RowId,
    edit: Option<&mut EditSession>,
) {
    match std::mem::take(&mut cell.content) {
        CellContent::Custom(mut custom) => custom.destroy(),
        CellContent::Editor => {
            if let Some(session) = edit.filter(|s| s.targets(row, &cell.field)) {
                session.unmount();
            }
        }
        _ => {}
    }
}

pub(crate) fn compute_spacers(cells: &[RenderedCell], layout: &Layout) -> Vec<SpacerRun> {
    let mut runs: Vec<SpacerRun> = Vec::new();
    for (i, cell) in cells.iter().enumerate() {
        if !cell.skipped {
            continue;
        }
        let width = layout.columns().get(i).map(|c| c.width).unwrap_or(0);
        match runs.last_mut() {
            Some(run) if run.end() == i => {
                run.len += 1;
                run.width += width;
            }
            _ => runs.push(SpacerRun {
                start: i,
                len: 1,
                width,
            }),
        }
    }
    runs
}

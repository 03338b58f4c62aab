//! The owning grid control.
//!
//! [`Grid`] holds the column set, the record list, the query and everything derived from them,
//! and drives the row pipeline: query result, render window, row views, selection, editing and
//! drag/scroll interaction. Mutations only mark state dirty; [`Grid::update`] applies them in
//! one pass, and [`Grid::render`] (see [`crate::paint`]) updates and then paints.

use crate::capability::Capture;
use crate::capability::Captures;
use crate::capability::Draggable;
use crate::capability::Filterable;
use crate::capability::Scrollable;
use crate::capability::ScopedListeners;
use crate::cell::CellContent;
use crate::column::Column;
use crate::column::ColumnType;
use crate::column::Layouts;
use crate::column::Region;
use crate::debounce::Debouncer;
use crate::diff::RowPatch;
use crate::drag::DragCommit;
use crate::drag::DragEffect;
use crate::drag::DragGeometry;
use crate::drag::DragMachine;
use crate::drag::DragSubject;
use crate::drag::DragThresholds;
use crate::drag::RowDropPosition;
use crate::editor::CellEvent;
use crate::editor::ComponentRegistry;
use crate::editor::EditSession;
use crate::editor::EditorEvent;
use crate::error::GridError;
use crate::error::GridResult;
use crate::input::InputEvent;
use crate::input::KeyEvent;
use crate::input::MouseButton;
use crate::input::MouseEvent;
use crate::input::MouseEventKind;
use crate::keymap::GridBindings;
use crate::materializer::RenderContext;
use crate::materializer::RowView;
use crate::navigation::NavAction;
use crate::navigation::navigate;
use crate::options::GridOptions;
use crate::paint::GridAreas;
use crate::paint::PaintGeometry;
use crate::query::FilterOp;
use crate::query::FilterSpec;
use crate::query::GroupKey;
use crate::query::GroupSpec;
use crate::query::Query;
use crate::query::QueryEngine;
use crate::query::ResultRow;
use crate::query::ResultSet;
use crate::query::SortDirection;
use crate::query::SortSpec;
use crate::record::Record;
use crate::record::RowId;
use crate::render_calc::RenderWindow;
use crate::render_calc::RowRenderCalculator;
use crate::scroll::Pane;
use crate::scroll::ScrollCoordinator;
use crate::scroll::ScrollDecision;
use crate::scroll::ScrollPolicy;
use crate::selection::CellAddr;
use crate::selection::ResolvedSelection;
use crate::selection::Selection;
use crate::selection::SelectionRange;
use crate::source::DataRequest;
use crate::source::DataResponse;
use crate::source::RequestTracker;
use crate::stacking::LayerToken;
use crate::stacking::StackingContext;
use crate::summary::SummaryKind;
use crate::summary::summarize;
use crate::surface::PatchLog;
use crate::surface::RowKey;
use crate::value::Value;
use crate::value::parse_datetime;
use ratatui::layout::Rect;
use std::collections::HashMap;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;
use tracing::trace;
use tracing::warn;
use virtualizer::Virtualizer;
use virtualizer::VirtualizerOptions;

/// Outcome of [`Grid::handle_event`].
#[derive(Clone, Debug, PartialEq)]
pub enum GridAction {
    None,
    Redraw,
    FocusChanged(CellAddr),
    EditStarted(CellAddr),
    EditCommitted(CellAddr),
    EditCancelled,
    SortChanged,
    FilterChanged,
    DragCommitted(DragCommit),
    /// The drop veto rejected a drag; nothing changed.
    DragRejected,
}

/// Operators offered by the filter popup, cycled with Tab.
const POPUP_OPS: [FilterOp; 7] = [
    FilterOp::Contains,
    FilterOp::Equals,
    FilterOp::NotEquals,
    FilterOp::Greater,
    FilterOp::Less,
    FilterOp::Empty,
    FilterOp::NotEmpty,
];

/// The open column filter editor. It owns a stacking layer and captures the keyboard while open.
#[derive(Debug)]
pub struct FilterPopup {
    pub field: String,
    pub op: FilterOp,
    pub input: String,
    /// Validation message shown inline; the popup stays open while set.
    pub error: Option<String>,
    layer: LayerToken,
    _keyboard: ScopedListeners,
}

impl FilterPopup {
    pub fn layer(&self) -> &LayerToken {
        &self.layer
    }
}

type DropVeto = Box<dyn FnMut(&DragCommit) -> bool>;

pub struct Grid {
    pub(crate) options: GridOptions,
    bindings: GridBindings,
    pub(crate) columns: Vec<Column>,
    pub(crate) layouts: Layouts,
    pub(crate) records: Vec<Record>,
    index: HashMap<RowId, usize>,
    /// Records arrive already queried from a data source.
    remote: bool,
    pub(crate) query: Query,
    collapsed: HashSet<GroupKey>,
    pub(crate) result: ResultSet,
    pub(crate) calculator: RowRenderCalculator,
    pub(crate) views: HashMap<RowKey, RowView>,
    selection: Selection,
    pub(crate) resolved: ResolvedSelection,
    pub(crate) edit: Option<EditSession>,
    registry: ComponentRegistry,
    pub(crate) scroll: ScrollCoordinator,
    pub(crate) drag: DragMachine,
    col_v: Virtualizer,
    col_widths: Vec<u32>,
    col_items: Vec<virtualizer::VirtualItem>,
    pub(crate) col_window: Option<Range<usize>>,
    requests: RequestTracker,
    pending_request: Option<DataRequest>,
    surface: PatchLog,
    query_dirty: bool,
    render_due: bool,
    deferred: bool,
    pub(crate) appearance: u64,
    pub(crate) disabled: bool,
    search: Debouncer<String>,
    pub(crate) layers: StackingContext,
    pub(crate) filter_popup: Option<FilterPopup>,
    captures: Captures,
    pointer_capture: Option<ScopedListeners>,
    cell_events: Vec<CellEvent>,
    pub(crate) geometry: PaintGeometry,
    pub(crate) area: Rect,
    pub(crate) resize_preview: Option<(String, u32)>,
    last_pointer: Option<(u16, u16)>,
    /// Descendants of the row being dragged in tree mode.
    drag_nested: Vec<RowId>,
    veto: Option<DropVeto>,
    now_ms: u64,
}

impl Default for Grid {
    fn default() -> Self {
        Self::with_options(GridOptions::default())
    }
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GridOptions) -> Self {
        let col_v = Virtualizer::new(VirtualizerOptions::new(0, |_| 1));
        Self {
            bindings: GridBindings::default(),
            columns: Vec::new(),
            layouts: Layouts::default(),
            records: Vec::new(),
            index: HashMap::new(),
            remote: false,
            query: Query::default(),
            collapsed: HashSet::new(),
            result: ResultSet::default(),
            calculator: RowRenderCalculator::new(options.row_height),
            views: HashMap::new(),
            selection: Selection::default(),
            resolved: ResolvedSelection::default(),
            edit: None,
            registry: ComponentRegistry::default(),
            scroll: ScrollCoordinator::new(ScrollPolicy::from_options(&options)),
            drag: DragMachine::new(DragThresholds::from_options(&options)),
            col_v,
            col_widths: Vec::new(),
            col_items: Vec::new(),
            col_window: None,
            requests: RequestTracker::default(),
            pending_request: None,
            surface: PatchLog::default(),
            query_dirty: false,
            render_due: true,
            deferred: false,
            appearance: 0,
            disabled: false,
            search: Debouncer::new(options.search_debounce_ms),
            layers: StackingContext::default(),
            filter_popup: None,
            captures: Captures::default(),
            pointer_capture: None,
            cell_events: Vec::new(),
            geometry: PaintGeometry::default(),
            area: Rect::default(),
            resize_preview: None,
            last_pointer: None,
            drag_nested: Vec::new(),
            veto: None,
            now_ms: 0,
            options,
        }
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: GridOptions) {
        self.scroll.set_policy(ScrollPolicy::from_options(&options));
        self.drag
            .set_thresholds(DragThresholds::from_options(&options));
        self.calculator.set_row_height(options.row_height);
        self.search.set_delay_ms(options.search_debounce_ms);
        self.options = options;
        self.rebuild_col_virtualizer();
        self.set_appearance_changed();
        self.relayout_area();
    }

    pub fn bindings(&self) -> &GridBindings {
        &self.bindings
    }

    pub fn set_bindings(&mut self, bindings: GridBindings) {
        self.bindings = bindings;
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Cell formatting or appearance inputs changed; every row is rebuilt on the next update.
    pub fn set_appearance_changed(&mut self) {
        self.appearance += 1;
        self.render_due = true;
        self.scroll.invalidate();
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        if self.disabled != disabled {
            self.disabled = disabled;
            self.render_due = true;
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    // Columns

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Replaces the column set. Reorders, inserts, removals and width changes are patched into
    /// existing rows; a changed type or format string forces a rebuild.
    pub fn set_columns(&mut self, columns: Vec<Column>) {
        let restyled = columns.iter().any(|c| {
            self.column(&c.field)
                .is_some_and(|old| old.column_type != c.column_type || old.format != c.format)
        });
        self.columns = columns;
        if restyled {
            self.set_appearance_changed();
        }
        self.relayout();
        // Search matches formatted values of the current columns.
        if self.query.search.is_some() {
            self.query_changed();
        }
    }

    pub fn set_column_width(&mut self, field: &str, width: u32) -> GridResult<()> {
        let min = self.options.min_column_width;
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.field == field)
            .ok_or_else(|| GridError::UnknownColumn(field.to_owned()))?;
        column.width = width.max(min);
        self.relayout();
        Ok(())
    }

    /// Moves `fields` (in their current relative order) before `before`, or to the end of
    /// `region` when `before` is `None`.
    pub fn move_columns(
        &mut self,
        fields: &[String],
        region: Region,
        before: Option<&str>,
    ) -> GridResult<()> {
        if let Some(missing) = fields.iter().find(|f| self.column(f).is_none()) {
            return Err(GridError::UnknownColumn(missing.clone()));
        }
        if let Some(b) = before
            && self.column(b).is_none()
        {
            return Err(GridError::UnknownColumn(b.to_owned()));
        }
        let (moving, mut rest): (Vec<Column>, Vec<Column>) = std::mem::take(&mut self.columns)
            .into_iter()
            .partition(|c| fields.contains(&c.field));
        let at = match before.and_then(|b| rest.iter().position(|c| c.field == b)) {
            Some(at) => at,
            None => rest
                .iter()
                .rposition(|c| c.region == region)
                .map(|i| i + 1)
                .unwrap_or(rest.len()),
        };
        rest.splice(at..at, moving);
        self.columns = rest;
        self.relayout();
        Ok(())
    }

    fn relayout(&mut self) {
        self.layouts = Layouts::from_columns(&self.columns);
        if self.selection.retain_fields(&self.layouts) {
            debug!(target: "ratatui_grid::grid", "selection trimmed to remaining columns");
        }
        if self
            .edit
            .as_ref()
            .is_some_and(|e| self.layouts.display_index(&e.field).is_none())
        {
            self.stop_editing(false);
        }
        self.rebuild_col_virtualizer();
        self.relayout_area();
        self.render_due = true;
        self.scroll.invalidate();
    }

    fn rebuild_col_virtualizer(&mut self) {
        let widths: Vec<u32> = self
            .layouts
            .center
            .columns()
            .iter()
            .map(|c| c.width)
            .collect();
        let shared = Arc::new(widths.clone());
        let mut opts = VirtualizerOptions::new(widths.len(), move |i| {
            shared.get(i).copied().unwrap_or(1).max(1)
        });
        opts.overscan = self.options.overscan_cols;
        self.col_v = Virtualizer::new(opts);
        self.col_widths = widths;
    }

    // Records

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, row: RowId) -> Option<&Record> {
        self.index.get(&row).and_then(|&i| self.records.get(i))
    }

    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.reindex();
        self.data_changed();
    }

    /// Writes one field of one record.
    pub fn set_value(&mut self, row: RowId, field: &str, value: Value) -> GridResult<()> {
        let i = *self.index.get(&row).ok_or(GridError::RowNotFound(row))?;
        self.records[i].set(field, value);
        self.data_changed();
        Ok(())
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
    }

    fn data_changed(&mut self) {
        self.query_dirty = true;
        self.render_due = true;
    }

    // Query

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn result(&self) -> &ResultSet {
        &self.result
    }

    /// Switches between local querying and a remote data source. In remote mode every query
    /// change produces a [`DataRequest`] (see [`take_pending_request`](Self::take_pending_request)).
    pub fn set_remote(&mut self, remote: bool) {
        self.remote = remote;
        self.query_changed();
    }

    fn query_changed(&mut self) {
        if self.remote {
            let id = self.requests.begin();
            debug!(target: "ratatui_grid::grid", request = id.0, "data requested");
            self.pending_request = Some(DataRequest {
                id,
                query: self.query.clone(),
            });
        } else {
            self.data_changed();
        }
    }

    pub fn take_pending_request(&mut self) -> Option<DataRequest> {
        self.pending_request.take()
    }

    /// Applies a data source response. Responses to superseded requests are dropped.
    pub fn receive(&mut self, response: DataResponse) -> GridResult<()> {
        self.requests.accept(response.id)?;
        self.set_records(response.records);
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.requests.is_pending()
    }

    pub fn sort(&mut self, field: &str, direction: SortDirection) -> GridResult<()> {
        self.require_column(field)?;
        self.query.sorts = vec![SortSpec::new(field, direction)];
        self.query_changed();
        Ok(())
    }

    /// Header click behaviour: ascending first, then flips. `additive` keeps the other sort keys.
    pub fn toggle_sort(&mut self, field: &str, additive: bool) -> GridResult<()> {
        let column = self.require_column(field)?;
        if !column.flags.sortable {
            return Ok(());
        }
        let existing = self.query.sorts.iter().position(|s| s.field == field);
        let direction = existing
            .map(|i| self.query.sorts[i].direction.toggled())
            .unwrap_or(SortDirection::Ascending);
        if additive {
            match existing {
                Some(i) => self.query.sorts[i].direction = direction,
                None => self.query.sorts.push(SortSpec::new(field, direction)),
            }
        } else {
            self.query.sorts = vec![SortSpec::new(field, direction)];
        }
        self.query_changed();
        Ok(())
    }

    pub fn clear_sort(&mut self) {
        if !self.query.sorts.is_empty() {
            self.query.sorts.clear();
            self.query_changed();
        }
    }

    pub fn sort_direction(&self, field: &str) -> Option<SortDirection> {
        self.query
            .sorts
            .iter()
            .find(|s| s.field == field)
            .map(|s| s.direction)
    }

    pub fn remove_filter(&mut self, field: &str) {
        let before = self.query.filters.len();
        self.query.filters.retain(|f| f.field != field);
        if self.query.filters.len() != before {
            self.query_changed();
        }
    }

    /// Schedules a search; it applies once typing pauses for the configured debounce.
    pub fn set_search(&mut self, term: impl Into<String>, now_ms: u64) {
        self.now_ms = now_ms;
        self.search.schedule(now_ms, term.into());
    }

    pub fn search_term(&self) -> Option<&str> {
        self.query.search.as_deref()
    }

    fn apply_search(&mut self, term: String) {
        let term = Some(term).filter(|t| !t.trim().is_empty());
        if term == self.query.search {
            return;
        }
        debug!(target: "ratatui_grid::grid", term = ?term, "search applied");
        self.query.search = term;
        // Highlights are part of cell content.
        self.set_appearance_changed();
        self.query_changed();
    }

    pub fn group_by(&mut self, fields: &[&str]) -> GridResult<()> {
        for f in fields {
            self.require_column(f)?;
        }
        self.query.groups = fields
            .iter()
            .map(|f| GroupSpec {
                field: (*f).to_owned(),
            })
            .collect();
        self.collapsed.clear();
        self.query_changed();
        Ok(())
    }

    pub fn toggle_group(&mut self, key: &GroupKey) {
        if !self.collapsed.remove(key) {
            self.collapsed.insert(key.clone());
        }
        self.data_changed();
    }

    pub fn set_page(&mut self, offset: usize, limit: usize) {
        self.query.page = Some(crate::query::Page { offset, limit });
        self.query_changed();
    }

    /// Aggregate of `field` over the rows that pass filtering and search.
    pub fn summary(&mut self, field: &str, kind: SummaryKind) -> GridResult<Value> {
        self.require_column(field)?;
        self.refresh_if_dirty();
        Ok(summarize(&self.records, &self.result.filtered, field, kind))
    }

    fn require_column(&self, field: &str) -> GridResult<&Column> {
        self.column(field)
            .ok_or_else(|| GridError::UnknownColumn(field.to_owned()))
    }

    fn refresh_if_dirty(&mut self) {
        if self.query_dirty {
            self.refresh_result();
        }
    }

    fn refresh_result(&mut self) {
        let next = if self.remote {
            ResultSet::passthrough(&self.records)
        } else {
            QueryEngine::run(&self.records, &self.query, &self.columns, &self.collapsed)
        };
        let old = std::mem::replace(&mut self.result, next);
        if self.selection.remap(&old, &self.result) {
            debug!(target: "ratatui_grid::grid", "selection remapped to new result");
        }
        if self
            .edit
            .as_ref()
            .is_some_and(|e| self.result.position_of(e.row).is_none())
        {
            self.stop_editing(false);
        }
        // Membership or order changed; measured heights no longer line up.
        self.calculator.clear();
        self.query_dirty = false;
        self.render_due = true;
        self.scroll.invalidate();
    }

    // Viewport and rendering

    /// Lays the grid out inside `area`.
    pub fn set_viewport(&mut self, area: Rect) {
        if self.area != area {
            self.area = area;
            self.render_due = true;
        }
        self.relayout_area();
    }

    fn relayout_area(&mut self) {
        let areas = GridAreas::compute(self.area, &self.options, &self.layouts);
        self.scroll.set_viewports(
            areas.center_width(),
            areas.left_w,
            areas.right_w,
            areas.body.height,
        );
        self.geometry.areas = areas;
        self.sync_extents();
    }

    fn sync_extents(&mut self) {
        self.scroll.set_content(
            self.layouts.center.width(),
            self.layouts.left.width(),
            self.layouts.right.width(),
            self.calculator.total_height(),
        );
    }

    pub fn window(&self) -> Option<RenderWindow> {
        self.calculator.window()
    }

    pub fn row_view(&self, row: RowId, region: Region) -> Option<&RowView> {
        self.views.get(&RowKey { row, region })
    }

    pub fn row_views(&self) -> impl Iterator<Item = &RowView> {
        self.views.values()
    }

    /// Patch operations applied to the retained tree so far.
    pub fn surface(&self) -> &PatchLog {
        &self.surface
    }

    pub fn scroll(&self) -> &ScrollCoordinator {
        &self.scroll
    }

    pub fn needs_update(&self) -> bool {
        self.query_dirty || self.render_due
    }

    /// Applies pending mutations: re-runs the query if needed, recomputes the render window and
    /// brings every row in it up to date. Returns whether rows were synchronised.
    pub fn update(&mut self) -> bool {
        self.refresh_if_dirty();
        if !self.render_due {
            return false;
        }
        if self.scroll.should_defer() {
            if !self.deferred {
                warn!(
                    target: "ratatui_grid::grid",
                    height = self.scroll.data.viewport_h,
                    "viewport too small, initial render deferred"
                );
                self.deferred = true;
            }
            return false;
        }
        self.deferred = false;

        let total = self.result.len();
        let overwork = self.options.overwork_rows;
        self.calculator.update_render_info(
            total,
            self.scroll.data.y as u64,
            self.scroll.data.viewport_h as u32,
            overwork,
        );
        let y = self.scroll.data.y;
        self.sync_extents();
        if self.scroll.data.y != y {
            self.calculator.update_render_info(
                total,
                self.scroll.data.y as u64,
                self.scroll.data.viewport_h as u32,
                overwork,
            );
        }
        self.sync_column_window();
        self.resolved = self.selection.resolve(&self.result, &self.layouts);
        self.sync_rows();
        self.collect_cell_events();
        let total_h = self.calculator.total_height();
        let covered = self
            .calculator
            .window()
            .map(|w| (w.space_before, total_h - w.space_after));
        self.scroll.set_covered(covered);
        self.scroll.mark_rendered(self.now_ms);
        self.render_due = false;
        true
    }

    fn sync_column_window(&mut self) {
        let widths: Vec<u32> = self
            .layouts
            .center
            .columns()
            .iter()
            .map(|c| c.width)
            .collect();
        if widths != self.col_widths {
            self.rebuild_col_virtualizer();
        }
        self.col_v.set_count(self.col_widths.len());
        self.col_v
            .set_viewport_size(self.scroll.data.viewport_w as u32);
        self.col_v.set_scroll_offset(self.scroll.data.x as u64);
        self.col_v.set_overscan(self.options.overscan_cols);
        self.col_v.collect_virtual_items(&mut self.col_items);
        self.col_window = if self.options.full_width {
            None
        } else {
            match (self.col_items.first(), self.col_items.last()) {
                (Some(first), Some(last)) => Some(first.index..last.index + 1),
                _ => Some(0..0),
            }
        };
    }

    fn sync_rows(&mut self) {
        let Self {
            records,
            index,
            result,
            layouts,
            views,
            resolved,
            edit,
            registry,
            surface,
            options,
            col_window,
            query,
            calculator,
            appearance,
            disabled,
            ..
        } = self;
        let (records, index, result, layouts) = (&*records, &*index, &*result, &*layouts);
        let (resolved, registry, options) = (&*resolved, &*registry, &*options);

        let window = calculator.window();
        let mut wanted: HashSet<RowKey> = HashSet::new();
        if let Some(w) = window {
            for row in result.rows.get(w.from..=w.to).unwrap_or_default() {
                let Some(id) = row.row_id() else {
                    continue;
                };
                for region in [Region::Left, Region::Center, Region::Right] {
                    if !layouts.get(region).is_empty() {
                        wanted.insert(RowKey { row: id, region });
                    }
                }
            }
        }

        let before = views.len();
        views.retain(|key, view| {
            if wanted.contains(key) {
                return true;
            }
            view.destroy(edit.as_mut(), surface);
            false
        });
        let destroyed = before - views.len();

        let Some(window) = window else {
            trace!(target: "ratatui_grid::grid", destroyed, "no rows to render");
            return;
        };
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let mut full = 0usize;
        for ri in window.from..=window.to {
            let Some(ResultRow::Data {
                index: at,
                id,
                level,
            }) = result.rows.get(ri)
            else {
                continue;
            };
            let Some(record) = records.get(*at) else {
                continue;
            };
            let level = if options.tree {
                level + tree_depth(records, index, record, &options.tree_parent_field)
            } else {
                *level
            };
            for region in [Region::Left, Region::Center, Region::Right] {
                let layout = layouts.get(region);
                if layout.is_empty() {
                    continue;
                }
                let key = RowKey { row: *id, region };
                let view = views
                    .entry(key)
                    .or_insert_with(|| RowView::new(*id, region));
                let mut ctx = RenderContext {
                    record,
                    result_index: ri,
                    level,
                    layout,
                    window: if region == Region::Center {
                        col_window.clone()
                    } else {
                        None
                    },
                    selection: resolved,
                    edit: edit.as_mut(),
                    registry,
                    search,
                    row_height: options.row_height,
                    legacy: options.is_legacy(),
                    disabled: *disabled,
                    tree: options.tree,
                    appearance: *appearance,
                };
                if view.sync(&mut ctx, surface) == RowPatch::Full {
                    full += 1;
                }
            }
        }
        trace!(
            target: "ratatui_grid::grid",
            from = window.from,
            to = window.to,
            full,
            destroyed,
            "rows synchronised"
        );
    }

    fn collect_cell_events(&mut self) {
        let mut views: Vec<&mut RowView> = self.views.values_mut().collect();
        views.sort_by_key(|v| (v.result_index(), v.key().region as u8));
        for view in views {
            let row = view.key().row;
            for cell in &mut view.cells {
                if let CellContent::Custom(custom) = &mut cell.content {
                    for (name, payload) in custom.drain_events() {
                        self.cell_events.push(CellEvent {
                            row,
                            field: cell.field.clone(),
                            name,
                            payload,
                        });
                    }
                }
            }
        }
    }

    /// Events raised by custom cells since the last call.
    pub fn take_cell_events(&mut self) -> Vec<CellEvent> {
        std::mem::take(&mut self.cell_events)
    }

    // Scrolling and time

    pub fn on_scroll(&mut self, pane: Pane, x: u32, y: u32, now_ms: u64) -> ScrollDecision {
        self.now_ms = now_ms;
        let decision = self.scroll.on_scroll(pane, x, y, now_ms);
        self.note_scroll(decision);
        decision
    }

    fn note_scroll(&mut self, decision: ScrollDecision) {
        if matches!(decision, ScrollDecision::Render | ScrollDecision::Deferred) {
            self.render_due = true;
        }
    }

    /// Advances timers: debounced search, trailing scroll renders and drag auto-scroll.
    /// Returns whether the grid needs repainting.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        self.now_ms = now_ms;
        let mut due = false;
        if let Some(term) = self.search.poll(now_ms) {
            self.apply_search(term);
            due = true;
        }
        if self.scroll.poll(now_ms) == ScrollDecision::Render {
            self.render_due = true;
            due = true;
        }
        if let Some(decision) = self.scroll.tick_auto_scroll(now_ms) {
            self.note_scroll(decision);
            if let Some((x, y)) = self.last_pointer {
                let geometry = DragGeometry {
                    header: &self.geometry.header,
                    rows: &self.geometry.rows,
                    viewport: self.geometry.areas.body,
                    tree: self.options.tree,
                    nested: &self.drag_nested,
                };
                self.drag.pointer_move(x, y, &geometry);
            }
            due = true;
        }
        due
    }

    fn reveal(&mut self, result_index: usize, display_col: usize) {
        self.refresh_if_dirty();
        self.calculator.update_render_info(
            self.result.len(),
            self.scroll.data.y as u64,
            self.scroll.data.viewport_h as u32,
            self.options.overwork_rows,
        );
        self.sync_extents();
        let start = self.calculator.row_offset(result_index).min(u32::MAX as u64) as u32;
        let height = self.calculator.height_of(result_index);
        self.scroll.data.reveal_y(start, height);
        if let Some((Region::Center, local)) = self.layouts.locate(display_col) {
            let center = &self.layouts.center;
            let width = center.columns().get(local).map(|c| c.width).unwrap_or(1);
            self.scroll.data.reveal_x(center.offset_of(local), width);
        }
        let decision = self.scroll.settle(self.now_ms);
        self.note_scroll(decision);
    }

    // Selection

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn focus(&self) -> Option<&CellAddr> {
        self.selection.focus()
    }

    /// Focuses and selects a single cell.
    pub fn set_focus(&mut self, row: RowId, field: &str) -> GridResult<()> {
        self.require_column(field)?;
        if self.record(row).is_none() {
            return Err(GridError::RowNotFound(row));
        }
        self.selection.select_single(CellAddr::new(row, field));
        self.selection_changed();
        Ok(())
    }

    pub fn select_rows(&mut self, anchor: RowId, head: RowId) {
        self.selection.select_rows(anchor, head, &self.layouts);
        self.selection_changed();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.selection_changed();
    }

    fn selection_changed(&mut self) {
        self.refresh_if_dirty();
        self.resolved = self.selection.resolve(&self.result, &self.layouts);
        self.render_due = true;
    }

    fn addr_at(&self, result_index: usize, display_col: usize) -> Option<CellAddr> {
        let row = self.result.rows.get(result_index)?.row_id()?;
        let field = self.layouts.display_columns().nth(display_col)?.field.clone();
        Some(CellAddr::new(row, field))
    }

    // Editing

    pub fn editing(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    /// Opens the inline editor on a cell. Any other active edit is discarded first.
    pub fn start_editing(&mut self, row: RowId, field: &str) -> GridResult<()> {
        self.require_column(field)?;
        let value = self
            .record(row)
            .ok_or(GridError::RowNotFound(row))?
            .get(field)
            .clone();
        if self.edit.as_ref().is_some_and(|e| e.targets(row, field)) {
            return Ok(());
        }
        self.stop_editing(false);
        debug!(target: "ratatui_grid::grid", row = row.0, field, "editing started");
        self.edit = Some(EditSession::new(row, field, value));
        self.selection.select_single(CellAddr::new(row, field));
        self.selection_changed();
        if let (Some(r), Some(c)) = (
            self.result.position_of(row),
            self.layouts.display_index(field),
        ) {
            self.reveal(r, c);
        }
        Ok(())
    }

    /// Feeds an editor event: `Change` records the live value, `Commit` writes the field and
    /// ends editing, `Cancel` ends editing without writing.
    pub fn apply_editor_event(&mut self, event: EditorEvent) -> GridResult<()> {
        let session = self.edit.as_mut().ok_or(GridError::NotEditing)?;
        match event {
            EditorEvent::Change(value) => {
                session.live = Some(value);
                self.render_due = true;
            }
            EditorEvent::Commit(value) => {
                let (row, field) = (session.row, session.field.clone());
                let i = *self.index.get(&row).ok_or(GridError::RowNotFound(row))?;
                session.committed = value.clone();
                session.live = None;
                self.records[i].set(field.clone(), value);
                debug!(target: "ratatui_grid::grid", row = row.0, field = %field, "edit committed");
                self.data_changed();
                self.stop_editing(true);
            }
            EditorEvent::Cancel => {
                debug!(target: "ratatui_grid::grid", "edit cancelled");
                self.stop_editing(true);
            }
        }
        Ok(())
    }

    /// Ends editing. The editor instance is dropped; with `return_focus` the edited cell keeps
    /// keyboard focus.
    pub fn stop_editing(&mut self, return_focus: bool) {
        let Some(mut session) = self.edit.take() else {
            return;
        };
        session.unmount();
        if return_focus {
            self.selection
                .set_focus(Some(CellAddr::new(session.row, session.field)));
            self.resolved = self.selection.resolve(&self.result, &self.layouts);
        }
        self.render_due = true;
    }

    // Filter popup

    pub fn filter_popup(&self) -> Option<&FilterPopup> {
        self.filter_popup.as_ref()
    }

    pub fn open_filter(&mut self, field: &str) -> GridResult<()> {
        self.require_column(field)?;
        self.close_filter();
        let existing = self.query.filters.iter().find(|f| f.field == field);
        let (op, input) = match existing {
            Some(f) => (f.op.clone(), f.value.format(None)),
            None => (FilterOp::Contains, String::new()),
        };
        self.filter_popup = Some(FilterPopup {
            field: field.to_owned(),
            op,
            input,
            error: None,
            layer: self.layers.acquire(),
            _keyboard: ScopedListeners::acquire(&self.captures, &[Capture::Keyboard]),
        });
        Ok(())
    }

    pub fn close_filter(&mut self) {
        if let Some(popup) = self.filter_popup.take() {
            self.layers.release(popup.layer);
        }
    }

    /// Validates and applies the popup's filter. On failure the popup stays open showing the
    /// message and the query is untouched.
    pub fn commit_filter(&mut self) -> GridResult<()> {
        let Some(popup) = &self.filter_popup else {
            return Ok(());
        };
        let column = self.require_column(&popup.field)?;
        let value = parse_operand(&popup.input, column);
        let spec = FilterSpec::new(popup.field.clone(), popup.op.clone(), value);
        match self.apply_filter(spec) {
            Ok(()) => {
                self.close_filter();
                Ok(())
            }
            Err(err) => {
                if let Some(popup) = &mut self.filter_popup {
                    popup.error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    // Drag and drop

    /// Installs the drop veto consulted before any drag commit.
    pub fn set_drop_veto(&mut self, veto: impl FnMut(&DragCommit) -> bool + 'static) {
        self.veto = Some(Box::new(veto));
    }

    /// Applies a drop as if it had been committed by a drag, subject to the veto.
    pub fn apply_drag_commit(&mut self, commit: DragCommit) -> GridResult<()> {
        if let Some(veto) = &mut self.veto
            && !veto(&commit)
        {
            return Err(GridError::DragRejected);
        }
        self.apply_commit(commit)
    }

    fn apply_commit(&mut self, commit: DragCommit) -> GridResult<()> {
        match commit {
            DragCommit::MoveColumns {
                fields,
                region,
                before,
            } => self.move_columns(&fields, region, before.as_deref()),
            DragCommit::Resize { field, width } => self.set_column_width(&field, width),
            DragCommit::MoveRow {
                row,
                target,
                position,
            } => self.move_row(row, target, position),
        }
    }

    pub fn move_row(
        &mut self,
        row: RowId,
        target: RowId,
        position: RowDropPosition,
    ) -> GridResult<()> {
        let from = *self.index.get(&row).ok_or(GridError::RowNotFound(row))?;
        if !self.index.contains_key(&target) {
            return Err(GridError::RowNotFound(target));
        }
        if row == target {
            return Ok(());
        }
        if self.options.tree && self.is_nested_under(target, row) {
            debug!(target: "ratatui_grid::grid", ?row, ?target, "drop onto own descendant");
            return Err(GridError::DragRejected);
        }
        let mut record = self.records.remove(from);
        let to = self
            .records
            .iter()
            .position(|r| r.id == target)
            .ok_or(GridError::RowNotFound(target))?;
        if self.options.tree {
            let parent_field = self.options.tree_parent_field.clone();
            let parent = match position {
                RowDropPosition::Into => Value::Number(target.0 as f64),
                _ => self.records[to].get(&parent_field).clone(),
            };
            record.set(parent_field, parent);
            // Indentation is baked into cell text.
            self.set_appearance_changed();
        }
        let at = match position {
            RowDropPosition::Before => to,
            RowDropPosition::After | RowDropPosition::Into => to + 1,
        };
        self.records.insert(at, record);
        self.reindex();
        self.data_changed();
        Ok(())
    }

    /// `row` sits somewhere below `ancestor` in the parent chain.
    fn is_nested_under(&self, row: RowId, ancestor: RowId) -> bool {
        let parent_field = &self.options.tree_parent_field;
        let mut current = row;
        for _ in 0..self.records.len() {
            let Some(parent) = self
                .record(current)
                .and_then(|r| r.get(parent_field).as_f64())
            else {
                return false;
            };
            current = RowId(parent as u64);
            if current == ancestor {
                return true;
            }
        }
        false
    }

    // Input

    pub fn handle_event(&mut self, event: InputEvent, now_ms: u64) -> GridAction {
        self.now_ms = now_ms;
        if self.disabled {
            return GridAction::None;
        }
        match event {
            InputEvent::Paste(text) => self.handle_paste(&text),
            InputEvent::Key(key) => self.handle_key(key),
            InputEvent::Mouse(mouse) => self.handle_mouse(mouse),
        }
    }

    fn handle_paste(&mut self, text: &str) -> GridAction {
        if let Some(popup) = &mut self.filter_popup {
            popup.input.push_str(text);
            return GridAction::Redraw;
        }
        GridAction::None
    }

    fn handle_key(&mut self, key: KeyEvent) -> GridAction {
        if self.filter_popup.is_some() {
            return self.handle_popup_key(&key);
        }
        if self.edit.is_some() {
            return self.handle_editor_key(&key);
        }
        if self.drag.is_active() && self.bindings.cancel.matches(&key) {
            self.cancel_drag();
            return GridAction::Redraw;
        }
        if let Some(action) = NavAction::from_key(&self.bindings, &key) {
            return self.navigate(action, key.modifiers.shift);
        }
        if self.bindings.toggle.matches(&key) {
            return self.toggle_focused();
        }
        if self.bindings.edit.matches(&key) {
            let Some(focus) = self.selection.focus().cloned() else {
                return GridAction::None;
            };
            let is_checkbox = self
                .column(&focus.field)
                .is_some_and(|c| c.column_type == ColumnType::Checkbox);
            if is_checkbox {
                return self.toggle_focused();
            }
            return match self.start_editing(focus.row, &focus.field) {
                Ok(()) => GridAction::EditStarted(focus),
                Err(_) => GridAction::None,
            };
        }
        GridAction::None
    }

    fn handle_editor_key(&mut self, key: &KeyEvent) -> GridAction {
        let cancel = self.bindings.cancel.matches(key);
        let Some(session) = self.edit.as_mut() else {
            return GridAction::None;
        };
        let addr = CellAddr::new(session.row, session.field.clone());
        let event = match session.editor.as_mut() {
            Some(editor) => editor.handle_key(key),
            // The editing row is scrolled away; only cancel is meaningful.
            None if cancel => Some(EditorEvent::Cancel),
            None => None,
        };
        let Some(event) = event else {
            return GridAction::Redraw;
        };
        let action = match &event {
            EditorEvent::Change(_) => GridAction::Redraw,
            EditorEvent::Commit(_) => GridAction::EditCommitted(addr),
            EditorEvent::Cancel => GridAction::EditCancelled,
        };
        match self.apply_editor_event(event) {
            Ok(()) => action,
            Err(err) => {
                warn!(target: "ratatui_grid::grid", error = %err, "editor event failed");
                GridAction::None
            }
        }
    }

    fn handle_popup_key(&mut self, key: &KeyEvent) -> GridAction {
        use crate::input::KeyCode;
        if self.bindings.cancel.matches(key) {
            self.close_filter();
            return GridAction::Redraw;
        }
        let Some(popup) = &mut self.filter_popup else {
            return GridAction::None;
        };
        match &key.code {
            KeyCode::Enter => {
                return match self.commit_filter() {
                    Ok(()) => GridAction::FilterChanged,
                    Err(_) => GridAction::Redraw,
                };
            }
            KeyCode::Tab => {
                let next = POPUP_OPS
                    .iter()
                    .position(|op| *op == popup.op)
                    .map(|i| (i + 1) % POPUP_OPS.len())
                    .unwrap_or(0);
                popup.op = POPUP_OPS[next].clone();
            }
            KeyCode::Backspace => {
                popup.input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.ctrl && !key.modifiers.alt => {
                popup.input.push(*c);
            }
            _ => return GridAction::None,
        }
        popup.error = None;
        GridAction::Redraw
    }

    fn navigate(&mut self, action: NavAction, extend: bool) -> GridAction {
        self.refresh_if_dirty();
        self.resolved = self.selection.resolve(&self.result, &self.layouts);
        let page = (self.scroll.data.viewport_h as u32 / self.options.row_height.max(1)) as usize;
        let Some((r, c)) = navigate(
            &self.result,
            self.layouts.column_count(),
            self.resolved.focus,
            action,
            page,
        ) else {
            return GridAction::None;
        };
        let Some(addr) = self.addr_at(r, c) else {
            return GridAction::None;
        };
        if extend && self.options.multi_select {
            self.selection.extend_to(addr.clone());
        } else {
            self.selection.select_single(addr.clone());
        }
        self.selection_changed();
        self.reveal(r, c);
        GridAction::FocusChanged(addr)
    }

    fn toggle_focused(&mut self) -> GridAction {
        let Some(focus) = self.selection.focus().cloned() else {
            return GridAction::None;
        };
        let Some(column) = self.column(&focus.field) else {
            return GridAction::None;
        };
        if column.column_type == ColumnType::Checkbox {
            let current = self
                .record(focus.row)
                .map(|r| r.get(&focus.field).as_bool())
                .unwrap_or(false);
            return match self.set_value(focus.row, &focus.field, Value::Bool(!current)) {
                Ok(()) => GridAction::Redraw,
                Err(_) => GridAction::None,
            };
        }
        if self.options.multi_select {
            self.selection.add_range(SelectionRange {
                anchor: focus.clone(),
                head: focus,
            });
            self.selection_changed();
            return GridAction::Redraw;
        }
        GridAction::None
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> GridAction {
        let step = self.options.row_height.max(1) as i32;
        match mouse.kind {
            MouseEventKind::ScrollDown => self.wheel(0, 3 * step),
            MouseEventKind::ScrollUp => self.wheel(0, -3 * step),
            MouseEventKind::ScrollRight => self.wheel(4, 0),
            MouseEventKind::ScrollLeft => self.wheel(-4, 0),
            MouseEventKind::Down(MouseButton::Left) => self.pointer_down(mouse),
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
                self.pointer_move(mouse)
            }
            MouseEventKind::Up(MouseButton::Left) => self.pointer_up(mouse),
            _ => GridAction::None,
        }
    }

    fn wheel(&mut self, dx: i32, dy: i32) -> GridAction {
        let before = self.scroll.offset();
        let decision = self.scroll.scroll_by(dx, dy, self.now_ms);
        self.note_scroll(decision);
        if self.scroll.offset() == before {
            GridAction::None
        } else {
            GridAction::Redraw
        }
    }

    fn pointer_down(&mut self, mouse: MouseEvent) -> GridAction {
        let (x, y) = (mouse.x, mouse.y);
        if self.filter_popup.is_some() {
            self.close_filter();
            return GridAction::Redraw;
        }
        if let Some((key, _)) = self
            .geometry
            .groups
            .iter()
            .find(|(_, r)| contains(r, x, y))
        {
            let key = key.clone();
            self.toggle_group(&key);
            return GridAction::Redraw;
        }
        let Some((subject, movable)) = self.hit_subject(x, y) else {
            return GridAction::None;
        };
        self.last_pointer = Some((x, y));
        self.drag_nested = match &subject {
            DragSubject::Row { row } if self.options.tree => self
                .records
                .iter()
                .map(|r| r.id)
                .filter(|&id| self.is_nested_under(id, *row))
                .collect(),
            _ => Vec::new(),
        };
        self.drag.press(subject, x, y, mouse.pointer, movable);
        GridAction::None
    }

    fn hit_subject(&self, x: u16, y: u16) -> Option<(DragSubject, bool)> {
        if let Some(band) = self.geometry.bands.iter().find(|b| contains(&b.rect, x, y)) {
            let movable = band.fields.iter().all(|f| {
                self.column(f)
                    .is_some_and(|c| c.flags.reorderable)
            });
            let subject = DragSubject::Band {
                name: band.name.clone(),
                fields: band.fields.clone(),
                region: band.region,
            };
            return Some((subject, movable));
        }
        if let Some(cell) = self.geometry.header.iter().find(|c| contains(&c.rect, x, y)) {
            let column = self.column(&cell.field)?;
            if column.flags.resizable && x + 1 == cell.rect.right() {
                let subject = DragSubject::ResizeHandle {
                    field: column.field.clone(),
                    width: column.width,
                };
                return Some((subject, true));
            }
            let subject = DragSubject::Column {
                field: column.field.clone(),
                region: column.region,
            };
            return Some((subject, column.flags.reorderable));
        }
        let row = self.geometry.rows.iter().find(|r| contains(&r.rect, x, y))?;
        let movable = self.options.row_reorder
            && !self.remote
            && self.query.sorts.is_empty()
            && self.query.groups.is_empty();
        Some((DragSubject::Row { row: row.row }, movable))
    }

    fn pointer_move(&mut self, mouse: MouseEvent) -> GridAction {
        let (x, y) = (mouse.x, mouse.y);
        if !self.drag.is_active() {
            return GridAction::None;
        }
        self.last_pointer = Some((x, y));
        let geometry = DragGeometry {
            header: &self.geometry.header,
            rows: &self.geometry.rows,
            viewport: self.geometry.areas.body,
            tree: self.options.tree,
            nested: &self.drag_nested,
        };
        match self.drag.pointer_move(x, y, &geometry) {
            DragEffect::Started => {
                let body = self.geometry.areas.body;
                self.scroll.begin_auto_scroll(body, (x, y), self.now_ms);
                self.pointer_capture = Some(ScopedListeners::acquire(
                    &self.captures,
                    &[Capture::Pointer],
                ));
                GridAction::Redraw
            }
            DragEffect::Moved(_) => {
                self.scroll.update_pointer(x, y);
                GridAction::Redraw
            }
            DragEffect::ResizePreview { field, width } => {
                if self.pointer_capture.is_none() {
                    self.pointer_capture = Some(ScopedListeners::acquire(
                        &self.captures,
                        &[Capture::Pointer],
                    ));
                }
                self.resize_preview = Some((field, width));
                GridAction::Redraw
            }
            _ => GridAction::None,
        }
    }

    fn pointer_up(&mut self, mouse: MouseEvent) -> GridAction {
        let (x, y) = (mouse.x, mouse.y);
        let mut vetoed = false;
        let veto = &mut self.veto;
        let geometry = DragGeometry {
            header: &self.geometry.header,
            rows: &self.geometry.rows,
            viewport: self.geometry.areas.body,
            tree: self.options.tree,
            nested: &self.drag_nested,
        };
        let effect = self.drag.release(x, y, &geometry, &mut |commit| {
            let accepted = veto.as_mut().is_none_or(|v| v(commit));
            vetoed = !accepted;
            accepted
        });
        self.end_gesture();

        match effect {
            DragEffect::Click(DragSubject::Column { field, .. }) => {
                match self.toggle_sort(&field, mouse.modifiers.shift) {
                    Ok(()) => GridAction::SortChanged,
                    Err(_) => GridAction::None,
                }
            }
            DragEffect::Click(DragSubject::Row { row }) => {
                let Some(field) = self.field_at_x(x).map(str::to_owned) else {
                    return GridAction::None;
                };
                let addr = CellAddr::new(row, field);
                if mouse.modifiers.shift && self.options.multi_select {
                    self.selection.extend_to(addr.clone());
                } else if mouse.modifiers.ctrl && self.options.multi_select {
                    self.selection.add_range(SelectionRange {
                        anchor: addr.clone(),
                        head: addr.clone(),
                    });
                } else {
                    self.selection.select_single(addr.clone());
                }
                self.selection_changed();
                GridAction::FocusChanged(addr)
            }
            DragEffect::Commit(commit) => match self.apply_commit(commit.clone()) {
                Ok(()) => GridAction::DragCommitted(commit),
                Err(err) => {
                    warn!(target: "ratatui_grid::grid", error = %err, "drop could not be applied");
                    GridAction::Redraw
                }
            },
            DragEffect::Cancelled if vetoed => GridAction::DragRejected,
            DragEffect::Cancelled => GridAction::Redraw,
            _ => GridAction::None,
        }
    }

    fn end_gesture(&mut self) {
        self.scroll.end_auto_scroll();
        self.pointer_capture = None;
        self.resize_preview = None;
        self.last_pointer = None;
        self.drag_nested.clear();
    }

    /// Field of the column painted at screen column `x`.
    fn field_at_x(&self, x: u16) -> Option<&str> {
        let areas = &self.geometry.areas;
        let [left, center, right] = areas.split(areas.body);
        let column = if x >= left.left() && x < left.right() {
            let i = self.layouts.left.column_at(u32::from(x - left.x))?;
            self.layouts.left.columns().get(i)
        } else if x >= center.left() && x < center.right() {
            let i = self
                .layouts
                .center
                .column_at(u32::from(x - center.x) + self.scroll.data.x)?;
            self.layouts.center.columns().get(i)
        } else if x >= right.left() && x < right.right() {
            let i = self.layouts.right.column_at(u32::from(x - right.x))?;
            self.layouts.right.columns().get(i)
        } else {
            None
        };
        column.map(|c| c.field.as_str())
    }
}

impl Scrollable for Grid {
    fn scroll_offset(&self) -> (u32, u32) {
        self.scroll.offset()
    }

    fn scroll_to(&mut self, x: u32, y: u32, now_ms: u64) -> bool {
        self.on_scroll(Pane::Data, x, y, now_ms) == ScrollDecision::Render
    }
}

impl Draggable for Grid {
    fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    fn cancel_drag(&mut self) {
        self.drag.cancel();
        self.end_gesture();
    }
}

impl Filterable for Grid {
    fn filters(&self) -> &[FilterSpec] {
        &self.query.filters
    }

    /// Validates `filter` against its column and replaces any filter on the same field.
    fn apply_filter(&mut self, filter: FilterSpec) -> GridResult<()> {
        let column = self.require_column(&filter.field)?;
        filter.validate(column)?;
        self.query.filters.retain(|f| f.field != filter.field);
        debug!(target: "ratatui_grid::grid", field = %filter.field, "filter applied");
        self.query.filters.push(filter);
        self.query_changed();
        Ok(())
    }

    fn clear_filters(&mut self) {
        if !self.query.filters.is_empty() {
            self.query.filters.clear();
            self.query_changed();
        }
    }
}

fn contains(rect: &Rect, x: u16, y: u16) -> bool {
    x >= rect.left() && x < rect.right() && y >= rect.top() && y < rect.bottom()
}

/// Nesting depth from parent links; cycles stop at the record count.
fn tree_depth(
    records: &[Record],
    index: &HashMap<RowId, usize>,
    record: &Record,
    parent_field: &str,
) -> usize {
    let mut depth = 0;
    let mut current = record;
    while depth < records.len() {
        let Some(parent) = current.get(parent_field).as_f64() else {
            break;
        };
        let Some(next) = index
            .get(&RowId(parent as u64))
            .and_then(|&i| records.get(i))
        else {
            break;
        };
        depth += 1;
        current = next;
    }
    depth
}

/// Parses popup input according to the column type. Unparseable input is kept as text so
/// validation can report it.
fn parse_operand(input: &str, column: &Column) -> Value {
    let input = input.trim();
    if input.is_empty() {
        return Value::Null;
    }
    match column.column_type {
        ColumnType::Number => input
            .replace(',', "")
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::from(input)),
        ColumnType::DateTime => parse_datetime(input, column.format.as_deref())
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::from(input)),
        ColumnType::Boolean | ColumnType::Checkbox => {
            Value::Bool(matches!(input.to_lowercase().as_str(), "true" | "yes" | "1" | "x"))
        }
        _ => Value::from(input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCode;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("name", "Name", 10),
            Column::new("qty", "Qty", 6).with_type(ColumnType::Number),
            Column::new("done", "Done", 6).with_type(ColumnType::Checkbox),
        ]
    }

    fn grid(rows: u64) -> Grid {
        let mut g = Grid::new();
        g.set_columns(columns());
        g.set_records(
            (0..rows)
                .map(|i| {
                    Record::new(i)
                        .with("name", format!("row {i}"))
                        .with("qty", i as i64)
                        .with("done", i % 2 == 0)
                })
                .collect(),
        );
        g.set_viewport(Rect::new(0, 0, 40, 12));
        g.update();
        g
    }

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key(KeyEvent::new(code))
    }

    #[test]
    fn update_materializes_only_the_window() {
        let g = grid(1_000);
        let w = g.window().unwrap();
        assert_eq!(w.from, 0);
        assert!(w.to < 20);
        assert_eq!(g.row_views().count(), w.len());
    }

    #[test]
    fn second_update_is_a_no_op() {
        let mut g = grid(50);
        let ops = g.surface().count();
        assert!(!g.update());
        g.set_appearance_changed();
        g.set_appearance_changed();
        assert!(g.update());
        assert!(g.surface().count() > ops);
        let ops = g.surface().count();
        g.clear_selection();
        g.update();
        assert_eq!(g.surface().count(), ops);
    }

    #[test]
    fn one_row_scroll_without_overwork_materializes_the_new_row() {
        let mut g = Grid::with_options(GridOptions {
            overwork_rows: 0,
            show_scrollbar_y: false,
            ..GridOptions::default()
        });
        g.set_columns(columns());
        g.set_records((0..100).map(|i| Record::new(i).with("qty", i as i64)).collect());
        g.set_viewport(Rect::new(0, 0, 40, 11));
        g.update();
        let body_h = g.scroll().data.viewport_h as usize;
        assert_eq!(g.window().map(|w| w.to), Some(body_h - 1));

        assert_eq!(g.on_scroll(Pane::Data, 0, 1, 0), ScrollDecision::Render);
        g.update();
        assert!(g.row_view(RowId(body_h as u64), Region::Center).is_some());
    }

    #[test]
    fn space_toggles_checkbox() {
        let mut g = grid(5);
        g.set_focus(RowId(1), "done").unwrap();
        assert_eq!(g.handle_event(key(KeyCode::Char(' ')), 0), GridAction::Redraw);
        assert!(g.record(RowId(1)).unwrap().get("done").as_bool());
    }

    #[test]
    fn enter_starts_editing_and_escape_cancels() {
        let mut g = grid(5);
        g.set_focus(RowId(2), "name").unwrap();
        assert!(matches!(
            g.handle_event(key(KeyCode::Enter), 0),
            GridAction::EditStarted(_)
        ));
        g.update();
        assert!(g.editing().is_some_and(|e| e.editor.is_some()));
        g.handle_event(key(KeyCode::Char('!')), 0);
        assert_eq!(g.handle_event(key(KeyCode::Esc), 0), GridAction::EditCancelled);
        assert!(g.editing().is_none());
        assert_eq!(g.record(RowId(2)).unwrap().get("name"), &Value::from("row 2"));
        assert_eq!(g.focus(), Some(&CellAddr::new(RowId(2), "name")));
    }

    #[test]
    fn editing_a_datetime_commits_the_parsed_value() {
        let due = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        let mut g = Grid::new();
        g.set_columns(vec![
            Column::new("due", "Due", 20).with_type(ColumnType::DateTime),
        ]);
        g.set_records(vec![Record::new(1).with("due", due)]);
        g.set_viewport(Rect::new(0, 0, 40, 6));
        g.update();
        g.set_focus(RowId(1), "due").unwrap();
        g.handle_event(key(KeyCode::Enter), 0);
        g.update();
        assert!(matches!(
            g.handle_event(key(KeyCode::Enter), 0),
            GridAction::EditCommitted(_)
        ));
        assert_eq!(g.record(RowId(1)).unwrap().get("due"), &Value::DateTime(due));

        g.handle_event(key(KeyCode::Enter), 0);
        g.update();
        g.handle_event(key(KeyCode::Char('x')), 0);
        assert_eq!(g.handle_event(key(KeyCode::Enter), 0), GridAction::Redraw);
        assert!(g.editing().is_some());
        assert_eq!(g.record(RowId(1)).unwrap().get("due"), &Value::DateTime(due));
    }

    #[test]
    fn invalid_popup_filter_stays_open() {
        let mut g = grid(5);
        g.open_filter("qty").unwrap();
        assert_eq!(g.layers.depth(), 1);
        assert!(g.captures().borrow().is_active(Capture::Keyboard));
        g.handle_event(key(KeyCode::Tab), 0);
        g.handle_event(key(KeyCode::Tab), 0);
        g.handle_event(key(KeyCode::Tab), 0);
        for c in "abc".chars() {
            g.handle_event(key(KeyCode::Char(c)), 0);
        }
        assert_eq!(g.handle_event(key(KeyCode::Enter), 0), GridAction::Redraw);
        let popup = g.filter_popup().unwrap();
        assert_eq!(popup.op, FilterOp::Greater);
        assert!(popup.error.is_some());
        assert!(g.filters().is_empty());

        for _ in 0..3 {
            g.handle_event(key(KeyCode::Backspace), 0);
        }
        g.handle_event(key(KeyCode::Char('2')), 0);
        assert_eq!(g.handle_event(key(KeyCode::Enter), 0), GridAction::FilterChanged);
        assert!(g.filter_popup().is_none());
        assert_eq!(g.layers.depth(), 0);
        assert!(!g.captures().borrow().is_active(Capture::Keyboard));
        g.update();
        assert_eq!(g.result().len(), 2);
    }

    #[test]
    fn search_applies_after_debounce() {
        let mut g = grid(30);
        g.set_search("row 2", 0);
        assert!(!g.poll(100));
        assert_eq!(g.search_term(), None);
        g.set_search("row 1", 150);
        assert!(g.poll(400));
        g.update();
        assert_eq!(g.search_term(), Some("row 1"));
        assert_eq!(g.result().len(), 11);
    }

    #[test]
    fn remote_mode_issues_requests() {
        let mut g = grid(3);
        g.set_remote(true);
        let first = g.take_pending_request().unwrap();
        g.sort("qty", SortDirection::Descending).unwrap();
        let second = g.take_pending_request().unwrap();
        assert!(second.id > first.id);
        assert_eq!(
            g.receive(DataResponse {
                id: first.id,
                records: vec![],
            }),
            Err(GridError::StaleResponse {
                expected: second.id,
                got: first.id
            })
        );
        g.receive(DataResponse {
            id: second.id,
            records: vec![Record::new(9).with("name", "nine")],
        })
        .unwrap();
        g.update();
        assert_eq!(g.result().len(), 1);
        assert!(!g.is_loading());
    }

    #[test]
    fn tree_rows_indent_by_parent_depth() {
        let mut g = Grid::with_options(GridOptions {
            tree: true,
            ..GridOptions::default()
        });
        g.set_columns(vec![Column::new("name", "Name", 12)]);
        g.set_records(vec![
            Record::new(1).with("name", "root"),
            Record::new(2).with("name", "child").with("parent", 1),
            Record::new(3).with("name", "leaf").with("parent", 2),
        ]);
        g.set_viewport(Rect::new(0, 0, 20, 6));
        g.update();
        let view = g.row_view(RowId(3), Region::Center).unwrap();
        match &view.cells()[0].content {
            CellContent::Text { text, .. } => assert_eq!(text, "    leaf"),
            other => panic!("unexpected {other:?}"),
        }

        g.move_row(RowId(3), RowId(1), RowDropPosition::Into).unwrap();
        assert_eq!(g.record(RowId(3)).unwrap().get("parent"), &Value::from(1));
        let order: Vec<u64> = g.records().iter().map(|r| r.id.0).collect();
        assert_eq!(order, vec![1, 3, 2]);
    }

    #[test]
    fn rows_cannot_move_under_their_own_descendants() {
        let mut g = Grid::with_options(GridOptions {
            tree: true,
            ..GridOptions::default()
        });
        g.set_columns(vec![Column::new("name", "Name", 12)]);
        g.set_records(vec![
            Record::new(1).with("name", "root"),
            Record::new(2).with("name", "child").with("parent", 1),
            Record::new(3).with("name", "leaf").with("parent", 2),
        ]);
        assert_eq!(
            g.move_row(RowId(1), RowId(2), RowDropPosition::Into),
            Err(GridError::DragRejected)
        );
        assert_eq!(
            g.move_row(RowId(1), RowId(3), RowDropPosition::Before),
            Err(GridError::DragRejected)
        );
        assert_eq!(g.record(RowId(1)).unwrap().get("parent"), &Value::Null);
        assert_eq!(g.record(RowId(2)).unwrap().get("parent"), &Value::from(1));
        let order: Vec<u64> = g.records().iter().map(|r| r.id.0).collect();
        assert_eq!(order, vec![1, 2, 3]);

        g.move_row(RowId(3), RowId(1), RowDropPosition::After).unwrap();
        assert_eq!(g.record(RowId(3)).unwrap().get("parent"), &Value::Null);
    }

    #[test]
    fn vetoed_commit_is_rejected() {
        let mut g = grid(3);
        g.set_drop_veto(|c| !matches!(c, DragCommit::Resize { .. }));
        assert_eq!(
            g.apply_drag_commit(DragCommit::Resize {
                field: "name".into(),
                width: 20
            }),
            Err(GridError::DragRejected)
        );
        assert_eq!(g.column("name").unwrap().width, 10);
        g.apply_drag_commit(DragCommit::MoveColumns {
            fields: vec!["done".into()],
            region: Region::Center,
            before: Some("name".into()),
        })
        .unwrap();
        let order: Vec<&str> = g.columns().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(order, vec!["done", "name", "qty"]);
    }
}

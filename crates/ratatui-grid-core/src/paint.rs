//! Terminal painting of the retained row views.
//!
//! [`Grid::render`] brings the grid up to date and then paints straight from the retained
//! [`RowView`](crate::materializer::RowView)s; nothing is re-read from the records except group
//! captions and footer summaries. Painting also records the hit geometry that pointer handling
//! and the drag machine read until the next frame.

use crate::cell::CellContent;
use crate::cell::RenderedCell;
use crate::column::Column;
use crate::column::ColumnType;
use crate::column::Layout;
use crate::column::Layouts;
use crate::column::Region;
use crate::drag::ColumnRect;
use crate::drag::DragState;
use crate::drag::DropTarget;
use crate::drag::RowDropPosition;
use crate::drag::RowRect;
use crate::grid::Grid;
use crate::options::GridOptions;
use crate::query::FilterOp;
use crate::query::GroupKey;
use crate::query::ResultRow;
use crate::query::SortDirection;
use crate::render;
use crate::summary::summarize;
use crate::surface::RowKey;
use crate::theme::Theme;
use crate::viewport::ViewportState;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Clear;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;

const SEPARATOR: &str = "│";
const DROP_MARKER: &str = "┃";

/// Screen split of the grid: band row, header, data pane, footer and scrollbar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridAreas {
    pub bands: Rect,
    pub header: Rect,
    pub body: Rect,
    pub footer: Rect,
    pub scrollbar: Option<Rect>,
    /// Width of the left pinned pane.
    pub left_w: u16,
    /// Width of the right pinned pane.
    pub right_w: u16,
}

impl GridAreas {
    pub fn compute(area: Rect, options: &GridOptions, layouts: &Layouts) -> Self {
        let has_bands = options.show_header && layouts.display_columns().any(|c| c.band.is_some());
        let scrollbar = u16::from(options.show_scrollbar_y && area.width > 1);
        let content_w = area.width.saturating_sub(scrollbar);

        let mut y = area.y;
        let mut remaining = area.height;
        let mut take = |wanted: bool| {
            let h = u16::from(wanted).min(remaining);
            let rect = Rect::new(area.x, y, content_w, h);
            y += h;
            remaining -= h;
            rect
        };
        let bands = take(has_bands);
        let header = take(options.show_header);
        let footer_h = u16::from(options.show_footer).min(remaining);
        let body = Rect::new(area.x, y, content_w, remaining - footer_h);
        let footer = Rect::new(area.x, body.bottom(), content_w, footer_h);

        let left_w = clamp_u16(layouts.left.width()).min(content_w);
        let right_w = clamp_u16(layouts.right.width()).min(content_w - left_w);

        Self {
            bands,
            header,
            body,
            footer,
            scrollbar: (scrollbar > 0).then(|| Rect::new(area.x + content_w, body.y, 1, body.height)),
            left_w,
            right_w,
        }
    }

    pub fn center_width(&self) -> u16 {
        self.body
            .width
            .saturating_sub(self.left_w)
            .saturating_sub(self.right_w)
    }

    /// Splits a horizontal strip into its left, center and right panes.
    pub fn split(&self, strip: Rect) -> [Rect; 3] {
        let center_w = self.center_width();
        [
            Rect::new(strip.x, strip.y, self.left_w, strip.height),
            Rect::new(strip.x + self.left_w, strip.y, center_w, strip.height),
            Rect::new(strip.x + self.left_w + center_w, strip.y, self.right_w, strip.height),
        ]
    }

    fn pane(&self, strip: Rect, region: Region) -> Rect {
        let [left, center, right] = self.split(strip);
        match region {
            Region::Left => left,
            Region::Center => center,
            Region::Right => right,
        }
    }
}

/// A band caption cell as painted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandRect {
    pub name: String,
    pub fields: Vec<String>,
    pub region: Region,
    pub rect: Rect,
}

/// Hit geometry captured by the last paint.
#[derive(Clone, Debug, Default)]
pub struct PaintGeometry {
    pub areas: GridAreas,
    pub header: Vec<ColumnRect>,
    pub bands: Vec<BandRect>,
    pub rows: Vec<RowRect>,
    pub groups: Vec<(GroupKey, Rect)>,
}

struct Styles {
    base: Style,
    header: Style,
    footer: Style,
    grid_line: Style,
    scrollbar: Style,
    focused: Style,
    group: Style,
    drop: Style,
    muted: Style,
    highlight: Style,
}

impl Styles {
    fn new(options: &GridOptions, theme: &Theme) -> Self {
        Self {
            base: or_theme(options.style, theme.text_primary),
            header: options.header_style.patch(theme.accent),
            footer: options.footer_style.patch(theme.text_muted),
            grid_line: or_theme(options.grid_line_style, theme.text_muted),
            scrollbar: or_theme(options.scrollbar_style, theme.text_muted),
            focused: or_theme(options.focused_style, theme.accent),
            group: options.group_style.patch(theme.accent),
            drop: or_theme(options.drop_marker_style, theme.accent),
            muted: theme.text_muted,
            highlight: theme.highlight,
        }
    }
}

impl Grid {
    /// Updates the grid for `area` and paints it into `buf`.
    pub fn render(&mut self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        self.set_viewport(area);
        self.update();

        let styles = Styles::new(&self.options, theme);
        let areas = self.geometry.areas;
        let mut geometry = PaintGeometry {
            areas,
            ..PaintGeometry::default()
        };
        buf.set_style(area, styles.base);
        if area.width == 0 || area.height == 0 {
            self.geometry = geometry;
            return;
        }

        if areas.header.height > 0 {
            buf.set_style(areas.header, styles.header);
            self.paint_header(&areas, buf, &styles, &mut geometry);
        }
        if areas.bands.height > 0 {
            buf.set_style(areas.bands, styles.header);
            self.paint_bands(&areas, buf, &styles, &mut geometry);
        }
        self.paint_body(&areas, buf, theme, &styles, &mut geometry);
        if areas.footer.height > 0 {
            buf.set_style(areas.footer, styles.footer);
            self.paint_footer(&areas, buf, &styles);
        }
        if let Some(rect) = areas.scrollbar {
            let data = &self.scroll.data;
            render::render_scrollbar(
                rect,
                buf,
                &ViewportState {
                    x: 0,
                    y: data.y,
                    viewport_w: 1,
                    viewport_h: rect.height,
                    content_w: 1,
                    content_h: data.content_h,
                },
                styles.scrollbar,
            );
        }
        self.paint_drag_feedback(&areas, buf, &styles, &geometry);
        self.paint_filter_popup(area, buf, theme, &styles, &geometry);
        self.geometry = geometry;
    }

    /// Horizontal scroll of a region's panes.
    fn scroll_x(&self, region: Region) -> u64 {
        match region {
            Region::Center => u64::from(self.scroll.data.x),
            Region::Left | Region::Right => 0,
        }
    }

    /// Region-local column indices worth painting.
    fn painted_columns(&self, region: Region) -> std::ops::Range<usize> {
        let layout = self.layouts.get(region);
        match (region, &self.col_window) {
            (Region::Center, Some(window)) => window.start..window.end.min(layout.len()),
            _ => 0..layout.len(),
        }
    }

    fn paint_header(
        &self,
        areas: &GridAreas,
        buf: &mut Buffer,
        styles: &Styles,
        geometry: &mut PaintGeometry,
    ) {
        for region in [Region::Left, Region::Center, Region::Right] {
            let layout = self.layouts.get(region);
            let pane = areas.pane(areas.header, region);
            if layout.is_empty() || pane.width == 0 {
                continue;
            }
            let scroll_x = self.scroll_x(region);
            for i in self.painted_columns(region) {
                let column = &layout.columns()[i];
                let start = u64::from(layout.offset_of(i));
                let (rect, clip_left) = clipped_rect_x(pane, scroll_x, start, column.width);
                if rect.width == 0 {
                    continue;
                }
                let caption = match self.sort_direction(&column.field) {
                    Some(SortDirection::Ascending) => format!("{} ▲", column.caption),
                    Some(SortDirection::Descending) => format!("{} ▼", column.caption),
                    None => column.caption.clone(),
                };
                render::render_str_clipped(
                    rect.x,
                    rect.y,
                    clip_left,
                    rect.width,
                    buf,
                    &caption,
                    styles.header,
                );
                if self.options.grid_lines {
                    draw_separator(buf, pane, scroll_x, start, column.width, styles.grid_line);
                }
                geometry.header.push(ColumnRect {
                    field: column.field.clone(),
                    band: column.band.clone(),
                    region,
                    rect,
                });
            }
        }
    }

    fn paint_bands(
        &self,
        areas: &GridAreas,
        buf: &mut Buffer,
        styles: &Styles,
        geometry: &mut PaintGeometry,
    ) {
        for region in [Region::Left, Region::Center, Region::Right] {
            let layout = self.layouts.get(region);
            let pane = areas.pane(areas.bands, region);
            if pane.width == 0 {
                continue;
            }
            let scroll_x = self.scroll_x(region);
            for (name, span) in band_spans(layout) {
                let start = u64::from(layout.offset_of(span.start));
                let width = layout.span_width(span.clone());
                let (rect, clip_left) = clipped_rect_x(pane, scroll_x, start, width);
                if rect.width == 0 {
                    continue;
                }
                render::render_str_clipped(
                    rect.x,
                    rect.y,
                    clip_left,
                    rect.width,
                    buf,
                    &name,
                    styles.header.add_modifier(Modifier::UNDERLINED),
                );
                if self.options.grid_lines {
                    draw_separator(buf, pane, scroll_x, start, width, styles.grid_line);
                }
                geometry.bands.push(BandRect {
                    name,
                    fields: layout.columns()[span]
                        .iter()
                        .map(|c| c.field.clone())
                        .collect(),
                    region,
                    rect,
                });
            }
        }
    }

    fn paint_body(
        &self,
        areas: &GridAreas,
        buf: &mut Buffer,
        theme: &Theme,
        styles: &Styles,
        geometry: &mut PaintGeometry,
    ) {
        let body = areas.body;
        let Some(window) = self.calculator.window() else {
            return;
        };
        if body.width == 0 || body.height == 0 {
            return;
        }
        let scroll_y = u64::from(self.scroll.data.y);
        for ri in window.from..=window.to {
            let Some(row) = self.result.rows.get(ri) else {
                break;
            };
            let start = self.calculator.row_offset(ri);
            let size = self.calculator.height_of(ri);
            let (row_rect, clip_top) = clipped_rect_y(body, scroll_y, start, size);
            if row_rect.height == 0 {
                continue;
            }
            match row {
                ResultRow::Group {
                    key,
                    field,
                    value,
                    level,
                    count,
                    expanded,
                } => {
                    if clip_top == 0 {
                        let column = self.column(field);
                        let caption = column.map(|c| c.caption.as_str()).unwrap_or(field);
                        let shown = value.format(column.and_then(|c| c.format.as_deref()));
                        let marker = if *expanded { "▾" } else { "▸" };
                        let line = format!(
                            "{}{marker} {caption}: {shown} ({count})",
                            " ".repeat(level * 2)
                        );
                        buf.set_style(row_rect, styles.group);
                        render::render_str_clipped(
                            row_rect.x,
                            row_rect.y,
                            0,
                            row_rect.width,
                            buf,
                            &line,
                            styles.group,
                        );
                    }
                    geometry.groups.push((key.clone(), row_rect));
                }
                ResultRow::Data { id, .. } => {
                    for region in [Region::Left, Region::Center, Region::Right] {
                        let Some(view) = self.views.get(&RowKey { row: *id, region }) else {
                            continue;
                        };
                        let pane = areas.pane(row_rect, region);
                        if pane.width == 0 {
                            continue;
                        }
                        let layout = self.layouts.get(region);
                        let scroll_x = self.scroll_x(region);
                        for (i, cell) in view.cells().iter().enumerate() {
                            if cell.skipped {
                                continue;
                            }
                            let Some(column) = layout.columns().get(i) else {
                                continue;
                            };
                            let start = u64::from(layout.offset_of(i));
                            let (rect, clip_left) =
                                clipped_rect_x(pane, scroll_x, start, column.width);
                            if rect.width == 0 {
                                continue;
                            }
                            let style = self.cell_style(cell, theme, styles);
                            buf.set_style(rect, style);
                            if clip_top == 0 {
                                self.paint_cell(buf, rect, clip_left, cell, column, style, styles);
                            }
                            if self.options.grid_lines && i + 1 < layout.len() {
                                draw_separator(
                                    buf,
                                    pane,
                                    scroll_x,
                                    start,
                                    column.width,
                                    styles.grid_line,
                                );
                            }
                        }
                    }
                    geometry.rows.push(RowRect {
                        row: *id,
                        rect: row_rect,
                    });
                }
            }
        }
    }

    fn cell_style(&self, cell: &RenderedCell, theme: &Theme, styles: &Styles) -> Style {
        let mut style = styles.base;
        if cell.state.disabled {
            style = style.patch(styles.muted);
        }
        if let Some(selected) = theme.selection_style(cell.state.selected) {
            style = style.patch(selected);
        }
        if cell.state.focused {
            style = style.patch(styles.focused);
        }
        style
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_cell(
        &self,
        buf: &mut Buffer,
        rect: Rect,
        clip_left: u32,
        cell: &RenderedCell,
        column: &Column,
        style: Style,
        styles: &Styles,
    ) {
        let text = match &cell.content {
            CellContent::Empty => return,
            CellContent::Text { text, highlights } => {
                let offset = if column.column_type == ColumnType::Number && clip_left == 0 {
                    render::right_align_offset(text, rect.width)
                } else {
                    0
                };
                render::render_highlighted(
                    rect.x + offset,
                    rect.y,
                    clip_left,
                    rect.width - offset,
                    buf,
                    text,
                    highlights,
                    style,
                    styles.highlight,
                );
                return;
            }
            CellContent::Checkbox(checked) => (if *checked { "[x]" } else { "[ ]" }).to_owned(),
            CellContent::Boolean(value) => (if *value { "✓" } else { "" }).to_owned(),
            CellContent::Reference(label) => label.clone(),
            CellContent::Editor => self
                .edit
                .as_ref()
                .and_then(|e| e.editor.as_ref())
                .map(|e| e.display())
                .unwrap_or_default(),
            CellContent::Custom(custom) => custom.display(),
        };
        let style = match &cell.content {
            CellContent::Editor => style.add_modifier(Modifier::UNDERLINED),
            CellContent::Reference(_) => style.add_modifier(Modifier::ITALIC),
            _ => style,
        };
        render::render_str_clipped(rect.x, rect.y, clip_left, rect.width, buf, &text, style);
    }

    fn paint_footer(&self, areas: &GridAreas, buf: &mut Buffer, styles: &Styles) {
        for (field, kind) in &self.options.summaries {
            let Some(display) = self.layouts.display_index(field) else {
                continue;
            };
            let Some((region, local)) = self.layouts.locate(display) else {
                continue;
            };
            let layout = self.layouts.get(region);
            let column = &layout.columns()[local];
            let pane = areas.pane(areas.footer, region);
            let start = u64::from(layout.offset_of(local));
            let (rect, clip_left) = clipped_rect_x(pane, self.scroll_x(region), start, column.width);
            if rect.width == 0 {
                continue;
            }
            let value = summarize(&self.records, &self.result.filtered, field, *kind);
            let text = format!("{}: {}", kind.label(), value.format(column.format.as_deref()));
            render::render_str_clipped(rect.x, rect.y, clip_left, rect.width, buf, &text, styles.footer);
        }
    }

    fn paint_drag_feedback(
        &self,
        areas: &GridAreas,
        buf: &mut Buffer,
        styles: &Styles,
        geometry: &PaintGeometry,
    ) {
        let span = Rect::new(
            areas.header.x,
            areas.header.y,
            areas.body.width,
            areas.body.bottom().saturating_sub(areas.header.y),
        );
        if let Some((field, width)) = &self.resize_preview
            && let Some(cell) = geometry.header.iter().find(|c| &c.field == field)
        {
            let x = cell.rect.x.saturating_add(clamp_u16(*width)).saturating_sub(1);
            draw_vertical(buf, span, x, DROP_MARKER, styles.drop);
        }
        let DragState::Dragging {
            target: Some(target),
            ..
        } = self.drag.state()
        else {
            return;
        };
        match target {
            DropTarget::Column { region, before } => {
                let x = match before {
                    Some(field) => geometry
                        .header
                        .iter()
                        .find(|c| &c.field == field)
                        .map(|c| c.rect.x),
                    None => geometry
                        .header
                        .iter()
                        .filter(|c| c.region == *region)
                        .map(|c| c.rect.right().saturating_sub(1))
                        .max(),
                };
                if let Some(x) = x {
                    draw_vertical(buf, span, x, DROP_MARKER, styles.drop);
                }
            }
            DropTarget::Row { row, position } => {
                let Some(rect) = geometry.rows.iter().find(|r| r.row == *row).map(|r| r.rect)
                else {
                    return;
                };
                let line = |y: u16| Rect::new(rect.x, y, rect.width, 1);
                match position {
                    RowDropPosition::Into => buf.set_style(rect, styles.drop),
                    RowDropPosition::Before if rect.y > areas.body.y => buf.set_style(
                        line(rect.y - 1),
                        Style::default().add_modifier(Modifier::UNDERLINED),
                    ),
                    RowDropPosition::Before => buf.set_style(line(rect.y), styles.drop),
                    RowDropPosition::After => buf.set_style(
                        line(rect.bottom() - 1),
                        Style::default().add_modifier(Modifier::UNDERLINED),
                    ),
                }
            }
        }
    }

    fn paint_filter_popup(
        &self,
        area: Rect,
        buf: &mut Buffer,
        theme: &Theme,
        styles: &Styles,
        geometry: &PaintGeometry,
    ) {
        let Some(popup) = &self.filter_popup else {
            return;
        };
        let anchor = geometry
            .header
            .iter()
            .find(|c| c.field == popup.field)
            .map(|c| c.rect)
            .unwrap_or(areas_origin(area));
        let width = 32.min(area.width);
        let height = 4.min(area.height);
        let x = anchor.x.min(area.right().saturating_sub(width));
        let y = (anchor.y + 1).min(area.bottom().saturating_sub(height));
        let rect = Rect::new(x, y, width, height);

        let caption = self
            .column(&popup.field)
            .map(|c| c.caption.as_str())
            .unwrap_or(&popup.field);
        Clear.render(rect, buf);
        let block = Block::bordered()
            .title(format!(" Filter: {caption} "))
            .border_style(styles.drop);
        let inner = block.inner(rect);
        block.render(rect, buf);

        let input = format!("{} {}", op_label(&popup.op), popup.input);
        Paragraph::new(Span::styled(input, styles.base)).render(
            Rect::new(inner.x, inner.y, inner.width, inner.height.min(1)),
            buf,
        );
        if let Some(error) = &popup.error
            && inner.height > 1
        {
            Paragraph::new(Span::styled(error.as_str(), theme.danger)).render(
                Rect::new(inner.x, inner.y + 1, inner.width, 1),
                buf,
            );
        }
    }
}

fn areas_origin(area: Rect) -> Rect {
    Rect::new(area.x, area.y, 0, 0)
}

fn op_label(op: &FilterOp) -> &'static str {
    match op {
        FilterOp::Equals => "=",
        FilterOp::NotEquals => "≠",
        FilterOp::Contains => "contains",
        FilterOp::NotContains => "excludes",
        FilterOp::Greater => ">",
        FilterOp::GreaterOrEqual => "≥",
        FilterOp::Less => "<",
        FilterOp::LessOrEqual => "≤",
        FilterOp::Between(_) => "between",
        FilterOp::Empty => "is empty",
        FilterOp::NotEmpty => "is not empty",
    }
}

/// Runs of consecutive columns sharing a band.
fn band_spans(layout: &Layout) -> Vec<(String, std::ops::Range<usize>)> {
    let mut spans: Vec<(String, std::ops::Range<usize>)> = Vec::new();
    for (i, column) in layout.columns().iter().enumerate() {
        let Some(band) = &column.band else {
            continue;
        };
        match spans.last_mut() {
            Some((name, span)) if name == band && span.end == i => span.end = i + 1,
            _ => spans.push((band.clone(), i..i + 1)),
        }
    }
    spans
}

fn or_theme(style: Style, fallback: Style) -> Style {
    if style == Style::default() {
        fallback
    } else {
        style
    }
}

fn clamp_u16(value: u32) -> u16 {
    value.min(u32::from(u16::MAX)) as u16
}

fn clipped_rect_x(area: Rect, scroll_x: u64, start: u64, size: u32) -> (Rect, u32) {
    let rel = start as i64 - scroll_x as i64;
    let clip_left = (-rel).max(0) as u32;
    let x = rel.clamp(0, i64::from(area.width)) as u16;
    let max_w = area.width.saturating_sub(x);
    let visible_w = size.saturating_sub(clip_left).min(max_w as u32) as u16;
    (
        Rect::new(area.x + x, area.y, visible_w, area.height),
        clip_left,
    )
}

fn clipped_rect_y(area: Rect, scroll_y: u64, start: u64, size: u32) -> (Rect, u32) {
    let rel = start as i64 - scroll_y as i64;
    let clip_top = (-rel).max(0) as u32;
    let y = rel.clamp(0, i64::from(area.height)) as u16;
    let max_h = area.height.saturating_sub(y);
    let visible_h = size.saturating_sub(clip_top).min(max_h as u32) as u16;
    (
        Rect::new(area.x, area.y + y, area.width, visible_h),
        clip_top,
    )
}

/// Draws the separator on the last cell of a column.
fn draw_separator(buf: &mut Buffer, pane: Rect, scroll_x: u64, start: u64, size: u32, style: Style) {
    let rel = (start + u64::from(size)) as i64 - 1 - scroll_x as i64;
    if rel < 0 || rel >= i64::from(pane.width) {
        return;
    }
    draw_vertical(buf, pane, pane.x + rel as u16, SEPARATOR, style);
}

fn draw_vertical(buf: &mut Buffer, area: Rect, x: u16, symbol: &str, style: Style) {
    if x < area.left() || x >= area.right() {
        return;
    }
    for dy in 0..area.height {
        buf.set_span(x, area.y + dy, &Span::styled(symbol, style), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputEvent;
    use crate::input::MouseButton;
    use crate::input::MouseEvent;
    use crate::input::MouseEventKind;
    use crate::record::Record;
    use crate::record::RowId;

    fn line(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    fn grid() -> Grid {
        let mut g = Grid::with_options(GridOptions {
            show_scrollbar_y: false,
            grid_lines: false,
            mouse_drag_threshold: 2,
            ..GridOptions::default()
        });
        g.set_columns(vec![
            Column::new("name", "Name", 8),
            Column::new("qty", "Qty", 5).with_type(ColumnType::Number),
        ]);
        g.set_records(
            (0..20)
                .map(|i| Record::new(i).with("name", format!("n{i}")).with("qty", i as i64))
                .collect(),
        );
        g
    }

    #[test]
    fn areas_reserve_header_footer_and_scrollbar() {
        let options = GridOptions {
            show_footer: true,
            ..GridOptions::default()
        };
        let columns = vec![
            Column::new("a", "A", 4).pinned(Region::Left),
            Column::new("b", "B", 10),
        ];
        let layouts = Layouts::from_columns(&columns);
        let areas = GridAreas::compute(Rect::new(0, 0, 20, 10), &options, &layouts);
        assert_eq!(areas.header, Rect::new(0, 0, 19, 1));
        assert_eq!(areas.body, Rect::new(0, 1, 19, 8));
        assert_eq!(areas.footer, Rect::new(0, 9, 19, 1));
        assert_eq!(areas.scrollbar, Some(Rect::new(19, 1, 1, 8)));
        assert_eq!(areas.left_w, 4);
        assert_eq!(areas.center_width(), 15);
    }

    #[test]
    fn paints_header_and_right_aligned_numbers() {
        let mut g = grid();
        let area = Rect::new(0, 0, 13, 4);
        let mut buf = Buffer::empty(area);
        g.render(area, &mut buf, &Theme::default());
        assert_eq!(line(&buf, 0), "Name    Qty  ");
        assert_eq!(line(&buf, 1), "n0          0");
        assert_eq!(line(&buf, 3), "n2          2");
        assert_eq!(g.geometry.rows.len(), 3);
        assert_eq!(g.geometry.header.len(), 2);
    }

    #[test]
    fn header_click_sorts_and_shows_indicator() {
        let mut g = grid();
        let area = Rect::new(0, 0, 13, 4);
        let mut buf = Buffer::empty(area);
        g.render(area, &mut buf, &Theme::default());
        g.handle_event(
            InputEvent::Mouse(MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 9, 0)),
            0,
        );
        g.handle_event(
            InputEvent::Mouse(MouseEvent::new(MouseEventKind::Up(MouseButton::Left), 9, 0)),
            0,
        );
        g.handle_event(
            InputEvent::Mouse(MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 9, 0)),
            0,
        );
        g.handle_event(
            InputEvent::Mouse(MouseEvent::new(MouseEventKind::Up(MouseButton::Left), 9, 0)),
            0,
        );
        let mut buf = Buffer::empty(area);
        g.render(area, &mut buf, &Theme::default());
        assert_eq!(line(&buf, 0), "Name    Qty ▼");
        assert_eq!(line(&buf, 1), "n19        19");
    }

    #[test]
    fn dragging_a_row_moves_the_record() {
        let mut g = grid();
        let area = Rect::new(0, 0, 13, 6);
        let mut buf = Buffer::empty(area);
        g.render(area, &mut buf, &Theme::default());
        let mouse = |kind, y| InputEvent::Mouse(MouseEvent::new(kind, 2, y));
        g.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 1), 0);
        g.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), 4), 10);
        assert!(g.drag.is_dragging());
        let action = g.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 4), 20);
        assert!(matches!(action, crate::grid::GridAction::DragCommitted(_)));
        let order: Vec<u64> = g.records().iter().take(4).map(|r| r.id.0).collect();
        assert_eq!(order, vec![1, 2, 0, 3]);
        assert_eq!(g.record(RowId(0)).map(|r| r.id), Some(RowId(0)));
    }
}

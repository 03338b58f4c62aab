use crate::drag::DragThresholds;
use crate::input::PointerKind;
use crate::summary::SummaryKind;
use ratatui::style::Modifier;
use ratatui::style::Style;

/// Host class; selects drag thresholds and scroll throttling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Touch,
    /// Slow hosts: scroll-triggered renders are throttled.
    Legacy,
}

/// Options for [`crate::grid::Grid`].
#[derive(Clone, Debug)]
pub struct GridOptions {
    pub show_header: bool,
    pub show_footer: bool,
    pub show_scrollbar_y: bool,
    /// Draw a separator glyph in the last cell of every column.
    pub grid_lines: bool,
    pub row_height: u32,
    /// Extra rows materialized above and below the visible rows.
    pub overwork_rows: usize,
    pub overscan_cols: usize,
    /// Render every center column instead of a horizontal window.
    pub full_width: bool,
    pub device: DeviceClass,
    pub mouse_drag_threshold: u16,
    pub touch_drag_threshold: u16,
    pub min_column_width: u32,
    /// Distance from a pane edge at which a drag starts auto-scrolling.
    pub auto_scroll_margin: u16,
    pub auto_scroll_step: u32,
    pub auto_scroll_interval_ms: u64,
    pub legacy_throttle_ms: u64,
    pub search_debounce_ms: u64,
    /// Viewports shorter than this defer the initial render.
    pub min_viewport_height: u16,
    pub multi_select: bool,
    /// Tree rows: row drops may nest (`Into`) and rows always rebuild on column changes.
    pub tree: bool,
    /// Field holding a row's parent id in tree mode.
    pub tree_parent_field: String,
    /// Rows can be dragged while no sort or grouping is active.
    pub row_reorder: bool,
    /// Footer summaries, one per field.
    pub summaries: Vec<(String, SummaryKind)>,
    pub style: Style,
    pub header_style: Style,
    pub footer_style: Style,
    pub grid_line_style: Style,
    pub scrollbar_style: Style,
    pub focused_style: Style,
    pub group_style: Style,
    pub drop_marker_style: Style,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            show_header: true,
            show_footer: false,
            show_scrollbar_y: true,
            grid_lines: true,
            row_height: 1,
            overwork_rows: 2,
            overscan_cols: 1,
            full_width: false,
            device: DeviceClass::Desktop,
            mouse_drag_threshold: 6,
            touch_drag_threshold: 9,
            min_column_width: 3,
            auto_scroll_margin: 1,
            auto_scroll_step: 1,
            auto_scroll_interval_ms: 50,
            legacy_throttle_ms: 40,
            search_debounce_ms: 200,
            min_viewport_height: 1,
            multi_select: true,
            tree: false,
            tree_parent_field: "parent".to_owned(),
            row_reorder: true,
            summaries: Vec::new(),
            style: Style::default(),
            header_style: Style::default().add_modifier(Modifier::BOLD),
            footer_style: Style::default().add_modifier(Modifier::ITALIC),
            grid_line_style: Style::default(),
            scrollbar_style: Style::default(),
            focused_style: Style::default().add_modifier(Modifier::REVERSED),
            group_style: Style::default().add_modifier(Modifier::BOLD),
            drop_marker_style: Style::default().add_modifier(Modifier::REVERSED),
        }
    }
}

impl GridOptions {
    /// Pointer travel needed before a press turns into a drag.
    pub fn drag_threshold(&self, pointer: PointerKind) -> u16 {
        DragThresholds::from_options(self).for_pointer(pointer)
    }

    pub fn is_legacy(&self) -> bool {
        self.device == DeviceClass::Legacy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_uses_larger_threshold() {
        let o = GridOptions::default();
        assert_eq!(o.drag_threshold(PointerKind::Mouse), 6);
        assert_eq!(o.drag_threshold(PointerKind::Touch), 9);
        let touch = GridOptions {
            device: DeviceClass::Touch,
            ..Default::default()
        };
        assert_eq!(touch.drag_threshold(PointerKind::Mouse), 9);
    }
}

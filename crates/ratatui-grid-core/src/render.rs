//! Low-level buffer drawing helpers shared by the painter.

use crate::viewport::ViewportState;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use std::ops::Range;
use unicode_width::UnicodeWidthChar;
use unicode_width::UnicodeWidthStr;

pub fn render_scrollbar(area: Rect, buf: &mut Buffer, state: &ViewportState, style: Style) {
    buf.set_style(area, style);
    if area.height == 0 {
        return;
    }
    if state.content_h <= state.viewport_h as u32 || state.content_h == 0 {
        for dy in 0..area.height {
            buf.set_stringn(area.x, area.y + dy, " ", 1, style);
        }
        return;
    }

    let track_h = area.height as f64;
    let thumb_h = ((state.viewport_h as f64 / state.content_h as f64) * track_h)
        .round()
        .clamp(1.0, track_h) as u16;

    let max_y = state.max_y().max(1) as f64;
    let thumb_top = ((state.y as f64 / max_y) * (track_h - thumb_h as f64))
        .round()
        .clamp(0.0, (track_h - thumb_h as f64).max(0.0)) as u16;

    for dy in 0..area.height {
        let ch = if dy >= thumb_top && dy < thumb_top + thumb_h {
            "█"
        } else {
            " "
        };
        buf.set_stringn(area.x, area.y + dy, ch, 1, style);
    }
}

/// Draws `input` starting `start_col` display columns in, clipped to `max_cols`.
///
/// Wide characters cut by either edge are skipped rather than split.
pub fn render_str_clipped(
    x: u16,
    y: u16,
    start_col: u32,
    max_cols: u16,
    buf: &mut Buffer,
    input: &str,
    style: Style,
) {
    render_highlighted(x, y, start_col, max_cols, buf, input, &[], style, style);
}

/// Like [`render_str_clipped`], patching `highlight` onto the byte ranges in `highlights`.
#[allow(clippy::too_many_arguments)]
pub fn render_highlighted(
    x: u16,
    y: u16,
    start_col: u32,
    max_cols: u16,
    buf: &mut Buffer,
    input: &str,
    highlights: &[Range<usize>],
    style: Style,
    highlight: Style,
) {
    if max_cols == 0 {
        return;
    }

    let start_col = start_col as usize;
    let max_cols = max_cols as usize;
    let mut col = 0usize;
    let mut out_cols = 0usize;
    let mut dx = 0u16;
    let mut tmp = [0u8; 4];

    for (b, ch) in input.char_indices() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if w == 0 {
            continue;
        }
        if col < start_col {
            col += w;
            continue;
        }
        if out_cols + w > max_cols {
            return;
        }

        let ch_style = if highlights.iter().any(|r| r.contains(&b)) {
            style.patch(highlight)
        } else {
            style
        };
        let s = ch.encode_utf8(&mut tmp);
        if let Some(cell) = buf.cell_mut((x + dx, y)) {
            cell.set_style(ch_style);
            cell.set_symbol(s);
        }
        dx += 1;
        out_cols += 1;
        col += w;

        if w == 2 {
            if out_cols >= max_cols {
                return;
            }
            if let Some(cell) = buf.cell_mut((x + dx, y)) {
                cell.set_style(ch_style);
                cell.set_symbol("");
            }
            dx += 1;
            out_cols += 1;
        }
    }
}

pub fn slice_by_cols(input: &str, start_col: u32, max_cols: u16) -> String {
    if max_cols == 0 {
        return String::new();
    }

    let start_col = start_col as usize;
    let max_cols = max_cols as usize;
    let mut col = 0usize;
    let mut out_cols = 0usize;
    let mut out = String::new();

    for ch in input.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if w == 0 {
            continue;
        }
        if col < start_col {
            col += w;
            continue;
        }
        if out_cols + w > max_cols {
            break;
        }
        out.push(ch);
        col += w;
        out_cols += w;
    }

    out
}

/// Display columns to skip so `text` ends flush with a `width`-wide box. `0` if it overflows.
pub fn right_align_offset(text: &str, width: u16) -> u16 {
    (width as usize).saturating_sub(UnicodeWidthStr::width(text)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &Buffer, w: u16) -> String {
        (0..w)
            .map(|x| buf.cell((x, 0)).map(|c| c.symbol().to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn slice_by_cols_limits_width() {
        assert_eq!(slice_by_cols("abcdef", 0, 3), "abc");
        assert_eq!(slice_by_cols("abcdef", 2, 3), "cde");
        assert_eq!(slice_by_cols("你好", 1, 2), "好");
    }

    #[test]
    fn clipped_render_skips_leading_columns() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 4, 1));
        render_str_clipped(0, 0, 2, 4, &mut buf, "abcdef", Style::default());
        assert_eq!(row(&buf, 4), "cdef");
    }

    #[test]
    fn highlighted_ranges_get_patched_style() {
        use ratatui::style::Color;
        let mut buf = Buffer::empty(Rect::new(0, 0, 5, 1));
        let hl = Style::default().bg(Color::Yellow);
        render_highlighted(0, 0, 0, 5, &mut buf, "hello", &[1..3], Style::default(), hl);
        assert_eq!(buf.cell((0, 0)).map(|c| c.bg), Some(Color::Reset));
        assert_eq!(buf.cell((1, 0)).map(|c| c.bg), Some(Color::Yellow));
        assert_eq!(buf.cell((3, 0)).map(|c| c.bg), Some(Color::Reset));
    }

    #[test]
    fn right_align_offset_pads_short_text() {
        assert_eq!(right_align_offset("42", 5), 3);
        assert_eq!(right_align_offset("123456", 5), 0);
    }

    #[test]
    fn render_scrollbar_does_not_panic() {
        let mut state = ViewportState::default();
        state.set_viewport(10, 5);
        state.set_content(10, 50);
        let mut buf = Buffer::empty(Rect::new(0, 0, 1, 5));
        render_scrollbar(Rect::new(0, 0, 1, 5), &mut buf, &state, Style::default());
    }
}

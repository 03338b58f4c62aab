//! Scroll synchronisation across panes and scroll-driven render scheduling.
//!
//! The data pane is the source of truth. Header and footer follow it horizontally, the fixed
//! left/right panes follow it vertically. Every scroll produces a [`ScrollDecision`] telling the
//! grid whether to re-render now, later, or not at all.

use crate::debounce::Debouncer;
use crate::options::GridOptions;
use crate::viewport::ViewportState;
use ratatui::layout::Rect;
use tracing::debug;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pane {
    Header,
    Data,
    Footer,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollDecision {
    /// The move is too small to change what is materialized.
    Skip,
    Render,
    /// Deferred to a trailing render (legacy throttle).
    Throttled,
    /// The viewport is not laid out yet.
    Deferred,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrollPolicy {
    pub row_height: u32,
    pub full_width: bool,
    pub legacy: bool,
    pub throttle_ms: u64,
    pub min_viewport_height: u16,
    pub auto_scroll_margin: u16,
    pub auto_scroll_step: u32,
    pub auto_scroll_interval_ms: u64,
}

impl ScrollPolicy {
    pub fn from_options(options: &GridOptions) -> Self {
        Self {
            row_height: options.row_height.max(1),
            full_width: options.full_width,
            legacy: options.is_legacy(),
            throttle_ms: options.legacy_throttle_ms,
            min_viewport_height: options.min_viewport_height,
            auto_scroll_margin: options.auto_scroll_margin,
            auto_scroll_step: options.auto_scroll_step.max(1),
            auto_scroll_interval_ms: options.auto_scroll_interval_ms,
        }
    }
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self::from_options(&GridOptions::default())
    }
}

#[derive(Clone, Copy, Debug)]
struct AutoScroll {
    reference: Rect,
    pointer: (u16, u16),
    next_tick_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ScrollCoordinator {
    pub header: ViewportState,
    pub data: ViewportState,
    pub footer: ViewportState,
    pub left: ViewportState,
    pub right: ViewportState,
    policy: ScrollPolicy,
    last_render: Option<(u32, u32)>,
    last_render_ms: Option<u64>,
    /// Vertical extent `[top, bottom)` of the materialized rows.
    covered: Option<(u64, u64)>,
    trailing: Debouncer<(u32, u32)>,
    auto: Option<AutoScroll>,
}

impl Default for ScrollCoordinator {
    fn default() -> Self {
        Self::new(ScrollPolicy::default())
    }
}

impl ScrollCoordinator {
    pub fn new(policy: ScrollPolicy) -> Self {
        let trailing = Debouncer::new(policy.throttle_ms);
        Self {
            header: ViewportState::default(),
            data: ViewportState::default(),
            footer: ViewportState::default(),
            left: ViewportState::default(),
            right: ViewportState::default(),
            policy,
            last_render: None,
            last_render_ms: None,
            covered: None,
            trailing,
            auto: None,
        }
    }

    pub fn policy(&self) -> &ScrollPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: ScrollPolicy) {
        self.trailing.set_delay_ms(policy.throttle_ms);
        self.policy = policy;
        self.last_render = None;
    }

    pub fn pane(&self, pane: Pane) -> &ViewportState {
        match pane {
            Pane::Header => &self.header,
            Pane::Data => &self.data,
            Pane::Footer => &self.footer,
            Pane::Left => &self.left,
            Pane::Right => &self.right,
        }
    }

    pub fn offset(&self) -> (u32, u32) {
        (self.data.x, self.data.y)
    }

    /// Sets pane sizes. `center_w` is the scrolling data pane width; `left_w`/`right_w` the fixed
    /// panes.
    pub fn set_viewports(&mut self, center_w: u16, left_w: u16, right_w: u16, body_h: u16) {
        self.data.set_viewport(center_w, body_h);
        self.header.set_viewport(center_w, 1);
        self.footer.set_viewport(center_w, 1);
        self.left.set_viewport(left_w, body_h);
        self.right.set_viewport(right_w, body_h);
        self.mirror();
    }

    /// Sets content extents: center columns width, fixed pane widths and total row height.
    pub fn set_content(&mut self, center_w: u32, left_w: u32, right_w: u32, total_h: u64) {
        let total_h = total_h.min(u32::MAX as u64) as u32;
        self.data.set_content(center_w, total_h);
        self.header.set_content(center_w, 1);
        self.footer.set_content(center_w, 1);
        self.left.set_content(left_w, total_h);
        self.right.set_content(right_w, total_h);
        self.mirror();
    }

    /// The initial render waits while the body is implausibly small.
    pub fn should_defer(&self) -> bool {
        self.data.viewport_h < self.policy.min_viewport_height.max(1)
    }

    /// Handles a scroll originating in `pane`, mirroring it onto the other panes.
    pub fn on_scroll(&mut self, pane: Pane, x: u32, y: u32, now_ms: u64) -> ScrollDecision {
        match pane {
            Pane::Data => self.data.set_offset(x, y),
            Pane::Header | Pane::Footer => self.data.set_offset(x, self.data.y),
            Pane::Left | Pane::Right => self.data.set_offset(self.data.x, y),
        }
        self.mirror();
        self.decide(now_ms)
    }

    pub fn scroll_by(&mut self, dx: i32, dy: i32, now_ms: u64) -> ScrollDecision {
        self.data.scroll_x_by(dx);
        self.data.scroll_y_by(dy);
        self.mirror();
        self.decide(now_ms)
    }

    /// Re-applies the data offset after a programmatic change to `data`.
    pub fn settle(&mut self, now_ms: u64) -> ScrollDecision {
        self.data.clamp();
        self.mirror();
        self.decide(now_ms)
    }

    fn mirror(&mut self) {
        self.header.x = self.data.x;
        self.footer.x = self.data.x;
        self.header.clamp();
        self.footer.clamp();
        self.left.y = self.data.y;
        self.right.y = self.data.y;
        self.left.clamp();
        self.right.clamp();
    }

    fn needs_render(&self, (x, y): (u32, u32)) -> bool {
        let Some((lx, ly)) = self.last_render else {
            return true;
        };
        if let Some((top, bottom)) = self.covered
            && (u64::from(y) < top || u64::from(y) + u64::from(self.data.viewport_h) > bottom)
        {
            return true;
        }
        let dy = y.abs_diff(ly);
        let dx = x.abs_diff(lx);
        dy >= 2 * self.policy.row_height || (!self.policy.full_width && dx >= 1)
    }

    fn decide(&mut self, now_ms: u64) -> ScrollDecision {
        if self.should_defer() {
            debug!(target: "ratatui_grid::scroll", height = self.data.viewport_h, "render deferred");
            return ScrollDecision::Deferred;
        }
        let pos = self.offset();
        if !self.needs_render(pos) {
            return ScrollDecision::Skip;
        }
        if self.policy.legacy
            && let Some(last) = self.last_render_ms
            && now_ms.saturating_sub(last) < self.policy.throttle_ms
        {
            self.trailing.schedule_trailing(now_ms, pos);
            trace!(target: "ratatui_grid::scroll", x = pos.0, y = pos.1, "render throttled");
            return ScrollDecision::Throttled;
        }
        ScrollDecision::Render
    }

    /// Records that the grid rendered at the current offset.
    pub fn mark_rendered(&mut self, now_ms: u64) {
        self.last_render = Some(self.offset());
        self.last_render_ms = Some(now_ms);
    }

    /// Records the vertical extent the materialized rows cover. A scroll leaving it always
    /// renders, however small.
    pub fn set_covered(&mut self, covered: Option<(u64, u64)>) {
        self.covered = covered;
    }

    /// Forces the next scroll decision to render.
    pub fn invalidate(&mut self) {
        self.last_render = None;
    }

    pub fn has_trailing(&self) -> bool {
        self.trailing.is_pending()
    }

    /// Fires a due trailing render. A trailing render whose position was already rendered is
    /// dropped.
    pub fn poll(&mut self, now_ms: u64) -> ScrollDecision {
        let Some(scheduled) = self.trailing.poll(now_ms) else {
            return ScrollDecision::Skip;
        };
        let current = self.offset();
        if self.last_render == Some(current) {
            trace!(target: "ratatui_grid::scroll", "stale trailing render dropped");
            return ScrollDecision::Skip;
        }
        trace!(
            target: "ratatui_grid::scroll",
            scheduled_y = scheduled.1,
            y = current.1,
            "trailing render"
        );
        ScrollDecision::Render
    }

    /// Starts auto-scrolling against `reference` (the data pane on screen).
    pub fn begin_auto_scroll(&mut self, reference: Rect, pointer: (u16, u16), now_ms: u64) {
        self.auto = Some(AutoScroll {
            reference,
            pointer,
            next_tick_ms: now_ms.saturating_add(self.policy.auto_scroll_interval_ms),
        });
    }

    pub fn update_pointer(&mut self, x: u16, y: u16) {
        if let Some(a) = &mut self.auto {
            a.pointer = (x, y);
        }
    }

    pub fn end_auto_scroll(&mut self) {
        self.auto = None;
    }

    pub fn is_auto_scrolling(&self) -> bool {
        self.auto.is_some()
    }

    /// Horizontal auto-scroll speed for a pointer at `x`: negative towards the left edge,
    /// positive towards the right one, zero inside the reference rectangle or when idle.
    pub fn check_auto_scroll_x(&self, x: u16) -> i32 {
        let Some(a) = self.auto else {
            return 0;
        };
        edge_speed(
            x,
            a.reference.left(),
            a.reference.right(),
            self.policy.auto_scroll_margin,
            self.policy.auto_scroll_step,
        )
    }

    pub fn check_auto_scroll_y(&self, y: u16) -> i32 {
        let Some(a) = self.auto else {
            return 0;
        };
        edge_speed(
            y,
            a.reference.top(),
            a.reference.bottom(),
            self.policy.auto_scroll_margin,
            self.policy.row_height * self.policy.auto_scroll_step,
        )
    }

    /// Advances auto-scroll if its timer is due. Returns `None` when nothing scrolled.
    pub fn tick_auto_scroll(&mut self, now_ms: u64) -> Option<ScrollDecision> {
        let a = self.auto?;
        if now_ms < a.next_tick_ms {
            return None;
        }
        if let Some(auto) = &mut self.auto {
            auto.next_tick_ms = now_ms.saturating_add(self.policy.auto_scroll_interval_ms);
        }
        let dx = self.check_auto_scroll_x(a.pointer.0);
        let dy = self.check_auto_scroll_y(a.pointer.1);
        if dx == 0 && dy == 0 {
            return None;
        }
        let before = self.offset();
        self.data.scroll_x_by(dx);
        self.data.scroll_y_by(dy);
        self.mirror();
        if self.offset() == before {
            return None;
        }
        Some(self.decide(now_ms))
    }
}

fn edge_speed(pos: u16, start: u16, end: u16, margin: u16, step: u32) -> i32 {
    let step = step.min(i32::MAX as u32) as i32;
    if pos < start.saturating_add(margin) {
        -step
    } else if pos.saturating_add(margin) >= end {
        step
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(policy: ScrollPolicy) -> ScrollCoordinator {
        let mut c = ScrollCoordinator::new(policy);
        c.set_viewports(20, 5, 5, 10);
        c.set_content(200, 5, 5, 1_000);
        c
    }

    #[test]
    fn panes_follow_the_data_pane() {
        let mut c = coordinator(ScrollPolicy::default());
        c.on_scroll(Pane::Data, 30, 40, 0);
        assert_eq!(c.header.x, 30);
        assert_eq!(c.footer.x, 30);
        assert_eq!(c.left.y, 40);
        assert_eq!(c.right.y, 40);
        assert_eq!(c.header.y, 0);

        c.on_scroll(Pane::Header, 12, 999, 0);
        assert_eq!(c.offset(), (12, 40));
        c.on_scroll(Pane::Left, 999, 7, 0);
        assert_eq!(c.offset(), (12, 7));
    }

    #[test]
    fn small_vertical_moves_are_skipped() {
        let mut c = coordinator(ScrollPolicy {
            row_height: 2,
            ..ScrollPolicy::default()
        });
        assert_eq!(c.on_scroll(Pane::Data, 0, 10, 0), ScrollDecision::Render);
        c.mark_rendered(0);
        assert_eq!(c.on_scroll(Pane::Data, 0, 13, 1), ScrollDecision::Skip);
        assert_eq!(c.on_scroll(Pane::Data, 0, 14, 2), ScrollDecision::Render);
    }

    #[test]
    fn leaving_the_materialized_rows_always_renders() {
        let mut c = coordinator(ScrollPolicy::default());
        c.mark_rendered(0);
        c.set_covered(Some((0, 10)));
        assert_eq!(c.on_scroll(Pane::Data, 0, 1, 1), ScrollDecision::Render);

        c.set_covered(Some((0, 14)));
        assert_eq!(c.on_scroll(Pane::Data, 0, 1, 2), ScrollDecision::Skip);
    }

    #[test]
    fn horizontal_moves_matter_only_when_windowed() {
        let mut c = coordinator(ScrollPolicy::default());
        c.mark_rendered(0);
        assert_eq!(c.on_scroll(Pane::Data, 1, 0, 1), ScrollDecision::Render);

        let mut full = coordinator(ScrollPolicy {
            full_width: true,
            ..ScrollPolicy::default()
        });
        full.mark_rendered(0);
        assert_eq!(full.on_scroll(Pane::Data, 5, 0, 1), ScrollDecision::Skip);
    }

    #[test]
    fn legacy_throttle_schedules_one_trailing_render() {
        let mut c = coordinator(ScrollPolicy {
            legacy: true,
            throttle_ms: 40,
            ..ScrollPolicy::default()
        });
        assert_eq!(c.on_scroll(Pane::Data, 0, 10, 0), ScrollDecision::Render);
        c.mark_rendered(0);
        assert_eq!(c.on_scroll(Pane::Data, 0, 20, 10), ScrollDecision::Throttled);
        assert_eq!(c.on_scroll(Pane::Data, 0, 30, 20), ScrollDecision::Throttled);
        assert_eq!(c.poll(45), ScrollDecision::Skip);
        assert_eq!(c.poll(50), ScrollDecision::Render);
        c.mark_rendered(50);
        assert_eq!(c.offset().1, 30);
        assert!(!c.has_trailing());
    }

    #[test]
    fn trailing_render_at_rendered_position_is_dropped() {
        let mut c = coordinator(ScrollPolicy {
            legacy: true,
            throttle_ms: 40,
            ..ScrollPolicy::default()
        });
        c.mark_rendered(0);
        assert_eq!(c.on_scroll(Pane::Data, 0, 20, 10), ScrollDecision::Throttled);
        c.mark_rendered(15);
        assert_eq!(c.poll(60), ScrollDecision::Skip);
    }

    #[test]
    fn tiny_viewport_defers_render() {
        let mut c = ScrollCoordinator::new(ScrollPolicy {
            min_viewport_height: 3,
            ..ScrollPolicy::default()
        });
        c.set_viewports(20, 0, 0, 1);
        assert_eq!(c.on_scroll(Pane::Data, 0, 0, 0), ScrollDecision::Deferred);
        c.set_viewports(20, 0, 0, 8);
        assert_eq!(c.on_scroll(Pane::Data, 0, 0, 0), ScrollDecision::Render);
    }

    #[test]
    fn auto_scroll_speed_and_timer() {
        let mut c = coordinator(ScrollPolicy {
            auto_scroll_margin: 1,
            auto_scroll_step: 2,
            auto_scroll_interval_ms: 50,
            ..ScrollPolicy::default()
        });
        assert_eq!(c.check_auto_scroll_y(100), 0);

        let reference = Rect::new(10, 5, 20, 10);
        c.begin_auto_scroll(reference, (15, 14), 0);
        assert_eq!(c.check_auto_scroll_y(14), 2);
        assert_eq!(c.check_auto_scroll_y(5), -2);
        assert_eq!(c.check_auto_scroll_y(9), 0);
        assert_eq!(c.check_auto_scroll_x(40), 2);
        assert_eq!(c.check_auto_scroll_x(0), -2);

        assert_eq!(c.tick_auto_scroll(10), None);
        assert_eq!(c.tick_auto_scroll(50), Some(ScrollDecision::Render));
        assert_eq!(c.offset().1, 2);
        assert_eq!(c.tick_auto_scroll(60), None);

        c.end_auto_scroll();
        assert_eq!(c.check_auto_scroll_y(14), 0);
    }
}

/// Scroll offset and extents of one scrollable pane, in terminal cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportState {
    pub x: u32,
    pub y: u32,
    pub viewport_w: u16,
    pub viewport_h: u16,
    pub content_w: u32,
    pub content_h: u32,
}

impl ViewportState {
    pub fn set_viewport(&mut self, w: u16, h: u16) {
        self.viewport_w = w;
        self.viewport_h = h;
        self.clamp();
    }

    pub fn set_content(&mut self, w: u32, h: u32) {
        self.content_w = w;
        self.content_h = h;
        self.clamp();
    }

    pub fn clamp(&mut self) {
        let max_y = self.max_y();
        let max_x = self.max_x();
        self.y = self.y.min(max_y);
        self.x = self.x.min(max_x);
    }

    pub fn set_offset(&mut self, x: u32, y: u32) {
        self.x = x;
        self.y = y;
        self.clamp();
    }

    pub fn scroll_y_by(&mut self, delta: i32) {
        let next = self.y as i64 + delta as i64;
        self.y = next.clamp(0, self.max_y() as i64) as u32;
    }

    pub fn scroll_x_by(&mut self, delta: i32) {
        let next = self.x as i64 + delta as i64;
        self.x = next.clamp(0, self.max_x() as i64) as u32;
    }

    pub fn page_down(&mut self) {
        self.scroll_y_by(self.viewport_h.saturating_sub(1) as i32);
    }

    pub fn page_up(&mut self) {
        self.scroll_y_by(-(self.viewport_h.saturating_sub(1) as i32));
    }

    /// Scrolls the least amount that brings `[start, start + size)` into view vertically.
    pub fn reveal_y(&mut self, start: u32, size: u32) {
        let view = self.viewport_h as u32;
        if start < self.y {
            self.y = start;
        } else if start + size > self.y + view {
            self.y = (start + size).saturating_sub(view);
        }
        self.clamp();
    }

    /// Horizontal counterpart of [`reveal_y`](Self::reveal_y).
    pub fn reveal_x(&mut self, start: u32, size: u32) {
        let view = self.viewport_w as u32;
        if start < self.x {
            self.x = start;
        } else if start + size > self.x + view {
            self.x = (start + size).saturating_sub(view);
        }
        self.clamp();
    }

    pub fn max_y(&self) -> u32 {
        self.content_h.saturating_sub(self.viewport_h as u32)
    }

    pub fn max_x(&self) -> u32 {
        self.content_w.saturating_sub(self.viewport_w as u32)
    }
}

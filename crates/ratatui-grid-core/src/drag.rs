//! Pointer drag state machine for column/band reorder, row reorder and column resize.
//!
//! ```text
//! Idle -> Armed -> Dragging -> Idle (commit or cancel)
//!            \---> Resizing -> Idle
//!            \---> Idle (release before the threshold is a click)
//! ```
//!
//! The machine owns no grid data. Hit geometry is passed in as [`DragGeometry`] snapshots built
//! from what is currently painted, and commits are handed back to the caller as [`DragCommit`].

use crate::column::Region;
use crate::input::PointerKind;
use crate::options::DeviceClass;
use crate::options::GridOptions;
use crate::record::RowId;
use ratatui::layout::Rect;
use tracing::debug;
use tracing::trace;

/// What the pointer went down on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragSubject {
    Column { field: String, region: Region },
    /// All columns of a band, moved as one block.
    Band {
        name: String,
        fields: Vec<String>,
        region: Region,
    },
    Row { row: RowId },
    /// The resize handle on a header cell's right edge.
    ResizeHandle { field: String, width: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowDropPosition {
    Before,
    After,
    /// Nest under the target row (tree mode only).
    Into,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropTarget {
    /// Insert before `before` in the region, or at its end when `None`.
    Column {
        region: Region,
        before: Option<String>,
    },
    Row {
        row: RowId,
        position: RowDropPosition,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragCommit {
    MoveColumns {
        fields: Vec<String>,
        region: Region,
        before: Option<String>,
    },
    MoveRow {
        row: RowId,
        target: RowId,
        position: RowDropPosition,
    },
    Resize { field: String, width: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Armed {
        subject: DragSubject,
        origin: (u16, u16),
        pointer: PointerKind,
        /// The subject may be dragged; otherwise the press can only become a click.
        movable: bool,
    },
    Dragging {
        subject: DragSubject,
        origin: (u16, u16),
        current: (u16, u16),
        target: Option<DropTarget>,
    },
    Resizing {
        field: String,
        origin_x: u16,
        start_width: u32,
        width: u32,
    },
}

/// Result of feeding one pointer event to the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragEffect {
    Noop,
    Armed,
    Started,
    Moved(Option<DropTarget>),
    ResizePreview { field: String, width: u32 },
    /// Released before crossing the threshold.
    Click(DragSubject),
    Commit(DragCommit),
    Cancelled,
}

/// A header cell as painted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRect {
    pub field: String,
    pub band: Option<String>,
    pub region: Region,
    pub rect: Rect,
}

/// A data row as painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRect {
    pub row: RowId,
    pub rect: Rect,
}

/// Hit geometry captured from the last paint.
#[derive(Clone, Debug, Default)]
pub struct DragGeometry<'a> {
    pub header: &'a [ColumnRect],
    pub rows: &'a [RowRect],
    /// The data pane; row drops outside its vertical bounds are rejected.
    pub viewport: Rect,
    pub tree: bool,
    /// Rows nested under the dragged row; they never take its drop.
    pub nested: &'a [RowId],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragThresholds {
    pub mouse: u16,
    pub touch: u16,
    pub min_width: u32,
    pub device: DeviceClass,
}

impl DragThresholds {
    pub fn from_options(options: &GridOptions) -> Self {
        Self {
            mouse: options.mouse_drag_threshold,
            touch: options.touch_drag_threshold,
            min_width: options.min_column_width.max(1),
            device: options.device,
        }
    }

    /// Touch pointers and touch devices both use the touch threshold.
    pub fn for_pointer(&self, pointer: PointerKind) -> u16 {
        match (pointer, self.device) {
            (PointerKind::Touch, _) | (_, DeviceClass::Touch) => self.touch,
            _ => self.mouse,
        }
    }
}

impl Default for DragThresholds {
    fn default() -> Self {
        Self::from_options(&GridOptions::default())
    }
}

#[derive(Clone, Debug)]
pub struct DragMachine {
    state: DragState,
    thresholds: DragThresholds,
}

impl Default for DragMachine {
    fn default() -> Self {
        Self::new(DragThresholds::default())
    }
}

impl DragMachine {
    pub fn new(thresholds: DragThresholds) -> Self {
        Self {
            state: DragState::Idle,
            thresholds,
        }
    }

    pub fn set_thresholds(&mut self, thresholds: DragThresholds) {
        self.thresholds = thresholds;
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// In `Dragging` or `Resizing`: the pointer is captured.
    pub fn is_dragging(&self) -> bool {
        matches!(
            self.state,
            DragState::Dragging { .. } | DragState::Resizing { .. }
        )
    }

    pub fn target(&self) -> Option<&DropTarget> {
        match &self.state {
            DragState::Dragging { target, .. } => target.as_ref(),
            _ => None,
        }
    }

    pub fn subject(&self) -> Option<&DragSubject> {
        match &self.state {
            DragState::Armed { subject, .. } | DragState::Dragging { subject, .. } => {
                Some(subject)
            }
            _ => None,
        }
    }

    /// Pointer down on `subject`. Ignored unless idle.
    pub fn press(
        &mut self,
        subject: DragSubject,
        x: u16,
        y: u16,
        pointer: PointerKind,
        movable: bool,
    ) -> DragEffect {
        if self.is_active() {
            return DragEffect::Noop;
        }
        trace!(target: "ratatui_grid::drag", ?subject, x, y, "armed");
        self.state = DragState::Armed {
            subject,
            origin: (x, y),
            pointer,
            movable,
        };
        DragEffect::Armed
    }

    pub fn pointer_move(&mut self, x: u16, y: u16, geometry: &DragGeometry<'_>) -> DragEffect {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => DragEffect::Noop,
            DragState::Armed {
                subject: DragSubject::ResizeHandle { field, width },
                origin,
                movable,
                pointer,
            } => {
                if !movable {
                    self.state = DragState::Armed {
                        subject: DragSubject::ResizeHandle { field, width },
                        origin,
                        pointer,
                        movable,
                    };
                    return DragEffect::Noop;
                }
                let start_width = width;
                let width = resized(start_width, origin.0, x, self.thresholds.min_width);
                debug!(target: "ratatui_grid::drag", field = %field, "resize started");
                self.state = DragState::Resizing {
                    field: field.clone(),
                    origin_x: origin.0,
                    start_width,
                    width,
                };
                DragEffect::ResizePreview { field, width }
            }
            DragState::Armed {
                subject,
                origin,
                pointer,
                movable,
            } => {
                let threshold = self.thresholds.for_pointer(pointer);
                if !movable || !crossed_drag_threshold(origin, (x, y), threshold) {
                    self.state = DragState::Armed {
                        subject,
                        origin,
                        pointer,
                        movable,
                    };
                    return DragEffect::Noop;
                }
                let target = drop_target(&subject, x, y, geometry);
                debug!(target: "ratatui_grid::drag", ?subject, "drag started");
                self.state = DragState::Dragging {
                    subject,
                    origin,
                    current: (x, y),
                    target,
                };
                DragEffect::Started
            }
            DragState::Dragging {
                subject, origin, ..
            } => {
                let target = drop_target(&subject, x, y, geometry);
                self.state = DragState::Dragging {
                    subject,
                    origin,
                    current: (x, y),
                    target: target.clone(),
                };
                DragEffect::Moved(target)
            }
            DragState::Resizing {
                field,
                origin_x,
                start_width,
                ..
            } => {
                let width = resized(start_width, origin_x, x, self.thresholds.min_width);
                self.state = DragState::Resizing {
                    field: field.clone(),
                    origin_x,
                    start_width,
                    width,
                };
                DragEffect::ResizePreview { field, width }
            }
        }
    }

    /// Pointer up. `veto` sees the proposed commit and may reject it.
    pub fn release(
        &mut self,
        x: u16,
        y: u16,
        geometry: &DragGeometry<'_>,
        veto: &mut dyn FnMut(&DragCommit) -> bool,
    ) -> DragEffect {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => DragEffect::Noop,
            DragState::Armed { subject, .. } => DragEffect::Click(subject),
            DragState::Dragging { subject, .. } => {
                let Some(target) = drop_target(&subject, x, y, geometry) else {
                    debug!(target: "ratatui_grid::drag", "drop outside any target");
                    return DragEffect::Cancelled;
                };
                let Some(commit) = commit_for(subject, target) else {
                    return DragEffect::Cancelled;
                };
                if !veto(&commit) {
                    debug!(target: "ratatui_grid::drag", ?commit, "drop vetoed");
                    return DragEffect::Cancelled;
                }
                debug!(target: "ratatui_grid::drag", ?commit, "drop committed");
                DragEffect::Commit(commit)
            }
            DragState::Resizing {
                field,
                origin_x,
                start_width,
                ..
            } => {
                let width = resized(start_width, origin_x, x, self.thresholds.min_width);
                let commit = DragCommit::Resize { field, width };
                if !veto(&commit) {
                    return DragEffect::Cancelled;
                }
                debug!(target: "ratatui_grid::drag", ?commit, "resize committed");
                DragEffect::Commit(commit)
            }
        }
    }

    pub fn cancel(&mut self) -> DragEffect {
        if !self.is_active() {
            return DragEffect::Noop;
        }
        self.state = DragState::Idle;
        debug!(target: "ratatui_grid::drag", "drag cancelled");
        DragEffect::Cancelled
    }
}

fn crossed_drag_threshold(origin: (u16, u16), current: (u16, u16), threshold: u16) -> bool {
    let dx = i64::from(current.0) - i64::from(origin.0);
    let dy = i64::from(current.1) - i64::from(origin.1);
    let threshold = i64::from(threshold);
    dx * dx + dy * dy > threshold * threshold
}

fn resized(start_width: u32, origin_x: u16, x: u16, min_width: u32) -> u32 {
    let delta = i64::from(x) - i64::from(origin_x);
    let width = (i64::from(start_width) + delta).max(i64::from(min_width));
    width.min(i64::from(u32::MAX)) as u32
}

fn commit_for(subject: DragSubject, target: DropTarget) -> Option<DragCommit> {
    match (subject, target) {
        (DragSubject::Column { field, .. }, DropTarget::Column { region, before }) => {
            Some(DragCommit::MoveColumns {
                fields: vec![field],
                region,
                before,
            })
        }
        (DragSubject::Band { fields, .. }, DropTarget::Column { region, before }) => {
            Some(DragCommit::MoveColumns {
                fields,
                region,
                before,
            })
        }
        (DragSubject::Row { row }, DropTarget::Row { row: target, position }) => {
            Some(DragCommit::MoveRow {
                row,
                target,
                position,
            })
        }
        _ => None,
    }
}

fn drop_target(subject: &DragSubject, x: u16, y: u16, geometry: &DragGeometry<'_>) -> Option<DropTarget> {
    match subject {
        DragSubject::Column { field, region } => {
            let band = geometry
                .header
                .iter()
                .find(|c| &c.field == field)
                .and_then(|c| c.band.clone());
            column_drop(
                std::slice::from_ref(field),
                band.as_deref(),
                *region,
                x,
                geometry,
            )
        }
        DragSubject::Band { fields, region, .. } => column_drop(fields, None, *region, x, geometry),
        DragSubject::Row { row } => row_drop(*row, x, y, geometry),
        DragSubject::ResizeHandle { .. } => None,
    }
}

/// A contiguous run of header cells that moves as one unit.
struct Block<'a> {
    first: &'a str,
    left: u16,
    right: u16,
}

/// Drop slot among the rendered blocks of `region`. A column inside a band only moves within its
/// band; free columns and bands move between blocks.
fn column_drop(
    moving: &[String],
    within_band: Option<&str>,
    region: Region,
    x: u16,
    geometry: &DragGeometry<'_>,
) -> Option<DropTarget> {
    let candidates: Vec<&ColumnRect> = geometry
        .header
        .iter()
        .filter(|c| c.region == region && !moving.contains(&c.field))
        .filter(|c| within_band.is_none_or(|b| c.band.as_deref() == Some(b)))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mut blocks: Vec<Block<'_>> = Vec::new();
    let mut prev_band: Option<&str> = None;
    for c in &candidates {
        let band = c.band.as_deref();
        match blocks.last_mut() {
            Some(b) if within_band.is_none() && band.is_some() && band == prev_band => {
                b.right = c.rect.right();
            }
            _ => blocks.push(Block {
                first: &c.field,
                left: c.rect.left(),
                right: c.rect.right(),
            }),
        }
        prev_band = band;
    }

    let before = blocks
        .iter()
        .find(|b| x < b.left + (b.right - b.left) / 2)
        .map(|b| b.first.to_owned());
    // Dropping a band member past the band's end keeps it inside the band.
    let before = match (before, within_band) {
        (None, Some(band)) => geometry
            .header
            .iter()
            .filter(|c| c.region == region)
            .skip_while(|c| c.band.as_deref() != Some(band))
            .find(|c| c.band.as_deref() != Some(band))
            .map(|c| c.field.clone()),
        (before, _) => before,
    };
    Some(DropTarget::Column { region, before })
}

fn row_drop(moving: RowId, _x: u16, y: u16, geometry: &DragGeometry<'_>) -> Option<DropTarget> {
    let vp = geometry.viewport;
    if y < vp.top() || y >= vp.bottom() {
        return None;
    }
    let hit = geometry
        .rows
        .iter()
        .find(|r| y >= r.rect.top() && y < r.rect.bottom())?;
    if hit.row == moving || geometry.nested.contains(&hit.row) {
        return None;
    }
    let offset = y - hit.rect.top();
    let height = hit.rect.height.max(1);
    let position = if geometry.tree {
        // Thirds; rows one cell high are always `Into`.
        if height >= 3 && offset < height / 3 {
            RowDropPosition::Before
        } else if height >= 3 && offset >= height - height / 3 {
            RowDropPosition::After
        } else {
            RowDropPosition::Into
        }
    } else if offset < height.div_ceil(2) {
        RowDropPosition::Before
    } else {
        RowDropPosition::After
    };
    Some(DropTarget::Row {
        row: hit.row,
        position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<ColumnRect> {
        let mk = |field: &str, band: Option<&str>, x: u16, w: u16| ColumnRect {
            field: field.into(),
            band: band.map(Into::into),
            region: Region::Center,
            rect: Rect::new(x, 0, w, 1),
        };
        vec![
            mk("a", None, 0, 10),
            mk("b", Some("addr"), 10, 10),
            mk("c", Some("addr"), 20, 10),
            mk("d", None, 30, 10),
        ]
    }

    fn rows() -> Vec<RowRect> {
        (0..5)
            .map(|i| RowRect {
                row: RowId(i),
                rect: Rect::new(0, 1 + i as u16 * 2, 40, 2),
            })
            .collect()
    }

    fn column(field: &str) -> DragSubject {
        DragSubject::Column {
            field: field.into(),
            region: Region::Center,
        }
    }

    fn accept(_: &DragCommit) -> bool {
        true
    }

    #[test]
    fn press_and_release_below_threshold_is_a_click() {
        let header = header();
        let geometry = DragGeometry {
            header: &header,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        assert_eq!(m.press(column("a"), 5, 0, PointerKind::Mouse, true), DragEffect::Armed);
        assert_eq!(m.pointer_move(9, 0, &geometry), DragEffect::Noop);
        assert_eq!(
            m.release(9, 0, &geometry, &mut accept),
            DragEffect::Click(column("a"))
        );
        assert!(!m.is_active());
    }

    #[test]
    fn touch_needs_a_longer_move() {
        let header = header();
        let geometry = DragGeometry {
            header: &header,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        m.press(column("a"), 0, 0, PointerKind::Touch, true);
        assert_eq!(m.pointer_move(7, 0, &geometry), DragEffect::Noop);
        assert_eq!(m.pointer_move(9, 0, &geometry), DragEffect::Noop);
        assert_eq!(m.pointer_move(10, 0, &geometry), DragEffect::Started);
        assert!(m.is_dragging());
    }

    #[test]
    fn touch_devices_use_the_touch_threshold_for_mice() {
        let header = header();
        let geometry = DragGeometry {
            header: &header,
            ..DragGeometry::default()
        };
        let options = GridOptions {
            device: DeviceClass::Touch,
            ..GridOptions::default()
        };
        let mut m = DragMachine::new(DragThresholds::from_options(&options));
        m.press(column("a"), 0, 0, PointerKind::Mouse, true);
        assert_eq!(m.pointer_move(7, 0, &geometry), DragEffect::Noop);
        assert!(matches!(m.state(), DragState::Armed { .. }));
        assert_eq!(m.pointer_move(10, 0, &geometry), DragEffect::Started);
    }

    #[test]
    fn a_move_of_exactly_the_threshold_is_still_a_press() {
        let header = header();
        let geometry = DragGeometry {
            header: &header,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        m.press(column("a"), 0, 0, PointerKind::Mouse, true);
        assert_eq!(m.pointer_move(6, 0, &geometry), DragEffect::Noop);
        assert_eq!(m.pointer_move(7, 0, &geometry), DragEffect::Started);
    }

    #[test]
    fn column_drag_commits_before_the_block_under_the_pointer() {
        let header = header();
        let geometry = DragGeometry {
            header: &header,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        m.press(column("a"), 5, 0, PointerKind::Mouse, true);
        m.pointer_move(32, 0, &geometry);
        assert_eq!(
            m.target(),
            Some(&DropTarget::Column {
                region: Region::Center,
                before: Some("d".into())
            })
        );
        assert_eq!(
            m.release(38, 0, &geometry, &mut accept),
            DragEffect::Commit(DragCommit::MoveColumns {
                fields: vec!["a".into()],
                region: Region::Center,
                before: None,
            })
        );
    }

    #[test]
    fn banded_columns_move_as_a_block() {
        let header = header();
        let geometry = DragGeometry {
            header: &header,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        let band = DragSubject::Band {
            name: "addr".into(),
            fields: vec!["b".into(), "c".into()],
            region: Region::Center,
        };
        m.press(band, 15, 0, PointerKind::Mouse, true);
        m.pointer_move(2, 0, &geometry);
        assert_eq!(
            m.release(2, 0, &geometry, &mut accept),
            DragEffect::Commit(DragCommit::MoveColumns {
                fields: vec!["b".into(), "c".into()],
                region: Region::Center,
                before: Some("a".into()),
            })
        );

        // A free column dropped over the band lands before the whole band.
        m.press(column("d"), 35, 0, PointerKind::Mouse, true);
        m.pointer_move(15, 0, &geometry);
        assert_eq!(
            m.target(),
            Some(&DropTarget::Column {
                region: Region::Center,
                before: Some("b".into())
            })
        );
    }

    #[test]
    fn row_drop_positions_and_viewport_rejection() {
        let rows = rows();
        let viewport = Rect::new(0, 1, 40, 10);
        let flat = DragGeometry {
            rows: &rows,
            viewport,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        m.press(DragSubject::Row { row: RowId(0) }, 1, 1, PointerKind::Mouse, true);
        assert_eq!(m.pointer_move(1, 8, &flat), DragEffect::Started);
        assert_eq!(
            m.target(),
            Some(&DropTarget::Row {
                row: RowId(3),
                position: RowDropPosition::After
            })
        );
        assert_eq!(
            m.pointer_move(1, 7, &flat),
            DragEffect::Moved(Some(DropTarget::Row {
                row: RowId(3),
                position: RowDropPosition::Before
            }))
        );
        assert_eq!(m.pointer_move(1, 20, &flat), DragEffect::Moved(None));
        assert_eq!(m.release(1, 20, &flat, &mut accept), DragEffect::Cancelled);

        let tree = DragGeometry { tree: true, ..flat };
        m.press(DragSubject::Row { row: RowId(0) }, 1, 1, PointerKind::Mouse, true);
        m.pointer_move(1, 8, &tree);
        assert_eq!(
            m.release(1, 8, &tree, &mut accept),
            DragEffect::Commit(DragCommit::MoveRow {
                row: RowId(0),
                target: RowId(3),
                position: RowDropPosition::Into,
            })
        );
    }

    #[test]
    fn nested_rows_refuse_the_drop() {
        let rows = rows();
        let nested = [RowId(3)];
        let tree = DragGeometry {
            rows: &rows,
            viewport: Rect::new(0, 1, 40, 10),
            tree: true,
            nested: &nested,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        m.press(DragSubject::Row { row: RowId(0) }, 1, 1, PointerKind::Mouse, true);
        assert_eq!(m.pointer_move(1, 8, &tree), DragEffect::Started);
        assert_eq!(m.target(), None);
        assert_eq!(m.release(1, 8, &tree, &mut accept), DragEffect::Cancelled);
    }

    #[test]
    fn vetoed_drop_changes_nothing() {
        let rows = rows();
        let geometry = DragGeometry {
            rows: &rows,
            viewport: Rect::new(0, 1, 40, 10),
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        m.press(DragSubject::Row { row: RowId(0) }, 1, 1, PointerKind::Mouse, true);
        m.pointer_move(1, 9, &geometry);
        let mut seen = None;
        let effect = m.release(1, 9, &geometry, &mut |c: &DragCommit| {
            seen = Some(c.clone());
            false
        });
        assert_eq!(effect, DragEffect::Cancelled);
        assert!(seen.is_some());
        assert!(!m.is_active());
    }

    #[test]
    fn resize_clamps_to_minimum_width() {
        let geometry = DragGeometry::default();
        let mut m = DragMachine::default();
        let handle = DragSubject::ResizeHandle {
            field: "a".into(),
            width: 10,
        };
        m.press(handle, 9, 0, PointerKind::Mouse, true);
        assert_eq!(
            m.pointer_move(13, 0, &geometry),
            DragEffect::ResizePreview {
                field: "a".into(),
                width: 14
            }
        );
        assert_eq!(
            m.release(0, 0, &geometry, &mut accept),
            DragEffect::Commit(DragCommit::Resize {
                field: "a".into(),
                width: 3
            })
        );
    }

    #[test]
    fn pinned_columns_are_not_movable() {
        let header = header();
        let geometry = DragGeometry {
            header: &header,
            ..DragGeometry::default()
        };
        let mut m = DragMachine::default();
        m.press(column("a"), 0, 0, PointerKind::Mouse, false);
        assert_eq!(m.pointer_move(30, 0, &geometry), DragEffect::Noop);
        assert!(matches!(
            m.release(30, 0, &geometry, &mut accept),
            DragEffect::Click(_)
        ));
    }
}

//! Capability traits shared by scrollable, draggable and filterable controls, plus scoped
//! input captures.

use crate::error::GridResult;
use crate::query::FilterSpec;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

pub trait Scrollable {
    fn scroll_offset(&self) -> (u32, u32);

    /// Scrolls the data pane to `(x, y)` and returns whether a re-render is due.
    fn scroll_to(&mut self, x: u32, y: u32, now_ms: u64) -> bool;
}

pub trait Draggable {
    fn is_dragging(&self) -> bool;

    /// Aborts an active gesture without committing it.
    fn cancel_drag(&mut self);
}

pub trait Filterable {
    fn filters(&self) -> &[FilterSpec];

    fn apply_filter(&mut self, filter: FilterSpec) -> GridResult<()>;

    fn clear_filters(&mut self);
}

/// Input streams a control can capture while it is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capture {
    /// Pointer events anywhere on screen (an active drag).
    Pointer,
    /// Keyboard events (an open popup).
    Keyboard,
}

/// Live capture registrations, counted per kind.
#[derive(Debug, Default)]
pub struct CaptureSet {
    counts: BTreeMap<Capture, usize>,
}

impl CaptureSet {
    pub fn is_active(&self, capture: Capture) -> bool {
        self.counts.get(&capture).is_some_and(|&n| n > 0)
    }

    fn acquire(&mut self, capture: Capture) {
        *self.counts.entry(capture).or_default() += 1;
    }

    fn release(&mut self, capture: Capture) {
        if let Some(n) = self.counts.get_mut(&capture) {
            *n = n.saturating_sub(1);
        }
    }
}

/// Shared handle to a [`CaptureSet`].
pub type Captures = Rc<RefCell<CaptureSet>>;

/// Holds captures for as long as it lives; dropping it releases them.
#[derive(Debug)]
pub struct ScopedListeners {
    set: Captures,
    held: Vec<Capture>,
}

impl ScopedListeners {
    pub fn acquire(set: &Captures, captures: &[Capture]) -> Self {
        {
            let mut s = set.borrow_mut();
            for &c in captures {
                s.acquire(c);
            }
        }
        Self {
            set: Rc::clone(set),
            held: captures.to_vec(),
        }
    }

    pub fn holds(&self, capture: Capture) -> bool {
        self.held.contains(&capture)
    }
}

impl Drop for ScopedListeners {
    fn drop(&mut self) {
        let mut s = self.set.borrow_mut();
        for &c in &self.held {
            s.release(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let set: Captures = Rc::default();
        let a = ScopedListeners::acquire(&set, &[Capture::Pointer]);
        let b = ScopedListeners::acquire(&set, &[Capture::Pointer, Capture::Keyboard]);
        drop(a);
        assert!(set.borrow().is_active(Capture::Pointer));
        drop(b);
        assert!(!set.borrow().is_active(Capture::Pointer));
        assert!(!set.borrow().is_active(Capture::Keyboard));
    }
}

//! Layer ordering for popups drawn over the grid.

use tracing::debug;

/// Handle to one acquired layer. Not `Clone`: a layer is released exactly once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct LayerToken(u64);

impl LayerToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Hands out layer tokens in stacking order and reclaims them.
#[derive(Debug, Default)]
pub struct StackingContext {
    next: u64,
    layers: Vec<u64>,
}

impl StackingContext {
    /// A new topmost layer.
    pub fn acquire(&mut self) -> LayerToken {
        self.next += 1;
        self.layers.push(self.next);
        debug!(target: "ratatui_grid::stacking", layer = self.next, depth = self.layers.len(), "layer acquired");
        LayerToken(self.next)
    }

    pub fn release(&mut self, token: LayerToken) {
        self.layers.retain(|&l| l != token.0);
        debug!(target: "ratatui_grid::stacking", layer = token.0, depth = self.layers.len(), "layer released");
    }

    /// Stacking position of `token`, `0` being the lowest live layer.
    pub fn z_of(&self, token: &LayerToken) -> Option<usize> {
        self.layers.iter().position(|&l| l == token.0)
    }

    pub fn is_top(&self, token: &LayerToken) -> bool {
        self.layers.last() == Some(&token.0)
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releasing_a_middle_layer_compacts_order() {
        let mut s = StackingContext::default();
        let a = s.acquire();
        let b = s.acquire();
        let c = s.acquire();
        assert!(s.is_top(&c));
        s.release(b);
        assert_eq!(s.z_of(&a), Some(0));
        assert_eq!(s.z_of(&c), Some(1));
        s.release(c);
        assert!(s.is_top(&a));
        assert_eq!(s.depth(), 1);
    }
}

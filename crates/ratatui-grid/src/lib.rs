//! `ratatui-grid` is the batteries-included entry point for the virtualized data grid.
//!
//! It re-exports [`ratatui_grid_core`]; enable the `crossterm` feature for
//! [`crossterm_input::input_event_from_crossterm`].
//!
//! ```no_run
//! use ratatui_grid::Column;
//! use ratatui_grid::ColumnType;
//! use ratatui_grid::Grid;
//! use ratatui_grid::Record;
//!
//! let mut grid = Grid::new();
//! grid.set_columns(vec![
//!     Column::new("name", "Name", 16),
//!     Column::new("qty", "Qty", 6).with_type(ColumnType::Number),
//! ]);
//! grid.set_records(vec![Record::new(1).with("name", "bolts").with("qty", 40)]);
//! ```

pub use ratatui_grid_core::*;

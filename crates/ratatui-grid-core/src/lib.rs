//! `ratatui-grid-core` is a virtualized, editable data-grid engine for terminal UIs.
//!
//! The engine keeps a retained set of materialized rows for the visible window only and brings
//! them up to date incrementally: a value change rewrites one cell, a column reorder moves cells,
//! a selection change only touches cell state. Painting reads the retained rows directly.
//!
//! ## Design goals
//!
//! - Event-loop agnostic: you feed input events and a clock (`now_ms`), and call
//!   [`grid::Grid::render`] when you draw.
//! - No async runtime: remote data is modelled as request/response values the app ferries.
//! - Cell-level failures never abort a render; they are logged through `tracing` and the cell is
//!   left empty.
//!
//! ## Pipeline
//!
//! - [`query::QueryEngine`] turns records plus sort/filter/group/search into a [`query::ResultSet`].
//! - [`render_calc::RowRenderCalculator`] picks the row window for the scroll position.
//! - [`materializer::RowView`] builds cells for a row; [`diff`] decides the cheapest patch.
//! - [`scroll::ScrollCoordinator`] syncs panes and decides when scrolling needs a render.
//! - [`drag::DragMachine`] turns pointer gestures into column, band, row and resize commits.
//!
//! Most apps only need [`grid::Grid`], which owns all of the above.

pub mod error;
pub mod theme;

#[cfg(feature = "crossterm")]
pub mod crossterm_input;

pub mod input;
pub mod keymap;
pub mod render;
pub mod viewport;

pub mod column;
pub mod query;
pub mod record;
pub mod source;
pub mod summary;
pub mod value;

pub mod cell;
pub mod diff;
pub mod editor;
pub mod materializer;
pub mod render_calc;
pub mod surface;

pub mod capability;
pub mod debounce;
pub mod drag;
pub mod navigation;
pub mod scroll;
pub mod selection;
pub mod stacking;

pub mod grid;
pub mod options;
pub mod paint;

pub use column::Column;
pub use column::ColumnType;
pub use column::Region;
pub use error::GridError;
pub use error::GridResult;
pub use grid::Grid;
pub use grid::GridAction;
pub use options::GridOptions;
pub use record::Record;
pub use record::RowId;
pub use value::Value;

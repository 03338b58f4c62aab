use tracing::debug;

/// Semantic type of a column; drives formatting and the cell kind chosen at render time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Number,
    DateTime,
    Boolean,
    Checkbox,
    Reference,
    /// A column rendered by a named custom cell component.
    Custom(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnFlags {
    pub resizable: bool,
    pub reorderable: bool,
    pub sortable: bool,
}

impl Default for ColumnFlags {
    fn default() -> Self {
        Self {
            resizable: true,
            reorderable: true,
            sortable: true,
        }
    }
}

/// Which horizontal region of the grid a column is pinned to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Region {
    Left,
    #[default]
    Center,
    Right,
}

/// Column definition.
///
/// Identity is the field name. Only `width` (resize) and the position in the grid's column list
/// (reorder) change at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub field: String,
    pub caption: String,
    pub width: u32,
    pub column_type: ColumnType,
    pub format: Option<String>,
    pub flags: ColumnFlags,
    pub region: Region,
    /// Columns sharing a band are dragged as one block.
    pub band: Option<String>,
    /// Name of a custom cell component registered in the grid's component registry.
    pub cell_component: Option<String>,
    /// Name of an editor registered in the grid's component registry.
    pub editor: Option<String>,
}

impl Column {
    pub fn new(field: impl Into<String>, caption: impl Into<String>, width: u32) -> Self {
        Self {
            field: field.into(),
            caption: caption.into(),
            width,
            column_type: ColumnType::String,
            format: None,
            flags: ColumnFlags::default(),
            region: Region::Center,
            band: None,
            cell_component: None,
            editor: None,
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        if let ColumnType::Custom(name) = &column_type {
            self.cell_component.get_or_insert_with(|| name.clone());
        }
        self.column_type = column_type;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn pinned(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn in_band(mut self, band: impl Into<String>) -> Self {
        self.band = Some(band.into());
        self
    }

    pub fn with_cell_component(mut self, name: impl Into<String>) -> Self {
        self.cell_component = Some(name.into());
        self
    }

    pub fn with_editor(mut self, name: impl Into<String>) -> Self {
        self.editor = Some(name.into());
        self
    }
}

/// The ordered columns of one region plus their aggregate width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layout {
    pub region: Region,
    columns: Vec<Column>,
    width: u32,
    /// Display index of the first column across all regions (left, center, right).
    first_index: usize,
}

impl Layout {
    pub fn new(region: Region, columns: Vec<Column>, first_index: usize) -> Self {
        let width = columns.iter().map(|c| c.width).sum();
        Self {
            region,
            columns,
            width,
            first_index,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn first_index(&self) -> usize {
        self.first_index
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    /// Left edge of column `index`, relative to the region.
    pub fn offset_of(&self, index: usize) -> u32 {
        self.columns.iter().take(index).map(|c| c.width).sum()
    }

    /// Index of the column covering region-relative `x`.
    pub fn column_at(&self, x: u32) -> Option<usize> {
        let mut left = 0u32;
        for (i, c) in self.columns.iter().enumerate() {
            if x >= left && x < left + c.width {
                return Some(i);
            }
            left += c.width;
        }
        None
    }

    /// Total width of columns in `range`.
    pub fn span_width(&self, range: std::ops::Range<usize>) -> u32 {
        self.columns
            .get(range)
            .map(|cols| cols.iter().map(|c| c.width).sum())
            .unwrap_or(0)
    }
}

/// Left-fixed, scrolling center and right-fixed layouts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layouts {
    pub left: Layout,
    pub center: Layout,
    pub right: Layout,
}

impl Layouts {
    /// Splits `columns` by region, keeping their relative order.
    pub fn from_columns(columns: &[Column]) -> Self {
        let pick = |region: Region| -> Vec<Column> {
            columns
                .iter()
                .filter(|c| c.region == region)
                .cloned()
                .collect()
        };
        let left = pick(Region::Left);
        let center = pick(Region::Center);
        let right = pick(Region::Right);

        let left_len = left.len();
        let center_len = center.len();
        let layouts = Self {
            left: Layout::new(Region::Left, left, 0),
            center: Layout::new(Region::Center, center, left_len),
            right: Layout::new(Region::Right, right, left_len + center_len),
        };
        debug!(
            target: "ratatui_grid::layout",
            left = layouts.left.width(),
            center = layouts.center.width(),
            right = layouts.right.width(),
            "layouts recomputed"
        );
        layouts
    }

    pub fn get(&self, region: Region) -> &Layout {
        match region {
            Region::Left => &self.left,
            Region::Center => &self.center,
            Region::Right => &self.right,
        }
    }

    /// All columns in display order.
    pub fn display_columns(&self) -> impl Iterator<Item = &Column> {
        self.left
            .columns()
            .iter()
            .chain(self.center.columns())
            .chain(self.right.columns())
    }

    pub fn column_count(&self) -> usize {
        self.left.len() + self.center.len() + self.right.len()
    }

    /// Region and region-local index of a display index.
    pub fn locate(&self, display_index: usize) -> Option<(Region, usize)> {
        [&self.left, &self.center, &self.right]
            .into_iter()
            .find(|l| display_index >= l.first_index() && display_index < l.first_index() + l.len())
            .map(|l| (l.region, display_index - l.first_index()))
    }

    pub fn display_index(&self, field: &str) -> Option<usize> {
        self.display_columns().position(|c| c.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<Column> {
        vec![
            Column::new("a", "A", 5),
            Column::new("id", "Id", 4).pinned(Region::Left),
            Column::new("b", "B", 7),
            Column::new("total", "Total", 6).pinned(Region::Right),
        ]
    }

    #[test]
    fn layout_width_is_sum_of_columns() {
        let l = Layouts::from_columns(&cols());
        assert_eq!(l.left.width(), 4);
        assert_eq!(l.center.width(), 12);
        assert_eq!(l.right.width(), 6);
        assert_eq!(l.center.offset_of(1), 5);
        assert_eq!(l.center.column_at(5), Some(1));
        assert_eq!(l.center.column_at(12), None);
    }

    #[test]
    fn display_order_is_left_center_right() {
        let l = Layouts::from_columns(&cols());
        let fields: Vec<&str> = l.display_columns().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["id", "a", "b", "total"]);
        assert_eq!(l.locate(2), Some((Region::Center, 1)));
        assert_eq!(l.locate(3), Some((Region::Right, 0)));
        assert_eq!(l.display_index("total"), Some(3));
    }
}

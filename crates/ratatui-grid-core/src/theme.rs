use ratatui::style::Style;

/// Base palette the grid patches its option styles onto.
#[derive(Clone, Debug)]
pub struct Theme {
    pub text_primary: Style,
    pub text_muted: Style,
    pub accent: Style,
    pub danger: Style,
    pub highlight: Style,
    /// One style per selection level, index 0 being a single covering range.
    pub selection: [Style; 5],
}

impl Default for Theme {
    fn default() -> Self {
        use ratatui::style::Color;
        use ratatui::style::Stylize;

        Self {
            text_primary: Style::default(),
            text_muted: Style::default().dark_gray(),
            accent: Style::default().cyan(),
            danger: Style::default().red(),
            highlight: Style::default().black().on_yellow(),
            selection: [
                Style::default().bg(Color::Indexed(237)),
                Style::default().bg(Color::Indexed(239)),
                Style::default().bg(Color::Indexed(241)),
                Style::default().bg(Color::Indexed(243)),
                Style::default().bg(Color::Indexed(245)),
            ],
        }
    }
}

impl Theme {
    /// Style for a cell covered by `level` selection ranges.
    pub fn selection_style(&self, level: u8) -> Option<Style> {
        let i = usize::from(level).checked_sub(1)?;
        self.selection.get(i.min(self.selection.len() - 1)).copied()
    }
}

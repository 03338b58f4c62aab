use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub keys: Vec<KeyEvent>,
    pub help_key: String,
    pub help_desc: String,
}

impl Binding {
    pub fn new(
        help_key: impl Into<String>,
        help_desc: impl Into<String>,
        keys: Vec<KeyEvent>,
    ) -> Self {
        Self {
            keys,
            help_key: help_key.into(),
            help_desc: help_desc.into(),
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.keys.iter().any(|k| key_event_matches(k, event))
    }
}

pub fn key_event_matches(pattern: &KeyEvent, event: &KeyEvent) -> bool {
    pattern.code == event.code && modifiers_match(pattern.modifiers, event.modifiers)
}

/// Like [`key_event_matches`] but ignores shift, which extends selections.
pub fn key_event_matches_extend(pattern: &KeyEvent, event: &KeyEvent) -> bool {
    pattern.code == event.code
        && pattern.modifiers.ctrl == event.modifiers.ctrl
        && pattern.modifiers.alt == event.modifiers.alt
}

fn modifiers_match(pattern: KeyModifiers, event: KeyModifiers) -> bool {
    pattern.shift == event.shift && pattern.ctrl == event.ctrl && pattern.alt == event.alt
}

pub fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code)
}

pub fn key_char(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c))
}

pub fn key_ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c)).with_modifiers(KeyModifiers::ctrl())
}

pub fn key_ctrl_code(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code).with_modifiers(KeyModifiers::ctrl())
}

/// Grid key bindings. Each action accepts any of its listed keys.
#[derive(Clone, Debug)]
pub struct GridBindings {
    pub up: Binding,
    pub down: Binding,
    pub left: Binding,
    pub right: Binding,
    pub page_up: Binding,
    pub page_down: Binding,
    pub row_start: Binding,
    pub row_end: Binding,
    pub grid_start: Binding,
    pub grid_end: Binding,
    pub toggle: Binding,
    pub edit: Binding,
    pub cancel: Binding,
}

impl Default for GridBindings {
    fn default() -> Self {
        Self {
            up: Binding::new("↑/k", "up", vec![key(KeyCode::Up), key_char('k')]),
            down: Binding::new("↓/j", "down", vec![key(KeyCode::Down), key_char('j')]),
            left: Binding::new("←/h", "left", vec![key(KeyCode::Left), key_char('h')]),
            right: Binding::new("→/l", "right", vec![key(KeyCode::Right), key_char('l')]),
            page_up: Binding::new("PgUp", "page up", vec![key(KeyCode::PageUp), key_ctrl('u')]),
            page_down: Binding::new(
                "PgDn",
                "page down",
                vec![key(KeyCode::PageDown), key_ctrl('d')],
            ),
            row_start: Binding::new("Home", "first column", vec![key(KeyCode::Home)]),
            row_end: Binding::new("End", "last column", vec![key(KeyCode::End)]),
            grid_start: Binding::new(
                "C-Home",
                "first cell",
                vec![key_ctrl_code(KeyCode::Home), key_char('g')],
            ),
            grid_end: Binding::new(
                "C-End",
                "last cell",
                vec![key_ctrl_code(KeyCode::End), key_char('G')],
            ),
            toggle: Binding::new("Space", "toggle", vec![key_char(' ')]),
            edit: Binding::new("Enter/F2", "edit", vec![key(KeyCode::Enter), key(KeyCode::F(2))]),
            cancel: Binding::new("Esc", "cancel", vec![key(KeyCode::Esc)]),
        }
    }
}

impl GridBindings {
    /// Bindings in display order, for help lines.
    pub fn all(&self) -> [&Binding; 13] {
        [
            &self.up,
            &self.down,
            &self.left,
            &self.right,
            &self.page_up,
            &self.page_down,
            &self.row_start,
            &self.row_end,
            &self.grid_start,
            &self.grid_end,
            &self.toggle,
            &self.edit,
            &self.cancel,
        ]
    }
}

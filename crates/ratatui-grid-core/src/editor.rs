//! Inline editor and custom cell contracts, plus the registry that builds them.

use crate::column::Column;
use crate::column::ColumnType;
use crate::error::GridError;
use crate::error::GridResult;
use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::record::RowId;
use crate::value::EDIT_DATETIME_FORMAT;
use crate::value::Value;
use crate::value::parse_datetime;
use std::collections::HashMap;

/// Emitted by an editor while the user edits a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// Live value; nothing is written yet.
    Change(Value),
    /// Final value; writes the field and ends editing.
    Commit(Value),
    /// Discards the edit.
    Cancel,
}

/// Arguments passed when an editor is (re)attached to its cell.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorInit {
    pub value: Value,
    /// The field changed since editing started or was last committed.
    pub changed_from_outside: bool,
    pub row_height: u32,
    /// Set for [`crate::options::DeviceClass::Legacy`] hosts.
    pub legacy: bool,
    /// This edit session already showed an editor (it was torn down by scrolling).
    pub was_previously_shown: bool,
}

pub trait Editor {
    fn init(&mut self, init: EditorInit);

    fn handle_key(&mut self, key: &KeyEvent) -> Option<EditorEvent>;

    /// Text shown in the cell while editing.
    fn display(&self) -> String;

    /// Called before the editor is dropped.
    fn destroy(&mut self) {}
}

/// A cell rendered by caller-supplied code.
pub trait CustomCell {
    fn init(&mut self, displayed: &str);

    fn display(&self) -> String;

    /// Opaque events the grid forwards without interpreting.
    fn drain_events(&mut self) -> Vec<(String, Value)> {
        Vec::new()
    }

    fn destroy(&mut self) {}
}

/// An event raised by a custom cell, tagged with its position.
#[derive(Clone, Debug, PartialEq)]
pub struct CellEvent {
    pub row: RowId,
    pub field: String,
    pub name: String,
    pub payload: Value,
}

pub type EditorFactory = Box<dyn Fn(&Column) -> GridResult<Box<dyn Editor>>>;
pub type CellFactory = Box<dyn Fn(&Column) -> GridResult<Box<dyn CustomCell>>>;

/// Named factories for editors and custom cells.
///
/// A `"text"` editor is always available and is used for columns without an explicit editor.
pub struct ComponentRegistry {
    editors: HashMap<String, EditorFactory>,
    cells: HashMap<String, CellFactory>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        let mut r = Self {
            editors: HashMap::new(),
            cells: HashMap::new(),
        };
        r.register_editor("text", |c: &Column| {
            Ok(Box::new(TextEditor::for_column(c)) as Box<dyn Editor>)
        });
        r
    }
}

impl ComponentRegistry {
    pub fn register_editor(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Column) -> GridResult<Box<dyn Editor>> + 'static,
    ) {
        self.editors.insert(name.into(), Box::new(factory));
    }

    pub fn register_cell(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Column) -> GridResult<Box<dyn CustomCell>> + 'static,
    ) {
        self.cells.insert(name.into(), Box::new(factory));
    }

    pub fn create_editor(&self, column: &Column) -> GridResult<Box<dyn Editor>> {
        let name = column.editor.as_deref().unwrap_or("text");
        let factory = self
            .editors
            .get(name)
            .ok_or_else(|| GridError::ComponentConstruction {
                field: column.field.clone(),
                reason: format!("no editor named `{name}`"),
            })?;
        factory(column)
    }

    pub fn create_cell(&self, column: &Column) -> GridResult<Box<dyn CustomCell>> {
        let name = column.cell_component.as_deref().unwrap_or_default();
        let factory = self
            .cells
            .get(name)
            .ok_or_else(|| GridError::ComponentConstruction {
                field: column.field.clone(),
                reason: format!("no cell component named `{name}`"),
            })?;
        factory(column)
    }
}

/// Single-line text editor. Number and date-time columns parse their input and refuse to
/// commit garbage.
#[derive(Clone, Debug, Default)]
pub struct TextEditor {
    buffer: String,
    cursor: usize,
    kind: InputKind,
    invalid: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
enum InputKind {
    #[default]
    Text,
    Number,
    /// Holds the strftime pattern used both to show and to parse the value.
    DateTime(String),
}

impl TextEditor {
    pub fn for_column(column: &Column) -> Self {
        let kind = match column.column_type {
            ColumnType::Number => InputKind::Number,
            ColumnType::DateTime => InputKind::DateTime(
                column
                    .format
                    .clone()
                    .unwrap_or_else(|| EDIT_DATETIME_FORMAT.to_string()),
            ),
            _ => InputKind::Text,
        };
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    fn parsed(&mut self) -> Value {
        let trimmed = self.buffer.trim();
        let value = match &self.kind {
            InputKind::Text => Some(Value::Text(self.buffer.clone())),
            _ if trimmed.is_empty() => Some(Value::Null),
            InputKind::Number => trimmed
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Number),
            InputKind::DateTime(format) => {
                parse_datetime(trimmed, Some(format)).map(Value::DateTime)
            }
        };
        self.invalid = value.is_none();
        value.unwrap_or_default()
    }

    fn prev_boundary(&self) -> usize {
        self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
            .unwrap_or(self.cursor)
    }
}

impl Editor for TextEditor {
    fn init(&mut self, init: EditorInit) {
        if init.was_previously_shown && !init.changed_from_outside {
            return;
        }
        self.buffer = match &self.kind {
            InputKind::DateTime(format) => init.value.format(Some(format)),
            _ => init.value.format(None),
        };
        self.cursor = self.buffer.len();
        self.invalid = false;
    }

    fn handle_key(&mut self, key: &KeyEvent) -> Option<EditorEvent> {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.ctrl && !key.modifiers.alt => {
                self.buffer.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                Some(EditorEvent::Change(self.parsed()))
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return None;
                }
                let prev = self.prev_boundary();
                self.buffer.replace_range(prev..self.cursor, "");
                self.cursor = prev;
                Some(EditorEvent::Change(self.parsed()))
            }
            KeyCode::Delete => {
                let next = self.next_boundary();
                if next == self.cursor {
                    return None;
                }
                self.buffer.replace_range(self.cursor..next, "");
                Some(EditorEvent::Change(self.parsed()))
            }
            KeyCode::Left => {
                self.cursor = self.prev_boundary();
                None
            }
            KeyCode::Right => {
                self.cursor = self.next_boundary();
                None
            }
            KeyCode::Home => {
                self.cursor = 0;
                None
            }
            KeyCode::End => {
                self.cursor = self.buffer.len();
                None
            }
            KeyCode::Enter => {
                let value = self.parsed();
                if self.invalid {
                    return None;
                }
                Some(EditorEvent::Commit(value))
            }
            KeyCode::Esc => Some(EditorEvent::Cancel),
            _ => None,
        }
    }

    fn display(&self) -> String {
        self.buffer.clone()
    }
}

/// The cell currently being edited.
pub struct EditSession {
    pub row: RowId,
    pub field: String,
    /// `None` until the materializer mounts it, and again after it is torn down.
    pub editor: Option<Box<dyn Editor>>,
    /// Field value when editing started or was last committed.
    pub committed: Value,
    /// Latest value reported through [`EditorEvent::Change`].
    pub live: Option<Value>,
    /// An editor instance was shown at least once in this session.
    pub shown: bool,
}

impl EditSession {
    pub fn new(row: RowId, field: impl Into<String>, committed: Value) -> Self {
        Self {
            row,
            field: field.into(),
            editor: None,
            committed,
            live: None,
            shown: false,
        }
    }

    pub fn targets(&self, row: RowId, field: &str) -> bool {
        self.row == row && self.field == field
    }

    /// Drops the editor instance, keeping the session.
    pub fn unmount(&mut self) {
        if let Some(mut e) = self.editor.take() {
            e.destroy();
        }
    }
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("row", &self.row)
            .field("field", &self.field)
            .field("mounted", &self.editor.is_some())
            .field("committed", &self.committed)
            .field("live", &self.live)
            .field("shown", &self.shown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(value: Value) -> EditorInit {
        EditorInit {
            value,
            changed_from_outside: false,
            row_height: 1,
            legacy: false,
            was_previously_shown: false,
        }
    }

    #[test]
    fn text_editor_emits_change_then_commit() {
        let mut e = TextEditor::default();
        e.init(init(Value::from("ab")));
        assert_eq!(
            e.handle_key(&KeyEvent::new(KeyCode::Char('c'))),
            Some(EditorEvent::Change(Value::from("abc")))
        );
        e.handle_key(&KeyEvent::new(KeyCode::Left));
        e.handle_key(&KeyEvent::new(KeyCode::Backspace));
        assert_eq!(
            e.handle_key(&KeyEvent::new(KeyCode::Enter)),
            Some(EditorEvent::Commit(Value::from("ac")))
        );
    }

    #[test]
    fn numeric_editor_blocks_invalid_commit() {
        let mut e = TextEditor::for_column(&Column::new("n", "N", 5).with_type(ColumnType::Number));
        e.init(init(Value::from(12)));
        e.handle_key(&KeyEvent::new(KeyCode::Char('x')));
        assert!(!e.is_valid());
        assert_eq!(e.handle_key(&KeyEvent::new(KeyCode::Enter)), None);
        e.handle_key(&KeyEvent::new(KeyCode::Backspace));
        assert_eq!(
            e.handle_key(&KeyEvent::new(KeyCode::Enter)),
            Some(EditorEvent::Commit(Value::from(12)))
        );
    }

    #[test]
    fn datetime_editor_parses_with_column_format() {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let column = Column::new("d", "D", 12)
            .with_type(ColumnType::DateTime)
            .with_format("%d.%m.%Y");
        let mut e = TextEditor::for_column(&column);
        e.init(init(Value::DateTime(day.and_hms_opt(0, 0, 0).unwrap())));
        assert_eq!(e.text(), "02.01.2024");
        e.handle_key(&KeyEvent::new(KeyCode::Char('x')));
        assert!(!e.is_valid());
        assert_eq!(e.handle_key(&KeyEvent::new(KeyCode::Enter)), None);
        e.handle_key(&KeyEvent::new(KeyCode::Backspace));
        assert_eq!(
            e.handle_key(&KeyEvent::new(KeyCode::Enter)),
            Some(EditorEvent::Commit(Value::DateTime(day.and_hms_opt(0, 0, 0).unwrap())))
        );
    }

    #[test]
    fn reinit_keeps_typing_unless_value_changed_outside() {
        let mut e = TextEditor::default();
        e.init(init(Value::from("a")));
        e.handle_key(&KeyEvent::new(KeyCode::Char('b')));
        e.init(EditorInit {
            was_previously_shown: true,
            ..init(Value::from("a"))
        });
        assert_eq!(e.display(), "ab");
        e.init(EditorInit {
            was_previously_shown: true,
            changed_from_outside: true,
            ..init(Value::from("z"))
        });
        assert_eq!(e.display(), "z");
    }

    #[test]
    fn missing_component_is_a_construction_error() {
        let r = ComponentRegistry::default();
        let c = Column::new("x", "X", 3).with_cell_component("sparkline");
        assert!(matches!(
            r.create_cell(&c),
            Err(GridError::ComponentConstruction { .. })
        ));
        assert!(r.create_editor(&c).is_ok());
    }
}

//! Keyboard focus movement over result rows and display columns.

use crate::keymap::GridBindings;
use crate::keymap::key_event_matches;
use crate::keymap::key_event_matches_extend;
use crate::input::KeyEvent;
use crate::query::ResultRow;
use crate::query::ResultSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavAction {
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    RowStart,
    RowEnd,
    GridStart,
    GridEnd,
}

impl NavAction {
    /// Resolves `key` against `bindings`. Shift is accepted on every movement (it extends the
    /// selection), so ctrl-based bindings are tried first.
    pub fn from_key(bindings: &GridBindings, key: &KeyEvent) -> Option<Self> {
        let exact = [
            (&bindings.grid_start, NavAction::GridStart),
            (&bindings.grid_end, NavAction::GridEnd),
        ];
        for (b, action) in exact {
            if b.keys.iter().any(|p| key_event_matches(p, key)) {
                return Some(action);
            }
        }
        let extendable = [
            (&bindings.up, NavAction::Up),
            (&bindings.down, NavAction::Down),
            (&bindings.left, NavAction::Left),
            (&bindings.right, NavAction::Right),
            (&bindings.page_up, NavAction::PageUp),
            (&bindings.page_down, NavAction::PageDown),
            (&bindings.row_start, NavAction::RowStart),
            (&bindings.row_end, NavAction::RowEnd),
            (&bindings.grid_start, NavAction::GridStart),
            (&bindings.grid_end, NavAction::GridEnd),
        ];
        extendable
            .into_iter()
            .find(|(b, _)| b.keys.iter().any(|p| key_event_matches_extend(p, key)))
            .map(|(_, a)| a)
    }
}

/// Next focused `(result index, display column)`.
///
/// Group header rows are never focused. From an unfocused state every action lands on the first
/// data row, except the "end" actions, which land on their end.
pub fn navigate(
    result: &ResultSet,
    columns: usize,
    current: Option<(usize, usize)>,
    action: NavAction,
    page: usize,
) -> Option<(usize, usize)> {
    if columns == 0 {
        return None;
    }
    let first = first_data_row(result)?;
    let last = last_data_row(result)?;
    let last_col = columns - 1;

    let Some((row, col)) = current else {
        return Some(match action {
            NavAction::RowEnd => (first, last_col),
            NavAction::GridEnd => (last, last_col),
            _ => (first, 0),
        });
    };
    let col = col.min(last_col);
    let page = page.max(1);

    let next = match action {
        NavAction::Up => (step_data_row(result, row, -1).unwrap_or(row), col),
        NavAction::Down => (step_data_row(result, row, 1).unwrap_or(row), col),
        NavAction::Left => (row, col.saturating_sub(1)),
        NavAction::Right => (row, (col + 1).min(last_col)),
        NavAction::PageUp => (
            nearest_data_row(result, row.saturating_sub(page)).unwrap_or(first),
            col,
        ),
        NavAction::PageDown => (
            nearest_data_row(result, (row + page).min(result.len() - 1)).unwrap_or(last),
            col,
        ),
        NavAction::RowStart => (row, 0),
        NavAction::RowEnd => (row, last_col),
        NavAction::GridStart => (first, 0),
        NavAction::GridEnd => (last, last_col),
    };
    Some(next)
}

fn is_data(row: &ResultRow) -> bool {
    matches!(row, ResultRow::Data { .. })
}

fn first_data_row(result: &ResultSet) -> Option<usize> {
    result.rows.iter().position(is_data)
}

fn last_data_row(result: &ResultSet) -> Option<usize> {
    result.rows.iter().rposition(is_data)
}

fn step_data_row(result: &ResultSet, from: usize, dir: i32) -> Option<usize> {
    if dir > 0 {
        result
            .rows
            .iter()
            .enumerate()
            .skip(from + 1)
            .find(|(_, r)| is_data(r))
            .map(|(i, _)| i)
    } else {
        result.rows[..from.min(result.len())]
            .iter()
            .rposition(is_data)
    }
}

/// `index` if it is a data row, else the closest following data row, else the closest preceding.
fn nearest_data_row(result: &ResultSet, index: usize) -> Option<usize> {
    if result.rows.get(index).is_some_and(is_data) {
        return Some(index);
    }
    step_data_row(result, index, 1).or_else(|| step_data_row(result, index, -1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCode;
    use crate::input::KeyModifiers;
    use crate::query::GroupKey;
    use crate::record::Record;
    use crate::record::RowId;
    use crate::value::Value;

    fn flat(n: u64) -> ResultSet {
        let records: Vec<Record> = (0..n).map(Record::new).collect();
        ResultSet::passthrough(&records)
    }

    #[test]
    fn unfocused_down_lands_on_first_cell() {
        let r = flat(5);
        assert_eq!(navigate(&r, 3, None, NavAction::Down, 1), Some((0, 0)));
        assert_eq!(navigate(&r, 3, Some((0, 0)), NavAction::RowEnd, 1), Some((0, 2)));
        assert_eq!(navigate(&r, 3, Some((0, 2)), NavAction::GridEnd, 1), Some((4, 2)));
    }

    #[test]
    fn movement_clamps_at_edges() {
        let r = flat(3);
        assert_eq!(navigate(&r, 2, Some((0, 0)), NavAction::Up, 1), Some((0, 0)));
        assert_eq!(navigate(&r, 2, Some((2, 1)), NavAction::Right, 1), Some((2, 1)));
        assert_eq!(navigate(&r, 2, Some((0, 0)), NavAction::PageDown, 10), Some((2, 0)));
        assert_eq!(navigate(&flat(0), 2, None, NavAction::Down, 1), None);
    }

    #[test]
    fn group_rows_are_skipped() {
        let group = |level| ResultRow::Group {
            key: GroupKey(vec!["x".into()]),
            field: "g".into(),
            value: Value::Null,
            level,
            count: 1,
            expanded: true,
        };
        let data = |i: usize| ResultRow::Data {
            index: i,
            id: RowId(i as u64),
            level: 1,
        };
        let r = ResultSet {
            rows: vec![group(0), data(0), group(0), data(1)],
            filtered: vec![0, 1],
        };
        assert_eq!(navigate(&r, 1, None, NavAction::Down, 1), Some((1, 0)));
        assert_eq!(navigate(&r, 1, Some((1, 0)), NavAction::Down, 1), Some((3, 0)));
        assert_eq!(navigate(&r, 1, Some((3, 0)), NavAction::Up, 1), Some((1, 0)));
    }

    #[test]
    fn keys_resolve_with_shift_and_ctrl() {
        let b = GridBindings::default();
        let ctrl_end = KeyEvent::new(KeyCode::End).with_modifiers(KeyModifiers::ctrl());
        assert_eq!(NavAction::from_key(&b, &ctrl_end), Some(NavAction::GridEnd));
        assert_eq!(
            NavAction::from_key(&b, &KeyEvent::new(KeyCode::End)),
            Some(NavAction::RowEnd)
        );
        let shift_down = KeyEvent::new(KeyCode::Down).with_modifiers(KeyModifiers::shift());
        assert_eq!(NavAction::from_key(&b, &shift_down), Some(NavAction::Down));
    }
}

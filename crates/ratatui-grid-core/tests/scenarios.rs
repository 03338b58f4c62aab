use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui_grid_core::Column;
use ratatui_grid_core::ColumnType;
use ratatui_grid_core::Grid;
use ratatui_grid_core::GridAction;
use ratatui_grid_core::GridError;
use ratatui_grid_core::GridOptions;
use ratatui_grid_core::Record;
use ratatui_grid_core::Region;
use ratatui_grid_core::RowId;
use ratatui_grid_core::Value;
use ratatui_grid_core::capability::Filterable;
use ratatui_grid_core::editor::EditorEvent;
use ratatui_grid_core::input::InputEvent;
use ratatui_grid_core::input::KeyCode;
use ratatui_grid_core::input::KeyEvent;
use ratatui_grid_core::input::KeyModifiers;
use ratatui_grid_core::input::MouseButton;
use ratatui_grid_core::input::MouseEvent;
use ratatui_grid_core::input::MouseEventKind;
use ratatui_grid_core::query::FilterOp;
use ratatui_grid_core::query::FilterSpec;
use ratatui_grid_core::query::SortDirection;
use ratatui_grid_core::selection::CellAddr;
use ratatui_grid_core::source::DataSource;
use ratatui_grid_core::source::InMemorySource;
use ratatui_grid_core::summary::SummaryKind;
use ratatui_grid_core::theme::Theme;

fn columns() -> Vec<Column> {
    vec![
        Column::new("col1", "Col 1", 6).with_type(ColumnType::Number),
        Column::new("name", "Name", 10),
        Column::new("booleanValue", "Flag", 6).with_type(ColumnType::Boolean),
    ]
}

fn records(count: u64) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new(i)
                .with("col1", i as i64)
                .with("name", format!("name{i}"))
                .with("booleanValue", i % 2 == 0)
        })
        .collect()
}

fn grid(count: u64) -> Grid {
    let mut g = Grid::new();
    g.set_columns(columns());
    g.set_records(records(count));
    g.set_viewport(Rect::new(0, 0, 30, 10));
    g.update();
    g
}

fn first_value(g: &Grid, field: &str) -> Value {
    let id = g.result().rows[0].row_id().unwrap();
    g.record(id).unwrap().get(field).clone()
}

fn key(code: KeyCode) -> InputEvent {
    InputEvent::Key(KeyEvent::new(code))
}

#[test]
fn sorting_descending_puts_largest_first() {
    let mut g = grid(100);
    g.sort("col1", SortDirection::Descending).unwrap();
    g.update();
    assert_eq!(first_value(&g, "col1"), Value::from(99));
    let view = g.row_view(RowId(99), Region::Center).unwrap();
    assert_eq!(view.result_index(), 0);
}

#[test]
fn filtering_on_a_boolean_column() {
    let mut g = grid(100);
    g.apply_filter(FilterSpec::new("booleanValue", FilterOp::Equals, true))
        .unwrap();
    g.update();
    assert_eq!(g.result().len(), 50);
    assert_eq!(
        g.apply_filter(FilterSpec::new("booleanValue", FilterOp::Greater, 1)),
        Err(GridError::InvalidFilter {
            field: "booleanValue".into(),
            message: "comparison requires a number or date column".into(),
        })
    );
    assert_eq!(g.filters().len(), 1);
}

#[test]
fn summaries_over_all_rows() {
    let mut g = grid(100);
    let expect = [
        (SummaryKind::Min, 0.0),
        (SummaryKind::Max, 99.0),
        (SummaryKind::Sum, 4950.0),
        (SummaryKind::Average, 49.5),
        (SummaryKind::Count, 100.0),
    ];
    for (kind, want) in expect {
        assert_eq!(g.summary("col1", kind).unwrap(), Value::Number(want), "{kind:?}");
    }
    assert!(matches!(
        g.summary("missing", SummaryKind::Sum),
        Err(GridError::UnknownColumn(_))
    ));
}

#[test]
fn committing_an_edit_writes_the_field() {
    let mut g = grid(10);
    g.start_editing(RowId(0), "name").unwrap();
    g.update();
    assert!(g.editing().is_some_and(|e| e.editor.is_some()));

    g.apply_editor_event(EditorEvent::Commit(Value::from("newName")))
        .unwrap();
    g.stop_editing(true);
    g.update();
    assert!(g.editing().is_none());
    assert_eq!(g.record(RowId(0)).unwrap().get("name"), &Value::from("newName"));
    assert_eq!(g.focus(), Some(&CellAddr::new(RowId(0), "name")));
    assert_eq!(
        g.apply_editor_event(EditorEvent::Cancel),
        Err(GridError::NotEditing)
    );
}

#[test]
fn keyboard_navigation() {
    let mut g = grid(20);
    let last = RowId(19);
    assert_eq!(
        g.handle_event(key(KeyCode::Down), 0),
        GridAction::FocusChanged(CellAddr::new(RowId(0), "col1"))
    );
    assert_eq!(
        g.handle_event(key(KeyCode::End), 0),
        GridAction::FocusChanged(CellAddr::new(RowId(0), "booleanValue"))
    );
    let ctrl_end = KeyEvent::new(KeyCode::End).with_modifiers(KeyModifiers::ctrl());
    assert_eq!(
        g.handle_event(InputEvent::Key(ctrl_end), 0),
        GridAction::FocusChanged(CellAddr::new(last, "booleanValue"))
    );
    g.update();
    let window = g.window().unwrap();
    assert_eq!(window.to, 19);
    assert!(g.scroll().data.y > 0);
}

#[test]
fn empty_grid_renders_nothing() {
    let mut g = grid(0);
    assert!(g.window().is_none());
    assert_eq!(g.row_views().count(), 0);

    let area = Rect::new(0, 0, 30, 5);
    let mut buf = Buffer::empty(area);
    g.render(area, &mut buf, &Theme::default());
    assert_eq!(g.handle_event(key(KeyCode::Down), 0), GridAction::None);
}

#[test]
fn unchanged_data_patches_nothing() {
    let mut g = grid(30);
    let ops = g.surface().count();
    g.set_records(records(30));
    assert!(g.update());
    assert_eq!(g.surface().count(), ops);

    g.set_value(RowId(1), "name", Value::from("changed")).unwrap();
    g.update();
    assert!(g.surface().count() > ops);
}

#[test]
fn removing_and_reinserting_a_column() {
    let mut g = grid(5);
    let mut without = columns();
    let removed = without.remove(1);
    g.set_columns(without.clone());
    g.update();
    let view = g.row_view(RowId(2), Region::Center).unwrap();
    assert_eq!(view.fields().collect::<Vec<_>>(), vec!["col1", "booleanValue"]);

    without.insert(1, removed);
    g.set_columns(without);
    g.update();
    let view = g.row_view(RowId(2), Region::Center).unwrap();
    assert_eq!(
        view.fields().collect::<Vec<_>>(),
        vec!["col1", "name", "booleanValue"]
    );
    assert_eq!(view.cells()[1].displayed, "name2");
}

#[test]
fn selection_follows_rows_through_filtering() {
    let mut g = grid(20);
    g.set_focus(RowId(10), "name").unwrap();
    g.apply_filter(FilterSpec::new("col1", FilterOp::GreaterOrEqual, 8))
        .unwrap();
    g.update();
    assert_eq!(g.focus(), Some(&CellAddr::new(RowId(10), "name")));
    let view = g.row_view(RowId(10), Region::Center).unwrap();
    assert!(view.cells()[1].state.focused);

    g.apply_filter(FilterSpec::new("col1", FilterOp::Less, 5))
        .unwrap();
    g.update();
    assert_eq!(g.focus(), None);
}

#[test]
fn remote_source_drops_stale_responses() {
    let mut source = InMemorySource::new(records(10), columns());
    let mut g = Grid::new();
    g.set_columns(columns());
    g.set_remote(true);
    source.request(g.take_pending_request().unwrap());
    g.sort("col1", SortDirection::Descending).unwrap();
    source.request(g.take_pending_request().unwrap());

    let stale = source.poll().unwrap();
    assert!(matches!(
        g.receive(stale),
        Err(GridError::StaleResponse { .. })
    ));
    assert!(g.is_loading());
    g.receive(source.poll().unwrap()).unwrap();
    g.set_viewport(Rect::new(0, 0, 30, 10));
    g.update();
    assert_eq!(first_value(&g, "col1"), Value::from(9));
}

#[test]
fn dragging_a_header_reorders_columns() {
    let mut g = Grid::with_options(GridOptions {
        show_scrollbar_y: false,
        ..GridOptions::default()
    });
    g.set_columns(columns());
    g.set_records(records(5));
    let area = Rect::new(0, 0, 22, 6);
    let mut buf = Buffer::empty(area);
    g.render(area, &mut buf, &Theme::default());

    let mouse = |kind, x| InputEvent::Mouse(MouseEvent::new(kind, x, 0));
    g.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 17), 0);
    g.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), 1), 5);
    assert_eq!(
        g.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 1), 10),
        GridAction::DragCommitted(ratatui_grid_core::drag::DragCommit::MoveColumns {
            fields: vec!["booleanValue".into()],
            region: Region::Center,
            before: Some("col1".into()),
        })
    );
    let order: Vec<&str> = g.columns().iter().map(|c| c.field.as_str()).collect();
    assert_eq!(order, vec!["booleanValue", "col1", "name"]);

    let mut buf = Buffer::empty(area);
    g.render(area, &mut buf, &Theme::default());
    let header: String = (0..area.width).map(|x| buf[(x, 0)].symbol().to_string()).collect();
    assert!(header.starts_with("Flag"));
}

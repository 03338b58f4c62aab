use chrono::NaiveDate;
use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableMouseCapture;
use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEventKind;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui_grid::Column;
use ratatui_grid::ColumnType;
use ratatui_grid::Grid;
use ratatui_grid::GridAction;
use ratatui_grid::GridOptions;
use ratatui_grid::Record;
use ratatui_grid::Region;
use ratatui_grid::Value;
use ratatui_grid::crossterm_input::input_event_from_crossterm;
use ratatui_grid::summary::SummaryKind;
use ratatui_grid::theme::Theme;
use std::io;
use std::time::Duration;
use std::time::Instant;

fn main() -> io::Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let theme = Theme::default();
    let mut grid = Grid::with_options(GridOptions {
        show_footer: true,
        summaries: vec![
            ("qty".to_owned(), SummaryKind::Sum),
            ("price".to_owned(), SummaryKind::Average),
        ],
        ..GridOptions::default()
    });
    grid.set_columns(columns());
    grid.set_records(records(10_000));

    let res = run(&mut terminal, &theme, &mut grid);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

fn columns() -> Vec<Column> {
    vec![
        Column::new("id", "#", 6)
            .with_type(ColumnType::Number)
            .pinned(Region::Left),
        Column::new("name", "Item", 18),
        Column::new("qty", "Qty", 7)
            .with_type(ColumnType::Number)
            .in_band("Stock"),
        Column::new("price", "Price", 10)
            .with_type(ColumnType::Number)
            .with_format("#,##0.00")
            .in_band("Stock"),
        Column::new("ok", "Ok", 5).with_type(ColumnType::Checkbox),
        Column::new("updated", "Updated", 12)
            .with_type(ColumnType::DateTime)
            .with_format("%Y-%m-%d"),
        Column::new("owner", "Owner", 10)
            .with_type(ColumnType::Reference)
            .pinned(Region::Right),
    ]
}

fn records(count: u64) -> Vec<Record> {
    let owners = ["ana", "bo", "cy", "dee"];
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .unwrap_or_default();
    (0..count)
        .map(|i| {
            let owner = owners[(i % owners.len() as u64) as usize];
            Record::new(i)
                .with("id", i as i64)
                .with("name", format!("item {i:05}"))
                .with("qty", ((i * 37) % 500) as i64)
                .with("price", ((i * 7919) % 10_000) as f64 / 100.0)
                .with("ok", i % 3 == 0)
                .with("updated", start + chrono::Duration::hours(i as i64))
                .with(
                    "owner",
                    Value::Ref {
                        id: i % owners.len() as u64,
                        label: owner.to_owned(),
                    },
                )
        })
        .collect()
}

fn run<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    theme: &Theme,
    grid: &mut Grid,
) -> io::Result<()> {
    let started = Instant::now();
    let mut status = String::from("click headers to sort, drag to reorder, f filters, q quits");
    loop {
        let now_ms = started.elapsed().as_millis() as u64;
        grid.poll(now_ms);

        terminal.draw(|f| {
            let area = f.area();
            let block = Block::default()
                .title("Grid (hjkl/arrows, PgUp/PgDn, g/G, Space, Enter/F2 edit, f filter, q)")
                .borders(Borders::ALL);
            let inner = block.inner(area);
            f.render_widget(block, area);

            let buf = f.buffer_mut();
            let grid_area = Rect::new(
                inner.x,
                inner.y,
                inner.width,
                inner.height.saturating_sub(1),
            );
            let status_area = Rect::new(inner.x, inner.y + grid_area.height, inner.width, 1);
            grid.render(grid_area, buf, theme);

            let line = format!("{status}  rows={}", grid.result().len());
            buf.set_span(
                status_area.x,
                status_area.y,
                &Span::styled(line, theme.text_muted),
                status_area.width,
            );
        })?;

        if !crossterm::event::poll(Duration::from_millis(30))? {
            continue;
        }
        let event = crossterm::event::read()?;
        let now_ms = started.elapsed().as_millis() as u64;
        let idle = grid.editing().is_none() && grid.filter_popup().is_none();
        if let Event::Key(key) = &event
            && key.kind == KeyEventKind::Press
            && idle
        {
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Char('f') => {
                    if let Some(field) = grid.focus().map(|f| f.field.clone()) {
                        let _ = grid.open_filter(&field);
                    }
                    continue;
                }
                _ => {}
            }
        }
        let Some(ev) = input_event_from_crossterm(event) else {
            continue;
        };
        match grid.handle_event(ev, now_ms) {
            GridAction::FocusChanged(addr) => {
                status = format!("row {} / {}", addr.row.0, addr.field);
            }
            GridAction::EditCommitted(addr) => {
                status = format!("saved row {} / {}", addr.row.0, addr.field);
            }
            GridAction::DragCommitted(commit) => status = format!("{commit:?}"),
            GridAction::DragRejected => status = "drop rejected".to_owned(),
            GridAction::FilterChanged | GridAction::SortChanged => {
                status = format!("{:?}", grid.query().sorts);
            }
            GridAction::EditStarted(_)
            | GridAction::EditCancelled
            | GridAction::Redraw
            | GridAction::None => {}
        }
    }
}

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table, TableState, Tabs, Wrap},
};

use crate::archives::{ARCHIVE_COLUMNS, ArchiveForm, ArchiveModal, ArchiveWorkflow};
use crate::config::AdminConfig;
use crate::domain::CMDMode;
use crate::ead::EadPanel;
use crate::model::{Modus, Model};
use crate::navigation::ViewId;
use crate::table::{SortDirection, cell_text};
use crate::views::{GridView, Mounted};

#[derive(Debug)]
pub struct AdminUI {
    title: String,
}

impl AdminUI {
    pub fn new(cfg: &AdminConfig) -> Self {
        Self {
            title: format!(" recadmin @ {} ", cfg.base_url),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.render_tabs(model, frame, layout[0]);
        match model.container() {
            Mounted::Empty => frame.render_widget(Block::default().borders(Borders::ALL), layout[1]),
            Mounted::Grid(view) => render_grid_view(view, frame, layout[1]),
            Mounted::Archives(workflow) => render_archives(workflow, frame, layout[1]),
        }
        render_bottom_line(model, frame, layout[2]);
        render_overlays(model, frame);
    }

    fn render_tabs(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let selected = model.current_view().map(ViewId::position).unwrap_or(0);
        let titles = ViewId::ALL
            .iter()
            .map(|view| format!(" {} {} ", view.position() + 1, view.label()))
            .collect::<Vec<String>>();
        let tabs = Tabs::new(titles)
            .block(Block::default().title(self.title.as_str()).borders(Borders::ALL))
            .style(Style::default().fg(Color::White))
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .select(selected);
        frame.render_widget(tabs, area);
    }
}

fn render_grid_view(view: &GridView, frame: &mut Frame, area: Rect) {
    let panel_height = if view.ead.is_some() { 5 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(panel_height),
        ])
        .split(area);

    let grid = &view.grid;
    let table = &grid.table;
    let with_actions = !grid.row_actions().is_empty() || view.ead.is_some();
    let pending = view.ead.as_ref().and_then(|p| p.pending_delete());

    let mut header_cells: Vec<Cell> = table
        .headers()
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let marker = match table.sort() {
                Some(sort) if sort.column == i => match sort.direction {
                    SortDirection::Ascending => " ▲",
                    SortDirection::Descending => " ▼",
                },
                _ => "",
            };
            Cell::from(format!("{label}{marker}"))
        })
        .collect();
    if with_actions {
        header_cells.push(Cell::from(""));
    }

    let rows: Vec<Row> = table
        .rows()
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let mut cells: Vec<Cell> = row
                .iter()
                .enumerate()
                .map(|(c, value)| {
                    let cell = Cell::from(cell_text(value));
                    if r == table.curser_row() && c == table.curser_column() {
                        cell.style(Style::default().add_modifier(Modifier::REVERSED))
                    } else {
                        cell
                    }
                })
                .collect();
            if with_actions {
                let control = match grid.action_for_row(r) {
                    Some(action) if Some(action.target.as_str()) == pending => "delete?",
                    Some(_) => "[d] delete",
                    None => "",
                };
                cells.push(Cell::from(control).red());
            }
            Row::new(cells)
        })
        .collect();

    let mut widths = vec![Constraint::Fill(1); table.headers().len()];
    if with_actions {
        widths.push(Constraint::Length(11));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", grid.url()));
    let widget = Table::new(rows, widths)
        .header(Row::new(header_cells).bold().underlined())
        .block(block)
        .row_highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = TableState::default().with_selected(Some(table.curser_row()));
    frame.render_stateful_widget(widget, chunks[0], &mut state);

    let info = match (table.error(), table.processing()) {
        (Some(error), _) => Line::from(error.to_string().replace('\n', "; ")).red(),
        (None, true) => Line::from(vec![table.info().into(), "  Processing ...".yellow()]),
        (None, false) => Line::from(format!(
            "{}  ({} per page)",
            table.info(),
            table.page_length()
        )),
    };
    frame.render_widget(Paragraph::new(info), chunks[1]);

    if let Some(panel) = &view.ead {
        render_ead_panel(panel, frame, chunks[2]);
    }
}

fn render_ead_panel(panel: &EadPanel, frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Upload EAD ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let submit = if panel.upload_enabled() {
        "[Enter] upload".green()
    } else {
        "[Enter] upload".dark_gray()
    };
    let path = if panel.upload_path.value().is_empty() {
        "<press u to choose a file>".dark_gray()
    } else {
        panel.upload_path.value().to_string().yellow()
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec!["file: ".into(), path, "  ".into(), submit])),
        rows[0],
    );

    if let Some(percent) = panel.progress() {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Cyan))
            .percent(u16::from(percent))
            .label(format!("{percent}%"));
        frame.render_widget(gauge, rows[1]);
    }
    if let Some(message) = panel.message() {
        frame.render_widget(Paragraph::new(message).wrap(Wrap { trim: true }), rows[2]);
    }
}

fn render_archives(workflow: &ArchiveWorkflow, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let block = Block::default().borders(Borders::ALL).title(" Archives ");
    if workflow.loading() && workflow.items().is_empty() {
        frame.render_widget(Paragraph::new("Loading archives ...").block(block), chunks[0]);
    } else if let Some(error) = workflow.list_error() {
        frame.render_widget(Paragraph::new(error).red().block(block), chunks[0]);
    } else {
        let mut header: Vec<Cell> = vec![Cell::from(" ")];
        header.extend(ARCHIVE_COLUMNS.iter().map(|c| Cell::from(c.label)));
        let rows: Vec<Row> = workflow
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, cells)| {
                let mark = if workflow.selected_row() == Some(i) { "●" } else { " " };
                let mut row = vec![Cell::from(mark)];
                row.extend(cells.into_iter().map(Cell::from));
                let row = Row::new(row);
                if workflow.selected_row() == Some(i) {
                    row.cyan().bold()
                } else {
                    row
                }
            })
            .collect();
        let mut widths = vec![Constraint::Length(1)];
        widths.extend([
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Fill(2),
        ]);
        let table = Table::new(rows, widths)
            .header(Row::new(header).bold().underlined())
            .block(block)
            .row_highlight_style(Style::default().bg(Color::DarkGray));
        let mut state = TableState::default().with_selected(Some(workflow.curser_row()));
        frame.render_stateful_widget(table, chunks[0], &mut state);
    }

    let enabled = |on: bool, text: &'static str| -> Span<'static> {
        if on { text.blue().bold() } else { text.dark_gray() }
    };
    let buttons = Line::from(vec![
        enabled(true, "[a] New"),
        "  ".into(),
        enabled(workflow.actions_enabled(), "[e] Edit"),
        "  ".into(),
        enabled(workflow.actions_enabled(), "[d] Delete"),
        if workflow.submitting() { "  Saving ...".yellow() } else { "".into() },
    ]);
    frame.render_widget(Paragraph::new(buttons), chunks[1]);
}

fn render_bottom_line(model: &Model, frame: &mut Frame, area: Rect) {
    if model.modus() == Modus::CMDINPUT {
        let prompt = match model.cmd_mode() {
            Some(CMDMode::UploadPath) => "upload file: ",
            _ => ":",
        };
        let input = model.cmdinput();
        frame.render_widget(
            Paragraph::new(Line::from(vec![prompt.bold(), input.input.as_str().into()])),
            area,
        );
        let x = area.x + (prompt.len() + input.curser_pos) as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    } else {
        let line = Line::from(vec![
            model.status_message().to_string().yellow(),
            "  (? help, q quit)".dark_gray(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn render_overlays(model: &Model, frame: &mut Frame) {
    if let Some(modal) = model.archive_modal() {
        match modal {
            ArchiveModal::Edit(form) => render_form(form, frame),
            ArchiveModal::ConfirmDelete { id, error } => render_confirm(
                &format!("Really delete archive {id}?"),
                error.as_deref(),
                frame,
            ),
        }
    }
    if let Some(question) = model.confirm_text() {
        render_confirm(question, None, frame);
    }
    if let Some(popup) = model.popup() {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", popup.title))
            .title_bottom(Line::from(" Esc to close ").centered());
        frame.render_widget(
            Paragraph::new(popup.message.as_str()).wrap(Wrap { trim: false }).block(block),
            area,
        );
    }
}

fn render_confirm(question: &str, error: Option<&str>, frame: &mut Frame) {
    let area = centered_rect(50, 30, frame.area());
    frame.render_widget(Clear, area);
    let mut lines = vec![Line::from(question.to_string()).bold(), Line::from("")];
    if let Some(error) = error {
        lines.extend(error.lines().map(|l| Line::from(l.to_string()).red()));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(vec!["[y] yes".green(), "   ".into(), "[Esc] no".red()]));
    let block = Block::default().borders(Borders::ALL).title(" Confirm ");
    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}

fn render_form(form: &ArchiveForm, frame: &mut Frame) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);
    let title = match &form.original_id {
        Some(id) => format!(" Edit archive {id} "),
        None => " New archive ".to_string(),
    };
    let mut lines: Vec<Line> = form
        .fields
        .iter()
        .enumerate()
        .map(|(i, (name, input))| {
            let label = format!("{name:>24}: ");
            if i == form.focus {
                Line::from(vec![label.cyan().bold(), input.value().to_string().underlined()])
            } else {
                Line::from(vec![label.into(), input.value().to_string().into()])
            }
        })
        .collect();
    lines.push(Line::from(""));
    if let Some(error) = &form.error {
        lines.extend(error.lines().map(|l| Line::from(l.to_string()).red()));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(vec![
        "[Enter] save".green(),
        "  [Tab] next field  ".into(),
        "[Esc] cancel".red(),
    ]));
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};
use crate::models::{Priority, CATEGORIES};
use crate::viewmodel::Notice;
use super::app::{App, InputField, InputMode, ADD_STEPS};

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Stats
            Constraint::Min(0),    // Table
            Constraint::Length(1), // Notice
            Constraint::Length(3)  // Help
        ].as_ref())
        .split(f.area());

    let stats = app.list.stats();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(format!("Total {}", stats.total), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(format!("Pending {}", stats.pending), Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(format!("Completed {}", stats.completed), Style::default().fg(Color::Green)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(format!("todosync - {}", app.user_label)));
    f.render_widget(header, chunks[0]);

    let list = app.list.view_mut();
    let block = Block::default().borders(Borders::ALL).title("My Todos");
    if list.loading || list.visible().is_empty() {
        let text = if list.loading {
            "Loading..."
        } else if list.tasks.is_empty() {
            "No todos yet. Press 'a' to add one."
        } else {
            "All done. Press 'c' to show completed todos."
        };
        let empty = Paragraph::new(text).style(Style::default().fg(Color::Gray)).block(block);
        f.render_widget(empty, chunks[1]);
    } else {
        let rows: Vec<Row> = list
            .visible()
            .into_iter()
            .map(|t| {
                let style = if t.completed {
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
                } else {
                    Style::default().fg(priority_color(t.priority))
                };
                Row::new(vec![
                    Cell::from(if t.completed { "[x]" } else { "[ ]" }),
                    Cell::from(t.title.clone()),
                    Cell::from(t.description.clone()),
                    Cell::from(t.date.clone()),
                    Cell::from(t.priority.as_str()),
                    Cell::from(t.category.clone()),
                ]).style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(4),
            Constraint::Min(20),
            Constraint::Min(20),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(10),
        ];

        let table = Table::new(rows, widths)
            .header(Row::new(vec!["", "Title", "Description", "Date", "Priority", "Category"])
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .bottom_margin(1))
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, chunks[1], &mut list.state);
    }

    let notice = match &app.notice {
        Notice::None => match &app.status.borrow().last_error {
            Some(err) => Line::styled(format!("Sync error: {}", err), Style::default().fg(Color::Red)),
            None => Line::raw(""),
        },
        Notice::Success(msg) => Line::styled(msg.clone(), Style::default().fg(Color::Green)),
        Notice::Error(msg) => Line::styled(msg.clone(), Style::default().fg(Color::Red)),
    };
    f.render_widget(Paragraph::new(notice), chunks[2]);

    let help_text = match app.input_mode {
        InputMode::Normal => "q: Quit | a: Add | n: Title | e: Desc | t: Date | p: Prio | g: Cat | Space: Done | d: Del | c: Show Done | r: Refresh",
        InputMode::Editing => "Enter: Save | Esc: Cancel",
        InputMode::Adding => "Enter: Next Step | Esc: Cancel",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[3]);

    // Render Input Box if needed
    if app.input_mode == InputMode::Normal {
        return;
    }
    let area = centered_rect(60, 4, f.area());
    f.render_widget(Clear, area);

    let prompt = field_prompt(app.input_field);
    let title = match app.input_mode {
        InputMode::Adding => format!("Add Todo ({}/{}): {}", app.add_state.step + 1, ADD_STEPS.len(), prompt),
        _ => format!("Edit {}", prompt),
    };

    let mut lines = vec![Line::styled(app.input_buffer.clone(), Style::default().fg(Color::Yellow))];
    if let Some(err) = &app.field_error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    let input = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(input, area);
}

fn field_prompt(field: InputField) -> String {
    match field {
        InputField::Title => "Title".to_string(),
        InputField::Description => "Description".to_string(),
        InputField::Date => "Date (DD/MM/YYYY)".to_string(),
        InputField::Priority => "Priority (HIGH, MEDIUM, LOW)".to_string(),
        InputField::Category => format!("Category ({})", CATEGORIES.join(", ")),
    }
}

fn priority_color(p: Priority) -> Color {
    match p {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(r.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Length(r.height.saturating_sub(height) / 2),
        ].as_ref())
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(popup_layout[1])[1]
}

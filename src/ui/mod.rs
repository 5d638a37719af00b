mod help;
pub mod helpers;
mod projects;
mod theme;
mod timers;

use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    prelude::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};

use qtimer::types::TimerStatus;

use crate::app::{App, AppView, AssignTicketPopup, ConfirmPopup, NewTimerField, NewTimerPopup, TABS, TicketOption};
use helpers::format_duration;
use theme::Theme;

/// Renders the entire UI for a single frame.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let (title, body_text) = match app.view {
        AppView::Timers => (" Timers ", timers::build_timers_text(app)),
        AppView::Projects => (" Projects ", projects::build_projects_text(app)),
        AppView::Help => (" Help ", help::build_help_text()),
    };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(area);

    let header = Paragraph::new(Text::from(vec![Line::from(vec![
        Span::styled(
            "  qTimer  ",
            Style::default().fg(Color::Black).bg(Theme::primary()),
        ),
        Span::raw(" "),
        Span::styled(
            "time tracker",
            Style::default()
                .fg(Theme::secondary())
                .add_modifier(Modifier::BOLD),
        ),
    ])]))
    .alignment(Alignment::Left)
    .block(bordered());
    frame.render_widget(header, layout[0]);

    let mut body_lines = vec![
        tabs_line(app),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {title}"),
            Style::default()
                .fg(Theme::accent())
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    body_lines.extend(body_text.lines);
    body_lines.push(Line::from(""));
    body_lines.push(Line::from(Span::styled(
        "----------------------------------------",
        Style::default().fg(Theme::dim()),
    )));
    body_lines.extend(keybinds_lines(app));
    let body = Paragraph::new(Text::from(body_lines))
        .style(Style::default().fg(Theme::text()))
        .alignment(Alignment::Left)
        .block(bordered());
    frame.render_widget(body, layout[1]);

    let footer = Paragraph::new(Text::from(vec![running_timer_line(app), status_line(app)]))
        .alignment(Alignment::Left)
        .block(bordered());
    frame.render_widget(footer, layout[2]);

    if let Some(popup) = &app.new_timer_popup {
        render_new_timer_popup(frame, popup);
    }
    if let Some(popup) = &app.assign_popup {
        render_assign_popup(frame, popup);
    }
    if let Some(popup) = &app.confirm_popup {
        render_confirm_popup(frame, popup);
    }
}

fn bordered() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Theme::secondary()))
}

/// Search prompt or active-filter banner shown above list views.
pub(crate) fn search_lines(app: &App) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    if app.search_active {
        lines.push(Line::from(vec![
            Span::styled(
                "Search: ",
                Style::default()
                    .fg(Theme::highlight())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(app.search_query.as_str(), Style::default().fg(Theme::text())),
            Span::styled("_", Style::default().fg(Theme::highlight())),
        ]));
        lines.push(Line::from(Span::styled(
            "Type to search, Enter to apply, Esc to cancel",
            Style::default().fg(Theme::dim()),
        )));
        lines.push(Line::from(""));
    } else if !app.search_query.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Filtered: ", Style::default().fg(Theme::accent())),
            Span::styled(app.search_query.as_str(), Style::default().fg(Theme::text())),
            Span::styled(
                " (press / to edit, Esc to clear)",
                Style::default().fg(Theme::dim()),
            ),
        ]));
        lines.push(Line::from(""));
    }
    lines
}

fn tabs_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    for (index, (name, view)) in TABS.iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw("  "));
        }
        let style = if *view == app.view {
            Style::default()
                .fg(Color::Black)
                .bg(Theme::highlight())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Theme::dim())
        };
        spans.push(Span::styled(format!(" {name} "), style));
    }
    Line::from(spans)
}

fn running_timer_line(app: &App) -> Line<'_> {
    let mut running = app
        .timers
        .iter()
        .filter(|row| row.status == TimerStatus::Active);
    let Some(first) = running.next() else {
        return Line::from(Span::styled(
            "● No timer running",
            Style::default().fg(Theme::dim()),
        ));
    };
    let others = running.count();

    // Animated indicator that cycles every second
    let animation_chars = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
    let anim_index = (Local::now().timestamp() % animation_chars.len() as i64) as usize;

    let mut spans = vec![
        Span::styled(
            format!("{} ", animation_chars[anim_index]),
            Style::default()
                .fg(Theme::active())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} > ", first.name),
            Style::default()
                .fg(Theme::text())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Running {}", format_duration(first.duration)),
            Style::default()
                .fg(Theme::active())
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if others > 0 {
        spans.push(Span::styled(
            format!("  (+{others} more)"),
            Style::default().fg(Theme::dim()),
        ));
    }
    Line::from(spans)
}

fn status_line(app: &App) -> Line<'_> {
    match &app.status {
        Some(status) => Line::from(Span::styled(
            status.as_str(),
            Style::default().fg(Theme::warn()),
        )),
        None => Line::from(""),
    }
}

fn keybinds_lines(app: &App) -> Vec<Line<'static>> {
    let (primary, secondary) = match app.view {
        AppView::Timers => (
            "Up/Down: Select  space: Stop/Restart  n: New  e: Ticket  d: Delete  P: Post",
            "/: Search  S: Sync  r: Reload  Tab: Next view  ?: Help  q: Quit",
        ),
        AppView::Projects => (
            "Up/Down: Select  /: Search  S: Sync",
            "esc: Back  r: Reload  Tab: Next view  ?: Help  q: Quit",
        ),
        AppView::Help => ("Press ? or ESC to close this help screen", ""),
    };
    vec![
        Line::from(Span::styled(primary, Style::default().fg(Theme::dim()))),
        Line::from(Span::styled(secondary, Style::default().fg(Theme::dim()))),
    ]
}

fn ticket_option_lines<'a>(
    tickets: &'a [TicketOption],
    selected_index: usize,
    active: bool,
) -> Vec<Line<'a>> {
    tickets
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let selected = index == selected_index;
            let marker_style = if selected && active {
                Style::default()
                    .fg(Theme::selection_marker())
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Theme::dim())
            };
            let name_style = if selected {
                Style::default()
                    .fg(Theme::text())
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Theme::dim())
            };
            Line::from(vec![
                Span::styled(if selected { "> " } else { "  " }, marker_style),
                Span::styled(option.label.as_str(), name_style),
            ])
        })
        .collect()
}

fn render_new_timer_popup(frame: &mut Frame, popup: &NewTimerPopup) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let name_active = popup.field == NewTimerField::Name;
    let title_style = |active: bool| {
        if active {
            Style::default()
                .fg(Theme::highlight())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Theme::dim())
        }
    };

    let mut lines = vec![
        Line::from(Span::styled(
            "New timer",
            Style::default()
                .fg(Theme::accent())
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Name: ", title_style(name_active)),
            Span::styled(
                popup.name.as_str(),
                Style::default()
                    .fg(Theme::text())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                if name_active { "_" } else { "" },
                Style::default().fg(Theme::highlight()),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("Ticket", title_style(!name_active))),
    ];
    lines.extend(ticket_option_lines(
        &popup.tickets,
        popup.ticket_index,
        !name_active,
    ));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab: switch field. Up/Down: ticket. Enter: start. Esc: cancel.",
        Style::default().fg(Theme::dim()),
    )));

    let widget = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Left)
        .block(bordered().title(" New Timer "));
    frame.render_widget(widget, area);
}

fn render_assign_popup(frame: &mut Frame, popup: &AssignTicketPopup) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                "Ticket for ",
                Style::default()
                    .fg(Theme::accent())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                popup.timer_name.as_str(),
                Style::default()
                    .fg(Theme::text())
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
    ];
    lines.extend(ticket_option_lines(&popup.tickets, popup.ticket_index, true));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Up/Down: ticket. Enter: save. Esc: cancel.",
        Style::default().fg(Theme::dim()),
    )));

    let widget = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Left)
        .block(bordered().title(" Assign Ticket "));
    frame.render_widget(widget, area);
}

fn render_confirm_popup(frame: &mut Frame, popup: &ConfirmPopup) {
    let area = centered_rect(60, 30, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            "Confirm Action",
            Style::default()
                .fg(Theme::accent())
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            popup.message.as_str(),
            Style::default().fg(Theme::text()),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Press ", Style::default().fg(Theme::dim())),
            Span::styled(
                "Y",
                Style::default()
                    .fg(Theme::highlight())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" to confirm or ", Style::default().fg(Theme::dim())),
            Span::styled(
                "N",
                Style::default()
                    .fg(Theme::highlight())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("/", Style::default().fg(Theme::dim())),
            Span::styled(
                "ESC",
                Style::default()
                    .fg(Theme::highlight())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" to cancel", Style::default().fg(Theme::dim())),
        ]),
    ];

    let widget = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .block(bordered().title(" Confirm "));
    frame.render_widget(widget, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

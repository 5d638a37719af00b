use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span, Text},
};

use qtimer::types::TimerStatus;

use super::helpers::{clamp_name, format_duration, format_local};
use super::theme::Theme;
use super::search_lines;
use crate::app::App;

pub fn build_timers_text(app: &App) -> Text<'_> {
    let mut lines = search_lines(app);

    if app.timers.is_empty() {
        if app.search_query.is_empty() {
            lines.push(Line::from("No timers yet. Press 'n' to start one."));
        } else {
            lines.push(Line::from(vec![
                Span::styled("No timers match '", Style::default().fg(Theme::dim())),
                Span::styled(app.search_query.as_str(), Style::default().fg(Theme::text())),
                Span::styled("'. Press Esc to clear filter.", Style::default().fg(Theme::dim())),
            ]));
        }
        return Text::from(lines);
    }

    lines.push(Line::from(Span::styled(
        format!(
            "  {:>4} {:<28} {:<24} {:<16} {:>8} {:<6}",
            "ID", "Timer", "Ticket", "Start", "Duration", "Status"
        ),
        Style::default()
            .fg(Theme::secondary())
            .add_modifier(Modifier::BOLD),
    )));

    for (index, row) in app.timers.iter().enumerate() {
        let selected = index == app.selected_timer_index;
        let status_color = match row.status {
            TimerStatus::Active => Theme::active(),
            TimerStatus::Idle => Theme::text(),
            TimerStatus::Posted => Theme::posted(),
        };
        let line_style = if selected {
            Style::default()
                .fg(Theme::highlight())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Theme::text())
        };
        let marker_style = if selected {
            Style::default().fg(Theme::selection_marker())
        } else {
            Style::default().fg(Theme::dim())
        };
        let ticket = row
            .ticket
            .as_ref()
            .map(|ticket| format!("#{} {}", ticket.ticket_id, ticket.name))
            .unwrap_or_else(|| "-".to_string());
        let start = row.start.map(format_local).unwrap_or_default();

        lines.push(Line::from(vec![
            Span::styled(if selected { "> " } else { "  " }, marker_style),
            Span::styled(
                format!(
                    "{:>4} {} {} {:<16} {:>8} ",
                    row.id,
                    clamp_name(&row.name, 28),
                    clamp_name(&ticket, 24),
                    start,
                    format_duration(row.duration)
                ),
                line_style,
            ),
            Span::styled(
                format!("{:<6}", row.status.as_str()),
                Style::default().fg(status_color),
            ),
        ]));
    }

    Text::from(lines)
}

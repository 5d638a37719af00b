use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span, Text},
};

use super::helpers::{clamp_name, format_local};
use super::search_lines;
use super::theme::Theme;
use crate::app::App;

/// Mirrored projects; the selected one is expanded to show its tickets.
pub fn build_projects_text(app: &App) -> Text<'_> {
    let mut lines = search_lines(app);

    let synced = app
        .last_synced
        .map(format_local)
        .unwrap_or_else(|| "never".to_string());
    lines.push(Line::from(vec![
        Span::styled("Last synced: ", Style::default().fg(Theme::dim())),
        Span::styled(synced, Style::default().fg(Theme::accent())),
    ]));
    lines.push(Line::from(""));

    if app.projects.is_empty() {
        if app.search_query.is_empty() {
            lines.push(Line::from("No projects cached. Press 'S' to sync."));
        } else {
            lines.push(Line::from(vec![
                Span::styled("No projects match '", Style::default().fg(Theme::dim())),
                Span::styled(app.search_query.as_str(), Style::default().fg(Theme::text())),
                Span::styled("'. Press Esc to clear filter.", Style::default().fg(Theme::dim())),
            ]));
        }
        return Text::from(lines);
    }

    lines.push(Line::from(Span::styled(
        format!("  {:>8} {:<40} {:>7}", "ID", "Project", "Tickets"),
        Style::default()
            .fg(Theme::secondary())
            .add_modifier(Modifier::BOLD),
    )));

    for (index, project) in app.projects.iter().enumerate() {
        let selected = index == app.selected_project_index;
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
        let ticket_count = app.tickets_of(project).count();
        lines.push(Line::from(vec![
            Span::styled(if selected { "> " } else { "  " }, marker_style),
            Span::styled(
                format!(
                    "{:>8} {} {:>7}",
                    project.id,
                    clamp_name(&project.name, 40),
                    ticket_count
                ),
                line_style,
            ),
        ]));

        if selected {
            for ticket in app.tickets_of(project) {
                lines.push(Line::from(vec![
                    Span::styled("             ", Style::default()),
                    Span::styled(
                        format!("#{:<6}", ticket.ticket_id),
                        Style::default().fg(Theme::accent()),
                    ),
                    Span::styled(ticket.name.as_str(), Style::default().fg(Theme::dim())),
                ]));
            }
        }
    }

    Text::from(lines)
}

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span, Text},
};

use super::theme::Theme;

pub fn build_help_text() -> Text<'static> {
    let mut lines = Vec::new();

    lines.push(Line::from(Span::styled(
        "Key bindings",
        Style::default()
            .fg(Theme::accent())
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));

    lines.push(section_title("Global"));
    lines.extend(section_lines(&[
        "q: Quit",
        "?: Toggle help",
        "Tab: Next view",
        "t/p: Timers / Projects",
        "r: Reload from the database",
        "S: Refresh projects and tickets from the remote source",
        "/: Filter by name",
        "esc: Clear filter or go back",
    ]));

    lines.push(Line::from(""));
    lines.push(section_title("Timers"));
    lines.extend(section_lines(&[
        "Up/Down: Move selection",
        "space: Stop a running timer, restart an idle one",
        "n: New timer",
        "e: Assign ticket",
        "d: Delete timer",
        "P: Post timer to the remote source",
    ]));

    lines.push(Line::from(""));
    lines.push(section_title("Popups"));
    lines.extend(section_lines(&[
        "New timer: Tab switch field, Up/Down pick ticket, Enter start, Esc cancel",
        "Assign ticket: Up/Down pick ticket, Enter save, Esc cancel",
        "Delete: y confirm, n/Esc cancel",
    ]));

    lines.push(Line::from(""));
    lines.push(section_title("Notes"));
    lines.extend(section_lines(&[
        "Posted timers are locked: they cannot be edited, restarted or deleted",
        "Only stopped timers with a ticket can be posted",
    ]));

    Text::from(lines)
}

fn section_title(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("  {title}"),
        Style::default()
            .fg(Theme::secondary())
            .add_modifier(Modifier::BOLD),
    ))
}

fn section_lines(items: &[&str]) -> Vec<Line<'static>> {
    items
        .iter()
        .map(|item| {
            Line::from(Span::styled(
                format!("  - {item}"),
                Style::default().fg(Theme::text()),
            ))
        })
        .collect()
}

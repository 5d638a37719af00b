use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{App, AppEvent};

/// Refresh interval for running-timer durations.
const TICK_RATE: Duration = Duration::from_millis(250);

fn map_key(key: KeyEvent) -> Option<AppEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(AppEvent::Quit);
    }
    Some(AppEvent::KeyPress(key.code))
}

/// Waits up to `timeout` for input; a quiet interval becomes a tick.
pub fn poll(timeout: Duration) -> Result<Option<AppEvent>> {
    if event::poll(timeout)? {
        return Ok(match event::read()? {
            Event::Key(key) => map_key(key),
            _ => None,
        });
    }
    Ok(Some(AppEvent::Tick))
}

/// Runs the main event loop until the app asks to quit.
pub fn run(app: &mut App, terminal: &mut crate::tui::Terminal) -> Result<()> {
    while app.running {
        terminal.draw(|frame| crate::ui::draw(frame, app))?;

        if let Some(event) = poll(TICK_RATE)? {
            app.update(event);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(map_key(key), Some(AppEvent::Quit)));
    }

    #[test]
    fn plain_keys_pass_through() {
        let key = KeyEvent::new(KeyCode::Char('n'), KeyModifiers::NONE);
        assert!(matches!(map_key(key), Some(AppEvent::KeyPress(KeyCode::Char('n')))));
    }
}

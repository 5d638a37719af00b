mod state;

use crossterm::event::KeyCode;

pub use state::{App, AssignTicketPopup, ConfirmPopup, NewTimerField, NewTimerPopup, TicketOption};

/// Possible input events the app reacts to.
pub enum AppEvent {
    Tick,
    KeyPress(KeyCode),
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppView {
    Timers,
    Projects,
    Help,
}

/// Views reachable from the tab bar, in display order.
pub const TABS: [(&str, AppView); 3] = [
    ("Timers", AppView::Timers),
    ("Projects", AppView::Projects),
    ("Help", AppView::Help),
];

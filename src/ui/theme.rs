use ratatui::style::Color;

/// Unified color theme for the application
pub struct Theme;

impl Theme {
    /// Primary branding color
    pub fn primary() -> Color {
        Color::Magenta
    }

    /// Borders and table headers
    pub fn secondary() -> Color {
        Color::Cyan
    }

    /// Posted timers
    pub fn posted() -> Color {
        Color::Blue
    }

    /// Running timers
    pub fn active() -> Color {
        Color::LightGreen
    }

    /// Status line messages
    pub fn warn() -> Color {
        Color::Yellow
    }

    pub fn highlight() -> Color {
        Color::Cyan
    }

    pub fn selection_marker() -> Color {
        Color::Green
    }

    /// Dimmed/inactive text
    pub fn dim() -> Color {
        Color::DarkGray
    }

    pub fn text() -> Color {
        Color::White
    }

    /// Accent for titles and counts
    pub fn accent() -> Color {
        Color::LightBlue
    }
}

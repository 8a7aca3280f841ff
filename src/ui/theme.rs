//! Status -> color mapping shared by the header counts and the cards.

use ratatui::style::Color;

use crate::status::Status;

pub fn status_color(status: Status) -> Color {
    match status {
        Status::Ok => Color::Green,
        Status::Warn => Color::Yellow,
        Status::Down => Color::Red,
        Status::Stale => Color::Magenta,
        Status::Idle => Color::Gray,
        Status::Disabled => Color::DarkGray,
    }
}

pub fn gauge_color(pct: f64) -> Color {
    if pct < 70.0 {
        Color::Green
    } else if pct < 90.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

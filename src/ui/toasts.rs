//! Notification toasts stacked in the bottom-right corner.

use std::collections::VecDeque;
use std::time::Instant;

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::notify::Notification;

const TOAST_WIDTH: u16 = 44;
const TOAST_HEIGHT: u16 = 3;

pub fn draw_toasts(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    toasts: &VecDeque<(Notification, Instant)>,
) {
    if toasts.is_empty() || area.width < TOAST_WIDTH + 2 {
        return;
    }
    // Newest at the bottom, stacking upward.
    for (i, (toast, _)) in toasts.iter().rev().enumerate() {
        let offset = (i as u16 + 1) * TOAST_HEIGHT;
        if offset + 1 > area.height {
            break;
        }
        let rect = Rect {
            x: area.x + area.width - TOAST_WIDTH - 1,
            y: area.y + area.height - offset - 1,
            width: TOAST_WIDTH,
            height: TOAST_HEIGHT,
        };
        let body = format!(
            "{}: {} bad ({})",
            toast.server_name,
            toast.bad_count,
            toast.bad_names.join(", ")
        );
        let widget = Paragraph::new(body).style(Style::default().fg(Color::Red)).block(
            Block::default()
                .borders(Borders::ALL)
                .title("PM2 alert")
                .border_style(Style::default().fg(Color::Red)),
        );
        f.render_widget(Clear, rect);
        f.render_widget(widget, rect);
    }
}

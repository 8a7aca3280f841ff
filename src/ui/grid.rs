//! Rotating server grid: one bordered card per server with a status-colored
//! frame, resource lines and process-manager counts.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::paging::{PageWindow, GRID_GAP};
use crate::status::{classify, percent};
use crate::types::ServerEntry;
use crate::ui::theme::{gauge_color, status_color};
use crate::ui::util::{fmt_age, human, truncate_middle};

/// Draw one page of server cards laid out in the window's grid shape.
pub fn draw_grid(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    entries: &[ServerEntry],
    now: i64,
    win: &PageWindow,
) {
    if entries.is_empty() {
        let empty = Paragraph::new("no servers")
            .block(Block::default().borders(Borders::ALL).title("Fleet"));
        f.render_widget(empty, area);
        return;
    }

    let cols = win.columns as u16;
    let rows = win.rows as u16;
    let cell_w = (area.width.saturating_sub((cols - 1) * GRID_GAP)) / cols.max(1);
    let cell_h = (area.height.saturating_sub((rows - 1) * GRID_GAP)) / rows.max(1);
    if cell_w < 10 || cell_h < 3 {
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        let col = (i % win.columns) as u16;
        let row = (i / win.columns) as u16;
        if row >= rows {
            break;
        }
        let cell = Rect {
            x: area.x + col * (cell_w + GRID_GAP),
            y: area.y + row * (cell_h + GRID_GAP),
            width: cell_w,
            height: cell_h,
        };
        draw_card(f, cell, entry, now);
    }
}

fn draw_card(f: &mut ratatui::Frame<'_>, area: Rect, entry: &ServerEntry, now: i64) {
    let status = classify(entry, now);
    let color = status_color(status);

    let name_max = area.width.saturating_sub(12) as usize;
    let title = format!(
        " {} [{}] ",
        truncate_middle(&entry.name, name_max.max(4)),
        status.label()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(Span::styled(title, Style::default().fg(color)));

    let mut lines: Vec<Line> = Vec::with_capacity(5);
    lines.push(host_line(entry));
    if let Some(stats) = &entry.stats {
        lines.push(resources_line(stats));
        lines.push(managers_line(stats));
        lines.push(footer_line(entry, now));
    } else {
        lines.push(Line::from(Span::styled(
            "waiting for first update",
            Style::default().fg(Color::DarkGray),
        )));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn host_line(entry: &ServerEntry) -> Line<'static> {
    let mut text = entry.host.clone();
    if !entry.tags.is_empty() {
        text.push_str("  [");
        text.push_str(&entry.tags.join(", "));
        text.push(']');
    }
    Line::from(Span::styled(text, Style::default().fg(Color::Gray)))
}

fn resources_line(stats: &crate::types::ServerStats) -> Line<'static> {
    let mut spans: Vec<Span> = Vec::new();
    if let Some(cpu) = stats.cpu_usage {
        spans.push(Span::styled(
            format!("cpu {cpu:>3.0}%"),
            Style::default().fg(gauge_color(cpu)),
        ));
    }
    if let Some(pct) = percent(stats.memory_used, stats.memory_total) {
        push_sep(&mut spans);
        spans.push(Span::styled(
            format!(
                "mem {}/{} ({pct:.0}%)",
                human(stats.memory_used.unwrap_or(0)),
                human(stats.memory_total.unwrap_or(0)),
            ),
            Style::default().fg(gauge_color(pct)),
        ));
    }
    if let Some(pct) = percent(stats.disk_used, stats.disk_total) {
        push_sep(&mut spans);
        spans.push(Span::styled(
            format!("disk {pct:.0}%"),
            Style::default().fg(gauge_color(pct)),
        ));
    }
    if spans.is_empty() {
        spans.push(Span::styled(
            "no resource data",
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn managers_line(stats: &crate::types::ServerStats) -> Line<'static> {
    let mut spans: Vec<Span> = Vec::new();
    if let Some(procs) = stats.pm2_procs {
        let bad = stats.pm2_bad_count.unwrap_or(0);
        if bad > 0 {
            let names = stats
                .pm2_bad_names
                .as_deref()
                .unwrap_or(&[])
                .join(", ");
            spans.push(Span::styled(
                format!("pm2 {procs} ({bad} bad: {names})"),
                Style::default().fg(Color::Red),
            ));
        } else {
            spans.push(Span::raw(format!("pm2 {procs}")));
        }
    }
    if let (Some(total), Some(running)) = (stats.supervisor_total, stats.supervisor_running) {
        push_sep(&mut spans);
        let style = if running < total {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        spans.push(Span::styled(format!("sup {running}/{total}"), style));
    }
    Line::from(spans)
}

fn footer_line(entry: &ServerEntry, now: i64) -> Line<'static> {
    if let Some(err) = entry.stats.as_ref().and_then(|s| s.error.as_deref()) {
        return Line::from(Span::styled(
            format!("error: {err}"),
            Style::default().fg(Color::Red),
        ));
    }
    let mut text = fmt_age(now, entry.last_update);
    if let Some(up) = entry.stats.as_ref().and_then(|s| s.uptime.as_deref()) {
        text = format!("up {up} · {text}");
    }
    Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)))
}

fn push_sep(spans: &mut Vec<Span<'static>>) {
    if !spans.is_empty() {
        spans.push(Span::raw("  "));
    }
}

//! Top header: connection indicator, fleet counts and page position.

use ratatui::{
    layout::Rect,
    widgets::{Block, Borders},
};

use crate::types::{Aggregates, ConnState};

pub fn draw_header(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    conn: ConnState,
    agg: &Aggregates,
    page: usize,
    pages: usize,
) {
    let glyph = match conn {
        ConnState::Open => "●",
        ConnState::Connecting => "◌",
        ConnState::Closed => "○",
        ConnState::Error => "✕",
    };
    let problems = agg.warn + agg.down + agg.stale;
    let avg_cpu = agg
        .avg_cpu
        .map(|c| format!("cpu~{c:.0}%"))
        .unwrap_or_else(|| "cpu~n/a".into());
    let pm2 = if agg.pm2_bad > 0 {
        format!("pm2 {} ({} bad)", agg.pm2_procs, agg.pm2_bad)
    } else {
        format!("pm2 {}", agg.pm2_procs)
    };
    let title = format!(
        "fleetdeck — {glyph} {} | {} servers: {} ok, {} attention, {} idle/off | {avg_cpu} | {pm2} | sup {}/{} | page {}/{}  (q quits)",
        conn.label(),
        agg.total,
        agg.ok,
        problems,
        agg.idle + agg.disabled,
        agg.supervisor_running,
        agg.supervisor_total,
        page + 1,
        pages.max(1),
    );
    f.render_widget(Block::default().title(title).borders(Borders::BOTTOM), area);
}

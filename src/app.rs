//! App state and main loop: push events, poll fallback, evaluation ticks,
//! rotation, and drawing.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::time::sleep;
use tracing::warn;

use crate::config::Config;
use crate::notify::{Notification, NotifyThrottle};
use crate::paging::{page_bounds, page_count, page_window, Rotation};
use crate::poll::PollClient;
use crate::protocol::{parse_list, parse_stats, Inbound, Outbound};
use crate::push::{PushChannel, PushConfig, PushEvent};
use crate::registry::Registry;
use crate::types::ConnState;

const TICK: Duration = Duration::from_millis(100);
const MAX_TOASTS: usize = 4;

/// Wall-clock ms since epoch, the registry's freshness unit.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Watchdog predicate: the push channel cannot be trusted (non-open, or
/// silent beyond the threshold) and the last poll is old enough to repeat.
pub fn fallback_poll_due(
    state: ConnState,
    silent_for: Duration,
    since_last_poll: Duration,
    threshold: Duration,
) -> bool {
    let stalled = !state.is_open() || silent_for >= threshold;
    stalled && since_last_poll >= threshold
}

pub struct App {
    cfg: Config,
    registry: Registry,
    conn_state: ConnState,
    last_message_at: Option<Instant>,
    last_poll_at: Option<Instant>,
    throttle: NotifyThrottle,
    toasts: VecDeque<(Notification, Instant)>,
    rotation: Rotation,
    last_rotate: Instant,
    should_quit: bool,
}

impl App {
    pub fn new(cfg: Config) -> Self {
        let repeat_ms = cfg.toast_repeat.as_millis() as i64;
        Self {
            cfg,
            registry: Registry::new(),
            conn_state: ConnState::Connecting,
            last_message_at: None,
            last_poll_at: None,
            throttle: NotifyThrottle::new(repeat_ms),
            toasts: VecDeque::new(),
            rotation: Rotation::new(),
            last_rotate: Instant::now(),
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut push = PushChannel::spawn(PushConfig {
            url: self.cfg.ws_url.clone(),
            subscribe_refresh: self.cfg.subscribe_interval,
            backoff_floor: self.cfg.backoff_floor,
            backoff_ceiling: self.cfg.backoff_ceiling,
        });
        let poll = PollClient::new(&self.cfg.api_base, self.cfg.poll_timeout)?;

        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let res = self.event_loop(&mut terminal, &mut push, &poll).await;

        // Teardown: mark the connection dead before restoring the terminal.
        push.shutdown();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        push: &mut PushChannel,
        poll: &PollClient,
    ) -> Result<()> {
        // Prime the registry without waiting for the push channel.
        self.refresh_from_poll(push, poll).await;

        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10))? {
                if let Event::Key(k) = event::read()? {
                    match k.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                            self.should_quit = true;
                        }
                        // Manual page step; the rotation clock restarts so
                        // the page isn't yanked away right after.
                        KeyCode::Right | KeyCode::Char('n') => {
                            let pages = self.current_page_count(terminal)?;
                            self.rotation.advance(pages);
                            self.last_rotate = Instant::now();
                        }
                        _ => {}
                    }
                }
            }
            if self.should_quit {
                break;
            }

            // Drain push events.
            while let Some(ev) = push.try_event() {
                match ev {
                    PushEvent::State(state) => self.conn_state = state,
                    PushEvent::Frame(frame) => {
                        self.last_message_at = Some(Instant::now());
                        self.handle_frame(frame, push);
                    }
                }
            }

            // Poll fallback: scheduled refresh while the push channel isn't
            // live, plus the staleness watchdog for out-of-schedule polls.
            let silent_for = self
                .last_message_at
                .map_or(Duration::MAX, |t| t.elapsed());
            let since_poll = self.last_poll_at.map_or(Duration::MAX, |t| t.elapsed());
            let live = self.conn_state.is_open() && silent_for < self.cfg.silence_threshold;
            if !live && since_poll >= self.cfg.poll_interval {
                self.refresh_from_poll(push, poll).await;
            } else if fallback_poll_due(
                self.conn_state,
                silent_for,
                since_poll,
                self.cfg.silence_threshold,
            ) {
                self.refresh_from_poll(push, poll).await;
            }

            // Notifications for the current alert set.
            let now = now_ms();
            for n in self.throttle.sweep(self.registry.entries(), now) {
                self.toasts.push_back((n, Instant::now()));
                if self.toasts.len() > MAX_TOASTS {
                    self.toasts.pop_front();
                }
            }
            let ttl = self.cfg.toast_auto_close;
            self.toasts.retain(|(_, at)| at.elapsed() < ttl);

            // Rotation cadence.
            if self.last_rotate.elapsed() >= self.cfg.rotate_interval {
                let pages = self.current_page_count(terminal)?;
                self.rotation.advance(pages);
                self.last_rotate = Instant::now();
            }
            self.rotation.tick();

            // Draw
            terminal.draw(|f| self.draw(f))?;

            sleep(TICK).await;
        }

        Ok(())
    }

    fn current_page_count<B: ratatui::backend::Backend>(
        &self,
        terminal: &Terminal<B>,
    ) -> Result<usize> {
        let size = terminal.size()?;
        let win = page_window(size.width, size.height.saturating_sub(1));
        Ok(page_count(self.registry.len(), win.page_size))
    }

    fn handle_frame(&mut self, frame: Inbound, push: &PushChannel) {
        let now = now_ms();
        match frame {
            Inbound::ListUpdate { servers } => {
                let ids = self.registry.apply_list_snapshot(parse_list(&servers));
                self.subscribe_all(push, ids);
            }
            Inbound::ServerUpdate { server } => {
                if let Some((id, patch)) = parse_stats(&server) {
                    self.registry.apply_stats_updates(&[(id, patch)], now);
                }
            }
            Inbound::ServerError { server_id, error } => {
                self.registry.apply_error(&server_id, error.as_deref(), now);
            }
        }
    }

    // One per-server subscription per tracked id, so the push channel starts
    // streaming stats for newly-seen servers. No-op while not open.
    fn subscribe_all(&self, push: &PushChannel, ids: Vec<String>) {
        if !self.conn_state.is_open() {
            return;
        }
        let interval_ms = self.cfg.subscribe_interval.as_millis() as u64;
        for server_id in ids {
            push.send(Outbound::ServerSubscribe {
                server_id,
                interval_ms,
                detail: self.cfg.detail,
            });
        }
    }

    async fn refresh_from_poll(&mut self, push: &PushChannel, poll: &PollClient) {
        self.last_poll_at = Some(Instant::now());
        match poll.fetch_servers().await {
            Ok(items) => {
                let ids = self.registry.apply_list_snapshot(items);
                self.subscribe_all(push, ids);
            }
            // Fail open: keep the last known registry state.
            Err(err) => warn!("poll /servers failed: {err}"),
        }
        match poll.fetch_stats().await {
            Ok(updates) => self.registry.apply_stats_updates(&updates, now_ms()),
            Err(err) => warn!("poll /stats failed: {err}"),
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        use ratatui::layout::{Constraint, Direction, Layout};

        let full = f.area();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(5)])
            .split(full);

        let now = now_ms();
        let grid_area = rows[1];
        let win = page_window(grid_area.width, grid_area.height);
        let pages = page_count(self.registry.len(), win.page_size);
        let active = self.rotation.active(pages);
        let (start, end) = page_bounds(self.registry.len(), win.page_size, active);

        crate::ui::header::draw_header(
            f,
            rows[0],
            self.conn_state,
            &self.registry.aggregates(now),
            active,
            pages,
        );
        crate::ui::grid::draw_grid(f, grid_area, &self.registry.entries()[start..end], now, &win);
        crate::ui::toasts::draw_toasts(f, full, &self.toasts);
    }
}

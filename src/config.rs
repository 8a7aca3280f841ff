//! Recognized configuration options and their defaults.
//!
//! Precedence: CLI flags, then `FLEETDECK_*` environment variables, then the
//! defaults documented on each field.

use std::time::Duration;

use crate::protocol::Detail;
use crate::status::AlertPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the poll API, e.g. `http://ops.example:9600`.
    pub api_base: String,
    /// Push-channel URL; derived from `api_base` when not set explicitly.
    pub ws_url: String,
    /// Detail level requested in per-server subscriptions. Default: full.
    pub detail: Detail,
    /// `interval_ms` requested in per-server subscriptions, and the cadence
    /// of the list-subscription refresh. Default: 5s.
    pub subscribe_interval: Duration,
    /// Scheduled poll refresh cadence. Default: 15s.
    pub poll_interval: Duration,
    /// Per-request poll timeout. Default: 10s.
    pub poll_timeout: Duration,
    /// Page rotation cadence. Default: 10s.
    pub rotate_interval: Duration,
    /// Push silence beyond this marks the channel stalled and allows the
    /// watchdog to poll out of schedule. Default: 15s.
    pub silence_threshold: Duration,
    /// Alert thresholds, independent of the display bands.
    pub alerts: AlertPolicy,
    /// Toast lifetime on screen. Default: 8s.
    pub toast_auto_close: Duration,
    /// Minimum gap between identical notifications per server. Default: 2m.
    pub toast_repeat: Duration,
    /// Reconnect backoff floor/ceiling. Defaults: 1s / 30s.
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
}

impl Config {
    /// Build a config for the given poll base, deriving the push URL when
    /// none was given, with every other option from env or default.
    pub fn for_base(api_base: &str, ws_url: Option<String>) -> Self {
        let api_base = api_base.trim_end_matches('/').to_string();
        let ws_url = ws_url.unwrap_or_else(|| derive_ws_url(&api_base));
        Self {
            api_base,
            ws_url,
            detail: env_detail("FLEETDECK_DETAIL", Detail::Full),
            subscribe_interval: env_duration_ms("FLEETDECK_SUBSCRIBE_INTERVAL_MS", 5_000),
            poll_interval: env_duration_ms("FLEETDECK_POLL_INTERVAL_MS", 15_000),
            poll_timeout: env_duration_ms("FLEETDECK_POLL_TIMEOUT_MS", 10_000),
            rotate_interval: env_duration_ms("FLEETDECK_ROTATE_INTERVAL_MS", 10_000),
            silence_threshold: env_duration_ms("FLEETDECK_SILENCE_THRESHOLD_MS", 15_000),
            alerts: AlertPolicy {
                cpu_pct: env_f64("FLEETDECK_ALERT_CPU_PCT", 90.0),
                memory_pct: env_f64("FLEETDECK_ALERT_MEMORY_PCT", 95.0),
                disk_pct: env_f64("FLEETDECK_ALERT_DISK_PCT", 95.0),
                stale_after_ms: env_i64("FLEETDECK_ALERT_STALE_MS", 120_000),
            },
            toast_auto_close: env_duration_ms("FLEETDECK_TOAST_AUTOCLOSE_MS", 8_000),
            toast_repeat: env_duration_ms("FLEETDECK_TOAST_REPEAT_MS", 120_000),
            backoff_floor: env_duration_ms("FLEETDECK_BACKOFF_FLOOR_MS", 1_000),
            backoff_ceiling: env_duration_ms("FLEETDECK_BACKOFF_CEILING_MS", 30_000),
        }
    }
}

/// Derive the push endpoint from the poll base: `http` becomes `ws`,
/// `https` becomes `wss`, and `/ws` is appended to the path.
pub fn derive_ws_url(api_base: &str) -> String {
    // A bare host:port has no scheme to rewrite.
    if !api_base.contains("://") {
        return format!("ws://{}/ws", api_base.trim_end_matches('/'));
    }
    match url::Url::parse(api_base) {
        Ok(mut u) => {
            let scheme = if u.scheme() == "https" { "wss" } else { "ws" };
            let _ = u.set_scheme(scheme);
            let path = u.path().trim_end_matches('/').to_string();
            u.set_path(&format!("{path}/ws"));
            u.to_string()
        }
        Err(_) => format!("ws://{}/ws", api_base.trim_end_matches('/')),
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn env_detail(name: &str, default: Detail) -> Detail {
    match std::env::var(name).ok().as_deref() {
        Some("summary") => Detail::Summary,
        Some("full") => Detail::Full,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_derivation() {
        assert_eq!(
            derive_ws_url("http://ops.example:9600"),
            "ws://ops.example:9600/ws"
        );
        assert_eq!(derive_ws_url("https://ops.example"), "wss://ops.example/ws");
        assert_eq!(
            derive_ws_url("http://ops.example/api/"),
            "ws://ops.example/api/ws"
        );
        // Bare host:port still yields something connectable.
        assert_eq!(derive_ws_url("ops.example:9600"), "ws://ops.example:9600/ws");
    }

    #[test]
    fn explicit_ws_url_wins_over_derivation() {
        let cfg = Config::for_base("http://ops.example", Some("ws://other:1/feed".into()));
        assert_eq!(cfg.ws_url, "ws://other:1/feed");
        assert_eq!(cfg.api_base, "http://ops.example");
    }
}

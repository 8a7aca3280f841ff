//! Health classification and the alert predicate.
//!
//! Display banding (`classify`) uses fixed thresholds; alerting
//! (`should_alert`) takes a separately tunable [`AlertPolicy`]. The two are
//! independent policies, not one with two names.

use crate::types::ServerEntry;

/// An entry older than this classifies as stale.
pub const STALE_AFTER_MS: i64 = 60_000;

const WARN_CPU_PCT: f64 = 85.0;
const WARN_MEMORY_PCT: f64 = 90.0;
const WARN_DISK_PCT: f64 = 92.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Disabled,
    Idle,
    Down,
    Stale,
    Warn,
    Ok,
}

impl Status {
    pub fn key(&self) -> &'static str {
        match self {
            Status::Disabled => "disabled",
            Status::Idle => "idle",
            Status::Down => "down",
            Status::Stale => "stale",
            Status::Warn => "warn",
            Status::Ok => "ok",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Disabled => "DISABLED",
            Status::Idle => "IDLE",
            Status::Down => "DOWN",
            Status::Stale => "STALE",
            Status::Warn => "WARN",
            Status::Ok => "OK",
        }
    }
}

/// Ratio as a percentage clamped to 0..=100. Undefined when either operand
/// is missing or the denominator is zero.
pub fn percent(part: Option<u64>, total: Option<u64>) -> Option<f64> {
    match (part, total) {
        (Some(p), Some(t)) if t > 0 => Some((p as f64 / t as f64 * 100.0).clamp(0.0, 100.0)),
        _ => None,
    }
}

/// Fixed-precedence classification:
/// disabled > idle > down > stale > warn > ok.
pub fn classify(entry: &ServerEntry, now: i64) -> Status {
    if !entry.enabled {
        return Status::Disabled;
    }
    let Some(stats) = &entry.stats else {
        return Status::Idle;
    };
    if stats.error.is_some() {
        return Status::Down;
    }
    if let Some(ts) = entry.last_update {
        if now - ts > STALE_AFTER_MS {
            return Status::Stale;
        }
    }
    let over_cpu = stats.cpu_usage.is_some_and(|c| c > WARN_CPU_PCT);
    let over_mem =
        percent(stats.memory_used, stats.memory_total).is_some_and(|p| p > WARN_MEMORY_PCT);
    let over_disk = percent(stats.disk_used, stats.disk_total).is_some_and(|p| p > WARN_DISK_PCT);
    if over_cpu || over_mem || over_disk {
        Status::Warn
    } else {
        Status::Ok
    }
}

/// Thresholds for user-facing alerts, tuned independently of the display
/// bands.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub disk_pct: f64,
    pub stale_after_ms: i64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            cpu_pct: 90.0,
            memory_pct: 95.0,
            disk_pct: 95.0,
            stale_after_ms: 120_000,
        }
    }
}

/// Alert predicate: a disabled entry never alerts; an enabled one alerts on
/// a reported error, staleness past the policy ceiling, any resource at or
/// above its alert threshold, or any bad PM2 process.
pub fn should_alert(entry: &ServerEntry, now: i64, policy: &AlertPolicy) -> bool {
    if !entry.enabled {
        return false;
    }
    let Some(stats) = &entry.stats else {
        return false;
    };
    if stats.error.is_some() {
        return true;
    }
    if let Some(ts) = entry.last_update {
        if now - ts >= policy.stale_after_ms {
            return true;
        }
    }
    if stats.cpu_usage.is_some_and(|c| c >= policy.cpu_pct) {
        return true;
    }
    if percent(stats.memory_used, stats.memory_total).is_some_and(|p| p >= policy.memory_pct) {
        return true;
    }
    if percent(stats.disk_used, stats.disk_total).is_some_and(|p| p >= policy.disk_pct) {
        return true;
    }
    stats.pm2_bad_count.is_some_and(|n| n > 0)
}

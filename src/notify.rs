//! Per-entity notification throttle over the PM2 bad-process alert set.
//!
//! A server with bad PM2 processes surfaces a warning once per condition:
//! again when the set of offenders changes, or when the repeat interval
//! elapses. Servers that recover lose their throttle record, so a later
//! recurrence is treated as fresh.

use std::collections::{HashMap, HashSet};

use crate::types::ServerEntry;

/// One user-visible warning about bad PM2 processes on a server.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub server_id: String,
    pub server_name: String,
    pub bad_count: u32,
    pub bad_names: Vec<String>,
}

#[derive(Debug, Clone)]
struct ThrottleRecord {
    signature: String,
    last_notified_at: i64,
}

#[derive(Debug)]
pub struct NotifyThrottle {
    repeat_ms: i64,
    records: HashMap<String, ThrottleRecord>,
}

impl NotifyThrottle {
    pub fn new(repeat_ms: i64) -> Self {
        Self {
            repeat_ms,
            records: HashMap::new(),
        }
    }

    /// Evaluate the registry and return the notifications to surface now.
    pub fn sweep(&mut self, entries: &[ServerEntry], now: i64) -> Vec<Notification> {
        let mut fired = Vec::new();
        let mut qualifying: HashSet<&str> = HashSet::new();

        for entry in entries {
            let Some(stats) = &entry.stats else { continue };
            let bad_count = stats.pm2_bad_count.unwrap_or(0);
            if !entry.enabled || bad_count == 0 {
                continue;
            }
            qualifying.insert(entry.id.as_str());

            let bad_names = stats.pm2_bad_names.clone().unwrap_or_default();
            let signature = format!("{bad_count}:{}", bad_names.join(","));
            let due = match self.records.get(&entry.id) {
                None => true,
                Some(rec) => {
                    rec.signature != signature || now - rec.last_notified_at >= self.repeat_ms
                }
            };
            if due {
                self.records.insert(
                    entry.id.clone(),
                    ThrottleRecord {
                        signature,
                        last_notified_at: now,
                    },
                );
                fired.push(Notification {
                    server_id: entry.id.clone(),
                    server_name: entry.name.clone(),
                    bad_count,
                    bad_names,
                });
            }
        }

        // Entities that left the alert set forget their history.
        self.records.retain(|id, _| qualifying.contains(id.as_str()));
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ServerEntry, ServerStats};

    const REPEAT: i64 = 60_000;

    fn entry(id: &str, bad_count: u32, bad_names: &[&str]) -> ServerEntry {
        ServerEntry {
            id: id.into(),
            name: id.to_uppercase(),
            host: String::new(),
            enabled: true,
            tags: vec![],
            stats: Some(ServerStats {
                pm2_bad_count: Some(bad_count),
                pm2_bad_names: Some(bad_names.iter().map(|s| s.to_string()).collect()),
                ..ServerStats::default()
            }),
            last_update: Some(0),
        }
    }

    #[test]
    fn identical_condition_fires_once_inside_the_window() {
        let mut throttle = NotifyThrottle::new(REPEAT);
        let fleet = vec![entry("a", 2, &["api", "worker"])];

        assert_eq!(throttle.sweep(&fleet, 1_000).len(), 1);
        assert_eq!(throttle.sweep(&fleet, 2_000).len(), 0);
        // Window elapsed: fires again.
        assert_eq!(throttle.sweep(&fleet, 1_000 + REPEAT).len(), 1);
    }

    #[test]
    fn changed_signature_fires_immediately() {
        let mut throttle = NotifyThrottle::new(REPEAT);
        assert_eq!(throttle.sweep(&[entry("a", 1, &["api"])], 1_000).len(), 1);
        let fired = throttle.sweep(&[entry("a", 2, &["api", "worker"])], 2_000);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].bad_count, 2);
    }

    #[test]
    fn recovery_resets_history() {
        let mut throttle = NotifyThrottle::new(REPEAT);
        assert_eq!(throttle.sweep(&[entry("a", 1, &["api"])], 1_000).len(), 1);

        // Recovered: record dropped.
        assert_eq!(throttle.sweep(&[entry("a", 0, &[])], 2_000).len(), 0);

        // Same condition recurs inside what would have been the window:
        // treated as fresh, not rate-limited by stale history.
        assert_eq!(throttle.sweep(&[entry("a", 1, &["api"])], 3_000).len(), 1);
    }

    #[test]
    fn disabled_servers_never_notify() {
        let mut throttle = NotifyThrottle::new(REPEAT);
        let mut e = entry("a", 3, &["api"]);
        e.enabled = false;
        assert!(throttle.sweep(&[e], 1_000).is_empty());
    }
}

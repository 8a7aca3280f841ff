//! Canonical server registry: the single write path for both data sources.
//!
//! List snapshots replace membership wholesale but carry forward known stats;
//! stats updates merge field-by-field with last-non-null-wins. The two
//! operations are orthogonal so a metadata refresh can never blank live
//! metrics and a metrics update can never revive a removed server.

use std::collections::{HashMap, HashSet};

use crate::protocol::{ServerMeta, StatsPatch};
use crate::status::{classify, percent, Status};
use crate::types::{Aggregates, ServerEntry, ServerStats};

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<ServerEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in registry order (the order of the last snapshot).
    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ServerEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ServerEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Wholesale membership replacement. Surviving entries keep their known
    /// `stats` and `last_update` (a snapshot never demotes stats to unknown);
    /// entries absent from the snapshot are dropped. An empty snapshot is a
    /// no-op so a transient empty feed cannot wipe the dashboard. Returns the
    /// ids now tracked so the caller can subscribe to each.
    pub fn apply_list_snapshot(&mut self, items: Vec<ServerMeta>) -> Vec<String> {
        if items.is_empty() {
            return Vec::new();
        }
        let mut carried: HashMap<String, (Option<ServerStats>, Option<i64>)> = self
            .entries
            .drain(..)
            .map(|e| (e.id, (e.stats, e.last_update)))
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        for meta in items {
            if !seen.insert(meta.id.clone()) {
                tracing::debug!(id = %meta.id, "duplicate id in list snapshot, ignoring");
                continue;
            }
            let (stats, last_update) = carried.remove(&meta.id).unwrap_or((None, None));
            self.entries.push(ServerEntry {
                id: meta.id,
                name: meta.name,
                host: meta.host,
                enabled: meta.enabled,
                tags: meta.tags,
                stats,
                last_update,
            });
        }
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    /// Merge stats patches into known entries, stamping freshness with `now`.
    /// Updates for unknown ids are ignored; an empty batch is a no-op.
    pub fn apply_stats_updates(&mut self, updates: &[(String, StatsPatch)], now: i64) {
        for (id, patch) in updates {
            match self.get_mut(id) {
                Some(entry) => {
                    merge_stats(entry.stats.get_or_insert_with(ServerStats::default), patch);
                    entry.last_update = Some(entry.last_update.map_or(now, |prev| prev.max(now)));
                }
                None => tracing::debug!(id = %id, "stats update for unknown server, ignoring"),
            }
        }
    }

    /// Record a server-reported error, preserving other stat fields.
    pub fn apply_error(&mut self, id: &str, message: Option<&str>, now: i64) {
        if let Some(entry) = self.get_mut(id) {
            let stats = entry.stats.get_or_insert_with(ServerStats::default);
            stats.error = Some(
                message
                    .filter(|m| !m.is_empty())
                    .unwrap_or("server reported an error")
                    .to_string(),
            );
            entry.last_update = Some(entry.last_update.map_or(now, |prev| prev.max(now)));
        }
    }

    /// Derived fleet summary; recomputed on demand, never cached.
    pub fn aggregates(&self, now: i64) -> Aggregates {
        let mut agg = Aggregates {
            total: self.entries.len(),
            ..Aggregates::default()
        };
        let mut cpu = MeanAcc::default();
        let mut mem = MeanAcc::default();
        let mut disk = MeanAcc::default();

        for entry in &self.entries {
            match classify(entry, now) {
                Status::Ok => agg.ok += 1,
                Status::Warn => agg.warn += 1,
                Status::Down => agg.down += 1,
                Status::Stale => agg.stale += 1,
                Status::Idle => agg.idle += 1,
                Status::Disabled => agg.disabled += 1,
            }
            agg.last_update = agg.last_update.max(entry.last_update);

            let Some(stats) = &entry.stats else { continue };
            cpu.push(stats.cpu_usage);
            mem.push(percent(stats.memory_used, stats.memory_total));
            disk.push(percent(stats.disk_used, stats.disk_total));
            agg.pm2_procs += stats.pm2_procs.unwrap_or(0);
            agg.pm2_bad += stats.pm2_bad_count.unwrap_or(0);
            agg.supervisor_total += stats.supervisor_total.unwrap_or(0);
            agg.supervisor_running += stats.supervisor_running.unwrap_or(0);
        }

        agg.avg_cpu = cpu.mean();
        agg.avg_memory_pct = mem.mean();
        agg.avg_disk_pct = disk.mean();
        agg
    }
}

#[derive(Default)]
struct MeanAcc {
    sum: f64,
    n: usize,
}

impl MeanAcc {
    fn push(&mut self, v: Option<f64>) {
        if let Some(v) = v {
            self.sum += v;
            self.n += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}

// Last-non-null-wins: a field absent from the patch never changes the
// current value.
fn merge_stats(stats: &mut ServerStats, patch: &StatsPatch) {
    if let Some(v) = patch.cpu_usage {
        stats.cpu_usage = Some(v);
    }
    if let Some(v) = patch.memory_total {
        stats.memory_total = Some(v);
    }
    if let Some(v) = patch.memory_used {
        stats.memory_used = Some(v);
    }
    if let Some(v) = patch.disk_total {
        stats.disk_total = Some(v);
    }
    if let Some(v) = patch.disk_used {
        stats.disk_used = Some(v);
    }
    if let Some(v) = &patch.uptime {
        stats.uptime = Some(v.clone());
    }
    if let Some(v) = patch.pm2_procs {
        stats.pm2_procs = Some(v);
    }
    if let Some(v) = patch.pm2_mem {
        stats.pm2_mem = Some(v);
    }
    if let Some(v) = patch.pm2_bad_count {
        stats.pm2_bad_count = Some(v);
    }
    if let Some(v) = &patch.pm2_bad_names {
        stats.pm2_bad_names = Some(v.clone());
    }
    if let Some(v) = patch.supervisor_total {
        stats.supervisor_total = Some(v);
    }
    if let Some(v) = patch.supervisor_running {
        stats.supervisor_running = Some(v);
    }
    // Carried only when present on the wire: a string sets, an explicit
    // null clears, omission leaves the last value.
    if let Some(e) = &patch.error {
        stats.error = e.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> ServerMeta {
        ServerMeta {
            id: id.into(),
            name: id.to_uppercase(),
            host: format!("{id}.example"),
            enabled: true,
            tags: vec![],
        }
    }

    fn cpu_patch(v: f64) -> StatsPatch {
        StatsPatch {
            cpu_usage: Some(v),
            ..StatsPatch::default()
        }
    }

    #[test]
    fn merge_is_monotone_per_field() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a")]);
        reg.apply_stats_updates(&[("a".into(), cpu_patch(40.0))], 1_000);

        // Memory-only update: cpu must survive untouched.
        let mem_only = StatsPatch {
            memory_used: Some(100),
            memory_total: Some(200),
            ..StatsPatch::default()
        };
        reg.apply_stats_updates(&[("a".into(), mem_only)], 2_000);

        let stats = reg.get("a").unwrap().stats.as_ref().unwrap();
        assert_eq!(stats.cpu_usage, Some(40.0));
        assert_eq!(stats.memory_used, Some(100));
        assert_eq!(stats.memory_total, Some(200));
        assert_eq!(reg.get("a").unwrap().last_update, Some(2_000));
    }

    #[test]
    fn empty_snapshot_is_a_no_op() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a"), meta("b")]);
        let ids = reg.apply_list_snapshot(vec![]);
        assert!(ids.is_empty());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn snapshot_carries_stats_forward_and_drops_absentees() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a"), meta("b")]);
        reg.apply_stats_updates(&[("a".into(), cpu_patch(55.0))], 1_000);

        // New snapshot without "b"; "a" renamed upstream.
        let mut renamed = meta("a");
        renamed.name = "renamed".into();
        let ids = reg.apply_list_snapshot(vec![renamed, meta("c")]);
        assert_eq!(ids, vec!["a".to_string(), "c".into()]);

        let a = reg.get("a").unwrap();
        assert_eq!(a.name, "renamed");
        assert_eq!(a.stats.as_ref().unwrap().cpu_usage, Some(55.0));
        assert_eq!(a.last_update, Some(1_000));
        assert!(reg.get("b").is_none());
        assert!(reg.get("c").unwrap().stats.is_none());
    }

    #[test]
    fn snapshot_deduplicates_ids() {
        let mut reg = Registry::new();
        let ids = reg.apply_list_snapshot(vec![meta("a"), meta("a"), meta("b")]);
        assert_eq!(ids.len(), 2);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn updates_for_unknown_ids_are_ignored() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a")]);
        reg.apply_stats_updates(&[("ghost".into(), cpu_patch(10.0))], 1_000);
        assert!(reg.get("ghost").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn last_update_is_non_decreasing() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a")]);
        reg.apply_stats_updates(&[("a".into(), cpu_patch(10.0))], 5_000);
        // A late-arriving update with an older clock must not move time back.
        reg.apply_stats_updates(&[("a".into(), cpu_patch(20.0))], 4_000);
        let a = reg.get("a").unwrap();
        assert_eq!(a.last_update, Some(5_000));
        assert_eq!(a.stats.as_ref().unwrap().cpu_usage, Some(20.0));
    }

    #[test]
    fn apply_error_preserves_other_fields() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a")]);
        reg.apply_stats_updates(&[("a".into(), cpu_patch(33.0))], 1_000);
        reg.apply_error("a", Some("agent unreachable"), 2_000);

        let stats = reg.get("a").unwrap().stats.as_ref().unwrap();
        assert_eq!(stats.error.as_deref(), Some("agent unreachable"));
        assert_eq!(stats.cpu_usage, Some(33.0));

        // Empty message falls back to the default text.
        reg.apply_error("a", Some(""), 3_000);
        let stats = reg.get("a").unwrap().stats.as_ref().unwrap();
        assert_eq!(stats.error.as_deref(), Some("server reported an error"));
    }

    #[test]
    fn explicit_null_clears_error_but_omission_keeps_it() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a")]);
        reg.apply_error("a", Some("boom"), 1_000);

        reg.apply_stats_updates(&[("a".into(), cpu_patch(10.0))], 2_000);
        assert_eq!(
            reg.get("a").unwrap().stats.as_ref().unwrap().error.as_deref(),
            Some("boom"),
            "update omitting error must not clear it"
        );

        let clear = StatsPatch {
            error: Some(None),
            ..StatsPatch::default()
        };
        reg.apply_stats_updates(&[("a".into(), clear)], 3_000);
        assert_eq!(reg.get("a").unwrap().stats.as_ref().unwrap().error, None);
    }

    #[test]
    fn aggregates_average_only_reported_metrics() {
        let mut reg = Registry::new();
        reg.apply_list_snapshot(vec![meta("a"), meta("b"), meta("c")]);
        reg.apply_stats_updates(
            &[
                ("a".into(), cpu_patch(20.0)),
                ("b".into(), cpu_patch(40.0)),
            ],
            1_000,
        );

        let agg = reg.aggregates(1_500);
        assert_eq!(agg.total, 3);
        assert_eq!(agg.avg_cpu, Some(30.0));
        assert_eq!(agg.idle, 1, "entry without stats counts as idle");
        assert_eq!(agg.last_update, Some(1_000));
    }
}

//! Core data model shared by the reconciler, the evaluators and the UI.

/// One monitored server as known to the registry.
///
/// Created when first seen in a list snapshot, updated in place, and dropped
/// only by being absent from the next full snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntry {
    pub id: String,
    pub name: String,
    pub host: String,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub stats: Option<ServerStats>,
    /// ms since epoch of the last accepted stats update; non-decreasing.
    pub last_update: Option<i64>,
}

/// Last-known metrics for one server.
///
/// Every field is independently optional. Merges only overwrite a field when
/// the incoming patch carries a value for it, so a partial update never
/// demotes known data back to unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStats {
    pub cpu_usage: Option<f64>,
    pub memory_total: Option<u64>,
    pub memory_used: Option<u64>,
    pub disk_total: Option<u64>,
    pub disk_used: Option<u64>,
    pub uptime: Option<String>,
    pub pm2_procs: Option<u32>,
    pub pm2_mem: Option<u64>,
    pub pm2_bad_count: Option<u32>,
    /// At most the first three offending process names.
    pub pm2_bad_names: Option<Vec<String>>,
    pub supervisor_total: Option<u32>,
    pub supervisor_running: Option<u32>,
    pub error: Option<String>,
}

/// Push-channel connection state. Single process-wide value, written only by
/// the connection manager task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Open,
    Closed,
    Error,
}

impl ConnState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnState::Connecting => "connecting",
            ConnState::Open => "live",
            ConnState::Closed => "offline",
            ConnState::Error => "error",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnState::Open)
    }
}

/// Derived fleet summary. Recomputed from the registry on every evaluation
/// tick, never stored independently of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub total: usize,
    pub ok: usize,
    pub warn: usize,
    pub down: usize,
    pub stale: usize,
    pub idle: usize,
    pub disabled: usize,
    /// Means over the entries that actually report the metric.
    pub avg_cpu: Option<f64>,
    pub avg_memory_pct: Option<f64>,
    pub avg_disk_pct: Option<f64>,
    pub pm2_procs: u32,
    pub pm2_bad: u32,
    pub supervisor_total: u32,
    pub supervisor_running: u32,
    /// Most recent `last_update` across the fleet.
    pub last_update: Option<i64>,
}

//! Wire protocol: push-channel frames, poll payload shapes, and the tolerant
//! parsers that turn loosely-typed inbound JSON into validated records.
//!
//! Parsers here are total: malformed input yields an empty list or `None`,
//! never an error and never a partially-populated record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Subscription detail level requested from the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Full,
    Summary,
}

/// Outbound push-channel requests.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "list:subscribe")]
    ListSubscribe { include_disabled: bool },
    #[serde(rename = "server:subscribe")]
    ServerSubscribe {
        server_id: String,
        interval_ms: u64,
        detail: Detail,
    },
}

impl Outbound {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Inbound push-channel frames. An unknown `type` fails to parse and the
/// frame is dropped by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    #[serde(rename = "list:update")]
    ListUpdate {
        #[serde(default)]
        servers: Vec<Value>,
    },
    #[serde(rename = "server:update")]
    ServerUpdate { server: Value },
    #[serde(rename = "server:error")]
    ServerError {
        server_id: String,
        #[serde(default)]
        error: Option<String>,
    },
}

impl Inbound {
    /// Parse one newline-free text frame; `None` for anything malformed.
    pub fn parse(text: &str) -> Option<Inbound> {
        serde_json::from_str(text).ok()
    }
}

/// Body shape shared by both poll endpoints.
#[derive(Debug, Deserialize)]
pub struct PollEnvelope {
    #[serde(default)]
    pub servers: Vec<Value>,
}

/// Identity/metadata half of a server record, normalized from either the
/// push list frame (keyed by `server_id`) or the poll response (keyed by `id`).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerMeta {
    pub id: String,
    pub name: String,
    pub host: String,
    pub enabled: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawListItem {
    #[serde(alias = "server_id")]
    id: Option<String>,
    #[serde(alias = "server_name")]
    name: Option<String>,
    host: Option<String>,
    enabled: Option<bool>,
    tags: Option<Vec<String>>,
}

/// Normalize a list payload. Items without an id are dropped individually;
/// `enabled` defaults to true when absent.
pub fn parse_list(items: &[Value]) -> Vec<ServerMeta> {
    items.iter().filter_map(parse_list_item).collect()
}

fn parse_list_item(v: &Value) -> Option<ServerMeta> {
    let raw: RawListItem = serde_json::from_value(v.clone()).ok()?;
    let id = raw.id.filter(|s| !s.is_empty())?;
    Some(ServerMeta {
        name: raw.name.unwrap_or_else(|| id.clone()),
        host: raw.host.unwrap_or_default(),
        enabled: raw.enabled.unwrap_or(true),
        tags: raw.tags.unwrap_or_default(),
        id,
    })
}

/// Field-level stats patch produced by the parsers and consumed by the
/// registry merge. `error` is doubled so an explicit `null` on the wire
/// (clear) is distinguishable from an absent key (leave unchanged).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsPatch {
    pub cpu_usage: Option<f64>,
    pub memory_total: Option<u64>,
    pub memory_used: Option<u64>,
    pub disk_total: Option<u64>,
    pub disk_used: Option<u64>,
    pub uptime: Option<String>,
    pub pm2_procs: Option<u32>,
    pub pm2_mem: Option<u64>,
    pub pm2_bad_count: Option<u32>,
    pub pm2_bad_names: Option<Vec<String>>,
    pub supervisor_total: Option<u32>,
    pub supervisor_running: Option<u32>,
    pub error: Option<Option<String>>,
}

pub const PM2_BAD_NAME_CAP: usize = 3;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStats {
    #[serde(alias = "id")]
    server_id: Option<String>,
    cpu: Option<RawCpu>,
    memory: Option<RawStorage>,
    disk: Option<RawStorage>,
    uptime: Option<RawUptime>,
    pm2: Option<RawPm2>,
    supervisor: Option<RawSupervisor>,
    #[serde(deserialize_with = "explicit_null")]
    error: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCpu {
    usage_percent: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStorage {
    used_bytes: Option<u64>,
    total_bytes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUptime {
    human: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPm2 {
    processes: Option<u32>,
    total_memory_bytes: Option<u64>,
    details: Option<Vec<RawPm2Proc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPm2Proc {
    name: Option<String>,
    id: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSupervisor {
    total: Option<u32>,
    running: Option<u32>,
}

// Present-but-null deserializes to Some(None); an absent key stays None via
// the container default.
fn explicit_null<'de, D>(d: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(Option::<String>::deserialize(d)?))
}

/// Parse one stats record (push `server` object or poll array element) into
/// the target id and a field patch. `None` when malformed or missing an id.
/// Nested leaves are read defensively: absence at any level yields an absent
/// leaf, not a failure.
pub fn parse_stats(v: &Value) -> Option<(String, StatsPatch)> {
    let raw: RawStats = serde_json::from_value(v.clone()).ok()?;
    let id = raw.server_id.filter(|s| !s.is_empty())?;

    let mut patch = StatsPatch::default();
    if let Some(cpu) = raw.cpu {
        patch.cpu_usage = cpu.usage_percent.map(|p| p.clamp(0.0, 100.0));
    }
    if let Some(mem) = raw.memory {
        patch.memory_used = mem.used_bytes;
        patch.memory_total = mem.total_bytes;
    }
    if let Some(disk) = raw.disk {
        patch.disk_used = disk.used_bytes;
        patch.disk_total = disk.total_bytes;
    }
    if let Some(up) = raw.uptime {
        patch.uptime = up.human;
    }
    if let Some(pm2) = raw.pm2 {
        patch.pm2_procs = pm2.processes;
        patch.pm2_mem = pm2.total_memory_bytes;
        // Bad-process derivation happens only when details are reported at
        // all; otherwise the previous counts stay untouched.
        if let Some(details) = pm2.details {
            let bad: Vec<&RawPm2Proc> = details.iter().filter(|p| is_bad_proc(p)).collect();
            patch.pm2_bad_count = Some(bad.len() as u32);
            patch.pm2_bad_names = Some(
                bad.iter()
                    .take(PM2_BAD_NAME_CAP)
                    .map(|p| proc_name(p))
                    .collect(),
            );
        }
    }
    if let Some(sup) = raw.supervisor {
        patch.supervisor_total = sup.total;
        patch.supervisor_running = sup.running;
    }
    patch.error = raw.error;

    Some((id, patch))
}

/// Batch form used by the poll `/stats` response.
pub fn parse_stats_batch(items: &[Value]) -> Vec<(String, StatsPatch)> {
    items.iter().filter_map(parse_stats).collect()
}

fn is_bad_proc(p: &RawPm2Proc) -> bool {
    !p.status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("online"))
        .unwrap_or(false)
}

fn proc_name(p: &RawPm2Proc) -> String {
    p.name
        .clone()
        .or_else(|| p.id.clone())
        .unwrap_or_else(|| "unknown".into())
}

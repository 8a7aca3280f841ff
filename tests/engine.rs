//! End-to-end engine tests: raw frames through the parsers into the
//! registry, then out through the evaluators.

use fleetdeck::notify::NotifyThrottle;
use fleetdeck::protocol::{parse_list, parse_stats, Inbound};
use fleetdeck::registry::Registry;
use fleetdeck::status::{classify, should_alert, AlertPolicy, Status};

fn apply_frame(reg: &mut Registry, text: &str, now: i64) {
    match Inbound::parse(text).expect("frame parses") {
        Inbound::ListUpdate { servers } => {
            reg.apply_list_snapshot(parse_list(&servers));
        }
        Inbound::ServerUpdate { server } => {
            if let Some(update) = parse_stats(&server) {
                reg.apply_stats_updates(&[update], now);
            }
        }
        Inbound::ServerError { server_id, error } => {
            reg.apply_error(&server_id, error.as_deref(), now);
        }
    }
}

#[test]
fn frames_flow_into_a_consistent_registry() {
    let mut reg = Registry::new();

    apply_frame(
        &mut reg,
        r#"{"type":"list:update","servers":[
            {"server_id":"web-1","name":"web 1","host":"10.0.0.1","tags":["edge"]},
            {"server_id":"db-1","name":"db 1","host":"10.0.0.2"}
        ]}"#,
        1_000,
    );
    assert_eq!(reg.len(), 2);

    apply_frame(
        &mut reg,
        r#"{"type":"server:update","server":{
            "server_id":"web-1",
            "cpu":{"usage_percent":42.5},
            "memory":{"used_bytes":1000,"total_bytes":4000}
        }}"#,
        2_000,
    );

    // Partial update: disk only. CPU and memory must survive.
    apply_frame(
        &mut reg,
        r#"{"type":"server:update","server":{
            "server_id":"web-1",
            "disk":{"used_bytes":10,"total_bytes":100}
        }}"#,
        3_000,
    );

    let web = reg.get("web-1").expect("web-1 present");
    let stats = web.stats.as_ref().expect("stats recorded");
    assert_eq!(stats.cpu_usage, Some(42.5));
    assert_eq!(stats.memory_used, Some(1000));
    assert_eq!(stats.disk_total, Some(100));
    assert_eq!(web.last_update, Some(3_000));

    assert_eq!(classify(web, 3_500), Status::Ok);
    assert_eq!(classify(reg.get("db-1").unwrap(), 3_500), Status::Idle);
}

#[test]
fn server_error_frame_marks_the_entry_down() {
    let mut reg = Registry::new();
    apply_frame(
        &mut reg,
        r#"{"type":"list:update","servers":[{"server_id":"a","host":"h"}]}"#,
        1_000,
    );
    apply_frame(
        &mut reg,
        r#"{"type":"server:error","server_id":"a","error":"agent timeout"}"#,
        2_000,
    );

    let a = reg.get("a").unwrap();
    assert_eq!(classify(a, 2_500), Status::Down);
    assert!(should_alert(a, 2_500, &AlertPolicy::default()));
}

#[test]
fn poll_and_push_sources_commute_on_the_same_entry() {
    let mut reg = Registry::new();
    // Poll-shaped list (keyed by `id`), push-shaped stats (keyed by
    // `server_id`): both land on the same entry.
    reg.apply_list_snapshot(parse_list(&[
        serde_json::json!({"id":"a","name":"alpha","host":"h"}),
    ]));
    let push_update = parse_stats(&serde_json::json!({
        "server_id":"a","cpu":{"usage_percent":10.0}
    }))
    .unwrap();
    let poll_update = parse_stats(&serde_json::json!({
        "id":"a","memory":{"used_bytes":5,"total_bytes":10}
    }))
    .unwrap();

    reg.apply_stats_updates(&[push_update], 1_000);
    reg.apply_stats_updates(&[poll_update], 2_000);

    let stats = reg.get("a").unwrap().stats.as_ref().unwrap();
    assert_eq!(stats.cpu_usage, Some(10.0));
    assert_eq!(stats.memory_used, Some(5));
}

#[test]
fn pm2_alerts_notify_once_then_again_on_change() {
    let mut reg = Registry::new();
    let mut throttle = NotifyThrottle::new(60_000);

    apply_frame(
        &mut reg,
        r#"{"type":"list:update","servers":[{"server_id":"a","name":"alpha","host":"h"}]}"#,
        1_000,
    );
    let bad_one = r#"{"type":"server:update","server":{
        "server_id":"a",
        "pm2":{"processes":3,"details":[
            {"name":"api","status":"online"},
            {"name":"worker","status":"errored"},
            {"name":"cron","status":"online"}
        ]}
    }}"#;
    apply_frame(&mut reg, bad_one, 2_000);

    let fired = throttle.sweep(reg.entries(), 2_000);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].bad_names, vec!["worker".to_string()]);

    // Same condition re-reported inside the window: suppressed.
    apply_frame(&mut reg, bad_one, 3_000);
    assert!(throttle.sweep(reg.entries(), 3_000).is_empty());

    // A second process goes bad: new signature, immediate notification.
    apply_frame(
        &mut reg,
        r#"{"type":"server:update","server":{
            "server_id":"a",
            "pm2":{"processes":3,"details":[
                {"name":"api","status":"online"},
                {"name":"worker","status":"errored"},
                {"name":"cron","status":"stopped"}
            ]}
        }}"#,
        4_000,
    );
    let fired = throttle.sweep(reg.entries(), 4_000);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].bad_count, 2);
}

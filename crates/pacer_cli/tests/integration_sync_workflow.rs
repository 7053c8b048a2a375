//! `pacer sync` / `pacer status` against a local stand-in for the PACER API

use fs2::FileExt;
use pacer_test_helpers::prelude::*;
use pacer_test_helpers::workspace::{queue_file, read_queue};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

/// Request lines seen by the stand-in server
type Seen = Arc<Mutex<Vec<String>>>;

/// Serve forever on a background thread; paths under `fail_prefix` get a 500
fn spawn_api(fail_prefix: Option<&'static str>) -> (String, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}/api", listener.local_addr().unwrap());
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let request_line = read_request(&mut stream);
            log.lock().unwrap().push(request_line.clone());

            let path = request_line.split_whitespace().nth(1).unwrap_or("");
            let failing = fail_prefix.is_some_and(|prefix| path.starts_with(prefix));
            let (status, body) = if failing {
                ("500 Internal Server Error", r#"{"detail":"database unavailable"}"#)
            } else {
                ("200 OK", r#"{"ok":true}"#)
            };
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (base, seen)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    line.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .and_then(|v| v.trim().parse::<usize>().ok())
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

fn entry(id: &str, mut action: Value) -> Value {
    action["id"] = json!(id);
    action["timestamp"] = json!("2024-03-01T10:00:00Z");
    action
}

fn seeded_queue() -> Vec<Value> {
    vec![
        entry(
            "11111111-1111-4111-8111-111111111111",
            json!({ "type": "SAVE_PROGRESS", "data": { "completed_sessions": 3 } }),
        ),
        entry(
            "22222222-2222-4222-8222-222222222222",
            json!({ "type": "JOIN_TEAM", "data": { "team_id": 7, "user_id": 3 } }),
        ),
        entry(
            "33333333-3333-4333-8333-333333333333",
            json!({ "type": "SAVE_SESSION", "data": { "scenario_id": 2, "score": 88 } }),
        ),
    ]
}

fn report_of(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("sync --json prints a JSON report")
}

#[test]
fn test_sync_all_succeed() {
    let (base, seen) = spawn_api(None);
    let workspace = workspace_with_queue(&seeded_queue());

    let output = pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", &base)
        .env("PACER_TOKEN", "test-token")
        .args(["sync", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(valid_sync_report().eval(&String::from_utf8_lossy(&output.stdout)));
    let report = report_of(&output);
    assert_eq!(report["status"], "completed");
    assert_eq!(report["success"], true);
    assert_eq!(report["synced_count"], 3);
    assert_eq!(report["message"], "Successfully synced 3 actions");
    assert!(!queue_file(workspace.path()).exists());

    // Replayed in enqueue order after the reachability probe
    let posts: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("POST"))
        .cloned()
        .collect();
    assert_eq!(
        posts,
        vec![
            "POST /api/progress HTTP/1.1",
            "POST /api/team/teams/7/join HTTP/1.1",
            "POST /api/game/sessions HTTP/1.1",
        ]
    );
}

#[test]
fn test_sync_partial_failure_keeps_failed_actions() {
    let (base, _seen) = spawn_api(Some("/api/team/"));
    let workspace = workspace_with_queue(&seeded_queue());

    let output = pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", &base)
        .args(["sync", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(pacer_common::EXIT_PARTIAL_SYNC));
    let report = report_of(&output);
    assert_eq!(report["synced_count"], 2);
    assert_eq!(report["failed_count"], 1);
    assert_eq!(report["message"], "Synced 2 actions, 1 failed");

    let remaining = read_queue(workspace.path());
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], "22222222-2222-4222-8222-222222222222");
    assert!(remaining[0]["error"]
        .as_str()
        .unwrap()
        .contains("HTTP 500"));
}

#[test]
fn test_sync_partial_failure_text_output() {
    let (base, _seen) = spawn_api(Some("/api/game/"));
    let workspace = workspace_with_queue(&seeded_queue());

    pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", &base)
        .arg("sync")
        .assert()
        .code(pacer_common::EXIT_PARTIAL_SYNC)
        .stderr(
            predicate::str::contains("Synced 2 actions, 1 failed")
                .and(predicate::str::contains("SAVE_SESSION")),
        );
}

#[test]
fn test_sync_offline_flag_postpones() {
    let workspace = workspace_with_queue(&seeded_queue());
    let before = std::fs::read(queue_file(workspace.path())).unwrap();

    let output = pacer_command()
        .current_dir(workspace.path())
        .args(["sync", "--offline", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report = report_of(&output);
    assert_eq!(report["status"], "postponed");
    assert_eq!(report["success"], false);
    assert!(report["message"].as_str().unwrap().contains("postponed"));
    assert_eq!(std::fs::read(queue_file(workspace.path())).unwrap(), before);
}

#[test]
fn test_sync_unreachable_api_postpones() {
    let workspace = workspace_with_queue(&seeded_queue());

    pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", closed_port_url())
        .arg("sync")
        .assert()
        .success()
        .stderr(predicate::str::contains("Offline mode detected, sync postponed"));

    assert_eq!(read_queue(workspace.path()).len(), 3);
}

#[test]
fn test_sync_empty_queue() {
    let (base, seen) = spawn_api(None);
    let workspace = init_workspace();

    let output = pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", &base)
        .args(["sync", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report = report_of(&output);
    assert_eq!(report["status"], "nothing_to_sync");
    assert_eq!(report["synced_count"], 0);
    assert!(seen.lock().unwrap().iter().all(|line| !line.starts_with("POST")));
}

#[test]
fn test_sync_refused_while_lock_held() {
    let workspace = workspace_with_queue(&seeded_queue());
    let lock_path = workspace.path().join(".pacer/sync.lock");
    let lock = std::fs::File::create(&lock_path).unwrap();
    FileExt::lock_exclusive(&lock).unwrap();

    let output = pacer_command()
        .current_dir(workspace.path())
        .args(["sync", "--offline", "--json"])
        .output()
        .unwrap();

    let report = report_of(&output);
    assert_eq!(report["status"], "already_running");
    assert_eq!(report["message"], "Sync already in progress");
    assert_eq!(read_queue(workspace.path()).len(), 3);

    FileExt::unlock(&lock).unwrap();
}

#[test]
fn test_status_reports_sync_held_by_another_process() {
    let workspace = workspace_with_queue(&seeded_queue());
    let lock = std::fs::File::create(workspace.path().join(".pacer/sync.lock")).unwrap();
    FileExt::lock_exclusive(&lock).unwrap();

    let output = pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", closed_port_url())
        .args(["status", "--json"])
        .output()
        .unwrap();
    FileExt::unlock(&lock).unwrap();

    assert!(output.status.success());
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["syncing"], true);
}

#[test]
fn test_sync_replays_web_client_queue() {
    let (base, seen) = spawn_api(None);
    let workspace = workspace_with_queue(&[
        json!({ "type": "JOIN_TEAM", "data": { "teamId": 4, "userId": 9 }, "timestamp": "2024-03-01T10:00:00.000Z" }),
        json!({ "type": "LEAVE_TEAM", "data": { "teamId": 4, "userId": 9 }, "timestamp": "2024-03-01T10:01:00.000Z" }),
    ]);

    let output = pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", &base)
        .args(["sync", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(report_of(&output)["synced_count"], 2);
    let posts: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("POST"))
        .cloned()
        .collect();
    assert_eq!(
        posts,
        vec![
            "POST /api/team/teams/4/join HTTP/1.1",
            "POST /api/team/teams/4/leave HTTP/1.1",
        ]
    );
}

#[test]
fn test_status_json() {
    let workspace = workspace_with_queue(&seeded_queue());

    let output = pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", closed_port_url())
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["online"], false);
    assert_eq!(status["pending"], 3);
    assert_eq!(status["syncing"], false);
    assert_eq!(status["storage"]["available"], true);
    assert_eq!(status["notice"]["severity"], "warning");
}

#[test]
fn test_status_online_with_pending() {
    let (base, _seen) = spawn_api(None);
    let workspace = workspace_with_queue(&seeded_queue());

    pacer_command()
        .current_dir(workspace.path())
        .env("PACER_API_URL", &base)
        .arg("status")
        .assert()
        .success()
        .stderr(
            predicate::str::contains("(online)")
                .and(predicate::str::contains("You have 3 pending changes to sync.")),
        );
}

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

use cluster_topology::test_support::{cluster_fixture, remove_dir_if_exists, temp_path};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::time::sleep;

struct SnapshotDir {
    dir: PathBuf,
    file: PathBuf,
}

impl Drop for SnapshotDir {
    fn drop(&mut self) {
        remove_dir_if_exists(&self.dir);
    }
}

struct RunningServer {
    child: Child,
    bind_addr: String,
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn render_prints_layout_and_batch_json() {
    let snapshot = write_snapshot("render", &json_snapshot(&[10]));

    let output = run_cli(&["render", "--snapshot", path_arg(&snapshot.file)]);
    let body = stdout_json(&output);

    assert_eq!(body["currentClusterId"], "c1");
    let nodes = body["layout"]["nodes"]
        .as_array()
        .expect("layout nodes should be an array");
    assert_eq!(nodes.len(), 3, "oversized zone should start collapsed");

    let expanded = run_cli(&[
        "render",
        "--snapshot",
        path_arg(&snapshot.file),
        "--expand",
        "zone1",
    ]);
    let body = stdout_json(&expanded);
    let nodes = body["layout"]["nodes"]
        .as_array()
        .expect("layout nodes should be an array");
    assert_eq!(nodes.len(), 13);
    assert!(
        body["batch"]["diagram"]
            .as_array()
            .expect("diagram should be an array")
            .iter()
            .any(|command| command["id"] == "node:server:c1-z1-s10:box")
    );
}

#[test]
fn render_rejects_unknown_expand_target() {
    let snapshot = write_snapshot("render-unknown", &json_snapshot(&[2]));

    let output = run_cli(&[
        "render",
        "--snapshot",
        path_arg(&snapshot.file),
        "--expand",
        "zone9",
    ]);

    assert!(!output.status.success(), "unknown node should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unknown node `zone9`"),
        "expected unknown node in stderr, got: {stderr}"
    );
}

#[test]
fn menu_prints_resolved_entries() {
    let snapshot = write_snapshot("menu", &json_snapshot(&[2]));

    let output = run_cli(&[
        "menu",
        "--snapshot",
        path_arg(&snapshot.file),
        "--node",
        "c1",
    ]);
    let body = stdout_json(&output);

    assert_eq!(body["kind"], "cluster");
    let entries = body["entries"]
        .as_array()
        .expect("entries should be an array");
    assert_eq!(entries[0]["key"], "create_tenant");
    assert_eq!(
        entries.last().map(|entry| entry["key"].clone()),
        Some(json!("download_logs"))
    );
    assert!(entries.iter().any(|entry| entry["type"] == "divider"));
}

#[test]
fn missing_snapshot_file_is_reported() {
    let missing = temp_path("cli-missing").join("snapshot.json");

    let output = run_cli(&["render", "--snapshot", path_arg(&missing)]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load snapshot"),
        "expected load failure in stderr, got: {stderr}"
    );
}

#[tokio::test]
async fn serve_renders_and_resolves_menus() {
    let Some(server) = start_server().await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/render", server.bind_addr))
        .json(&json!({
            "clusters": json_snapshot(&[3]),
            "viewport": { "width": 800.0, "height": 600.0 }
        }))
        .send()
        .await
        .expect("render request should complete");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response
        .json()
        .await
        .expect("render response should be valid JSON");
    assert_eq!(
        body["layout"]["nodes"]
            .as_array()
            .map(Vec::len),
        Some(6)
    );

    let response = client
        .post(format!("http://{}/menu", server.bind_addr))
        .json(&json!({
            "clusters": json_snapshot(&[3]),
            "nodeId": "ghost"
        }))
        .send()
        .await
        .expect("menu request should complete");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response
        .json()
        .await
        .expect("error body should be valid JSON");
    let error = body["error"].as_str().expect("error should be a string");
    assert!(
        error.contains("unknown node `ghost`"),
        "expected unknown node in error, got: {error}"
    );
}

async fn start_server() -> Option<RunningServer> {
    let port = find_available_port()?;
    let bind_addr = format!("127.0.0.1:{port}");

    let mut command = Command::new(bin_path());
    command
        .args(["serve", "--bind", &bind_addr])
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    apply_test_env(&mut command);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(error) => panic!("server should start: {error}"),
    };

    let health_url = format!("http://{bind_addr}/health");
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Some(status) = child.try_wait().expect("failed to poll server process") {
            panic!("server exited before becoming healthy: {status}");
        }

        if let Ok(response) = client.get(&health_url).send().await
            && response.status().is_success()
        {
            return Some(RunningServer { child, bind_addr });
        }

        sleep(Duration::from_millis(50)).await;
    }

    let _ = child.kill();
    let _ = child.wait();
    panic!("server did not become healthy at {health_url}");
}

fn run_cli(args: &[&str]) -> Output {
    let mut command = Command::new(bin_path());
    command.args(args);
    apply_test_env(&mut command);
    command.output().expect("CLI command should execute")
}

fn apply_test_env(command: &mut Command) {
    command
        .env("RUST_LOG", "warn")
        .env_remove("TOPOLOGY_LOG_DIR")
        .env_remove("TOPOLOGY_SNAPSHOT_SOURCE")
        .env_remove("TOPOLOGY_CURRENT_CLUSTER")
        .env("TOPOLOGY_TASK_API_URL", "http://127.0.0.1:9/api/v1");
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "CLI should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON")
}

fn json_snapshot(servers_per_zone: &[usize]) -> Value {
    serde_json::to_value(cluster_fixture("c1", servers_per_zone))
        .expect("fixture should serialize")
}

fn write_snapshot(prefix: &str, snapshot: &Value) -> SnapshotDir {
    let dir = temp_path(prefix);
    fs::create_dir_all(&dir).expect("snapshot dir should be creatable");
    let file = dir.join("snapshot.json");
    fs::write(
        &file,
        serde_json::to_vec_pretty(snapshot).expect("snapshot should serialize"),
    )
    .expect("snapshot should be writable");
    SnapshotDir { dir, file }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths should be valid UTF-8")
}

fn find_available_port() -> Option<u16> {
    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(error) => panic!("ephemeral port should be available for bind: {error}"),
    };
    let port = listener
        .local_addr()
        .expect("ephemeral listener should have local address")
        .port();
    drop(listener);
    Some(port)
}

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_cluster-topology")
}

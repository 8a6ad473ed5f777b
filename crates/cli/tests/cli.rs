use assert_cmd::Command;
use predicates::prelude::*;
use std::net::TcpStream;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn toolhost(runtime_dir: &Path, config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("toolhost").expect("binary");
    cmd.env("TOOLHOST_RUNTIME_DIR", runtime_dir)
        .env("TOOLHOST_CONFIG_DIR", config_dir)
        .env_remove("TOOLHOST_FILESYSTEM_ALLOWED_DIR")
        .env_remove("TOOLHOST_FILESYSTEM_HOST")
        .env_remove("TOOLHOST_FILESYSTEM_PORT");
    cmd
}

#[test]
fn help_lists_the_lifecycle_commands() {
    Command::cargo_bin("toolhost")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn unknown_server_type_is_rejected_by_the_parser() {
    let runtime = TempDir::new().unwrap();
    let config = TempDir::new().unwrap();
    toolhost(runtime.path(), config.path())
        .args(["start", "--server", "frobnicator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown server type"));
}

#[test]
fn stop_without_a_record_reports_not_running() {
    let runtime = TempDir::new().unwrap();
    let config = TempDir::new().unwrap();
    toolhost(runtime.path(), config.path())
        .args(["stop", "--server", "filesystem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no running filesystem server found"));
}

#[test]
fn start_with_an_invalid_root_fails_before_serving() {
    let runtime = TempDir::new().unwrap();
    let config = TempDir::new().unwrap();
    toolhost(runtime.path(), config.path())
        .args([
            "start",
            "--server",
            "filesystem",
            "--allowed-dir",
            "/nonexistent/toolhost-root",
            "--port",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid allowed root"));
    assert!(!runtime.path().join("filesystem.pid").exists());
}

#[test]
fn search_kinds_have_no_builtin_launcher() {
    let runtime = TempDir::new().unwrap();
    let config = TempDir::new().unwrap();
    toolhost(runtime.path(), config.path())
        .args(["start", "--server", "brave_search"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no launcher registered"));
}

#[test]
fn init_writes_the_config_skeleton() {
    let runtime = TempDir::new().unwrap();
    let config_parent = TempDir::new().unwrap();
    let config = config_parent.path().join("toolhost-config");

    toolhost(runtime.path(), &config)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Example settings written"));

    assert!(config.join(".env").exists());
    assert!(config.join("searxng_config/settings.yml").exists());
}

/// Kills a leaked daemon if an assertion fails mid-test.
struct ReapOnDrop(u32);

impl Drop for ReapOnDrop {
    fn drop(&mut self) {
        let _ = std::process::Command::new("kill")
            .args(["-TERM", &self.0.to_string()])
            .status();
    }
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn detached_lifecycle_start_duplicate_stop_restart() {
    let runtime = TempDir::new().unwrap();
    let config = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let pid_file = runtime.path().join("filesystem.pid");

    let start = |expect_root: &Path| {
        let mut cmd = toolhost(runtime.path(), config.path());
        cmd.args([
            "start",
            "--server",
            "filesystem",
            "--detach",
            "--port",
            "0",
            "--allowed-dir",
        ])
        .arg(expect_root);
        cmd
    };

    start(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("detached mode"));
    assert!(pid_file.exists(), "record must exist once start returns");

    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&pid_file).unwrap()).unwrap();
    let pid = record["pid"].as_u64().unwrap() as u32;
    let port = record["port"].as_u64().unwrap() as u16;
    let _reaper = ReapOnDrop(pid);

    assert!(
        wait_until(Duration::from_secs(5), || {
            TcpStream::connect(("127.0.0.1", port)).is_ok()
        }),
        "server must accept connections"
    );

    // Second start of the same type must refuse.
    start(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already running"));

    toolhost(runtime.path(), config.path())
        .args(["stop", "--server", "filesystem"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent shutdown signal"));

    // Graceful stop deletes the record from inside the server process.
    assert!(
        wait_until(Duration::from_secs(5), || !pid_file.exists()),
        "record must disappear after graceful stop"
    );

    // And a subsequent start succeeds again.
    start(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("detached mode"));
    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&pid_file).unwrap()).unwrap();
    let _reaper2 = ReapOnDrop(record["pid"].as_u64().unwrap() as u32);

    toolhost(runtime.path(), config.path())
        .args(["stop", "--server", "filesystem"])
        .assert()
        .success();
    wait_until(Duration::from_secs(5), || !pid_file.exists());
}

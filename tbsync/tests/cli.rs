//! End-to-end tests for the `tbsync` and `tbsync-launch` binaries.

use std::fs;

use assert_cmd::Command;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const TBSYNC_VARS: &[&str] = &[
    "TBSYNC_VENV_DIR",
    "TBSYNC_WORK_DIR",
    "TBSYNC_PROGRAM",
    "TBSYNC_SCRIPT",
    "TBSYNC_ARGS",
    "TBSYNC_PROPAGATE_EXIT",
    "TBSYNC_CONFIG_DIR",
    "THINGSBOARD_CONFIG_DIR",
    "TBSYNC_DATA_DIR",
    "THINGSBOARD_DATA_DIR",
    "TBSYNC_TOKEN_FILE",
    "TBSYNC_START_DATE",
    "TBSYNC_PAGE_LIMIT",
    "TBSYNC_AUDIT_LOG",
];

/// Binary with a clean TBSYNC_* environment, run from `dir`.
fn bin(name: &str, dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(name).unwrap();
    for var in TBSYNC_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(dir.path()).env("TBSYNC_QUIET", "1");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let tmp = TempDir::new().unwrap();
    bin("tbsync", &tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("organize"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("launch"));
}

#[test]
fn download_without_config_fails() {
    let tmp = TempDir::new().unwrap();
    bin("tbsync", &tmp)
        .args(["download", "--config-dir"])
        .arg(tmp.path().join("missing"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn invalid_start_date_is_rejected() {
    let tmp = TempDir::new().unwrap();
    bin("tbsync", &tmp)
        .args(["download", "--start-date", "01/09/2024"])
        .assert()
        .failure();
}

#[test]
fn env_json_shows_defaults() {
    let tmp = TempDir::new().unwrap();
    let out = bin("tbsync", &tmp)
        .args(["env", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["launcher"]["venv_dir"], "/mnt/thingsboard_data/venv");
    assert_eq!(v["launcher"]["work_dir"], "/mnt/thingsboard_data/Descargas");
    assert_eq!(v["launcher"]["script"], "descargar_v0.py");
    assert_eq!(v["launcher"]["propagate_exit_code"], false);
    assert_eq!(v["downloader"]["start_date"], "2024-09-01");
    assert_eq!(v["downloader"]["page_limit"], 50000);
}

#[test]
fn env_reads_dotenv_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".env"), "TBSYNC_PAGE_LIMIT=1234\n").unwrap();
    bin("tbsync", &tmp)
        .args(["env", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1234"));
}

#[test]
fn organize_mirrors_server_tree() {
    let mut server = Server::new();
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("conf");
    let data_dir = tmp.path().join("data");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.json"),
        json!({
            "thingsboard_url": server.url(),
            "username": "tenant@example.com",
            "password": "secret"
        })
        .to_string(),
    )
    .unwrap();

    let _login = server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_body(json!({"token": "tok"}).to_string())
        .create();
    let _customers = server
        .mock("GET", "/api/customers")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "data": [{"id": {"id": "c1"}, "title": "Norte"}],
                "hasNext": false
            })
            .to_string(),
        )
        .create();
    let _gateways = server
        .mock("GET", "/api/customer/c1/devices")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "data": [{"id": {"id": "g1"}, "name": "gw-1", "additionalInfo": {"gateway": true}}],
                "hasNext": false
            })
            .to_string(),
        )
        .create();
    let _devices = server
        .mock("GET", "/api/tenant/devices")
        .match_query(Matcher::UrlEncoded("gatewayId".into(), "g1".into()))
        .with_status(200)
        .with_body(
            json!({
                "data": [{"id": {"id": "d1"}, "name": "sensor-1"}],
                "hasNext": false
            })
            .to_string(),
        )
        .create();

    let out = bin("tbsync", &tmp)
        .env("TBSYNC_CONFIG_DIR", &config_dir)
        .env("TBSYNC_DATA_DIR", &data_dir)
        .env("TBSYNC_TOKEN_FILE", tmp.path().join("token.json"))
        .args(["organize", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        summary,
        json!({"customers": 1, "gateways": 1, "devices": 1, "name_collisions": 0})
    );
    assert!(data_dir.join("Norte/Norte_customer.json").is_file());
    assert!(data_dir.join("Norte/gw-1/gw-1_gateway.json").is_file());
    assert!(data_dir
        .join("Norte/gw-1/sensor-1/sensor-1_device.json")
        .is_file());
    assert!(tmp.path().join("token.json").is_file());
}

#[cfg(unix)]
#[test]
fn launcher_discards_child_exit_code() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let venv = root.join("venv");
    fs::create_dir_all(venv.join("bin")).unwrap();
    fs::write(venv.join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();
    let work = root.join("Descargas");
    fs::create_dir_all(&work).unwrap();
    fs::write(
        work.join("stub.sh"),
        "pwd > ran\nprintf '%s' \"$VIRTUAL_ENV\" > venv\nexit 1\n",
    )
    .unwrap();

    bin("tbsync-launch", &tmp)
        .env("TBSYNC_VENV_DIR", &venv)
        .env("TBSYNC_WORK_DIR", &work)
        .env("TBSYNC_PROGRAM", "/bin/sh")
        .env("TBSYNC_SCRIPT", "stub.sh")
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());

    let cwd = fs::read_to_string(work.join("ran")).unwrap();
    assert_eq!(cwd.trim(), work.to_string_lossy());
    assert_eq!(
        fs::read_to_string(work.join("venv")).unwrap(),
        venv.to_string_lossy()
    );
}

#[cfg(unix)]
#[test]
fn launcher_missing_venv_exits_127() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("stub.sh"), "exit 0\n").unwrap();

    bin("tbsync", &tmp)
        .env("TBSYNC_VENV_DIR", tmp.path().join("no-venv"))
        .env("TBSYNC_WORK_DIR", tmp.path())
        .env("TBSYNC_PROGRAM", "/bin/sh")
        .env("TBSYNC_SCRIPT", "stub.sh")
        .arg("launch")
        .assert()
        .code(127);
}

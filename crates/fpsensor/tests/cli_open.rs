#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};

use fpsensor::bringup::REFERENCE_OTP;
use fpsensor::proto::render_hex;
use serde_json::Value;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/fpcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn fpsensor() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fpsensor"));
    cmd.arg("--log-level").arg("error").arg("--format").arg("json");
    cmd
}

/// Serve exactly one host session.
fn spawn_emulator(sock_path: &Path, extra: &[&str]) -> Child {
    fpsensor()
        .arg("emulate")
        .arg(sock_path)
        .arg("--count")
        .arg("1")
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("emulate command should start")
}

fn open(sock_path: &Path) -> Output {
    fpsensor()
        .arg("open")
        .arg(sock_path)
        .arg("--timeout")
        .arg("5s")
        .output()
        .expect("open should run")
}

fn json_line(bytes: &[u8]) -> Value {
    let text = String::from_utf8_lossy(bytes);
    let line = text.lines().next().expect("one line of output");
    serde_json::from_str(line).expect("output should be json")
}

#[test]
fn open_against_emulator_reports_device() {
    let dir = unique_temp_dir("open");
    let sock_path = dir.join("sensor.sock");
    let emulator = spawn_emulator(&sock_path, &[]);

    let output = open(&sock_path);
    assert!(
        output.status.success(),
        "open failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let device = json_line(&output.stdout);
    assert_eq!(device["device"], "goodixtls5395");
    assert_eq!(device["firmware"], "GF5288_HTSEC_APP_10011");
    assert_eq!(device["chip_id"], "0x00220c5a");
    assert_eq!(device["psk_provisioned"], false);
    assert_eq!(device["calibration"]["fdt_base"].as_array().map(Vec::len), Some(12));

    let steps = device["steps"].as_array().expect("steps array");
    assert_eq!(steps.len(), 9);
    assert_eq!(steps[5]["state"], "WRITE_PSK");
    assert_eq!(steps[5]["outcome"], "skipped");
    assert_eq!(steps[8]["state"], "SET_SLEEP_MODE");

    assert_eq!(device["closed"], false);
    assert!(device.get("asleep").is_none());

    let served = emulator.wait_with_output().expect("emulator should exit");
    assert!(served.status.success());
    let session = json_line(&served.stdout);
    assert_eq!(session["session"], 1);
    assert_eq!(session["commands"].as_array().map(Vec::len), Some(12));
    assert_eq!(session["commands"][0], "ping");
    assert_eq!(session["psk_written"], false);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn open_with_close_sleeps_again() {
    let dir = unique_temp_dir("close");
    let sock_path = dir.join("sensor.sock");
    let emulator = spawn_emulator(&sock_path, &[]);

    let output = fpsensor()
        .arg("open")
        .arg(&sock_path)
        .arg("--close")
        .output()
        .expect("open should run");
    assert!(output.status.success());
    assert_eq!(json_line(&output.stdout)["closed"], true);

    let served = emulator.wait_with_output().expect("emulator should exit");
    let commands = json_line(&served.stdout)["commands"].clone();
    let commands = commands.as_array().expect("commands array");
    assert_eq!(commands.len(), 13);
    assert_eq!(commands[11], "sleep");
    assert_eq!(commands[12], "sleep");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn open_provisions_missing_psk() {
    let dir = unique_temp_dir("provision");
    let sock_path = dir.join("sensor.sock");
    let emulator = spawn_emulator(&sock_path, &["--unprovisioned"]);

    let output = open(&sock_path);
    assert!(output.status.success());
    assert_eq!(json_line(&output.stdout)["psk_provisioned"], true);

    let served = emulator.wait_with_output().expect("emulator should exit");
    assert_eq!(json_line(&served.stdout)["psk_written"], true);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unsupported_firmware_fails_open() {
    let dir = unique_temp_dir("firmware");
    let sock_path = dir.join("sensor.sock");
    let emulator = spawn_emulator(&sock_path, &["--firmware", "GF5288_HTSEC_APP_10012"]);

    let output = open(&sock_path);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CHECK_FIRMWARE"), "stderr: {stderr}");
    assert!(stderr.contains("not supported"), "stderr: {stderr}");

    let served = emulator.wait_with_output().expect("emulator should exit");
    let session = json_line(&served.stdout);
    assert_eq!(session["commands"], serde_json::json!(["ping", "firmware-version"]));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn foreign_chip_fails_open() {
    let dir = unique_temp_dir("chip");
    let sock_path = dir.join("sensor.sock");
    let emulator = spawn_emulator(&sock_path, &["--chip-id", "0x00123456"]);

    let output = open(&sock_path);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DEVICE_ENABLE"), "stderr: {stderr}");

    let _ = emulator.wait_with_output();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn open_missing_socket_times_out() {
    let dir = unique_temp_dir("missing");
    let output = fpsensor()
        .arg("open")
        .arg(dir.join("absent.sock"))
        .arg("--timeout")
        .arg("200ms")
        .output()
        .expect("open should run");

    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("timed out"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn open_rejects_bad_timeout() {
    let output = fpsensor()
        .arg("open")
        .arg("/tmp/fpcli-unused.sock")
        .arg("--timeout")
        .arg("0s")
        .output()
        .expect("open should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn open_rejects_malformed_config() {
    let dir = unique_temp_dir("config");
    let config = dir.join("bringup.json");
    std::fs::write(&config, b"{\"timeouts\": 5").expect("config should be writable");

    let output = fpsensor()
        .arg("open")
        .arg(dir.join("sensor.sock"))
        .arg("--config")
        .arg(&config)
        .output()
        .expect("open should run");
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn verify_otp_accepts_reference_dump() {
    let output = fpsensor()
        .arg("verify-otp")
        .arg(render_hex(&REFERENCE_OTP))
        .output()
        .expect("verify-otp should run");

    assert!(output.status.success());
    let report = json_line(&output.stdout);
    assert_eq!(report["valid"], true);
    assert_eq!(report["len"], 64);
    assert_eq!(report["stored_checksum"], report["computed_checksum"]);
    assert_eq!(report["calibration"]["fdt_delta_threshold"], 6);
    assert_eq!(report["calibration"]["image_delta_threshold"], 200);
}

#[test]
fn verify_otp_rejects_corrupted_dump() {
    let mut otp = REFERENCE_OTP;
    otp[3] ^= 0x01;

    let output = fpsensor()
        .arg("verify-otp")
        .arg(render_hex(&otp))
        .output()
        .expect("verify-otp should run");

    assert_eq!(output.status.code(), Some(60));
    let report = json_line(&output.stdout);
    assert_eq!(report["valid"], false);
    assert!(report["calibration"].is_null());
}

#[test]
fn emulate_rejects_malformed_profile() {
    let dir = unique_temp_dir("profile");
    let profile = dir.join("profile.json");
    std::fs::write(&profile, b"{\"chip_id\": \"nope\"}").expect("profile should be writable");

    let output = fpsensor()
        .arg("emulate")
        .arg(dir.join("sensor.sock"))
        .arg("--profile")
        .arg(&profile)
        .output()
        .expect("emulate should run");
    assert_eq!(output.status.code(), Some(60));
    assert!(!dir.join("sensor.sock").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_name() {
    let output = Command::new(env!("CARGO_BIN_EXE_fpsensor"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("fpsensor "));
}

#[test]
fn extended_version_lists_supported_sensor() {
    let output = Command::new(env!("CARGO_BIN_EXE_fpsensor"))
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version should run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("device: Goodix TLS Fingerprint Sensor 5395 (goodixtls5395)"));
    assert!(stdout.contains("image: 88x108"));
    assert!(stdout.contains("chip_id_high: 0x220c"));
    assert!(stdout.contains("accepted_firmware: GF5288_HTSEC_APP_10011, GF5288_HTSEC_APP_10020"));
}

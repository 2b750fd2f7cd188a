//! Integration tests for top-level CLI behavior.

use std::path::{Path, PathBuf};
use std::process::Command;

const REQUIRED: [(&str, &str); 4] = [
    ("GCLOUD_PROJECT", "demo-project"),
    ("CLOUD_BUCKET", "demo-bucket"),
    ("OAUTH2_CLIENT_ID", "client"),
    ("OAUTH2_CLIENT_SECRET", "shh"),
];

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("appcheck-cli-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("failed to create scratch dir");
    dir
}

fn appcheck(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_appcheck"));
    cmd.current_dir(dir).env_remove("APPCHECK_MANIFEST").env_remove("DATA_BACKEND");
    for (key, _) in REQUIRED {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn help_lists_commands() {
    let output = appcheck(&std::env::temp_dir())
        .arg("--help")
        .output()
        .expect("failed to run appcheck");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["install", "local", "deploy", "config", "targets"] {
        assert!(stdout.contains(command), "help is missing `{command}`");
    }
}

#[test]
fn invalid_subcommand_exits_with_error() {
    let output = appcheck(&std::env::temp_dir())
        .arg("nonsense")
        .output()
        .expect("failed to run appcheck");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn deploy_without_target_shows_error() {
    let output = appcheck(&std::env::temp_dir())
        .arg("deploy")
        .output()
        .expect("failed to run appcheck");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("--all") || stderr.contains("TARGET"));
}

#[test]
fn targets_lists_the_manifest() {
    let dir = scratch_dir("targets");
    std::fs::write(
        dir.join("appcheck.yaml"),
        "targets:\n  - {name: 1-hello-world, msg: Hello}\n  - {name: 2-structured-data, msg: Books}\n",
    )
    .unwrap();

    let output = appcheck(&dir).arg("targets").output().expect("failed to run appcheck");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("1-hello-world"));
    assert!(stdout.contains("2 target(s) total."));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn config_reports_missing_settings() {
    let dir = scratch_dir("config-missing");

    let output = appcheck(&dir).arg("config").output().expect("failed to run appcheck");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr
        .contains("You must set the GCLOUD_PROJECT environment variable or add it to config.json!"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn config_reads_config_json_and_masks_secrets() {
    let dir = scratch_dir("config-json");
    std::fs::write(
        dir.join("config.json"),
        r#"{"GCLOUD_PROJECT": "from-file", "CLOUD_BUCKET": "b", "OAUTH2_CLIENT_ID": "id", "OAUTH2_CLIENT_SECRET": "hidden"}"#,
    )
    .unwrap();

    let output = appcheck(&dir)
        .args(["--set", "CLOUD_BUCKET=override", "config"])
        .output()
        .expect("failed to run appcheck");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("from-file"));
    assert!(stdout.contains("override"));
    assert!(!stdout.contains("hidden"));
    std::fs::remove_dir_all(&dir).ok();
}

#[cfg(unix)]
#[test]
fn local_app_that_crashes_fails_to_run() {
    let dir = scratch_dir("local-crash");
    std::fs::create_dir_all(dir.join("crasher")).unwrap();
    std::fs::write(
        dir.join("appcheck.yaml"),
        "targets:\n  - name: crasher\n    cmd: sh\n    args: [\"-c\", \"exit 3\"]\n    msg: never\n",
    )
    .unwrap();

    let mut cmd = appcheck(&dir);
    for (key, value) in REQUIRED {
        cmd.arg("--set").arg(format!("{key}={value}"));
    }
    let output = cmd.args(["--ci", "local", "crasher"]).output().expect("failed to run appcheck");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("crasher: failed to run!"));
    std::fs::remove_dir_all(&dir).ok();
}

#[cfg(unix)]
#[test]
fn install_with_missing_directory_fails_to_start() {
    let dir = scratch_dir("install-missing");
    std::fs::write(dir.join("appcheck.yaml"), "targets:\n  - {name: nowhere, msg: x}\n").unwrap();

    let mut cmd = appcheck(&dir);
    for (key, value) in REQUIRED {
        cmd.env(key, value);
    }
    let output = cmd.args(["install", "nowhere"]).output().expect("failed to run appcheck");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("nowhere: failed to start `npm`"));
    std::fs::remove_dir_all(&dir).ok();
}

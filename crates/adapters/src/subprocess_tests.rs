// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn captures_stdout_on_normal_exit() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("echo hello");
    let out = run_with_escalating_kill(cmd, Duration::from_secs(5), StdinSource::None)
        .await
        .unwrap();
    assert_eq!(out.stdout.trim(), "hello");
    assert_eq!(out.exit_code, Some(0));
    assert!(!out.timed_out);
}

#[tokio::test]
async fn feeds_stdin_payload_to_child() {
    let cmd = Command::new("cat");
    let out = run_with_escalating_kill(cmd, Duration::from_secs(5), StdinSource::Payload("from stdin"))
        .await
        .unwrap();
    assert_eq!(out.stdout, "from stdin");
}

#[tokio::test]
async fn feeds_stdin_file_to_child() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), "from file").unwrap();
    let cmd = Command::new("cat");
    let out = run_with_escalating_kill(cmd, Duration::from_secs(5), StdinSource::File(tmp.path()))
        .await
        .unwrap();
    assert_eq!(out.stdout, "from file");
}

#[tokio::test]
async fn timeout_kills_a_hanging_child_and_reports_timed_out() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("sleep 30");
    let start = std::time::Instant::now();
    let out = run_with_escalating_kill(cmd, Duration::from_millis(100), StdinSource::None)
        .await
        .unwrap();
    assert!(out.timed_out);
    assert!(start.elapsed() < Duration::from_secs(6), "should not wait the full sleep");
}

#[tokio::test]
async fn nonzero_exit_still_returns_captured_stderr() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("echo boom 1>&2; exit 3");
    let out = run_with_escalating_kill(cmd, Duration::from_secs(5), StdinSource::None)
        .await
        .unwrap();
    assert_eq!(out.exit_code, Some(3));
    assert_eq!(out.stderr.trim(), "boom");
}

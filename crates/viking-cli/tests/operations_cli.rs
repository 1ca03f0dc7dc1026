//! Integration tests for queue, readiness, and session commands.

mod common;

use predicates::prelude::*;
use serde_json::Value;

use common::Sandbox;

#[test]
fn test_ready_reports_backends() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().arg("ready").output().unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["object_store"]["status"], "ok");
}

#[test]
fn test_wait_reports_empty_queue() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["write", "viking://resources/q.md", "queued"])
        .assert()
        .success();

    let output = sandbox.cmd().args(["wait", "--timeout", "10"]).output().unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["pending"], 0);
    assert_eq!(json["deadLettered"], 0);
}

#[test]
fn test_session_messages_and_search() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["write", "viking://resources/visa.md", "visa application checklist"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["session", "chat-1", "user", "I am applying for a visa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"role\": \"user\""));

    sandbox
        .cmd()
        .args(["search", "checklist", "--session", "chat-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("viking://resources/visa.md"));

    sandbox
        .cmd()
        .args(["session", "bad/id", "user", "x"])
        .assert()
        .failure();
}

#[test]
fn test_add_media_without_vision_provider() {
    let sandbox = Sandbox::new();
    let audio = sandbox.dir.path().join("standup.mp3");
    std::fs::write(&audio, b"ID3 fake audio").unwrap();

    sandbox
        .cmd()
        .arg("add-media")
        .arg(&audio)
        .assert()
        .success()
        .stdout(predicate::str::contains("viking://resources/audio/"))
        .stdout(predicate::str::contains("standup.mp3"))
        .stdout(predicate::str::contains("Audio summary generation not yet implemented"));

    let text = sandbox.dir.path().join("notes.txt");
    std::fs::write(&text, b"plain").unwrap();
    sandbox.cmd().arg("add-media").arg(&text).assert().failure();
}

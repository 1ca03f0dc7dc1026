//! Shared test utilities for viking-cli integration tests.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// Get a Command for the viking binary.
///
/// # Panics
///
/// Panics if the viking binary cannot be found.
#[allow(deprecated)]
pub fn viking_cmd() -> Command {
    Command::cargo_bin("viking").expect("viking binary should exist")
}

/// A temp directory holding a config with local, durable backends.
pub struct Sandbox {
    pub dir: TempDir,
    pub config: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().display().to_string();
        let config = dir.path().join("config.yaml");
        let yaml = format!(
            "storage:\n  backend: local\n  path: {root}/objects\n\
             vector:\n  backend: simple\n  path: {root}/vectors\n\
             embedding:\n  dimension: 32\n\
             pipeline:\n  concurrency: 2\n  initialBackoffMs: 1\n  maxBackoffMs: 2\n",
            root = root
        );
        fs::write(&config, yaml).expect("write config");
        Self { dir, config }
    }

    /// A command bound to this sandbox's config, as acme/alice/helper.
    pub fn cmd(&self) -> Command {
        let mut cmd = viking_cmd();
        cmd.env_remove("VIKING_CONFIG")
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(&self.config)
            .args(["--account", "acme", "--user", "alice", "--agent", "helper"]);
        cmd
    }
}

//! Shared helpers for viking-core integration tests.

#![allow(dead_code)]

use std::time::Duration;

use viking_core::{Identity, VikingConfig, VikingEngine};

/// Generous bound for the pipeline to drain in tests.
pub const DRAIN: Duration = Duration::from_secs(10);

/// Engine over in-memory backends.
pub async fn memory_engine() -> VikingEngine {
    VikingEngine::from_config(&VikingConfig::default_for_testing())
        .await
        .expect("engine should start")
}

pub fn alice() -> Identity {
    Identity::new("acme", "alice", "helper").expect("valid identity")
}

pub fn alice_other_agent() -> Identity {
    Identity::new("acme", "alice", "planner").expect("valid identity")
}

pub fn bob() -> Identity {
    Identity::new("acme", "bob", "helper").expect("valid identity")
}

/// Same user and agent names as [`alice`], different account.
pub fn globex_alice() -> Identity {
    Identity::new("globex", "alice", "helper").expect("valid identity")
}

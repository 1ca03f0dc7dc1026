//! Readiness aggregation.
//!
//! The operational layer asks whether the process can serve traffic. Each
//! backend contributes one [`CheckStatus`]; a backend that is not configured
//! does not block readiness, anything else that is not `Ok` does.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use viking_db::object::ObjectStore;
use viking_db::vector::VectorIndexBackend;

use crate::errors::VikingResult;

/// Check name for the object store.
pub const CHECK_OBJECT_STORE: &str = "object_store";

/// Check name for the vector index.
pub const CHECK_VECTOR_INDEX: &str = "vector_index";

/// Check name for the identity store.
pub const CHECK_IDENTITY_STORE: &str = "identity_store";

/// External store of accounts and API keys. Only its health is consumed here.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether the store is reachable and usable.
    async fn health_check(&self) -> VikingResult<bool>;
}

/// Result of one readiness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "message")]
pub enum CheckStatus {
    Ok,
    NotConfigured,
    Unhealthy,
    Error(String),
}

impl CheckStatus {
    /// Whether this status allows the process to be ready.
    pub fn is_passing(&self) -> bool {
        matches!(self, CheckStatus::Ok | CheckStatus::NotConfigured)
    }

    fn from_health<E: std::fmt::Display>(result: Result<bool, E>) -> Self {
        match result {
            Ok(true) => CheckStatus::Ok,
            Ok(false) => CheckStatus::Unhealthy,
            Err(e) => CheckStatus::Error(e.to_string()),
        }
    }
}

/// Aggregated readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub checks: BTreeMap<String, CheckStatus>,
}

impl ReadinessReport {
    /// Build a report; ready iff every check passes.
    pub fn from_checks(checks: BTreeMap<String, CheckStatus>) -> Self {
        let ready = checks.values().all(CheckStatus::is_passing);
        Self { ready, checks }
    }
}

/// Run every check. `None` means the backend is not configured.
pub async fn check_readiness(
    store: Option<&dyn ObjectStore>,
    index: Option<&dyn VectorIndexBackend>,
    identity_store: Option<&dyn IdentityStore>,
) -> ReadinessReport {
    let mut checks = BTreeMap::new();

    let status = match store {
        Some(store) => CheckStatus::from_health(store.health_check().await),
        None => CheckStatus::NotConfigured,
    };
    checks.insert(CHECK_OBJECT_STORE.to_string(), status);

    let status = match index {
        Some(index) => CheckStatus::from_health(index.health_check().await),
        None => CheckStatus::NotConfigured,
    };
    checks.insert(CHECK_VECTOR_INDEX.to_string(), status);

    let status = match identity_store {
        Some(identity_store) => CheckStatus::from_health(identity_store.health_check().await),
        None => CheckStatus::NotConfigured,
    };
    checks.insert(CHECK_IDENTITY_STORE.to_string(), status);

    let report = ReadinessReport::from_checks(checks);
    if !report.ready {
        warn!(checks = ?report.checks, "not ready");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VikingError;
    use viking_db::object::MemoryObjectStore;
    use viking_db::vector::SimpleVectorIndex;
    use viking_db::vector::VectorMetric;

    struct FixedIdentityStore(Option<bool>);

    #[async_trait]
    impl IdentityStore for FixedIdentityStore {
        async fn health_check(&self) -> VikingResult<bool> {
            self.0
                .ok_or_else(|| VikingError::config("identity store unreachable", "Check the connection"))
        }
    }

    #[tokio::test]
    async fn test_not_configured_counts_as_ready() {
        let store = MemoryObjectStore::new();
        let report = check_readiness(Some(&store), None, None).await;
        assert!(report.ready);
        assert_eq!(report.checks[CHECK_OBJECT_STORE], CheckStatus::Ok);
        assert_eq!(report.checks[CHECK_VECTOR_INDEX], CheckStatus::NotConfigured);
    }

    #[tokio::test]
    async fn test_all_backends_healthy() {
        let store = MemoryObjectStore::new();
        let index = SimpleVectorIndex::in_memory(4, VectorMetric::Cosine);
        let ids = FixedIdentityStore(Some(true));
        let report = check_readiness(Some(&store), Some(&index), Some(&ids)).await;
        assert!(report.ready);
        assert!(report.checks.values().all(|s| *s == CheckStatus::Ok));
    }

    #[tokio::test]
    async fn test_unhealthy_or_error_flips_readiness() {
        let unhealthy = FixedIdentityStore(Some(false));
        let report = check_readiness(None, None, Some(&unhealthy)).await;
        assert!(!report.ready);
        assert_eq!(report.checks[CHECK_IDENTITY_STORE], CheckStatus::Unhealthy);

        let failing = FixedIdentityStore(None);
        let report = check_readiness(None, None, Some(&failing)).await;
        assert!(!report.ready);
        assert!(matches!(report.checks[CHECK_IDENTITY_STORE], CheckStatus::Error(_)));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(CheckStatus::Error("down".into())).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "down");
        let json = serde_json::to_value(CheckStatus::NotConfigured).unwrap();
        assert_eq!(json["status"], "not_configured");
    }
}

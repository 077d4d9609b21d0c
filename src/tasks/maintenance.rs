//! Cache Maintenance Task
//!
//! Background task that periodically expires stale cache entries and releases
//! memory when aggregate usage is above the high-water mark.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::orchestrator::CacheOrchestrator;

/// Spawns a task that runs [`CacheOrchestrator::run_maintenance`] every `interval`.
///
/// The task holds a weak reference and exits on its own once the orchestrator
/// is dropped or destroyed. The returned handle can also be aborted directly.
pub fn spawn_maintenance_task(
    orchestrator: Weak<CacheOrchestrator>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {:?}",
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(orchestrator) = orchestrator.upgrade() else {
                debug!("Orchestrator dropped, stopping maintenance task");
                break;
            };
            if orchestrator.is_destroyed() {
                break;
            }

            orchestrator.run_maintenance().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundedCacheConfig, OrchestratorConfig};
    use std::sync::Arc;

    fn config(cleanup_interval: Duration) -> OrchestratorConfig {
        OrchestratorConfig {
            metadata: BoundedCacheConfig::new(10, 1_000, Duration::from_millis(100)),
            cleanup_interval,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_maintenance_task_removes_expired_entries() {
        let orch = Arc::new(CacheOrchestrator::new(config(Duration::from_millis(200))));
        orch.set_metadata("expire_soon", serde_json::json!("value"))
            .await
            .unwrap();

        orch.start();
        tokio::time::sleep(Duration::from_millis(500)).await;

        // Removed by the sweep, not by a read
        assert_eq!(orch.stats().await.metadata.entries, 0);
        assert_eq!(orch.stats().await.metadata.expirations, 1);
        orch.destroy().await;
    }

    #[tokio::test]
    async fn test_maintenance_task_preserves_valid_entries() {
        let mut cfg = config(Duration::from_millis(100));
        cfg.metadata.ttl = Some(Duration::from_secs(3600));
        let orch = Arc::new(CacheOrchestrator::new(cfg));
        orch.set_metadata("long_lived", serde_json::json!("value"))
            .await
            .unwrap();

        orch.start();
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(
            orch.get_metadata("long_lived").await,
            Some(serde_json::json!("value"))
        );
        orch.destroy().await;
    }

    #[tokio::test]
    async fn test_maintenance_task_stops_when_orchestrator_dropped() {
        let orch = Arc::new(CacheOrchestrator::new(config(Duration::from_millis(20))));
        let handle = spawn_maintenance_task(Arc::downgrade(&orch), Duration::from_millis(20));

        drop(orch);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(handle.is_finished(), "Task should exit after the orchestrator is gone");
    }
}

//! Memory Pressure Listener
//!
//! Forwards signals from an external memory monitor to the orchestrator.

use std::sync::Weak;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::orchestrator::{CacheOrchestrator, MemoryPressureEvent};

/// Spawns a task that hands every received event to
/// [`CacheOrchestrator::handle_pressure_event`].
///
/// Stops when the sender side closes or the orchestrator goes away. Events
/// missed because the listener lagged are skipped; if any of them demanded a
/// release, the next one that does will trigger it.
pub fn spawn_pressure_listener(
    orchestrator: Weak<CacheOrchestrator>,
    mut events: broadcast::Receiver<MemoryPressureEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Memory pressure listener lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => {
                    debug!("Memory pressure channel closed");
                    break;
                }
            };

            let Some(orchestrator) = orchestrator.upgrade() else {
                break;
            };
            orchestrator.handle_pressure_event(event).await;
        }
    })
}

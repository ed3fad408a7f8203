//! In-process delivery of finalize events from uploads to the orchestrator.

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, warn};

use crate::{models::storage_event::StorageObject, services::orchestrator::AnalysisOrchestrator};

/// Sending half handed to the upload path.
#[derive(Clone)]
pub struct FinalizeNotifier {
    tx: UnboundedSender<StorageObject>,
}

impl FinalizeNotifier {
    /// Queue an event. Never blocks; if the dispatcher is gone the event is
    /// logged and dropped.
    pub fn notify(&self, object: StorageObject) {
        if let Err(err) = self.tx.send(object) {
            warn!(name = %err.0.name, "finalize dispatcher stopped; event dropped");
        }
    }
}

/// Start the dispatcher task. Each event is handled on its own task; the
/// dispatcher finishes once every notifier is dropped and in-flight events
/// are done.
pub fn spawn_dispatcher(orchestrator: AnalysisOrchestrator) -> (FinalizeNotifier, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(dispatch(orchestrator, rx));
    (FinalizeNotifier { tx }, handle)
}

async fn dispatch(orchestrator: AnalysisOrchestrator, mut rx: UnboundedReceiver<StorageObject>) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(object) = event else { break };
                let orchestrator = orchestrator.clone();
                in_flight.spawn(async move { orchestrator.handle(&object).await });
            }
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = done {
                    warn!("analysis task aborted: {}", err);
                }
            }
        }
    }

    debug!("finalize channel closed; waiting for {} analyses", in_flight.len());
    while let Some(done) = in_flight.join_next().await {
        if let Err(err) = done {
            warn!("analysis task aborted: {}", err);
        }
    }
}

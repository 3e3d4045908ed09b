use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use super::processor::WebhookProcessor;
use crate::models::InboundEvent;

/// Submission handle for background webhook work. Cloned into the HTTP
/// state; the receiving loop runs every event as its own task, with at most
/// `max_in_flight` of them processing at once.
#[derive(Clone)]
pub struct InboundDispatcher {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

#[derive(Debug, thiserror::Error)]
#[error("Inbound dispatcher is shut down")]
pub struct DispatcherClosed;

impl InboundDispatcher {
    /// Create the dispatcher and the loop that drains it. The loop ends once
    /// every handle is dropped and all in-flight tasks have finished.
    pub fn new(
        processor: Arc<WebhookProcessor>,
        max_in_flight: usize,
    ) -> (Self, impl std::future::Future<Output = ()> + Send + 'static) {
        let (tx, rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
        (Self { tx }, run(processor, rx, permits))
    }

    pub fn submit(&self, event: InboundEvent) -> Result<(), DispatcherClosed> {
        self.tx.send(event).map_err(|_| DispatcherClosed)
    }
}

async fn run(
    processor: Arc<WebhookProcessor>,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    permits: Arc<Semaphore>,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                // Waits here while the limit is reached; queued events stay
                // in the channel until a running task finishes.
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else { break };
                let processor = Arc::clone(&processor);
                tasks.spawn(async move {
                    let outcome = processor.handle(&event).await;
                    drop(permit);
                    tracing::debug!(phone = %event.phone, outcome = ?outcome, "Inbound message processed");
                });
            }
            Some(joined) = tasks.join_next() => log_join(joined),
        }
    }

    tracing::info!(in_flight = tasks.len(), "Draining inbound message tasks");
    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    tracing::info!("Inbound dispatcher stopped");
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Inbound message task panicked");
    }
}

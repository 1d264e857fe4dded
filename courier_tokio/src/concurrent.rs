//! A strategy that runs up to a configured number of consumer callbacks at once.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    Consumer, ConsumerError, ConsumerTag, DispatchError, DispatchStrategy, ShutdownReason,
};
use log::{debug, error};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use crate::config::DispatcherConfig;
use crate::strategy::QueueStrategy;
use crate::work::{Work, WorkQueue};

/// Runs callbacks on spawned tasks, at most `concurrency` at a time.
///
/// Callbacks start in arrival order but may complete in any order, including callbacks of the
/// same consumer. Shutdown notifications are delivered directly by the sweep; finalization waits
/// for every queued and in-flight callback. Both share the deadline set by
/// [`DispatcherConfig::shutdown_timeout`].
#[derive(Debug)]
pub struct ConcurrentStrategy {
    queue: WorkQueue,
    concurrency: usize,
}

impl ConcurrentStrategy {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: &DispatcherConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        ConcurrentStrategy {
            queue: WorkQueue::spawn(config.shutdown_timeout, move |receiver| {
                run(receiver, concurrency)
            }),
            concurrency,
        }
    }

    /// The maximum number of callbacks running at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

async fn run(mut receiver: mpsc::UnboundedReceiver<Work>, concurrency: usize) {
    debug!(
        "Concurrent dispatch worker started with concurrency {}",
        concurrency
    );
    let permits = Arc::new(Semaphore::new(concurrency));
    let mut in_flight = JoinSet::new();

    while let Some(work) = receiver.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        in_flight.spawn(async move {
            work.execute().await;
            drop(permit);
        });
        while let Some(finished) = in_flight.try_join_next() {
            if let Err(e) = finished {
                error!("Dispatch task failed: {}", e);
            }
        }
    }

    while let Some(finished) = in_flight.join_next().await {
        if let Err(e) = finished {
            error!("Dispatch task failed: {}", e);
        }
    }
    debug!("Concurrent dispatch worker stopped");
}

#[async_trait]
impl DispatchStrategy for ConcurrentStrategy {
    async fn shutdown_consumer(
        &self,
        tag: &ConsumerTag,
        consumer: Arc<dyn Consumer>,
        reason: &ShutdownReason,
    ) -> Result<(), ConsumerError> {
        debug!("Notifying consumer '{}' of shutdown", tag);
        match self.queue.within_deadline(consumer.handle_shutdown(reason)).await {
            Ok(outcome) => outcome,
            Err(e) => Err(e.into()),
        }
    }

    async fn finalize(&self) -> Result<(), DispatchError> {
        self.queue.finalize().await
    }
}

impl QueueStrategy for ConcurrentStrategy {
    fn work_queue(&self) -> &WorkQueue {
        &self.queue
    }
}

//! A strategy that runs every consumer callback, one at a time, in arrival order.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    Consumer, ConsumerError, ConsumerTag, DispatchError, DispatchStrategy, ShutdownReason,
};
use log::debug;
use tokio::sync::{mpsc, oneshot};

use crate::config::DispatcherConfig;
use crate::strategy::QueueStrategy;
use crate::work::{Work, WorkQueue};

/// Runs callbacks on a single worker task in the order they were scheduled.
///
/// Shutdown notifications go through the same queue, so a consumer is only told about the
/// shutdown after every delivery scheduled for it before the sweep has been handled. Waiting for
/// those notifications counts against [`DispatcherConfig::shutdown_timeout`], together with
/// finalization.
#[derive(Debug)]
pub struct SequentialStrategy {
    queue: WorkQueue,
}

impl SequentialStrategy {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: &DispatcherConfig) -> Self {
        SequentialStrategy {
            queue: WorkQueue::spawn(config.shutdown_timeout, run),
        }
    }
}

async fn run(mut receiver: mpsc::UnboundedReceiver<Work>) {
    debug!("Sequential dispatch worker started");
    while let Some(work) = receiver.recv().await {
        work.execute().await;
    }
    debug!("Sequential dispatch worker stopped");
}

#[async_trait]
impl DispatchStrategy for SequentialStrategy {
    async fn shutdown_consumer(
        &self,
        tag: &ConsumerTag,
        consumer: Arc<dyn Consumer>,
        reason: &ShutdownReason,
    ) -> Result<(), ConsumerError> {
        let (reply, result) = oneshot::channel();
        let work = Work::Shutdown {
            consumer: consumer.clone(),
            tag: tag.clone(),
            reason: reason.clone(),
            reply,
        };
        if !self.queue.enqueue(work) {
            // Nothing can be queued ahead of the notification any more.
            return match self.queue.within_deadline(consumer.handle_shutdown(reason)).await {
                Ok(outcome) => outcome,
                Err(e) => Err(e.into()),
            };
        }
        match self.queue.within_deadline(result).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err("dispatch worker stopped before notifying the consumer".into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn finalize(&self) -> Result<(), DispatchError> {
        self.queue.finalize().await
    }
}

impl QueueStrategy for SequentialStrategy {
    fn work_queue(&self) -> &WorkQueue {
        &self.queue
    }
}

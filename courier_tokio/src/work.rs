//! Work items and the queue feeding a dispatcher's worker task.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use courier_core::{Consumer, ConsumerError, ConsumerTag, Delivery, DispatchError, ShutdownReason};
use futures::FutureExt;
use log::{debug, error, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A consumer callback waiting to be executed.
pub(crate) enum Work {
    Deliver {
        consumer: Arc<dyn Consumer>,
        delivery: Delivery,
    },
    ConsumeOk {
        consumer: Arc<dyn Consumer>,
        tag: ConsumerTag,
    },
    CancelOk {
        consumer: Arc<dyn Consumer>,
        tag: ConsumerTag,
    },
    Cancel {
        consumer: Arc<dyn Consumer>,
        tag: ConsumerTag,
    },
    Shutdown {
        consumer: Arc<dyn Consumer>,
        tag: ConsumerTag,
        reason: ShutdownReason,
        reply: oneshot::Sender<Result<(), ConsumerError>>,
    },
}

impl Work {
    fn kind(&self) -> &'static str {
        match self {
            Work::Deliver { .. } => "delivery",
            Work::ConsumeOk { .. } => "consume-ok",
            Work::CancelOk { .. } => "cancel-ok",
            Work::Cancel { .. } => "cancel",
            Work::Shutdown { .. } => "shutdown",
        }
    }

    /// Runs the callback. Errors and panics are logged, or handed back for shutdown work.
    pub(crate) async fn execute(self) {
        match self {
            Work::Deliver { consumer, delivery } => {
                let tag = delivery.consumer_tag.clone();
                let delivery_tag = delivery.delivery_tag;
                if let Err(e) = guarded(consumer.handle_delivery(delivery)).await {
                    error!(
                        "Consumer '{}' failed to handle delivery {}: {}",
                        tag, delivery_tag, e
                    );
                }
            }
            Work::ConsumeOk { consumer, tag } => {
                if let Err(e) = guarded(consumer.handle_consume_ok(&tag)).await {
                    error!("Consumer '{}' failed to handle consume-ok: {}", tag, e);
                }
            }
            Work::CancelOk { consumer, tag } => {
                if let Err(e) = guarded(consumer.handle_cancel_ok(&tag)).await {
                    error!("Consumer '{}' failed to handle cancel-ok: {}", tag, e);
                }
            }
            Work::Cancel { consumer, tag } => {
                if let Err(e) = guarded(consumer.handle_cancel(&tag)).await {
                    error!("Consumer '{}' failed to handle cancel: {}", tag, e);
                }
            }
            Work::Shutdown {
                consumer,
                tag,
                reason,
                reply,
            } => {
                let result = guarded(consumer.handle_shutdown(&reason)).await;
                if reply.send(result).is_err() {
                    debug!("Shutdown of consumer '{}' was no longer awaited", tag);
                }
            }
        }
    }
}

/// Turns a panicking callback into an error.
async fn guarded<F>(callback: F) -> Result<(), ConsumerError>
where
    F: Future<Output = Result<(), ConsumerError>>,
{
    match AssertUnwindSafe(callback).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err("consumer callback panicked".into()),
    }
}

/// The sending half of a dispatcher plus the handle of the worker draining it.
///
/// Created by the strategies of this crate and exposed through
/// [`QueueStrategy::work_queue`](crate::QueueStrategy::work_queue).
///
/// Work is accepted until [`quiesce`](Self::quiesce) drops the sender. The worker then drains
/// whatever is queued and exits, which is what [`finalize`](Self::finalize) waits for.
///
/// Every wait performed on behalf of a shutdown shares one deadline, armed by the first of them.
pub struct WorkQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Work>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopped: watch::Receiver<bool>,
    shutdown_timeout: Option<Duration>,
    deadline: OnceLock<Option<Instant>>,
}

impl WorkQueue {
    /// Spawns `run` on the current tokio runtime as the worker draining the queue.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub(crate) fn spawn<F, Fut>(shutdown_timeout: Option<Duration>, run: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedReceiver<Work>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (stopped_tx, stopped) = watch::channel(false);
        let worker = run(receiver);
        let handle = tokio::spawn(async move {
            worker.await;
            let _ = stopped_tx.send(true);
        });

        WorkQueue {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
            stopped,
            shutdown_timeout,
            deadline: OnceLock::new(),
        }
    }

    /// Queues `work`. Returns `false` if the queue no longer accepts work.
    pub(crate) fn enqueue(&self, work: Work) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            warn!("Dispatcher is quiescing, dropping {} work", work.kind());
            return false;
        };
        match sender.send(work) {
            Ok(()) => true,
            Err(mpsc::error::SendError(work)) => {
                warn!("Dispatch worker has stopped, dropping {} work", work.kind());
                false
            }
        }
    }

    /// Stops accepting work. Already queued work still runs.
    pub fn quiesce(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!("Dispatcher quiesced");
        }
    }

    /// Whether [`quiesce`](Self::quiesce) has been called.
    pub fn is_quiesced(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Starts the shutdown deadline if it is not running yet and returns it.
    pub(crate) fn arm_deadline(&self) -> Option<Instant> {
        *self.deadline.get_or_init(|| self.shutdown_timeout.map(|timeout| Instant::now() + timeout))
    }

    /// Awaits `future` until the shutdown deadline.
    pub(crate) async fn within_deadline<F>(&self, future: F) -> Result<F::Output, DispatchError>
    where
        F: Future,
    {
        match (self.arm_deadline(), self.shutdown_timeout) {
            (Some(deadline), Some(timeout)) => tokio::time::timeout_at(deadline, future)
                .await
                .map_err(|_| DispatchError::ShutdownTimeout(timeout)),
            _ => Ok(future.await),
        }
    }

    /// Quiesces and waits for the worker to finish the queued work.
    pub(crate) async fn finalize(&self) -> Result<(), DispatchError> {
        self.quiesce();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };

        let joined = self.within_deadline(handle).await?;
        joined.map_err(|e| DispatchError::Worker(Box::new(e)))
    }

    /// Resolves once the worker has exited.
    pub async fn wait_for_shutdown(&self) {
        let mut stopped = self.stopped.clone();
        // An error means the worker is gone without reporting, which is just as final.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("quiesced", &self.is_quiesced())
            .field("stopped", &*self.stopped.borrow())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

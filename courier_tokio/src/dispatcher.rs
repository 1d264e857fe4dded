//! The channel-facing consumer dispatcher.

use std::sync::Arc;

use courier_core::{
    Consumer, ConsumerDispatcher, ConsumerRegistry, ConsumerTag, Delivery, DispatchError,
    ShutdownReason, ShutdownReport,
};

use crate::concurrent::ConcurrentStrategy;
use crate::config::DispatcherConfig;
use crate::sequential::SequentialStrategy;
use crate::strategy::QueueStrategy;
use crate::work::Work;

/// Dispatches protocol events of one channel to the consumers registered on it.
///
/// The channel's reader calls the `handle_*` methods as frames arrive. They only touch the
/// registry and queue a callback, so they never wait on consumer code. Callbacks then run on the
/// worker owned by the strategy `S`.
pub struct ChannelDispatcher<S: QueueStrategy> {
    inner: ConsumerDispatcher<S>,
}

/// A dispatcher running every callback in order on one worker task.
pub type SequentialDispatcher = ChannelDispatcher<SequentialStrategy>;

/// A dispatcher running up to `concurrency` callbacks at once.
pub type ConcurrentDispatcher = ChannelDispatcher<ConcurrentStrategy>;

impl ChannelDispatcher<SequentialStrategy> {
    /// Creates a sequential dispatcher and spawns its worker.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: DispatcherConfig) -> Self {
        log::debug!("Creating a new SequentialDispatcher");
        Self::with_strategy(SequentialStrategy::new(&config))
    }
}

impl ChannelDispatcher<ConcurrentStrategy> {
    /// Creates a concurrent dispatcher and spawns its worker.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: DispatcherConfig) -> Self {
        log::debug!(
            "Creating a new ConcurrentDispatcher with concurrency {}",
            config.concurrency
        );
        Self::with_strategy(ConcurrentStrategy::new(&config))
    }
}

impl<S: QueueStrategy> ChannelDispatcher<S> {
    /// Creates a dispatcher around an existing strategy.
    pub fn with_strategy(strategy: S) -> Self {
        ChannelDispatcher {
            inner: ConsumerDispatcher::new(strategy),
        }
    }

    /// The broker confirmed a subscription: registers `consumer` and schedules its
    /// [`handle_consume_ok`](Consumer::handle_consume_ok).
    pub fn handle_consume_ok(&self, consumer: Arc<dyn Consumer>, tag: ConsumerTag) {
        self.inner.register(tag.clone(), consumer.clone());
        self.schedule(Work::ConsumeOk { consumer, tag });
    }

    /// A message arrived: schedules it on the consumer registered for its tag.
    pub fn handle_deliver(&self, delivery: Delivery) {
        let consumer = self.inner.resolve(delivery.consumer_tag.as_str());
        self.schedule(Work::Deliver { consumer, delivery });
    }

    /// The broker confirmed a cancellation requested by the client: removes the consumer and
    /// schedules its [`handle_cancel_ok`](Consumer::handle_cancel_ok).
    pub fn handle_cancel_ok(&self, tag: &str) {
        let consumer = self.inner.take(tag);
        self.schedule(Work::CancelOk {
            consumer,
            tag: tag.into(),
        });
    }

    /// The broker cancelled a subscription: removes the consumer and schedules its
    /// [`handle_cancel`](Consumer::handle_cancel).
    pub fn handle_cancel(&self, tag: &str) {
        let consumer = self.inner.take(tag);
        self.schedule(Work::Cancel {
            consumer,
            tag: tag.into(),
        });
    }

    /// Stops accepting new callbacks. Already scheduled callbacks still run.
    pub fn quiesce(&self) {
        self.inner.strategy().work_queue().quiesce();
    }

    /// Notifies every registered consumer and waits for the worker to drain.
    ///
    /// Must be called once, when the channel closes. See [`ConsumerDispatcher::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ShutdownTimeout`] when notifying the consumers and draining the
    /// worker together take longer than the configured shutdown timeout.
    pub async fn shutdown(&self, reason: &ShutdownReason) -> Result<ShutdownReport, DispatchError> {
        self.inner.strategy().work_queue().arm_deadline();
        self.inner.shutdown(reason).await
    }

    /// Resolves once the worker has stopped.
    pub async fn wait_for_shutdown(&self) {
        self.inner.strategy().work_queue().wait_for_shutdown().await
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }

    /// Sets or clears the consumer used for unknown tags.
    pub fn set_default_consumer(&self, consumer: Option<Arc<dyn Consumer>>) {
        self.inner.set_default_consumer(consumer)
    }

    /// The consumers currently registered.
    pub fn registry(&self) -> &ConsumerRegistry {
        self.inner.registry()
    }

    /// The execution strategy.
    pub fn strategy(&self) -> &S {
        self.inner.strategy()
    }

    fn schedule(&self, work: Work) {
        // A rejected item has already been logged by the queue.
        let _ = self.inner.strategy().work_queue().enqueue(work);
    }
}

impl<S: QueueStrategy + std::fmt::Debug> std::fmt::Debug for ChannelDispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDispatcher")
            .field("inner", &self.inner)
            .field("strategy", self.inner.strategy())
            .finish()
    }
}

//! Shutdown coordination for a consumer registry.
//!
//! A [`ConsumerDispatcher`] pairs a [`ConsumerRegistry`] with a [`DispatchStrategy`]. The
//! registry routes deliveries to consumers; the strategy decides how consumer callbacks are
//! executed and what it takes to stop executing them. Shutdown runs in two phases:
//!
//! 1. The registry is drained in one atomic step and every consumer present at that instant is
//!    notified exactly once. A consumer that fails or panics is logged and skipped.
//! 2. The strategy finalizes, e.g. by waiting for in-flight deliveries. Its error is the error of
//!    the whole shutdown.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, info, warn};

use crate::consumer::{Consumer, ConsumerError};
use crate::registry::ConsumerRegistry;
use crate::shutdown::ShutdownReason;
use crate::tag::ConsumerTag;

/// Errors surfaced by a dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Finalization did not finish in time.
    #[error("Dispatcher shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
    /// A worker driving consumer callbacks stopped abnormally.
    #[error("Dispatch worker failed: {0}")]
    Worker(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Any other finalization failure reported by a strategy.
    #[error("Dispatcher finalization failed: {0}")]
    Finalize(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// How consumer callbacks are executed, as seen by the shutdown coordinator.
///
/// Implementations are the execution variants of a dispatcher (inline, sequential, concurrent).
#[async_trait]
pub trait DispatchStrategy: Send + Sync {
    /// Delivers the shutdown notification to one consumer removed by the sweep.
    ///
    /// The default calls [`Consumer::handle_shutdown`] right away. Strategies that queue work may
    /// override this to order the notification after work already queued for the consumer.
    async fn shutdown_consumer(
        &self,
        tag: &ConsumerTag,
        consumer: Arc<dyn Consumer>,
        reason: &ShutdownReason,
    ) -> Result<(), ConsumerError> {
        debug!("Notifying consumer '{}' of shutdown", tag);
        consumer.handle_shutdown(reason).await
    }

    /// Stops executing callbacks and waits for whatever is still running.
    ///
    /// Called exactly once, after every consumer has been notified.
    async fn finalize(&self) -> Result<(), DispatchError>;
}

/// A strategy without a queue: notifications run inline and there is nothing to wait for.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineStrategy;

#[async_trait]
impl DispatchStrategy for InlineStrategy {
    async fn finalize(&self) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// The outcome of the shutdown sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Number of consumers that were notified
    pub notified: usize,
    /// Tags whose consumer returned an error or panicked while being notified
    pub failed: Vec<ConsumerTag>,
}

/// A consumer registry with exactly-once shutdown notification.
pub struct ConsumerDispatcher<S: DispatchStrategy> {
    registry: ConsumerRegistry,
    strategy: S,
    shut_down: AtomicBool,
}

impl<S: DispatchStrategy> ConsumerDispatcher<S> {
    /// Creates a dispatcher with an empty registry driven by `strategy`.
    pub fn new(strategy: S) -> Self {
        ConsumerDispatcher {
            registry: ConsumerRegistry::new(),
            strategy,
            shut_down: AtomicBool::new(false),
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ConsumerRegistry {
        &self.registry
    }

    /// The execution strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Registers `consumer` for `tag`. See [`ConsumerRegistry::register`].
    ///
    /// A consumer registered after shutdown has started stays in the registry but is never
    /// notified by this dispatcher.
    pub fn register(
        &self,
        tag: ConsumerTag,
        consumer: Arc<dyn Consumer>,
    ) -> Option<Arc<dyn Consumer>> {
        if self.is_shut_down() {
            warn!(
                "Consumer '{}' registered after shutdown; it will not be notified",
                tag
            );
        }
        self.registry.register(tag, consumer)
    }

    /// See [`ConsumerRegistry::resolve`].
    #[inline]
    pub fn resolve(&self, tag: &str) -> Arc<dyn Consumer> {
        self.registry.resolve(tag)
    }

    /// See [`ConsumerRegistry::take`].
    pub fn take(&self, tag: &str) -> Arc<dyn Consumer> {
        self.registry.take(tag)
    }

    /// Sets or clears the consumer used for unknown tags.
    pub fn set_default_consumer(&self, consumer: Option<Arc<dyn Consumer>>) {
        self.registry.set_default_consumer(consumer)
    }

    /// The consumer used for unknown tags, if one was set.
    pub fn default_consumer(&self) -> Option<Arc<dyn Consumer>> {
        self.registry.default_consumer()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Notifies every registered consumer of `reason`, then finalizes the strategy.
    ///
    /// Must be called once per dispatcher, after the channel stopped registering consumers. A
    /// repeated call does nothing and returns an empty report.
    ///
    /// # Errors
    ///
    /// Returns the error of [`DispatchStrategy::finalize`]. Consumer notification failures are
    /// listed in the report instead.
    pub async fn shutdown(&self, reason: &ShutdownReason) -> Result<ShutdownReport, DispatchError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            warn!("Dispatcher already shut down, ignoring: {}", reason);
            return Ok(ShutdownReport::default());
        }

        info!("Shutting down consumer dispatcher: {}", reason);
        let report = self.shutdown_consumers(reason).await;
        self.strategy.finalize().await?;
        info!(
            "Consumer dispatcher shut down; {} consumer(s) notified, {} failed",
            report.notified,
            report.failed.len()
        );
        Ok(report)
    }

    async fn shutdown_consumers(&self, reason: &ShutdownReason) -> ShutdownReport {
        let consumers = self.registry.drain();
        let mut report = ShutdownReport::default();

        for (tag, consumer) in consumers {
            report.notified += 1;
            let notification = self.strategy.shutdown_consumer(&tag, consumer, reason);
            let outcome = AssertUnwindSafe(notification).catch_unwind().await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Consumer '{}' failed to handle shutdown: {}", tag, e);
                    report.failed.push(tag);
                }
                Err(_) => {
                    warn!("Consumer '{}' panicked while handling shutdown", tag);
                    report.failed.push(tag);
                }
            }
        }
        report
    }
}

impl<S: DispatchStrategy + Default> Default for ConsumerDispatcher<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: DispatchStrategy> std::fmt::Debug for ConsumerDispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerDispatcher")
            .field("registry", &self.registry)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

//! This module defines the `Consumer` trait, the capability a subscription handler provides, and
//! the process-wide `FallbackConsumer` used when nothing else can take a delivery.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use log::{debug, warn};

use crate::delivery::Delivery;
use crate::shutdown::ShutdownReason;
use crate::tag::ConsumerTag;

/// The error a consumer callback may return.
pub type ConsumerError = Box<dyn std::error::Error + Send + Sync>;

/// A handler for the deliveries and lifecycle events of one subscription.
///
/// The dispatcher only ever holds an `Arc<dyn Consumer>`; implementations are supplied by the
/// application (usually as wrappers around user callbacks). All callbacks may be invoked from any
/// worker thread.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Processes a single delivery.
    async fn handle_delivery(&self, delivery: Delivery) -> Result<(), ConsumerError>;

    /// Called once when the channel or connection owning this subscription shuts down.
    async fn handle_shutdown(&self, reason: &ShutdownReason) -> Result<(), ConsumerError>;

    /// Called when the broker confirms the subscription.
    async fn handle_consume_ok(&self, _tag: &ConsumerTag) -> Result<(), ConsumerError> {
        Ok(())
    }

    /// Called when the broker confirms a cancellation requested by the client.
    async fn handle_cancel_ok(&self, _tag: &ConsumerTag) -> Result<(), ConsumerError> {
        Ok(())
    }

    /// Called when the broker cancels the subscription on its own (e.g. the queue was deleted).
    async fn handle_cancel(&self, _tag: &ConsumerTag) -> Result<(), ConsumerError> {
        Ok(())
    }
}

/// Last-resort consumer used when no tag-specific or default consumer exists.
///
/// Every callback logs and succeeds. Deliveries routed here are discarded; they are never
/// acknowledged by this crate, so the broker redelivers them once the channel closes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackConsumer;

static FALLBACK_CONSUMER: LazyLock<Arc<FallbackConsumer>> =
    LazyLock::new(|| Arc::new(FallbackConsumer));

/// Returns the shared `FallbackConsumer` instance.
///
/// Every call returns a handle to the same allocation, so results compare equal with
/// [`Arc::ptr_eq`].
pub fn fallback_consumer() -> Arc<dyn Consumer> {
    FALLBACK_CONSUMER.clone()
}

/// Whether `consumer` is the shared `FallbackConsumer`.
pub fn is_fallback_consumer(consumer: &Arc<dyn Consumer>) -> bool {
    let fallback: Arc<dyn Consumer> = FALLBACK_CONSUMER.clone();
    Arc::ptr_eq(consumer, &fallback)
}

#[async_trait]
impl Consumer for FallbackConsumer {
    async fn handle_delivery(&self, delivery: Delivery) -> Result<(), ConsumerError> {
        warn!(
            "Discarding delivery {} for unknown consumer tag '{}'",
            delivery.delivery_tag, delivery.consumer_tag
        );
        Ok(())
    }

    async fn handle_shutdown(&self, reason: &ShutdownReason) -> Result<(), ConsumerError> {
        debug!("Fallback consumer notified of shutdown: {}", reason);
        Ok(())
    }

    async fn handle_consume_ok(&self, tag: &ConsumerTag) -> Result<(), ConsumerError> {
        debug!("Fallback consumer received consume-ok for '{}'", tag);
        Ok(())
    }

    async fn handle_cancel_ok(&self, tag: &ConsumerTag) -> Result<(), ConsumerError> {
        debug!("Fallback consumer received cancel-ok for '{}'", tag);
        Ok(())
    }

    async fn handle_cancel(&self, tag: &ConsumerTag) -> Result<(), ConsumerError> {
        warn!("Broker cancelled unknown consumer tag '{}'", tag);
        Ok(())
    }
}

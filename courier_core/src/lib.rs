//! # Courier core
//!
//! Routing and lifecycle table for the consumers of a messaging channel.
//!
//! The channel registers a [`Consumer`] under its [`ConsumerTag`] once a subscription is
//! confirmed, resolves it for every inbound [`Delivery`], removes it when the subscription is
//! cancelled and shuts the whole table down, exactly once, when the channel closes:
//!
//! ```ignore
//! use std::sync::Arc;
//! use courier_core::prelude::*;
//!
//! let dispatcher = ConsumerDispatcher::new(InlineStrategy);
//! dispatcher.register("orders".into(), Arc::new(MyConsumer));
//!
//! // On the delivery path
//! let consumer = dispatcher.resolve(delivery.consumer_tag.as_str());
//! consumer.handle_delivery(delivery).await?;
//!
//! // When the channel closes
//! dispatcher.shutdown(&ShutdownReason::normal()).await?;
//! ```
//!
//! Unknown tags never fail to resolve: they fall back to the default consumer, if set, and to the
//! shared [`FallbackConsumer`] otherwise.

#![deny(missing_docs)]

pub mod consumer;
pub mod delivery;
pub mod dispatcher;
pub mod registry;
pub mod shutdown;
pub mod tag;

pub use consumer::{
    Consumer, ConsumerError, FallbackConsumer, fallback_consumer, is_fallback_consumer,
};
pub use delivery::{Delivery, DeliveryBuilder, DeliveryBuilderError, DeliveryProperties};
pub use dispatcher::{
    ConsumerDispatcher, DispatchError, DispatchStrategy, InlineStrategy, ShutdownReport,
};
pub use registry::ConsumerRegistry;
pub use shutdown::{REPLY_SUCCESS, ShutdownInitiator, ShutdownReason};
pub use tag::ConsumerTag;

pub mod prelude {
    //! The prelude module for the `courier_core` crate.
    pub use super::{
        Consumer, ConsumerDispatcher, ConsumerError, ConsumerRegistry, ConsumerTag, Delivery,
        DeliveryProperties, DispatchError, DispatchStrategy, FallbackConsumer, InlineStrategy,
        ShutdownInitiator, ShutdownReason, ShutdownReport,
    };
}

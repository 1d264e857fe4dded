//! # Courier tokio dispatchers
//!
//! Consumer dispatchers that execute consumer callbacks on the tokio runtime.
//!
//! Two execution strategies are provided:
//!
//! - [`SequentialDispatcher`]: one worker task, callbacks run strictly in arrival order.
//! - [`ConcurrentDispatcher`]: callbacks run on spawned tasks, bounded by
//!   [`DispatcherConfig::concurrency`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use courier_core::prelude::*;
//! use courier_tokio::{DispatcherConfig, SequentialDispatcher};
//!
//! let dispatcher = SequentialDispatcher::new(DispatcherConfig::from_env()?);
//!
//! dispatcher.handle_consume_ok(Arc::new(MyConsumer), "orders".into());
//! dispatcher.handle_deliver(delivery);
//!
//! // When the channel closes, every consumer is notified and queued work drains.
//! dispatcher.shutdown(&ShutdownReason::normal()).await?;
//! ```

#![deny(missing_docs)]

mod concurrent;
mod config;
mod dispatcher;
mod sequential;
mod strategy;
mod work;

pub use concurrent::ConcurrentStrategy;
pub use config::{ConfigError, DispatcherConfig, ENV_CONCURRENCY, ENV_SHUTDOWN_TIMEOUT_MS};
pub use dispatcher::{ChannelDispatcher, ConcurrentDispatcher, SequentialDispatcher};
pub use sequential::SequentialStrategy;
pub use strategy::QueueStrategy;
pub use work::WorkQueue;

//! # Courier
//!
//! Consumer dispatch for messaging-protocol clients: routes each inbound delivery to the consumer
//! registered for its tag and notifies every consumer, exactly once, when the channel closes.

#![deny(missing_docs)]

pub use courier_core::*;

#[cfg(feature = "tokio")]
/// Tokio-backed dispatchers for the `courier` crate.
pub mod tokio {
    //! Contains the tokio-backed dispatchers for the `courier` crate.
    pub use courier_tokio::*;
}

pub mod prelude {
    //! The prelude module for the `courier` crate.
    pub use courier_core::prelude::*;

    #[cfg(feature = "tokio")]
    pub use super::tokio::{ConcurrentDispatcher, DispatcherConfig, SequentialDispatcher};
}

//! The seam between the channel-facing dispatcher and its execution strategies.

use courier_core::DispatchStrategy;

use crate::work::WorkQueue;

/// A [`DispatchStrategy`] that executes callbacks from a [`WorkQueue`].
///
/// This trait is sealed: a [`WorkQueue`] can only be spawned by this crate, so
/// [`SequentialStrategy`](crate::SequentialStrategy) and
/// [`ConcurrentStrategy`](crate::ConcurrentStrategy) are its only implementations.
pub trait QueueStrategy: DispatchStrategy + sealed::Sealed {
    /// The queue callbacks are scheduled on.
    fn work_queue(&self) -> &WorkQueue;
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for crate::SequentialStrategy {}
    impl Sealed for crate::ConcurrentStrategy {}
}

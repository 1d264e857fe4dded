#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use courier_core::prelude::*;

/// Records every delivery count and shutdown reason it is notified with.
#[derive(Default)]
pub struct RecordingConsumer {
    pub deliveries: AtomicUsize,
    pub shutdowns: Mutex<Vec<String>>,
}

impl RecordingConsumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.lock().unwrap().len()
    }
}

#[async_trait]
impl Consumer for RecordingConsumer {
    async fn handle_delivery(&self, _delivery: Delivery) -> Result<(), ConsumerError> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_shutdown(&self, reason: &ShutdownReason) -> Result<(), ConsumerError> {
        self.shutdowns
            .lock()
            .unwrap()
            .push(reason.reply_text.clone());
        Ok(())
    }
}

#[derive(Debug)]
pub struct RefusedError;

impl std::fmt::Display for RefusedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("consumer refused to shut down")
    }
}

impl std::error::Error for RefusedError {}

/// Fails every shutdown notification.
pub struct FailingConsumer;

#[async_trait]
impl Consumer for FailingConsumer {
    async fn handle_delivery(&self, _delivery: Delivery) -> Result<(), ConsumerError> {
        Ok(())
    }

    async fn handle_shutdown(&self, _reason: &ShutdownReason) -> Result<(), ConsumerError> {
        Err(Box::new(RefusedError))
    }
}

/// Panics on every shutdown notification.
pub struct PanickingConsumer;

#[async_trait]
impl Consumer for PanickingConsumer {
    async fn handle_delivery(&self, _delivery: Delivery) -> Result<(), ConsumerError> {
        Ok(())
    }

    async fn handle_shutdown(&self, _reason: &ShutdownReason) -> Result<(), ConsumerError> {
        panic!("consumer panicked during shutdown");
    }
}

pub fn reason(text: &str) -> ShutdownReason {
    ShutdownReason::new(ShutdownInitiator::Peer, 320, text)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

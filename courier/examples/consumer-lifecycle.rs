//! Walks one channel through the life of its consumers: subscribe, deliver, cancel, close.
//!
//! Run with `RUST_LOG=debug cargo run --example consumer-lifecycle` to see the dispatcher logs.

use std::sync::Arc;

use async_trait::async_trait;
use courier::prelude::*;

struct PrintingConsumer {
    name: &'static str,
}

#[async_trait]
impl Consumer for PrintingConsumer {
    async fn handle_delivery(&self, delivery: Delivery) -> Result<(), ConsumerError> {
        log::info!(
            "[{}] delivery {} on '{}': {}",
            self.name,
            delivery.delivery_tag,
            delivery.routing_key,
            String::from_utf8_lossy(&delivery.body)
        );
        Ok(())
    }

    async fn handle_shutdown(&self, reason: &ShutdownReason) -> Result<(), ConsumerError> {
        log::info!("[{}] channel closed: {}", self.name, reason);
        Ok(())
    }

    async fn handle_consume_ok(&self, tag: &ConsumerTag) -> Result<(), ConsumerError> {
        log::info!("[{}] subscribed as '{}'", self.name, tag);
        Ok(())
    }

    async fn handle_cancel_ok(&self, tag: &ConsumerTag) -> Result<(), ConsumerError> {
        log::info!("[{}] unsubscribed '{}'", self.name, tag);
        Ok(())
    }
}

fn delivery(tag: &ConsumerTag, delivery_tag: u64, body: &str) -> Delivery {
    Delivery::builder()
        .consumer_tag(tag.clone())
        .delivery_tag(delivery_tag)
        .exchange("amq.topic")
        .routing_key("orders.created")
        .body(body.as_bytes().to_vec())
        .build()
        .expect("tags are set")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dispatcher = SequentialDispatcher::new(DispatcherConfig::from_env()?);

    let orders = ConsumerTag::generate();
    let audit = ConsumerTag::generate();
    dispatcher.handle_consume_ok(Arc::new(PrintingConsumer { name: "orders" }), orders.clone());
    dispatcher.handle_consume_ok(Arc::new(PrintingConsumer { name: "audit" }), audit.clone());

    dispatcher.handle_deliver(delivery(&orders, 1, r#"{"id": 1}"#));
    dispatcher.handle_deliver(delivery(&audit, 2, r#"{"id": 1}"#));

    dispatcher.handle_cancel_ok(audit.as_str());
    // Lands on the fallback consumer and is discarded.
    dispatcher.handle_deliver(delivery(&audit, 3, r#"{"id": 2}"#));

    let report = dispatcher.shutdown(&ShutdownReason::normal()).await?;
    log::info!(
        "Shutdown complete: {} consumer(s) notified, {} failed",
        report.notified,
        report.failed.len()
    );
    Ok(())
}

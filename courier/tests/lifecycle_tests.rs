use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use courier::is_fallback_consumer;
use courier::prelude::*;

#[derive(Default)]
struct CountingConsumer {
    deliveries: AtomicUsize,
    shutdowns: AtomicUsize,
}

#[async_trait]
impl Consumer for CountingConsumer {
    async fn handle_delivery(&self, _delivery: Delivery) -> Result<(), ConsumerError> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_shutdown(&self, _reason: &ShutdownReason) -> Result<(), ConsumerError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn channel_lifecycle_through_the_prelude() {
    let dispatcher = SequentialDispatcher::new(DispatcherConfig::default());
    let h1 = Arc::new(CountingConsumer::default());
    let h2 = Arc::new(CountingConsumer::default());
    dispatcher.handle_consume_ok(h1.clone(), "A".into());
    dispatcher.handle_consume_ok(h2.clone(), "B".into());

    dispatcher.handle_deliver(
        Delivery::builder()
            .consumer_tag("B")
            .delivery_tag(1)
            .build()
            .unwrap(),
    );
    dispatcher.handle_cancel_ok("A");
    assert!(is_fallback_consumer(&dispatcher.registry().resolve("A")));

    let reason = ShutdownReason::new(ShutdownInitiator::Peer, 320, "CONNECTION_FORCED");
    let report = dispatcher.shutdown(&reason).await.unwrap();

    assert_eq!(report.notified, 1);
    assert_eq!(h1.shutdowns.load(Ordering::SeqCst), 0);
    assert_eq!(h2.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(h2.deliveries.load(Ordering::SeqCst), 1);
    assert!(dispatcher.registry().is_empty());
}

//! Tests for the shutdown sweep and strategy finalization.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{FailingConsumer, PanickingConsumer, RecordingConsumer, init_logging, reason};
use courier_core::prelude::*;
use courier_core::{fallback_consumer, is_fallback_consumer};

#[tokio::test]
async fn take_then_shutdown_scenario() {
    let dispatcher = ConsumerDispatcher::new(InlineStrategy);
    let h1 = RecordingConsumer::new();
    let h2 = RecordingConsumer::new();
    dispatcher.register("A".into(), h1.clone());
    dispatcher.register("B".into(), h2.clone());

    let taken = dispatcher.take("A");
    let h1_dyn: Arc<dyn Consumer> = h1.clone();
    assert!(Arc::ptr_eq(&taken, &h1_dyn));
    assert_eq!(dispatcher.registry().len(), 1);
    assert!(dispatcher.registry().contains("B"));
    assert!(is_fallback_consumer(&dispatcher.resolve("A")));

    let report = dispatcher.shutdown(&reason("reasonX")).await.unwrap();

    assert_eq!(report.notified, 1);
    assert_eq!(*h2.shutdowns.lock().unwrap(), vec!["reasonX".to_string()]);
    assert_eq!(h1.shutdown_count(), 0);
    assert!(dispatcher.registry().is_empty());
}

#[tokio::test]
async fn ghost_tag_resolves_to_the_same_fallback_instance() {
    let dispatcher = ConsumerDispatcher::new(InlineStrategy);
    let first = dispatcher.resolve("ghost");
    let second = dispatcher.resolve("ghost");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &fallback_consumer()));
}

#[tokio::test]
async fn previously_registered_tags_fall_back_to_default_after_shutdown() {
    let dispatcher = ConsumerDispatcher::new(InlineStrategy);
    let default: Arc<dyn Consumer> = RecordingConsumer::new();
    dispatcher.set_default_consumer(Some(default.clone()));
    for tag in ["A", "B", "C"] {
        dispatcher.register(tag.into(), RecordingConsumer::new());
    }

    dispatcher.shutdown(&reason("closed")).await.unwrap();

    for tag in ["A", "B", "C"] {
        assert!(Arc::ptr_eq(&dispatcher.resolve(tag), &default));
        assert!(Arc::ptr_eq(&dispatcher.take(tag), &default));
    }
}

#[tokio::test]
async fn every_registered_consumer_is_notified_exactly_once() {
    let dispatcher = ConsumerDispatcher::new(InlineStrategy);
    let consumers: Vec<Arc<RecordingConsumer>> =
        (0..50).map(|_| RecordingConsumer::new()).collect();
    for (n, consumer) in consumers.iter().enumerate() {
        dispatcher.register(format!("ctag-{}", n).into(), consumer.clone());
    }

    let report = dispatcher.shutdown(&reason("bye")).await.unwrap();

    assert_eq!(report.notified, 50);
    for consumer in &consumers {
        assert_eq!(consumer.shutdown_count(), 1);
    }
}

#[tokio::test]
async fn failing_consumer_does_not_stop_the_sweep() {
    init_logging();
    let dispatcher = ConsumerDispatcher::new(InlineStrategy);
    let healthy: Vec<Arc<RecordingConsumer>> = (0..5).map(|_| RecordingConsumer::new()).collect();
    for (n, consumer) in healthy.iter().enumerate() {
        dispatcher.register(format!("ok-{}", n).into(), consumer.clone());
    }
    dispatcher.register("broken".into(), Arc::new(FailingConsumer));

    let report = dispatcher.shutdown(&reason("bye")).await.unwrap();

    assert_eq!(report.notified, 6);
    assert_eq!(report.failed, vec![ConsumerTag::from("broken")]);
    for consumer in &healthy {
        assert_eq!(consumer.shutdown_count(), 1);
    }
}

#[tokio::test]
async fn panicking_consumer_does_not_stop_the_sweep() {
    init_logging();
    let dispatcher = ConsumerDispatcher::new(InlineStrategy);
    let healthy = RecordingConsumer::new();
    dispatcher.register("panics".into(), Arc::new(PanickingConsumer));
    dispatcher.register("healthy".into(), healthy.clone());

    let report = dispatcher.shutdown(&reason("bye")).await.unwrap();

    assert_eq!(report.failed, vec![ConsumerTag::from("panics")]);
    assert_eq!(healthy.shutdown_count(), 1);
    assert!(dispatcher.registry().is_empty());
}

/// Records the order of notifications and finalization, and can be told to fail.
#[derive(Default)]
struct ScriptedStrategy {
    log: Mutex<Vec<String>>,
    fail_finalize: AtomicBool,
    finalized: AtomicUsize,
}

#[derive(Debug)]
struct DrainError;

impl std::fmt::Display for DrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("in-flight deliveries did not drain")
    }
}

impl std::error::Error for DrainError {}

#[async_trait]
impl DispatchStrategy for ScriptedStrategy {
    async fn shutdown_consumer(
        &self,
        tag: &ConsumerTag,
        consumer: Arc<dyn Consumer>,
        reason: &ShutdownReason,
    ) -> Result<(), ConsumerError> {
        self.log.lock().unwrap().push(format!("notify {}", tag));
        consumer.handle_shutdown(reason).await
    }

    async fn finalize(&self) -> Result<(), DispatchError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.log.lock().unwrap().push("finalize".to_string());
        self.finalized.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(DispatchError::Finalize(Box::new(DrainError)));
        }
        Ok(())
    }
}

#[tokio::test]
async fn finalization_runs_after_every_notification() {
    let dispatcher = ConsumerDispatcher::new(ScriptedStrategy::default());
    dispatcher.register("A".into(), RecordingConsumer::new());
    dispatcher.register("B".into(), RecordingConsumer::new());

    dispatcher.shutdown(&reason("bye")).await.unwrap();

    let log = dispatcher.strategy().log.lock().unwrap().clone();
    assert_eq!(log.len(), 3);
    assert_eq!(log.last().unwrap(), "finalize");
    assert!(log.contains(&"notify A".to_string()));
    assert!(log.contains(&"notify B".to_string()));
}

#[tokio::test]
async fn finalization_failure_is_surfaced() {
    let strategy = ScriptedStrategy::default();
    strategy.fail_finalize.store(true, Ordering::SeqCst);
    let dispatcher = ConsumerDispatcher::new(strategy);
    let consumer = RecordingConsumer::new();
    dispatcher.register("A".into(), consumer.clone());

    let result = dispatcher.shutdown(&reason("bye")).await;

    match result {
        Err(DispatchError::Finalize(e)) => {
            assert_eq!(e.to_string(), "in-flight deliveries did not drain")
        }
        other => panic!("Unexpected result: {:?}", other),
    }
    // Consumers were still notified before finalization failed.
    assert_eq!(consumer.shutdown_count(), 1);
    assert!(dispatcher.registry().is_empty());
}

#[tokio::test]
async fn finalize_runs_once_even_if_shutdown_is_repeated() {
    let dispatcher = ConsumerDispatcher::new(ScriptedStrategy::default());
    dispatcher.shutdown(&reason("first")).await.unwrap();
    dispatcher.shutdown(&reason("second")).await.unwrap();
    assert_eq!(dispatcher.strategy().finalized.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn registration_after_shutdown_is_orphaned() {
    init_logging();
    let dispatcher = ConsumerDispatcher::new(InlineStrategy);
    dispatcher.shutdown(&reason("bye")).await.unwrap();

    let late = RecordingConsumer::new();
    dispatcher.register("late".into(), late.clone());

    // The late consumer is still routable but never notified by this dispatcher.
    let late_dyn: Arc<dyn Consumer> = late.clone();
    assert!(Arc::ptr_eq(&dispatcher.resolve("late"), &late_dyn));
    dispatcher.shutdown(&reason("again")).await.unwrap();
    assert_eq!(late.shutdown_count(), 0);
    assert!(dispatcher.registry().contains("late"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sweep_racing_registrations_never_notifies_twice() {
    init_logging();
    let dispatcher = Arc::new(ConsumerDispatcher::new(InlineStrategy));
    let consumers: Vec<Arc<RecordingConsumer>> =
        (0..2_000).map(|_| RecordingConsumer::new()).collect();

    let registrar = {
        let dispatcher = dispatcher.clone();
        let consumers = consumers.clone();
        std::thread::spawn(move || {
            for (n, consumer) in consumers.into_iter().enumerate() {
                dispatcher.register(format!("ctag-{}", n).into(), consumer);
            }
        })
    };

    tokio::task::yield_now().await;
    let report = dispatcher.shutdown(&reason("racing")).await.unwrap();
    registrar.join().unwrap();

    // Each consumer was either swept (notified once) or registered too late (still present).
    let mut notified = 0;
    for (n, consumer) in consumers.iter().enumerate() {
        let count = consumer.shutdown_count();
        let present = dispatcher.registry().contains(&format!("ctag-{}", n));
        assert!(count <= 1);
        assert!(
            (count == 1) != present,
            "ctag-{} notified {} time(s), present: {}",
            n,
            count,
            present
        );
        notified += count;
    }
    assert_eq!(notified, report.notified);
}

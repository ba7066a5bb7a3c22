mod common;

use common::{RecordingDelivery, entry, ids};
use gt8004_sdk::{DeliveryError, DeliveryOutcome, Logger, LoggerConfig};
use std::time::Duration;
use tokio::time::sleep;

fn config() -> LoggerConfig {
    LoggerConfig::new("agent-test", "test-key")
        .with_flush_interval(Duration::from_secs(60))
        .with_batch_size(50)
}

fn server_error() -> DeliveryOutcome {
    DeliveryOutcome::Retryable(DeliveryError::Server { status: 503 })
}

#[tokio::test(start_paused = true)]
async fn test_size_trigger_flushes_full_batches_only() {
    let delivery = RecordingDelivery::new();
    let logger = Logger::with_delivery(config().with_batch_size(2), delivery.clone()).unwrap();

    for i in 0..5 {
        logger.log(entry(i)).unwrap();
    }
    sleep(Duration::from_millis(10)).await;

    assert_eq!(
        delivery.request_ids(),
        vec![ids(0..2), ids(2..4)],
        "the odd entry waits for the timer"
    );
    assert_eq!(logger.buffered(), 1);

    logger.close().await;
    assert_eq!(delivery.request_ids().last().unwrap(), &ids(4..5));
}

#[tokio::test(start_paused = true)]
async fn test_timer_flushes_partial_batch() {
    let delivery = RecordingDelivery::new();
    let logger = Logger::with_delivery(
        config().with_flush_interval(Duration::from_secs(5)),
        delivery.clone(),
    )
    .unwrap();

    logger.log(entry(0)).unwrap();
    sleep(Duration::from_secs(4)).await;
    assert_eq!(delivery.attempts(), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(delivery.request_ids(), vec![ids(0..1)]);

    // Nothing buffered, nothing sent.
    sleep(Duration::from_secs(20)).await;
    assert_eq!(delivery.attempts(), 1);

    logger.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_waits_for_next_tick() {
    let delivery = RecordingDelivery::scripted([server_error()]);
    let logger = Logger::with_delivery(
        config()
            .with_batch_size(2)
            .with_flush_interval(Duration::from_secs(1)),
        delivery.clone(),
    )
    .unwrap();

    logger.log(entry(0)).unwrap();
    logger.log(entry(1)).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(delivery.attempts(), 1);
    assert_eq!(logger.buffered(), 2);

    // A full buffer does not jump the queue while a retry is pending.
    logger.log(entry(2)).unwrap();
    logger.log(entry(3)).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(delivery.attempts(), 1);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        delivery.request_ids(),
        vec![ids(0..2), ids(0..2), ids(2..4)]
    );

    let stats = logger.stats();
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.delivered_entries, 4);
    assert_eq!(stats.batches_failed, 1);
    logger.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_flushes_never_overlap() {
    let delivery = RecordingDelivery::with_delay(Duration::from_millis(100));
    let logger = Logger::with_delivery(config().with_batch_size(1), delivery.clone()).unwrap();

    for i in 0..3 {
        logger.log(entry(i)).unwrap();
    }
    let explicit = {
        let logger = logger.clone();
        tokio::spawn(async move { logger.flush().await })
    };
    sleep(Duration::from_millis(10)).await;
    logger.flush().await;
    explicit.await.unwrap();

    assert_eq!(delivery.max_in_flight(), 1);
    let delivered: Vec<String> = delivery.request_ids().concat();
    assert_eq!(delivered, ids(0..3));

    logger.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_pauses_scheduled_flushes() {
    let delivery = RecordingDelivery::always(server_error());
    let logger = Logger::with_delivery(
        config()
            .with_flush_interval(Duration::from_secs(1))
            .with_max_retries(10)
            .with_circuit_breaker(2, Duration::from_secs(10)),
        delivery.clone(),
    )
    .unwrap();

    logger.log(entry(0)).unwrap();
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(delivery.attempts(), 2);

    // Open from t=2s until t=12s.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(delivery.attempts(), 2);

    sleep(Duration::from_secs(7)).await;
    assert_eq!(delivery.attempts(), 4);

    // Close ignores the breaker and spends the remaining budget.
    logger.close().await;
    assert_eq!(delivery.attempts(), 10);
    let stats = logger.stats();
    assert_eq!(stats.dropped_retries_exhausted, 1);
    assert_eq!(stats.delivered_entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_flush_stops_at_first_requeue() {
    let delivery = RecordingDelivery::scripted([server_error()]);
    let logger = Logger::with_delivery(config().with_batch_size(2), delivery.clone()).unwrap();

    for i in 0..4 {
        logger.log(entry(i)).unwrap();
    }
    logger.flush().await;

    assert_eq!(delivery.request_ids(), vec![ids(0..2)]);
    assert_eq!(logger.buffered(), 4);

    logger.close().await;
    let delivered: Vec<String> = delivery.request_ids()[1..].concat();
    assert_eq!(delivered, ids(0..4));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_batch_is_dropped() {
    let delivery = RecordingDelivery::scripted([DeliveryOutcome::Fatal(DeliveryError::Client {
        status: 422,
        body: "unprocessable".to_string(),
    })]);
    let logger = Logger::with_delivery(config(), delivery.clone()).unwrap();

    logger.log(entry(0)).unwrap();
    logger.log(entry(1)).unwrap();
    logger.flush().await;
    logger.log(entry(2)).unwrap();
    logger.flush().await;

    assert_eq!(delivery.request_ids(), vec![ids(0..2), ids(2..3)]);
    let stats = logger.stats();
    assert_eq!(stats.dropped_rejected, 2);
    assert_eq!(stats.delivered_entries, 1);
    assert_eq!(stats.retries, 0);

    logger.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_overflow_drops_oldest() {
    let delivery = RecordingDelivery::new();
    let logger = Logger::with_delivery(
        config().with_batch_size(3).with_buffer_capacity(3),
        delivery.clone(),
    )
    .unwrap();

    for i in 0..5 {
        logger.log(entry(i)).unwrap();
    }
    assert_eq!(logger.buffered(), 3);
    logger.flush().await;

    assert_eq!(delivery.request_ids().concat(), ids(2..5));
    let stats = logger.stats();
    assert_eq!(stats.dropped_overflow, 2);
    assert_eq!(stats.enqueued, 5);
    logger.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_request_id_starts_new_batch() {
    let delivery = RecordingDelivery::new();
    let logger = Logger::with_delivery(config(), delivery.clone()).unwrap();

    logger.log(entry(0)).unwrap();
    logger.log(entry(1)).unwrap();
    logger.log(entry(0)).unwrap();
    logger.close().await;

    assert_eq!(
        delivery.request_ids(),
        vec![ids(0..2), vec!["req-0".to_string()]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_drains_and_rejects_new_entries() {
    let delivery = RecordingDelivery::new();
    let logger = Logger::with_delivery(config(), delivery.clone()).unwrap();

    for i in 0..120 {
        logger.log(entry(i)).unwrap();
    }
    logger.close().await;

    let sizes: Vec<usize> = delivery.request_ids().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert!(logger.is_closed());
    assert!(logger.log(entry(999)).is_err());

    let stats = logger.stats();
    assert_eq!(stats.delivered_entries, 120);
    assert_eq!(stats.dropped_closed, 1);
    assert_eq!(stats.buffered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_deadline_counts_batch_cut_off_mid_request() {
    let delivery = RecordingDelivery::with_delay(Duration::from_secs(5));
    let logger = Logger::with_delivery(
        config().with_close_timeout(Duration::from_millis(300)),
        delivery.clone(),
    )
    .unwrap();

    logger.log(entry(0)).unwrap();
    logger.close().await;

    assert_eq!(delivery.attempts(), 1);
    let stats = logger.stats();
    assert_eq!(stats.delivered_entries, 0);
    assert_eq!(stats.dropped_shutdown_timeout, 1);
    assert_eq!(stats.buffered, 0);
    assert_eq!(
        stats.enqueued,
        stats.delivered_entries + stats.dropped_total() + stats.buffered
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_deadline_counts_batch_of_aborted_worker() {
    let delivery = RecordingDelivery::with_delay(Duration::from_secs(5));
    let logger = Logger::with_delivery(
        config()
            .with_batch_size(1)
            .with_close_timeout(Duration::from_millis(300)),
        delivery.clone(),
    )
    .unwrap();

    logger.log(entry(0)).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(delivery.attempts(), 1, "the worker is mid-request");
    logger.log(entry(1)).unwrap();

    logger.close().await;

    assert_eq!(delivery.attempts(), 1);
    let stats = logger.stats();
    assert_eq!(stats.delivered_entries, 0);
    assert_eq!(stats.dropped_shutdown_timeout, 2);
    assert_eq!(stats.buffered, 0);
    assert_eq!(
        stats.enqueued,
        stats.delivered_entries + stats.dropped_total() + stats.buffered
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_stops_worker() {
    let delivery = RecordingDelivery::new();
    let logger = Logger::with_delivery(
        config().with_flush_interval(Duration::from_secs(1)),
        delivery.clone(),
    )
    .unwrap();
    logger.log(entry(0)).unwrap();
    drop(logger);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(delivery.attempts(), 0);
}

//! Queue Consumer Tests
//!
//! ## Test Scopes
//! - **Happy path**: a published message ends up as exactly one record and leaves the queue.
//! - **Idempotence**: redeliveries and duplicate fan-out copies never create a second record.
//! - **Retries**: transient store failures release the envelope; exhausted budgets dead-letter it.
//! - **Permanent failures**: bad payloads are reported once, acknowledged and never retried.
//! - **Workers**: the pool drains a queue concurrently and stops on cancellation.

#[cfg(test)]
mod tests {
    use crate::consumer::consumer::QueueConsumer;
    use crate::consumer::reporter::{ErrorReporter, MockErrorReporter, TracingReporter};
    use crate::consumer::types::*;
    use crate::consumer::worker::ConsumerPool;
    use crate::queue::types::now_ms;
    use crate::queue::{DurableQueue, Message, MessageId, QueueConfig};
    use crate::storage::testing::FlakyStore;
    use crate::storage::types::MockKeyValueStore;
    use crate::storage::{InMemoryStore, KeyValueStore, PutMode, Record, StoreError};
    use crate::topic::Topic;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const VISIBILITY: Duration = Duration::from_secs(1);

    fn queue_with(max_receive_count: u32) -> Arc<DurableQueue> {
        Arc::new(DurableQueue::new(
            "ingest-queue",
            QueueConfig {
                max_receive_count,
                max_depth: None,
            },
        ))
    }

    fn config() -> ConsumerConfig {
        ConsumerConfig {
            batch_size: 10,
            visibility_timeout: VISIBILITY,
            wait_time: Duration::ZERO,
            ..Default::default()
        }
    }

    fn silent_reporter() -> Arc<dyn ErrorReporter> {
        let mut reporter = MockErrorReporter::new();
        reporter.expect_report().never();
        Arc::new(reporter)
    }

    fn consumer(
        queue: &Arc<DurableQueue>,
        store: Arc<dyn KeyValueStore>,
        reporter: Arc<dyn ErrorReporter>,
        config: ConsumerConfig,
    ) -> QueueConsumer {
        QueueConsumer::new(queue.clone(), store, reporter, config)
    }

    fn stored_message(store: &InMemoryStore, key: &str) -> StoredMessageRecord {
        store.get_local(key).unwrap().decode().unwrap()
    }

    // ============================================================
    // TEST 1: Publish -> consume -> one record
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_published_message_is_persisted_once() {
        // ARRANGE
        let queue = queue_with(5);
        let topic = Topic::new("ingest-topic");
        topic.subscribe(queue.clone());
        let store = Arc::new(InMemoryStore::new());
        let consumer = consumer(&queue, store.clone(), silent_reporter(), config());

        // ACT
        let receipt = topic.publish(Message::new("hello")).unwrap();
        let report = consumer.run_once().await;

        // ASSERT
        assert_eq!(report.received, 1);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.ack_lost, 0);
        assert!(queue.is_empty());

        let key = format!("{}{}", MESSAGE_KEY_PREFIX, receipt.message_id);
        let record = stored_message(&store, &key);
        assert_eq!(record.item_id, key);
        assert_eq!(record.message, "hello");
        assert_eq!(store.keys_of_kind(MESSAGE_KIND), vec![key]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_pass_reports_nothing() {
        let queue = queue_with(5);
        let store = Arc::new(InMemoryStore::new());
        let consumer = consumer(&queue, store.clone(), silent_reporter(), config());

        let report = consumer.run_once().await;

        assert!(report.is_idle());
        assert_eq!(report, ConsumptionReport::default());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_waits_for_late_message() {
        let queue = queue_with(5);
        let store = Arc::new(InMemoryStore::new());
        let consumer = consumer(
            &queue,
            store.clone(),
            silent_reporter(),
            ConsumerConfig {
                wait_time: Duration::from_secs(5),
                ..config()
            },
        );

        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            producer
                .enqueue(MessageId::new(), Message::new("late"), now_ms())
                .unwrap();
        });

        let report = consumer.run_once().await;

        assert_eq!(report.persisted, 1);
        assert_eq!(store.len(), 1);
    }

    // ============================================================
    // TEST 2: Transient failures are retried
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_releases_then_succeeds() {
        // ARRANGE: the first write hits an outage.
        let queue = queue_with(5);
        let topic = Topic::new("ingest-topic");
        topic.subscribe(queue.clone());
        let inner = Arc::new(InMemoryStore::new());
        let store = Arc::new(FlakyStore::new(inner.clone()));
        store.fail_next_puts(1);
        let consumer = consumer(&queue, store.clone(), silent_reporter(), config());
        topic.publish(Message::new("hello")).unwrap();

        // ACT
        let first = consumer.run_once().await;

        // ASSERT: released, nothing stored, envelope immediately receivable again.
        assert_eq!(first.released, 1);
        assert!(inner.is_empty());
        assert_eq!(queue.stats().pending, 1);

        // ACT
        let second = consumer.run_once().await;

        // ASSERT
        assert_eq!(second.persisted, 1);
        assert_eq!(store.attempts(), 2);
        assert_eq!(inner.keys_of_kind(MESSAGE_KIND).len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_in_batch_only_affects_its_envelope() {
        let queue = queue_with(5);
        for text in ["a", "b", "c"] {
            queue
                .enqueue(MessageId::new(), Message::new(text), now_ms())
                .unwrap();
        }
        let inner = Arc::new(InMemoryStore::new());
        let store = Arc::new(FlakyStore::new(inner.clone()));
        store.fail_next_puts(1);
        let consumer = consumer(&queue, store, silent_reporter(), config());

        let first = consumer.run_once().await;
        assert_eq!(first.received, 3);
        assert_eq!(first.released, 1);
        assert_eq!(first.persisted, 2);

        let second = consumer.run_once().await;
        assert_eq!(second.persisted, 1);
        assert_eq!(inner.len(), 3);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_outage_dead_letters_envelope() {
        // ARRANGE: the store never recovers.
        let queue = queue_with(3);
        let mut store = MockKeyValueStore::new();
        store
            .expect_put()
            .times(3)
            .returning(|_, _, _| Err(StoreError::Unavailable("store down".to_string())));
        let consumer = consumer(&queue, Arc::new(store), silent_reporter(), config());
        queue
            .enqueue(MessageId::new(), Message::new("doomed"), now_ms())
            .unwrap();

        // ACT
        for _ in 0..3 {
            let report = consumer.run_once().await;
            assert_eq!(report.released, 1);
        }
        let after_budget = consumer.run_once().await;

        // ASSERT: three deliveries, then parked instead of looping forever.
        assert!(after_budget.is_idle());
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].envelope.receive_count, 3);
        assert_eq!(dead[0].envelope.payload.message, "doomed");
    }

    // ============================================================
    // TEST 3: Redelivery and duplicates never duplicate records
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_lost_acknowledgments_do_not_duplicate_record() {
        // ARRANGE: every write outlives the visibility timeout three times.
        let queue = queue_with(10);
        let inner = Arc::new(InMemoryStore::new());
        let store = Arc::new(FlakyStore::new(inner.clone()));
        store.stall_next_puts(3, VISIBILITY * 2);
        let consumer = consumer(&queue, store.clone(), silent_reporter(), config());
        let message_id = MessageId::new();
        queue
            .enqueue(message_id.clone(), Message::new("slow"), now_ms())
            .unwrap();

        // ACT
        let first = consumer.run_once().await;
        let mut duplicates = 0;
        let mut ack_lost = first.ack_lost;
        for _ in 0..3 {
            let report = consumer.run_once().await;
            duplicates += report.duplicates;
            ack_lost += report.ack_lost;
        }

        // ASSERT
        assert_eq!(first.persisted, 1);
        assert_eq!(first.ack_lost, 1);
        assert_eq!(duplicates, 3);
        assert_eq!(ack_lost, 3);
        assert_eq!(store.attempts(), 4);
        assert!(queue.is_empty());

        let key = format!("{}{}", MESSAGE_KEY_PREFIX, message_id);
        assert_eq!(inner.keys_of_kind(MESSAGE_KIND), vec![key.clone()]);
        assert_eq!(stored_message(&inner, &key).message, "slow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_consumer_cannot_settle_successors_claim() {
        // ARRANGE: A's write outlives its visibility timeout; B picks the envelope up meanwhile.
        let queue = queue_with(5);
        let inner = Arc::new(InMemoryStore::new());
        let slow_store = Arc::new(FlakyStore::new(inner.clone()));
        slow_store.stall_next_puts(1, VISIBILITY * 2);
        let consumer_a = consumer(&queue, slow_store, silent_reporter(), config());
        let consumer_b = consumer(&queue, inner.clone(), silent_reporter(), config());
        queue
            .enqueue(MessageId::new(), Message::new("contended"), now_ms())
            .unwrap();

        // ACT
        let (report_a, report_b) = tokio::join!(consumer_a.run_once(), async {
            tokio::time::sleep(VISIBILITY + VISIBILITY / 2).await;
            consumer_b.run_once().await
        });

        // ASSERT: B owns the settlement, A's late ack is rejected.
        assert_eq!(report_b.persisted, 1);
        assert_eq!(report_b.ack_lost, 0);
        assert_eq!(report_a.duplicates, 1);
        assert_eq!(report_a.ack_lost, 1);
        assert!(queue.is_empty());
        assert_eq!(inner.keys_of_kind(MESSAGE_KIND).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_copies_of_one_publish_share_a_record() {
        let queue = queue_with(5);
        let message_id = MessageId::new();
        for _ in 0..3 {
            queue
                .enqueue(message_id.clone(), Message::new("fan-out"), now_ms())
                .unwrap();
        }
        let store = Arc::new(InMemoryStore::new());
        let consumer = consumer(&queue, store.clone(), silent_reporter(), config());

        let report = consumer.run_once().await;

        assert_eq!(report.received, 3);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.duplicates, 2);
        assert_eq!(store.len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_publishes_of_same_text_are_separate_records() {
        let queue = queue_with(5);
        let topic = Topic::new("ingest-topic");
        topic.subscribe(queue.clone());
        let store = Arc::new(InMemoryStore::new());
        let consumer = consumer(&queue, store.clone(), silent_reporter(), config());

        topic.publish(Message::new("same")).unwrap();
        topic.publish(Message::new("same")).unwrap();
        let report = consumer.run_once().await;

        assert_eq!(report.persisted, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_hash_policy_collapses_identical_text() {
        let queue = queue_with(5);
        let topic = Topic::new("ingest-topic");
        topic.subscribe(queue.clone());
        let store = Arc::new(InMemoryStore::new());
        let consumer = consumer(
            &queue,
            store.clone(),
            silent_reporter(),
            ConsumerConfig {
                dedup_key: DedupKeyPolicy::ContentHash,
                ..config()
            },
        );

        topic.publish(Message::new("same")).unwrap();
        topic.publish(Message::new("same")).unwrap();
        topic.publish(Message::new("different")).unwrap();
        let report = consumer.run_once().await;

        assert_eq!(report.persisted, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.keys_of_kind(MESSAGE_KIND).len(), 2);
    }

    // ============================================================
    // TEST 4: Permanent failures are reported and dropped
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_empty_message_is_reported_and_dropped() {
        // ARRANGE
        let queue = queue_with(5);
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = MockErrorReporter::new();
        reporter
            .expect_report()
            .times(1)
            .withf(|error, envelope| {
                matches!(error, ProcessingError::EmptyMessage) && envelope.receive_count == 1
            })
            .return_const(());
        let consumer = consumer(&queue, store.clone(), Arc::new(reporter), config());
        queue
            .enqueue(MessageId::new(), Message::new("   "), now_ms())
            .unwrap();

        // ACT
        let report = consumer.run_once().await;

        // ASSERT: acknowledged, so never redelivered.
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty());
        assert!(store.is_empty());
        assert!(consumer.run_once().await.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_message_is_reported_and_dropped() {
        let queue = queue_with(5);
        let store = Arc::new(InMemoryStore::new());
        let mut reporter = MockErrorReporter::new();
        reporter
            .expect_report()
            .times(1)
            .withf(|error, _| {
                matches!(error, ProcessingError::MessageTooLarge { size: 9, limit: 8 })
            })
            .return_const(());
        let consumer = consumer(
            &queue,
            store.clone(),
            Arc::new(reporter),
            ConsumerConfig {
                max_message_bytes: 8,
                ..config()
            },
        );
        queue
            .enqueue(MessageId::new(), Message::new("123456789"), now_ms())
            .unwrap();
        queue
            .enqueue(MessageId::new(), Message::new("12345678"), now_ms())
            .unwrap();

        let report = consumer.run_once().await;

        assert_eq!(report.dropped, 1);
        assert_eq!(report.persisted, 1);
        assert_eq!(store.len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicting_record_is_reported_and_dropped() {
        // ARRANGE: the derived key already holds an unrelated record.
        let queue = queue_with(5);
        let store = Arc::new(InMemoryStore::new());
        let message_id = MessageId::new();
        let key = format!("{}{}", MESSAGE_KEY_PREFIX, message_id);
        let existing = Record::encode(
            MESSAGE_KIND,
            &StoredMessageRecord {
                item_id: key.clone(),
                message: "original".to_string(),
            },
        )
        .unwrap();
        store.put_local(&key, existing, PutMode::Overwrite).unwrap();

        let mut reporter = MockErrorReporter::new();
        reporter
            .expect_report()
            .times(1)
            .withf(|error, _| matches!(error, ProcessingError::Conflict { .. }))
            .return_const(());
        let consumer = consumer(&queue, store.clone(), Arc::new(reporter), config());
        queue
            .enqueue(message_id, Message::new("impostor"), now_ms())
            .unwrap();

        // ACT
        let report = consumer.run_once().await;

        // ASSERT: the original record is untouched.
        assert_eq!(report.dropped, 1);
        assert_eq!(stored_message(&store, &key).message, "original");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_error_classification() {
        assert!(ProcessingError::EmptyMessage.is_permanent());
        assert!(ProcessingError::Conflict { key: "k".into() }.is_permanent());
        assert!(!ProcessingError::Unavailable("down".into()).is_permanent());
        assert!(!ProcessingError::from(StoreError::Unavailable("down".into())).is_permanent());
    }

    // ============================================================
    // TEST 5: Dedup key derivation
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_dedup_keys_are_stable_across_redelivery() {
        let queue = queue_with(5);
        let message_id = MessageId::new();
        queue
            .enqueue(message_id.clone(), Message::new("hello"), now_ms())
            .unwrap();

        let first = queue.receive(1, VISIBILITY).remove(0);
        queue.release(&first.delivery_id, first.receipt_handle);
        let second = queue.receive(1, VISIBILITY).remove(0);

        assert_eq!(second.receive_count, 2);
        for policy in [DedupKeyPolicy::MessageId, DedupKeyPolicy::ContentHash] {
            assert_eq!(policy.derive_key(&first), policy.derive_key(&second));
        }
        assert_eq!(
            DedupKeyPolicy::MessageId.derive_key(&first),
            format!("message-{}", message_id)
        );

        let hashed = DedupKeyPolicy::ContentHash.derive_key(&first);
        let digest = hashed.strip_prefix(MESSAGE_KEY_PREFIX).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // ============================================================
    // TEST 6: Worker pool
    // ============================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_drains_queue_without_duplicates() {
        // ARRANGE: every publish is duplicated into the queue twice.
        let queue = queue_with(5);
        let store = Arc::new(InMemoryStore::new());
        for i in 0..40 {
            let message_id = MessageId::new();
            for _ in 0..2 {
                queue
                    .enqueue(message_id.clone(), Message::new(format!("m{}", i)), now_ms())
                    .unwrap();
            }
        }
        let consumer = Arc::new(consumer(
            &queue,
            store.clone(),
            Arc::new(TracingReporter),
            ConsumerConfig {
                batch_size: 3,
                visibility_timeout: Duration::from_secs(30),
                wait_time: Duration::from_millis(20),
                ..Default::default()
            },
        ));
        let shutdown = CancellationToken::new();

        // ACT
        let handles = ConsumerPool::new(consumer, 4).start(shutdown.clone());
        for _ in 0..500 {
            if queue.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        // ASSERT
        assert!(queue.is_empty());
        assert_eq!(store.keys_of_kind(MESSAGE_KIND).len(), 40);
    }

    #[tokio::test]
    async fn test_pool_stops_on_cancellation() {
        let queue = queue_with(5);
        let consumer = Arc::new(consumer(
            &queue,
            Arc::new(InMemoryStore::new()),
            silent_reporter(),
            ConsumerConfig {
                wait_time: Duration::from_secs(60),
                ..config()
            },
        ));
        let shutdown = CancellationToken::new();
        let handles = ConsumerPool::new(consumer, 2).start(shutdown.clone());
        assert_eq!(handles.len(), 2);

        shutdown.cancel();

        let joined = tokio::time::timeout(Duration::from_secs(5), async {
            for handle in handles {
                handle.await.unwrap();
            }
        })
        .await;
        assert!(joined.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_pass_is_recovered_by_visibility_timeout() {
        // ARRANGE: the worker's write hangs long enough to be cut off by shutdown.
        let queue = queue_with(5);
        let inner = Arc::new(InMemoryStore::new());
        let store = Arc::new(FlakyStore::new(inner.clone()));
        store.stall_next_puts(1, Duration::from_secs(60));
        queue
            .enqueue(MessageId::new(), Message::new("interrupted"), now_ms())
            .unwrap();
        let worker_consumer = Arc::new(consumer(&queue, store, silent_reporter(), config()));
        let shutdown = CancellationToken::new();
        let handles = ConsumerPool::new(worker_consumer, 1).start(shutdown.clone());

        // ACT: stop mid-write, then let the claim expire.
        tokio::time::sleep(VISIBILITY / 2).await;
        assert_eq!(queue.stats().in_flight, 1);
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
        tokio::time::sleep(VISIBILITY).await;

        let successor = consumer(&queue, inner.clone(), silent_reporter(), config());
        let report = successor.run_once().await;

        // ASSERT
        assert_eq!(report.received, 1);
        assert_eq!(report.persisted, 1);
        assert!(queue.is_empty());
        assert_eq!(inner.len(), 1);
    }
}

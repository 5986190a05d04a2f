//! Queue Consumer
//!
//! One consumption pass: receive a batch, persist each envelope idempotently, then settle it
//! with the queue.
//!
//! ## Settlement rules
//! - **Written or already present**: acknowledge.
//! - **Store unavailable**: release, so the envelope is retried on the next pass.
//! - **Permanent failure**: acknowledge anyway and hand the error to the `ErrorReporter`;
//!   retrying a payload that can never succeed would only burn the retry budget.
//!
//! No error leaves `run_once`. A bad envelope affects only itself.

use super::reporter::ErrorReporter;
use super::types::*;
use crate::queue::{DurableQueue, Message, MessageEnvelope};
use crate::storage::{KeyValueStore, PutMode, PutOutcome, Record};

use std::sync::Arc;

pub struct QueueConsumer {
    queue: Arc<DurableQueue>,
    store: Arc<dyn KeyValueStore>,
    reporter: Arc<dyn ErrorReporter>,
    config: ConsumerConfig,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<DurableQueue>,
        store: Arc<dyn KeyValueStore>,
        reporter: Arc<dyn ErrorReporter>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            store,
            reporter,
            config,
        }
    }

    pub fn queue(&self) -> &Arc<DurableQueue> {
        &self.queue
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Receives one batch (waiting up to `wait_time` if the queue is empty) and
    /// settles every envelope in it.
    pub async fn run_once(&self) -> ConsumptionReport {
        let batch = self
            .queue
            .receive_wait(
                self.config.batch_size,
                self.config.visibility_timeout,
                self.config.wait_time,
            )
            .await;

        let mut report = ConsumptionReport {
            received: batch.len(),
            ..Default::default()
        };

        for envelope in &batch {
            let outcome = self.process(envelope, &mut report).await;
            report.record(outcome);
        }

        if !report.is_idle() {
            tracing::debug!(
                queue = self.queue.name(),
                received = report.received,
                persisted = report.persisted,
                duplicates = report.duplicates,
                released = report.released,
                dropped = report.dropped,
                "Consumption pass finished"
            );
        }

        report
    }

    async fn process(
        &self,
        envelope: &MessageEnvelope,
        report: &mut ConsumptionReport,
    ) -> EnvelopeOutcome {
        let key = self.config.dedup_key.derive_key(envelope);

        match self.persist(&key, envelope).await {
            Ok(outcome) => {
                let created = outcome == PutOutcome::Created;
                if !created {
                    tracing::debug!(
                        key = %key,
                        delivery_id = %envelope.delivery_id,
                        receive_count = envelope.receive_count,
                        "Record already present, skipping duplicate write"
                    );
                }
                self.acknowledge(envelope, report);
                EnvelopeOutcome::Persisted { created }
            }
            Err(e) if !e.is_permanent() => {
                tracing::warn!(
                    key = %key,
                    delivery_id = %envelope.delivery_id,
                    receive_count = envelope.receive_count,
                    error = %e,
                    "Transient write failure, releasing envelope"
                );
                self.queue
                    .release(&envelope.delivery_id, envelope.receipt_handle);
                EnvelopeOutcome::Released
            }
            Err(e) => {
                self.reporter.report(&e, envelope);
                self.acknowledge(envelope, report);
                EnvelopeOutcome::Dropped
            }
        }
    }

    async fn persist(
        &self,
        key: &str,
        envelope: &MessageEnvelope,
    ) -> Result<PutOutcome, ProcessingError> {
        let record = self.build_record(key, &envelope.payload)?;
        let record = Record::encode(MESSAGE_KIND, &record)?;

        Ok(self.store.put(key, record, PutMode::Idempotent).await?)
    }

    fn build_record(&self, key: &str, payload: &Message) -> Result<StoredMessageRecord, ProcessingError> {
        if payload.message.trim().is_empty() {
            return Err(ProcessingError::EmptyMessage);
        }

        let size = payload.message.len();
        if size > self.config.max_message_bytes {
            return Err(ProcessingError::MessageTooLarge {
                size,
                limit: self.config.max_message_bytes,
            });
        }

        Ok(StoredMessageRecord {
            item_id: key.to_string(),
            message: payload.message.clone(),
        })
    }

    fn acknowledge(&self, envelope: &MessageEnvelope, report: &mut ConsumptionReport) {
        if let Err(e) = self
            .queue
            .acknowledge(&envelope.delivery_id, envelope.receipt_handle)
        {
            // The write was idempotent, so the redelivery this implies is harmless.
            report.ack_lost += 1;
            tracing::warn!(
                delivery_id = %envelope.delivery_id,
                receive_count = envelope.receive_count,
                error = %e,
                "Acknowledgment lost, envelope will be redelivered"
            );
        }
    }
}

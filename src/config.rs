//! Process configuration.
//!
//! Every option is a command-line flag that can also be set through an `INGEST_*` environment
//! variable. Defaults match the `Default` implementations of `QueueConfig` and `ConsumerConfig`.

use crate::consumer::types::{ConsumerConfig, DedupKeyPolicy, DEFAULT_MAX_MESSAGE_BYTES};
use crate::queue::QueueConfig;
use crate::queue::types::DEFAULT_MAX_RECEIVE_COUNT;

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Event-driven ingestion pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "ingest-pipeline")]
#[command(about = "HTTP ingestion with a topic, a durable queue and idempotent consumers")]
#[command(version)]
pub struct AppConfig {
    /// HTTP listen address
    #[arg(short, long, env = "INGEST_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "INGEST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "INGEST_TOPIC", default_value = "ingest-topic")]
    pub topic: String,

    #[arg(long, env = "INGEST_QUEUE", default_value = "ingest-queue")]
    pub queue: String,

    /// Deliveries before an envelope is dead-lettered
    #[arg(long, env = "INGEST_MAX_RECEIVE_COUNT", default_value_t = DEFAULT_MAX_RECEIVE_COUNT)]
    pub max_receive_count: u32,

    /// Maximum live envelopes in the queue (unbounded when unset)
    #[arg(long, env = "INGEST_MAX_QUEUE_DEPTH")]
    pub max_queue_depth: Option<usize>,

    /// Visibility timeout in milliseconds
    #[arg(long, env = "INGEST_VISIBILITY_TIMEOUT_MS", default_value_t = 30_000)]
    pub visibility_timeout_ms: u64,

    /// Envelopes claimed per consumer pass
    #[arg(long, env = "INGEST_BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// Long-poll wait of an empty receive in milliseconds
    #[arg(long, env = "INGEST_RECEIVE_WAIT_MS", default_value_t = 1_000)]
    pub receive_wait_ms: u64,

    /// Number of consumer workers
    #[arg(short, long, env = "INGEST_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Interval of the visibility sweeper in milliseconds
    #[arg(long, env = "INGEST_SWEEP_INTERVAL_MS", default_value_t = 1_000)]
    pub sweep_interval_ms: u64,

    /// How message record keys are derived
    #[arg(long, env = "INGEST_DEDUP_KEY", value_enum, default_value_t = DedupKeyPolicy::MessageId)]
    pub dedup_key: DedupKeyPolicy,

    /// Largest message body accepted for persistence, in bytes
    #[arg(long, env = "INGEST_MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,
}

impl AppConfig {
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_receive_count: self.max_receive_count.max(1),
            max_depth: self.max_queue_depth,
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            batch_size: self.batch_size.max(1),
            visibility_timeout: Duration::from_millis(self.visibility_timeout_ms),
            wait_time: Duration::from_millis(self.receive_wait_ms),
            dedup_key: self.dedup_key,
            max_message_bytes: self.max_message_bytes,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

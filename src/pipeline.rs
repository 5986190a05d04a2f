//! Pipeline wiring.
//!
//! Creates the shared handles once (store, item service, topic, queue, consumer), registers the
//! queue with the topic, and starts the background tasks. Nothing here is global: every
//! component receives its dependencies as `Arc` handles.

use crate::api;
use crate::config::AppConfig;
use crate::consumer::{ConsumerConfig, ConsumerPool, ErrorReporter, QueueConsumer, TracingReporter};
use crate::items::ItemService;
use crate::queue::sweeper::spawn_sweeper;
use crate::queue::{DurableQueue, QueueConfig};
use crate::storage::{InMemoryStore, KeyValueStore};
use crate::topic::Topic;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Pipeline {
    pub store: Arc<dyn KeyValueStore>,
    pub items: Arc<ItemService>,
    pub topic: Arc<Topic>,
    pub queue: Arc<DurableQueue>,
    pub consumer: Arc<QueueConsumer>,
}

impl Pipeline {
    pub fn new(
        topic_name: &str,
        queue_name: &str,
        store: Arc<dyn KeyValueStore>,
        reporter: Arc<dyn ErrorReporter>,
        queue_config: QueueConfig,
        consumer_config: ConsumerConfig,
    ) -> Self {
        let items = Arc::new(ItemService::new(store.clone()));
        let queue = Arc::new(DurableQueue::new(queue_name, queue_config));
        let topic = Arc::new(Topic::new(topic_name));
        topic.subscribe(queue.clone());

        let consumer = Arc::new(QueueConsumer::new(
            queue.clone(),
            store.clone(),
            reporter,
            consumer_config,
        ));

        Self {
            store,
            items,
            topic,
            queue,
            consumer,
        }
    }

    /// Wires an in-memory store and the tracing error reporter from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.topic,
            &config.queue,
            Arc::new(InMemoryStore::new()),
            Arc::new(TracingReporter),
            config.queue_config(),
            config.consumer_config(),
        )
    }

    pub fn router(&self) -> Router {
        api::router(self.items.clone(), self.topic.clone(), self.queue.clone())
    }

    /// Starts the visibility sweeper and `workers` consumer workers. All of
    /// them stop once `shutdown` is cancelled.
    pub fn spawn_background(
        &self,
        workers: usize,
        sweep_interval: Duration,
        shutdown: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = vec![spawn_sweeper(
            self.queue.clone(),
            sweep_interval,
            shutdown.clone(),
        )];
        handles.extend(ConsumerPool::new(self.consumer.clone(), workers).start(shutdown.clone()));
        handles
    }
}

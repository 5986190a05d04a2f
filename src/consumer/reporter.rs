use super::types::ProcessingError;
use crate::queue::MessageEnvelope;

/// Sink for envelopes dropped after a permanent processing failure.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &ProcessingError, envelope: &MessageEnvelope);
}

/// Reports dropped envelopes as structured `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &ProcessingError, envelope: &MessageEnvelope) {
        tracing::error!(
            delivery_id = %envelope.delivery_id,
            message_id = %envelope.message_id,
            receive_count = envelope.receive_count,
            error = %error,
            "Dropped message after permanent processing failure"
        );
    }
}

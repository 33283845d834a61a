//! Measurement streams and their backpressure policy.
//!
//! Every driver publishes into a bounded channel with an explicit policy for
//! what happens when the consumer falls behind. `Block` makes the channel a
//! strict backpressure point (a stalled consumer throttles the producer);
//! the other two policies trade completeness for producer liveness, which
//! matters on the heart-rate path where the producer is fed by the radio
//! stack.

use serde::{Deserialize, Serialize};
use spiro_core::{Result, SensorError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// What a publish does when the measurement channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishPolicy {
    /// Wait until the consumer makes room. The producer is fully throttled
    /// by the consumer.
    Block,

    /// Wait up to the given deadline, then drop the measurement with a
    /// warning.
    BlockWithTimeout(Duration),

    /// Never wait: drop the new measurement with a warning when the channel
    /// is full.
    DropNewest,
}

/// Capacity and overflow policy for one measurement stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Channel capacity; clamped to at least 1.
    pub capacity: usize,

    /// Overflow behavior.
    pub policy: PublishPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: spiro_core::constants::DEFAULT_STREAM_CAPACITY,
            policy: PublishPolicy::Block,
        }
    }
}

/// Producer side of a measurement stream.
#[derive(Debug, Clone)]
pub(crate) struct Publisher<T> {
    tx: mpsc::Sender<T>,
    policy: PublishPolicy,
}

/// Create a measurement channel with the configured capacity and policy.
pub(crate) fn channel<T>(config: StreamConfig) -> (Publisher<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(config.capacity.max(1));
    (
        Publisher {
            tx,
            policy: config.policy,
        },
        rx,
    )
}

impl<T: Send> Publisher<T> {
    /// Publish one measurement according to the stream policy.
    ///
    /// A dropped measurement (timeout or `DropNewest` overflow) is not an
    /// error; only a vanished consumer is, since the stream can never
    /// deliver again.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Closed`] when the consumer has been dropped.
    pub(crate) async fn publish(&self, value: T) -> Result<()> {
        match self.policy {
            PublishPolicy::Block => self
                .tx
                .send(value)
                .await
                .map_err(|_| SensorError::closed("measurement stream consumer dropped")),
            PublishPolicy::BlockWithTimeout(deadline) => {
                match tokio::time::timeout(deadline, self.tx.send(value)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(SensorError::closed("measurement stream consumer dropped")),
                    Err(_) => {
                        warn!(
                            deadline_ms = deadline.as_millis() as u64,
                            "publish deadline elapsed, dropping measurement"
                        );
                        Ok(())
                    }
                }
            }
            PublishPolicy::DropNewest => match self.tx.try_send(value) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("measurement channel full, dropping newest measurement");
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    Err(SensorError::closed("measurement stream consumer dropped"))
                }
            },
        }
    }
}

//! Generic polling engine for the wired sensors.
//!
//! One spawned task per sensor runs the unending read loop: take one read
//! transaction, publish on success, or log-and-sleep on failure and retry
//! the identical operation. Retries are unbounded with no backoff growth,
//! so a permanently dead device keeps the loop alive, but every outcome is
//! mirrored onto a health watch channel so the fault is observable, and the
//! returned [`StreamHandle`] gives the owner a real stop operation instead
//! of process exit.

use crate::stream::{Publisher, StreamConfig, channel};
use serde::{Deserialize, Serialize};
use spiro_core::constants::DEFAULT_RETRY_INTERVAL;
use spiro_core::{Result, SensorError, SensorHealth, SensorKind};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Retry pacing for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Fixed delay between identical retries after a failed read.
    pub retry_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Publishes health transitions onto a watch channel.
#[derive(Debug)]
pub(crate) struct HealthMonitor {
    tx: watch::Sender<SensorHealth>,
}

impl HealthMonitor {
    pub(crate) fn new() -> (Self, watch::Receiver<SensorHealth>) {
        let (tx, rx) = watch::channel(SensorHealth::default());
        (Self { tx }, rx)
    }

    pub(crate) fn record_success(&self) {
        self.tx.send_modify(|health| health.record_success());
    }

    pub(crate) fn record_failure(&self, error: &dyn std::fmt::Display) {
        self.tx.send_modify(|health| health.record_failure(error));
    }
}

/// Handle to one running measurement stream.
///
/// Holds the consumer end of the measurement channel, a live view of the
/// sensor's health, and the lifecycle of the producing task. Dropping the
/// handle aborts the task.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use spiro_drivers::{Co2Probe, Co2ProbeConfig};
///
/// # async fn example() -> spiro_core::Result<()> {
/// let probe = Co2Probe::new(Co2ProbeConfig::default())?;
/// probe.connect().await?;
///
/// let mut stream = probe.start();
/// while let Some(ppm) = stream.recv().await {
///     println!("CO2: {ppm} ppm");
/// }
///
/// stream.stop(Duration::from_secs(1)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StreamHandle<T> {
    rx: mpsc::Receiver<T>,
    health_rx: watch::Receiver<SensorHealth>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<T> StreamHandle<T> {
    /// Receive the next measurement.
    ///
    /// Returns `None` once the stream has been stopped and drained. The
    /// stream is not restartable; call the driver's `start` again for a new
    /// one.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Snapshot of the sensor's last-known health.
    pub fn health(&self) -> SensorHealth {
        self.health_rx.borrow().clone()
    }

    /// A watch receiver for observing health transitions independently of
    /// the measurement stream.
    pub fn health_receiver(&self) -> watch::Receiver<SensorHealth> {
        self.health_rx.clone()
    }

    /// Signal the polling task to stop and wait for it, bounded.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Timeout`] if the task did not finish within
    /// the bound; the task is aborted in that case.
    pub async fn stop(mut self, timeout: Duration) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(_) => Ok(()),
            Err(_) => {
                self.task.abort();
                Err(SensorError::timeout(timeout.as_millis() as u64))
            }
        }
    }
}

impl<T> Drop for StreamHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the polling loop for one wired sensor.
///
/// `read` performs exactly one read transaction (locking the session for
/// its duration) and is retried forever on failure with the configured
/// interval. The loop ends when the handle is stopped or the consumer goes
/// away.
pub(crate) fn spawn_poller<T, F, Fut>(
    kind: SensorKind,
    poller: PollerConfig,
    stream: StreamConfig,
    mut read: F,
) -> StreamHandle<T>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let (publisher, rx): (Publisher<T>, _) = channel(stream);
    let (health, health_rx) = HealthMonitor::new();
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let retry_interval = poller.retry_interval;

    let task = tokio::spawn(async move {
        debug!(sensor = %kind, "polling started");
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                result = read() => match result {
                    Ok(value) => {
                        health.record_success();
                        // The publish can block on a stalled consumer, so it
                        // must stay interruptible by stop.
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            published = publisher.publish(value) => {
                                if published.is_err() {
                                    debug!(sensor = %kind, "measurement stream consumer gone, stopping");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        health.record_failure(&e);
                        warn!(sensor = %kind, error = %e, "read failed, retrying");
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            _ = tokio::time::sleep(retry_interval) => {}
                        }
                    }
                },
            }
        }
        debug!(sensor = %kind, "polling stopped");
    });

    StreamHandle {
        rx,
        health_rx,
        shutdown_tx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiro_core::HealthState;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Read closure failing the first `fail_first` attempts, then returning
    /// the attempt number.
    macro_rules! counting_reader {
        ($attempts:ident, $fail_first:expr) => {{
            let seen = $attempts.clone();
            let fail_first: u32 = $fail_first;
            move || {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < fail_first {
                        Err(SensorError::protocol("invalid response format"))
                    } else {
                        Ok(n)
                    }
                }
            }
        }};
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_waits_retry_interval_then_retries() {
        let attempts = Arc::new(AtomicU32::new(0));
        let read = counting_reader!(attempts, 1);
        let start = tokio::time::Instant::now();

        let mut handle = spawn_poller(
            SensorKind::Co2,
            PollerConfig::default(),
            StreamConfig::default(),
            read,
        );

        let value = handle.recv().await.unwrap();
        assert_eq!(value, 1);
        // One failure, one fixed one-second pause, one successful retry.
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(attempts.load(Ordering::SeqCst) >= 2);

        handle.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_failures_never_escalate() {
        let attempts = Arc::new(AtomicU32::new(0));
        let read = counting_reader!(attempts, u32::MAX);
        let handle = spawn_poller(
            SensorKind::AirFlow,
            PollerConfig::default(),
            StreamConfig::default(),
            read,
        );

        // Let many retry cycles elapse in virtual time.
        tokio::time::sleep(Duration::from_secs(10)).await;

        let health = handle.health();
        assert_eq!(health.state, HealthState::Degraded);
        assert!(health.consecutive_failures >= 9);
        assert_eq!(
            health.last_error.as_deref(),
            Some("Protocol error: invalid response format")
        );
        // Still trying: the loop never gave up.
        assert!(attempts.load(Ordering::SeqCst) >= 10);

        handle.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_health() {
        let attempts = Arc::new(AtomicU32::new(0));
        let read = counting_reader!(attempts, 2);
        let mut handle = spawn_poller(
            SensorKind::Co2,
            PollerConfig::default(),
            StreamConfig::default(),
            read,
        );

        assert_eq!(handle.recv().await, Some(2));
        let health = handle.health();
        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.consecutive_failures, 0);
        // The last fault stays visible after recovery.
        assert!(health.last_error.is_some());

        handle.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_bounded() {
        let attempts = Arc::new(AtomicU32::new(0));
        let read = counting_reader!(attempts, u32::MAX);
        let handle = spawn_poller(
            SensorKind::Co2,
            PollerConfig::default(),
            StreamConfig::default(),
            read,
        );

        let start = tokio::time::Instant::now();
        handle.stop(Duration::from_secs(1)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_dropped_consumer_stops_loop() {
        let attempts = Arc::new(AtomicU32::new(0));
        let read = counting_reader!(attempts, 0);
        let handle = spawn_poller(
            SensorKind::Co2,
            PollerConfig::default(),
            StreamConfig {
                capacity: 1,
                policy: crate::stream::PublishPolicy::Block,
            },
            read,
        );

        // Dropping the handle drops the receiver and aborts the task.
        drop(handle);
    }
}

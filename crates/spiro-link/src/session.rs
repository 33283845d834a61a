//! Sensor sessions.
//!
//! A session is one open link plus the identification metadata collected
//! over it. It is created after a successful open, replaced wholesale by a
//! reconnect, and never patched in place: the metadata set at identification
//! time stays until the session is dropped.
//!
//! Exclusive transaction access is structural (every method takes
//! `&mut self`), so two transactions cannot interleave on one session.
//! Drivers that share a session between a polling task and ad-hoc readers
//! wrap it in `Arc<tokio::sync::Mutex<SensorSession>>` and hold the lock for
//! exactly one transaction.

use crate::traits::{AnySensorLink, SensorLink};
use spiro_core::{Result, SensorError, SensorInfo};
use spiro_protocol::{Command, IdentPatterns};
use tracing::{debug, warn};

/// One live connection to a sensor, with its identification state.
#[derive(Debug)]
pub struct SensorSession {
    link: AnySensorLink,
    info: SensorInfo,
}

impl SensorSession {
    /// Wrap a freshly opened link into a session with empty identification.
    pub fn new(link: AnySensorLink) -> Self {
        Self {
            link,
            info: SensorInfo::default(),
        }
    }

    /// Identification metadata collected at handshake time.
    pub fn info(&self) -> &SensorInfo {
        &self.info
    }

    /// Run the identification handshake: send the query, read one line, and
    /// extract whatever fields match.
    ///
    /// Fields whose pattern does not match stay unset; that is not an
    /// error. Only the I/O itself can fail.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Handshake`] when the query write or the
    /// response read fails.
    pub async fn identify(&mut self, query: &Command, patterns: &IdentPatterns) -> Result<()> {
        self.link.send_command(query).await.map_err(|e| {
            SensorError::handshake(format!("failed to send identification query: {e}"))
        })?;

        let response = self.link.read_line().await.map_err(|e| {
            SensorError::handshake(format!("failed to read identification response: {e}"))
        })?;

        self.info = patterns.extract(&response);
        debug!(info = %self.info, "collected sensor identification");
        Ok(())
    }

    /// Write one command without expecting a response line.
    pub async fn send_command(&mut self, command: &Command) -> Result<()> {
        self.link.send_command(command).await
    }

    /// One request/response transaction.
    pub async fn transact(&mut self, command: &Command) -> Result<String> {
        self.link.transact(command).await
    }

    /// Close the underlying link.
    pub async fn close(&mut self) -> Result<()> {
        self.link.close().await
    }
}

/// Best-effort teardown of a session slot before a reconnect.
///
/// A failure during teardown is logged and never aborts the new open
/// attempt.
pub async fn close_replaced(slot: &mut Option<SensorSession>) {
    if let Some(session) = slot.as_mut() {
        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close previous session");
        }
        *slot = None;
    }
}

//! USB-serial transport.
//!
//! `serialport` I/O is blocking, so every port operation is shipped to the
//! blocking pool: the port is taken out of the link, moved into the closure,
//! and put back when the operation returns. The port's own timeout bounds
//! each read, so a silent device surfaces as [`SensorError::Timeout`]
//! instead of stalling its task forever.

use crate::framing::SerialFraming;
use crate::traits::SensorLink;
use serialport::SerialPort;
use spiro_core::constants::MAX_RESPONSE_LINE_LEN;
use spiro_core::{Result, SensorError};
use spiro_protocol::Command;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// One open serial link to a wired instrument.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use spiro_link::{SerialFraming, SerialLink};
/// use spiro_link::traits::SensorLink;
/// use spiro_protocol::Command;
///
/// # async fn example() -> spiro_core::Result<()> {
/// let framing = SerialFraming::eight_n_one(19200);
/// let mut link = SerialLink::open("/dev/ttyUSB0", framing, Duration::from_secs(5)).await?;
///
/// let response = link.transact(&Command::new("send")?).await?;
/// println!("device answered: {response}");
///
/// link.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SerialLink {
    path: String,
    read_timeout: Duration,
    /// `None` once closed, or after a worker panic lost the port.
    port: Option<Box<dyn SerialPort>>,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .field("read_timeout", &self.read_timeout)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialLink {
    /// Open the port with the given framing and per-read deadline.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Connection`] on any underlying open failure.
    pub async fn open(
        path: impl Into<String>,
        framing: SerialFraming,
        read_timeout: Duration,
    ) -> Result<Self> {
        let path = path.into();
        let open_path = path.clone();

        let port = tokio::task::spawn_blocking(move || {
            serialport::new(open_path.as_str(), framing.baud_rate)
                .data_bits(framing.data_bits.into())
                .parity(framing.parity.into())
                .stop_bits(framing.stop_bits.into())
                .timeout(read_timeout)
                .open()
        })
        .await
        .map_err(|e| SensorError::connection(format!("serial open task failed: {e}")))?
        .map_err(|e| SensorError::connection(format!("failed to open {path}: {e}")))?;

        info!(%path, baud = framing.baud_rate, "opened serial connection");

        Ok(Self {
            path,
            read_timeout,
            port: Some(port),
        })
    }

    /// The port path this link was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run a blocking port operation on the blocking pool, returning the
    /// port to the link afterwards.
    async fn with_port<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn SerialPort>) -> Result<T> + Send + 'static,
    {
        let mut port = self
            .port
            .take()
            .ok_or_else(|| SensorError::closed(format!("serial link {} is closed", self.path)))?;

        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut port);
            (port, result)
        })
        .await
        .map_err(|e| SensorError::connection(format!("serial worker failed: {e}")))?;

        self.port = Some(port);
        result
    }
}

impl SensorLink for SerialLink {
    async fn send_command(&mut self, command: &Command) -> Result<()> {
        debug!(command = %command, path = %self.path, "writing command");
        let bytes = command.encode();
        self.with_port(move |port| {
            port.write_all(&bytes)
                .and_then(|_| port.flush())
                .map_err(|e| SensorError::connection(format!("failed to write command: {e}")))
        })
        .await
    }

    async fn read_line(&mut self) -> Result<String> {
        let timeout_ms = self.read_timeout.as_millis() as u64;
        self.with_port(move |port| read_line_blocking(port.as_mut(), timeout_ms))
            .await
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(path = %self.path, "closed serial connection");
        }
        Ok(())
    }
}

/// Read bytes one at a time until a line feed, honoring the port timeout.
///
/// Trailing carriage returns are stripped along with the line feed.
fn read_line_blocking(port: &mut dyn SerialPort, timeout_ms: u64) -> Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match port.read(&mut byte) {
            Ok(0) => {
                return Err(SensorError::connection("link closed by device"));
            }
            Ok(_) => {
                if byte[0] == b'\n' {
                    break;
                }
                buf.push(byte[0]);
                if buf.len() > MAX_RESPONSE_LINE_LEN {
                    return Err(SensorError::protocol(format!(
                        "response line exceeded {MAX_RESPONSE_LINE_LEN} bytes"
                    )));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(SensorError::timeout(timeout_ms));
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(SensorError::connection(format!("serial read failed: {e}")));
            }
        }
    }

    while buf.last() == Some(&b'\r') {
        buf.pop();
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_nonexistent_port_is_connection_error() {
        let framing = SerialFraming::eight_n_one(19200);
        let err = SerialLink::open(
            "/dev/nonexistent-spiro-port",
            framing,
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SensorError::Connection { .. }), "{err}");
    }
}

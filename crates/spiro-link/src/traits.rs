//! Transport capability interface.
//!
//! A [`SensorLink`] is the small surface a driver needs from a physical
//! link: send a framed command, read one response line, close. The trait
//! uses native `async fn` methods (RPITIT), so it is not object-safe;
//! [`AnySensorLink`] provides concrete dispatch between the real serial
//! transport and the scriptable mock.

#![allow(async_fn_in_trait)]

use crate::mock::MockLink;
use crate::serial::SerialLink;
use spiro_core::Result;
use spiro_protocol::Command;

/// Byte-level transport to one wired instrument.
///
/// Implementations are exclusively owned: every method takes `&mut self`,
/// so two transactions can never interleave on the same link. Sharing
/// happens one level up, where a session wraps the link in an async mutex.
pub trait SensorLink: Send {
    /// Write one framed command to the device.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Connection`](spiro_core::SensorError) when the
    /// write fails, or [`SensorError::Closed`](spiro_core::SensorError) when
    /// the link has been closed.
    async fn send_command(&mut self, command: &Command) -> Result<()>;

    /// Read exactly one line-feed-terminated response line, with the link's
    /// configured deadline. The terminator is stripped.
    async fn read_line(&mut self) -> Result<String>;

    /// One request/response exchange: send, then read one line.
    async fn transact(&mut self, command: &Command) -> Result<String> {
        self.send_command(command).await?;
        self.read_line().await
    }

    /// Close the link. Closing an already-closed link is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Enum wrapper for link dispatch.
///
/// Native `async fn` traits are not object-safe, so drivers hold this enum
/// instead of a `Box<dyn SensorLink>`.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySensorLink {
    /// Real USB-serial transport.
    Serial(SerialLink),

    /// Scriptable in-memory transport for tests and development.
    Mock(MockLink),
}

impl SensorLink for AnySensorLink {
    async fn send_command(&mut self, command: &Command) -> Result<()> {
        match self {
            Self::Serial(link) => link.send_command(command).await,
            Self::Mock(link) => link.send_command(command).await,
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        match self {
            Self::Serial(link) => link.read_line().await,
            Self::Mock(link) => link.read_line().await,
        }
    }

    async fn transact(&mut self, command: &Command) -> Result<String> {
        match self {
            Self::Serial(link) => link.transact(command).await,
            Self::Mock(link) => link.transact(command).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Serial(link) => link.close().await,
            Self::Mock(link) => link.close().await,
        }
    }
}

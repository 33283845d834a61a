//! Mock link implementation for testing and development.
//!
//! `MockLink` stands in for a wired instrument: tests script the device's
//! replies through a [`MockLinkHandle`] and inspect the transcript of
//! commands the code under test wrote. Reads block until a reply (or error)
//! is scripted, which makes transaction-ordering assertions possible.

use crate::traits::SensorLink;
use spiro_core::{Result, SensorError};
use spiro_protocol::Command;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Scriptable in-memory transport.
///
/// # Examples
///
/// ```
/// use spiro_link::MockLink;
/// use spiro_link::traits::SensorLink;
/// use spiro_protocol::Command;
///
/// #[tokio::main]
/// async fn main() -> spiro_core::Result<()> {
///     let (mut link, handle) = MockLink::new();
///
///     handle.push_line("CO2=  412.35 ppm")?;
///
///     let response = link.transact(&Command::new("send")?).await?;
///     assert_eq!(response, "CO2=  412.35 ppm");
///     assert_eq!(handle.commands(), vec!["send"]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockLink {
    replies: mpsc::UnboundedReceiver<Result<String>>,
    transcript: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

impl MockLink {
    /// Create a mock link and the handle that scripts it.
    pub fn new() -> (Self, MockLinkHandle) {
        let (replies_tx, replies) = mpsc::unbounded_channel();
        let transcript = Arc::new(Mutex::new(Vec::new()));

        let link = Self {
            replies,
            transcript: transcript.clone(),
            closed: false,
        };
        let handle = MockLinkHandle {
            replies_tx,
            transcript,
        };

        (link, handle)
    }
}

impl SensorLink for MockLink {
    async fn send_command(&mut self, command: &Command) -> Result<()> {
        if self.closed {
            return Err(SensorError::closed("mock link is closed"));
        }
        self.transcript
            .lock()
            .expect("transcript lock poisoned")
            .push(command.token().to_string());
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        if self.closed {
            return Err(SensorError::closed("mock link is closed"));
        }
        self.replies
            .recv()
            .await
            .ok_or_else(|| SensorError::closed("mock script dropped"))?
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Handle for scripting a [`MockLink`] and inspecting its transcript.
///
/// Clonable so a test can script from several tasks.
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    replies_tx: mpsc::UnboundedSender<Result<String>>,
    transcript: Arc<Mutex<Vec<String>>>,
}

impl MockLinkHandle {
    /// Script one successful response line.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Closed`] if the link has been dropped.
    pub fn push_line(&self, line: impl Into<String>) -> Result<()> {
        self.replies_tx
            .send(Ok(line.into()))
            .map_err(|_| SensorError::closed("mock link dropped"))
    }

    /// Script one read failure.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Closed`] if the link has been dropped.
    pub fn push_error(&self, error: SensorError) -> Result<()> {
        self.replies_tx
            .send(Err(error))
            .map_err(|_| SensorError::closed("mock link dropped"))
    }

    /// All command tokens written so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.transcript
            .lock()
            .expect("transcript lock poisoned")
            .clone()
    }

    /// Number of command tokens written so far.
    pub fn command_count(&self) -> usize {
        self.transcript
            .lock()
            .expect("transcript lock poisoned")
            .len()
    }
}

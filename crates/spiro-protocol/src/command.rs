//! Outbound command framing for the wired instruments.
//!
//! Both serial instruments speak the same request shape: a short ASCII token
//! terminated by carriage-return/line-feed. The token is validated once at
//! construction so the link layer can write the encoded bytes without
//! further checks.

use spiro_core::{Result, SensorError};

/// A validated outbound command token.
///
/// # Examples
///
/// ```
/// use spiro_protocol::Command;
///
/// let cmd = Command::new("send").unwrap();
/// assert_eq!(cmd.encode(), b"send\r\n");
/// assert_eq!(cmd.token(), "send");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    /// Create a command from a request token.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Protocol`] if the token is empty, contains
    /// non-ASCII bytes, or embeds its own line terminator.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();

        if token.is_empty() {
            return Err(SensorError::protocol("command token is empty"));
        }
        if !token.is_ascii() {
            return Err(SensorError::protocol(format!(
                "command token must be ASCII: {token:?}"
            )));
        }
        if token.contains(['\r', '\n']) {
            return Err(SensorError::protocol(format!(
                "command token embeds a line terminator: {token:?}"
            )));
        }

        Ok(Self(token))
    }

    /// The raw request token, without framing.
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Wire bytes: the token followed by CRLF.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() + 2);
        bytes.extend_from_slice(self.0.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        bytes
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_appends_crlf() {
        let cmd = Command::new("x").unwrap();
        assert_eq!(cmd.encode(), b"x\r\n");
    }

    #[test]
    fn test_multi_word_token_allowed() {
        // The Vaisala device-select command is "open <address>".
        let cmd = Command::new("open 240").unwrap();
        assert_eq!(cmd.encode(), b"open 240\r\n");
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(Command::new("").is_err());
    }

    #[test]
    fn test_embedded_terminator_rejected() {
        assert!(Command::new("send\r\n").is_err());
        assert!(Command::new("se\nnd").is_err());
    }

    #[test]
    fn test_non_ascii_rejected() {
        assert!(Command::new("sénd").is_err());
    }
}

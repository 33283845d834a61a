//! Device location and link management for the spiro instruments.
//!
//! This crate owns everything between "there is a sensor plugged in
//! somewhere" and "here is a session you can run transactions against":
//!
//! - [`discovery`]: scans the OS device listing for a vendor signature and
//!   resolves it to a connectable port path.
//! - [`framing`]: serial framing parameters (baud rate, data bits, parity,
//!   stop bits) as plain config values.
//! - [`traits`]: the transport capability interface
//!   ([`SensorLink`](traits::SensorLink): send, read, transact, close) and
//!   the enum dispatch wrapper used by the drivers.
//! - [`serial`]: the real USB-serial transport. Blocking port I/O runs on
//!   the blocking pool; every read carries the configured deadline.
//! - [`mock`]: a scriptable in-memory transport for tests and development
//!   without physical hardware.
//! - [`session`]: one open link plus the identification metadata collected
//!   over it. Exclusive transaction access is enforced by `&mut`; drivers
//!   share a session behind `Arc<tokio::sync::Mutex<_>>`.

pub mod discovery;
pub mod framing;
pub mod mock;
pub mod serial;
pub mod session;
pub mod traits;

pub use discovery::{DiscoveryConfig, PortScanner, resolve_port};
pub use framing::{DataBits, Parity, SerialFraming, StopBits};
pub use mock::{MockLink, MockLinkHandle};
pub use serial::SerialLink;
pub use session::{SensorSession, close_replaced};
pub use traits::{AnySensorLink, SensorLink};

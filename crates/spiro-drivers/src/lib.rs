//! Sensor drivers for the spiro acquisition rig.
//!
//! Three drivers, one per physical instrument:
//!
//! - [`Co2Probe`]: Vaisala CO2 probe over USB-serial (19200 8N1,
//!   `CO2=  <value> ppm` responses).
//! - [`FlowMeter`]: Kurz flow meter over USB-serial (9600 8N1,
//!   whitespace-delimited responses, optional constant override that
//!   bypasses the hardware).
//! - [`HeartRateMonitor`]: Polar heart-rate strap over BLE (Heart Rate
//!   service notifications).
//!
//! All three share the same acquisition shape: discover the device, open
//! and initialize a session, then produce an unending measurement stream.
//! The wired drivers run a polling loop that retries failed reads forever
//! at a fixed interval; the strap is notification-driven. Every stream
//! handle carries a health channel that makes a permanently failing sensor
//! distinguishable from a healthy quiet one, and a bounded-wait `stop`.
//!
//! Backpressure is an explicit choice per stream: see
//! [`PublishPolicy`].
//!
//! # Wiring
//!
//! Process startup, environment-variable handling, and fan-in of multiple
//! sensors belong to the embedding application. The drivers only consume
//! ready-made config values and hand back streams.

pub mod kurz;
pub mod polar;
pub mod poller;
pub mod stream;
pub mod vaisala;

pub use kurz::{FlowMeter, FlowMeterConfig};
pub use polar::{
    HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID, HeartRateConfig, HeartRateMonitor,
    HeartRateStream,
};
pub use poller::{PollerConfig, StreamHandle};
pub use stream::{PublishPolicy, StreamConfig};
pub use vaisala::{Co2Probe, Co2ProbeConfig};

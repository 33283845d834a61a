//! Shared types for the spiro sensor acquisition workspace.
//!
//! This crate holds what every other spiro crate agrees on: the error
//! taxonomy for device acquisition ([`SensorError`]), the identification and
//! measurement types produced by the drivers, the per-sensor health model,
//! and the vendor constants (signatures, framings, request tokens) the
//! default configurations are built from.
//!
//! Nothing in here touches hardware. Discovery, links and drivers live in
//! `spiro-link` and `spiro-drivers`; wire grammars live in `spiro-protocol`.

pub mod constants;
pub mod error;
pub mod health;
pub mod types;

pub use error::{Result, SensorError};
pub use health::{HealthState, SensorHealth};
pub use types::{SensorInfo, SensorKind};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

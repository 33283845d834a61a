//! Wire codecs for the spiro instruments.
//!
//! Three small grammars live here, one per physical protocol:
//!
//! - [`command`]: outbound ASCII request tokens with CRLF framing, shared
//!   by both wired instruments.
//! - [`response`]: the two inbound text grammars: the `KEY=VALUE UNIT` CO2
//!   line and the whitespace-delimited flow-rate line.
//! - [`heart_rate`]: the binary Heart Rate Measurement notification frame
//!   (flags byte, bpm byte, optional trailing little-endian RR intervals).
//!
//! [`ident`] is the odd one out: it is not a grammar but a set of capture
//! patterns applied to the free-text identification response, because the
//! instruments do not document that response's layout beyond "the fields
//! appear somewhere in it".
//!
//! Everything here is pure: no I/O, no state. The link layer feeds lines and
//! frames in, typed values come out.

pub mod command;
pub mod heart_rate;
pub mod ident;
pub mod response;

pub use command::Command;
pub use heart_rate::HeartRateFrame;
pub use ident::IdentPatterns;
pub use response::{parse_co2, parse_flow_rate};

//! Vendor and protocol constants.
//!
//! Every value here feeds a `Default` impl on some configuration struct;
//! none of them is read as hidden global state. The serial signatures and
//! identification patterns were captured from the physical instruments.

use std::time::Duration;

/// Shell command that enumerates persistent serial device symlinks.
pub const SERIAL_LISTING_COMMAND: &str = "ls -l /dev/serial/by-id";

/// Template a discovered symlink target's final path segment is substituted
/// into to obtain a connectable port path.
pub const DEV_PORT_TEMPLATE: &str = "/dev/{}";

/// Identification query understood by both wired instruments.
pub const IDENT_COMMAND: &str = "?";

// Vaisala CO2 probe (GMP-series behind a Silicon Labs USB instrument cable).

pub const VAISALA_BAUD_RATE: u32 = 19200;
pub const VAISALA_DEFAULT_ADDRESS: u8 = 240;
pub const VAISALA_SIGNATURE: &str = r"usb-Silicon_Labs_Vaisala_USB.*->.*ttyUSB\d+";
pub const VAISALA_MODEL_PATTERN: &str = r"Device\s+:\s+(\w+)";
pub const VAISALA_SERIAL_NUMBER_PATTERN: &str = r"SNUM\s+:\s+(\w+)";
pub const VAISALA_FIRMWARE_PATTERN: &str = r"SW\s+:\s+(\w+)";

/// Request token that makes the probe report one CO2 reading.
pub const CO2_READ_COMMAND: &str = "send";

// Kurz thermal flow meter (FTDI USB-serial bridge).

pub const KURZ_BAUD_RATE: u32 = 9600;
pub const KURZ_SIGNATURE: &str = r"usb-FTDI_.*_USB.*->.*ttyUSB\d+";
pub const KURZ_MODEL_PATTERN: &str = r"Device\s*:\s*(\w+)";
pub const KURZ_SERIAL_NUMBER_PATTERN: &str = r"SNUM\s*:\s*(\w+)";
pub const KURZ_FIRMWARE_PATTERN: &str = r"SW version\s*:\s*(\d+\.\d+\.\d+)";

/// Request token that makes the flow meter report one flow-rate line.
pub const FLOW_READ_COMMAND: &str = "x";

// Heart-rate measurement frames (Bluetooth Heart Rate Profile).

/// Flag bit indicating RR-interval values trail the heart-rate byte.
pub const RR_INTERVAL_FLAG: u8 = 0x10;

// Acquisition defaults shared by the drivers.

/// Fixed delay between identical retries after a failed read transaction.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Deadline applied to every blocking line read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default measurement channel capacity.
pub const DEFAULT_STREAM_CAPACITY: usize = 32;

/// Longest response line accepted before the codec declares the response
/// malformed.
pub const MAX_RESPONSE_LINE_LEN: usize = 1024;

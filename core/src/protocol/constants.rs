//! Centralized protocol constants
//!
//! All protocol-level constants are defined here to ensure consistency
//! across the codebase; both peers must agree on every value.

use std::time::Duration;

/// Protocol version, written by the client as the first frame of a
/// fresh connection.
pub const PROTOCOL_VERSION: u16 = 1;

/// Control-channel tags, all carried as little-endian `u16`.
pub mod tag {
    /// Server accepted the announced protocol version.
    pub const SUCCESS_VERSION: u16 = 0x0002;
    /// Server accepted a format name.
    pub const SUCCESS_FORMAT: u16 = 0x0003;
    /// Server accepted an announced size.
    pub const SUCCESS_SIZE: u16 = 0x0004;
    /// Server received a payload whole.
    pub const SUCCESS_DATA: u16 = 0x0005;
    /// Sender will transmit another (format, size, payload) triple.
    pub const MORE_DATA: u16 = 0x0006;
    /// End of the current transfer.
    pub const FINISH: u16 = 0x0007;
    /// Either side rejects and closes.
    pub const ERROR: u16 = 0x00FF;
}

/// Default TCP port for the data server
pub const DEFAULT_PORT: u16 = 53512;

/// mDNS service type for address discovery
pub const SERVICE_TYPE: &str = "_shareclip._tcp.local.";

/// Chunk size for bulk payload transfers (64 KiB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Maximum length accepted for a wire string (format names, paths)
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Name of the receiver spool directory under the OS temp root
pub const SPOOL_DIR_NAME: &str = "ShareClipbrd_60D54950";

/// Default period between keep-alive pings
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(30);

/// How long a new send waits for a cancelled in-flight send to unwind
pub const SEND_QUIESCENCE_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a discovery lookup browses before giving up
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

//! Contracts to the host environment
//!
//! The core never touches the OS clipboard, a progress indicator or an
//! error dialog directly; it talks to them through these traits. The CLI
//! crate supplies the real implementations.

use std::path::PathBuf;
use std::sync::Arc;

use crate::clipboard::ClipboardData;
use crate::{Error, Result};

/// Receives payloads assembled by the data server and forwards them to
/// the OS clipboard.
pub trait ClipboardDispatch: Send + Sync {
    fn deliver_data(&self, data: ClipboardData) -> Result<()>;
    fn deliver_files(&self, paths: Vec<PathBuf>) -> Result<()>;
    /// `bmp` is a complete BMP file (BITMAPFILEHEADER included).
    fn deliver_image(&self, bmp: Vec<u8>) -> Result<()>;
}

/// Direction of the transfer a progress indicator is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Send,
    Receive,
}

/// Visible transfer progress.
pub trait Progress: Send + Sync {
    fn begin(&self, mode: ProgressMode);
    fn set_max(&self, total: u64);
    fn tick(&self, delta: u64);
    fn end(&self);
}

/// Scoped acquisition of a progress indicator: `end` runs on every exit
/// path, including error and cancellation unwinds.
pub struct ProgressScope {
    progress: Arc<dyn Progress>,
}

impl ProgressScope {
    pub fn begin(progress: Arc<dyn Progress>, mode: ProgressMode) -> Self {
        progress.begin(mode);
        Self { progress }
    }

    pub fn set_max(&self, total: u64) {
        self.progress.set_max(total);
    }

    pub fn tick(&self, delta: u64) {
        self.progress.tick(delta);
    }
}

impl Drop for ProgressScope {
    fn drop(&mut self) {
        self.progress.end();
    }
}

/// Connection status transitions surfaced to the host.
pub trait ConnectStatus: Send + Sync {
    fn online(&self);
    fn offline(&self);
    fn client_online(&self);
    fn client_offline(&self);
}

/// Error presentation surface. Cancellation is filtered out before this
/// is reached.
pub trait ErrorDialog: Send + Sync {
    fn show_error(&self, err: &Error);
}

/// Resolves a discovery handle to a concrete endpoint.
///
/// Lookups may block for the duration of a network browse; callers in
/// async context run them on a blocking thread.
pub trait AddressDiscovery: Send + Sync {
    fn discover(&self, id: &str) -> Result<std::net::SocketAddr>;
}

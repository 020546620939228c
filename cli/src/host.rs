//! Host-boundary implementations: OS clipboard, console status and
//! progress surfaces.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use shareclip_core::clipboard::{decode, format, ClipboardData, HostValue};
use shareclip_core::host::{
    ClipboardDispatch, ConnectStatus, ErrorDialog, Progress, ProgressMode,
};
use shareclip_core::{Error, Result};

/// Text formats in paste preference order.
const TEXT_PREFERENCE: [&str; 6] = [
    format::UNICODE_TEXT,
    format::TEXT,
    format::SYSTEM_STRING,
    format::OEM_TEXT,
    format::HTML,
    format::RICH_TEXT,
];

/// Forwards received payloads to the OS clipboard via arboard.
///
/// `last_applied` is shared with the clipboard watcher so a paste we
/// perform ourselves is not echoed back to the partner.
pub struct SystemClipboard {
    last_applied: Arc<Mutex<Option<String>>>,
}

impl SystemClipboard {
    pub fn new(last_applied: Arc<Mutex<Option<String>>>) -> Self {
        Self { last_applied }
    }

    fn set_text(&self, text: String) -> Result<()> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        clipboard.set_text(&text).map_err(|e| Error::Clipboard(e.to_string()))?;
        *self.last_applied.lock().unwrap() = Some(text);
        Ok(())
    }
}

impl ClipboardDispatch for SystemClipboard {
    fn deliver_data(&self, data: ClipboardData) -> Result<()> {
        for preferred in TEXT_PREFERENCE {
            if let Some(item) = data.items().iter().find(|i| i.format == preferred) {
                if let Ok(HostValue::Text(text)) = decode(&item.format, item.payload.clone()) {
                    println!("\x1b[1;34m📋\x1b[0m Pasted {} ({} bytes)", item.format, text.len());
                    return self.set_text(text);
                }
            }
        }
        tracing::info!(items = data.len(), "no text format in received data");
        Ok(())
    }

    fn deliver_files(&self, paths: Vec<PathBuf>) -> Result<()> {
        println!("\x1b[1;34m📁\x1b[0m Received {} path(s):", paths.len());
        for path in &paths {
            println!("    {}", path.display());
        }
        let listing =
            paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join("\n");
        self.set_text(listing)
    }

    fn deliver_image(&self, bmp: Vec<u8>) -> Result<()> {
        let dest = std::env::temp_dir().join("shareclip_received.bmp");
        std::fs::write(&dest, &bmp)?;
        println!(
            "\x1b[1;34m🖼\x1b[0m Received image ({} bytes) -> {}",
            bmp.len(),
            dest.display()
        );
        Ok(())
    }
}

/// Console progress meter, logging at transfer boundaries.
#[derive(Default)]
pub struct ConsoleProgress {
    total: AtomicU64,
    done: AtomicU64,
}

impl Progress for ConsoleProgress {
    fn begin(&self, mode: ProgressMode) {
        self.total.store(0, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        tracing::debug!(?mode, "transfer started");
    }

    fn set_max(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn tick(&self, delta: u64) {
        let done = self.done.fetch_add(delta, Ordering::Relaxed) + delta;
        let total = self.total.load(Ordering::Relaxed);
        if total > 0 {
            tracing::trace!(done, total, "transfer progress");
        }
    }

    fn end(&self) {
        tracing::debug!(
            done = self.done.load(Ordering::Relaxed),
            "transfer finished"
        );
    }
}

/// Prints connection status transitions.
pub struct ConsoleStatus;

impl ConnectStatus for ConsoleStatus {
    fn online(&self) {
        println!("\x1b[1;32m⬤\x1b[0m Partner connected");
    }

    fn offline(&self) {
        println!("\x1b[1;31m⬤\x1b[0m Server offline");
    }

    fn client_online(&self) {
        println!("\x1b[1;32m⬤\x1b[0m Connected to partner");
    }

    fn client_offline(&self) {
        println!("\x1b[1;33m⬤\x1b[0m Disconnected from partner");
    }
}

/// Prints errors the core surfaces.
pub struct ConsoleErrorDialog;

impl ErrorDialog for ConsoleErrorDialog {
    fn show_error(&self, err: &Error) {
        eprintln!("\x1b[1;31m✗\x1b[0m Error: {}", err);
    }
}

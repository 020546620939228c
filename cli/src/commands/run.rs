//! Run command implementation.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shareclip_core::clipboard::{encode, format, ClipboardData, HostValue};
use shareclip_core::discovery::MdnsDiscovery;
use shareclip_core::host::ErrorDialog;
use shareclip_core::sync::{DataClient, DataServer};
use shareclip_core::{Config, DeviceIdentity};

use crate::host::{ConsoleErrorDialog, ConsoleProgress, ConsoleStatus, SystemClipboard};
use crate::ui::print_banner;

/// How often the local clipboard is polled for changes.
const CLIPBOARD_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Run both roles: serve inbound transfers and push local clipboard
/// changes to the partner.
pub async fn run_service(
    name: String,
    listen: SocketAddr,
    partner: Option<String>,
) -> anyhow::Result<()> {
    print_banner();

    let identity = DeviceIdentity::new(name);
    println!("\x1b[1mDevice:\x1b[0m {}", identity.name);
    println!("\x1b[1mID:\x1b[0m     {}", identity.id);
    if let Some(ref partner) = partner {
        println!("\x1b[1mPeer:\x1b[0m   {}", partner);
    }

    let config = Config {
        host_address: listen,
        partner_address: partner.clone().unwrap_or_default(),
        ..Config::default()
    };

    let last_applied = Arc::new(Mutex::new(None));
    let dispatch = Arc::new(SystemClipboard::new(Arc::clone(&last_applied)));
    let progress = Arc::new(ConsoleProgress::default());
    let status = Arc::new(ConsoleStatus);
    let errors = Arc::new(ConsoleErrorDialog);
    let discovery = Arc::new(MdnsDiscovery::new(&identity)?);

    let server = DataServer::bind(
        config.host_address,
        dispatch.clone() as _,
        progress.clone() as _,
        status.clone() as _,
        errors.clone() as _,
    )
    .await?;
    discovery.register(&identity.name, server.local_addr().port())?;
    let server_handle = server.start();

    let client = partner.is_some().then(|| {
        let client = DataClient::new(
            config.clone(),
            discovery.clone() as _,
            progress.clone() as _,
            status.clone() as _,
        );
        client.start();
        client
    });

    let watcher = client.clone().map(|client| {
        let errors = errors.clone();
        let last_applied = Arc::clone(&last_applied);
        tokio::spawn(watch_clipboard(client, errors as _, last_applied))
    });

    println!("\x1b[1;32m✓\x1b[0m Listening on {} for clipboard and file drops...", listen);
    println!("\x1b[2mPress Ctrl+C to stop.\x1b[0m\n");

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.blocking_send(());
    })?;
    let _ = rx.recv().await;

    println!("\n\x1b[1;33mShutting down...\x1b[0m");
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    if let Some(client) = client {
        client.stop().await;
    }
    server_handle.stop().await;

    Ok(())
}

/// Poll the local clipboard and push changed text to the partner.
async fn watch_clipboard(
    client: Arc<DataClient>,
    errors: Arc<dyn ErrorDialog>,
    last_applied: Arc<Mutex<Option<String>>>,
) {
    let mut last_seen: Option<String> = None;

    loop {
        tokio::time::sleep(CLIPBOARD_POLL_INTERVAL).await;

        let text = tokio::task::spawn_blocking(|| {
            arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text())
        })
        .await;
        let text = match text {
            Ok(Ok(text)) if !text.is_empty() => text,
            _ => continue,
        };

        if last_seen.as_ref() == Some(&text) {
            continue;
        }
        last_seen = Some(text.clone());

        // Skip content we just pasted ourselves
        if last_applied.lock().unwrap().as_ref() == Some(&text) {
            continue;
        }

        match build_text_payload(&text) {
            Ok(data) => match client.send_data(data).await {
                Ok(()) => println!("\x1b[1;34m📤\x1b[0m Sent clipboard ({} bytes)", text.len()),
                Err(e) if e.is_cancelled() => {}
                Err(e) => errors.show_error(&e),
            },
            Err(e) => errors.show_error(&e),
        }
    }
}

/// A text change is advertised in both Unicode and plain-text formats.
pub fn build_text_payload(text: &str) -> shareclip_core::Result<ClipboardData> {
    let value = HostValue::Text(text.to_string());
    let mut data = ClipboardData::new();
    data.add(format::UNICODE_TEXT, encode(format::UNICODE_TEXT, &value)?)?;
    data.add(format::TEXT, encode(format::TEXT, &value)?)?;
    Ok(data)
}

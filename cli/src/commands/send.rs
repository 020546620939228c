//! Send command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncReadExt;

use shareclip_core::discovery::MdnsDiscovery;
use shareclip_core::sync::DataClient;
use shareclip_core::{Config, DeviceIdentity};

use crate::host::{ConsoleProgress, ConsoleStatus};
use crate::commands::run::build_text_payload;

/// One-shot send: drop the given paths on the partner, or, with no
/// paths, send piped stdin as clipboard text.
pub async fn send_to_partner(
    name: String,
    partner: Option<String>,
    paths: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let partner = partner.context("--partner is required for send")?;

    let identity = DeviceIdentity::new(name);
    let config = Config {
        partner_address: partner,
        ..Config::default()
    };
    let discovery = Arc::new(MdnsDiscovery::new(&identity)?);

    let client = DataClient::new(
        config,
        discovery as _,
        Arc::new(ConsoleProgress::default()) as _,
        Arc::new(ConsoleStatus) as _,
    );

    if paths.is_empty() {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        let trimmed = text.trim_end_matches('\n');
        if trimmed.is_empty() {
            anyhow::bail!("nothing to send: no paths given and stdin is empty");
        }
        client.send_data(build_text_payload(trimmed)?).await?;
        println!("\x1b[1;34m📤\x1b[0m Sent clipboard text ({} bytes)", trimmed.len());
    } else {
        client.send_file_drop_list(paths.clone()).await?;
        println!("\x1b[1;34m📤\x1b[0m Sent {} path(s)", paths.len());
    }

    client.stop().await;
    Ok(())
}

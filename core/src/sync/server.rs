//! Inbound data server
//!
//! Accepts one client at a time. Each accepted connection is handshaken
//! and then drained in a session loop: size frame, format frames, payload
//! bodies. Session errors are surfaced to the error dialog and the
//! listener immediately goes back to accepting; only `stop()` takes the
//! server offline.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::clipboard::{format, image, ClipboardData};
use crate::host::{ClipboardDispatch, ConnectStatus, ErrorDialog, Progress, ProgressMode, ProgressScope};
use crate::protocol::constants::CHUNK_SIZE;
use crate::protocol::{tag, wire};
use crate::sync::server_handshake;
use crate::transfer;
use crate::{Error, Result};

/// Inbound role: listens, accepts one connection at a time, dispatches
/// received payloads to the host.
pub struct DataServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    dispatch: Arc<dyn ClipboardDispatch>,
    progress: Arc<dyn Progress>,
    status: Arc<dyn ConnectStatus>,
    errors: Arc<dyn ErrorDialog>,
}

impl DataServer {
    /// Bind the listen endpoint and create the server.
    pub async fn bind(
        addr: SocketAddr,
        dispatch: Arc<dyn ClipboardDispatch>,
        progress: Arc<dyn Progress>,
        status: Arc<dyn ConnectStatus>,
        errors: Arc<dyn ErrorDialog>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Network(format!("failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr().map_err(|e| Error::Network(e.to_string()))?;

        tracing::info!(%local_addr, "data server listening");

        Ok(Self {
            listener,
            local_addr,
            dispatch,
            progress,
            status,
            errors,
        })
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the accept loop.
    pub fn start(self) -> ServerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = shutdown_rx.wait_for(|stop| *stop) => break,
                    accepted = self.listener.accept() => accepted,
                };

                match accepted {
                    Ok((mut stream, addr)) => {
                        tracing::debug!(%addr, "accepted connection");
                        let outcome = tokio::select! {
                            _ = shutdown_rx.wait_for(|stop| *stop) => Err(Error::Cancelled),
                            outcome = self.session(&mut stream) => outcome,
                        };
                        if let Err(e) = outcome {
                            if e.is_cancelled() {
                                break;
                            }
                            tracing::error!(%addr, error = %e, "session error");
                            self.errors.show_error(&e);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept error");
                    }
                }
            }
            self.status.offline();
        });

        ServerHandle {
            task,
            shutdown: shutdown_tx,
        }
    }

    /// Drain one connection: handshake once, then size-framed transfers
    /// until the client closes.
    async fn session<S>(&self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        server_handshake(stream).await?;
        self.status.online();

        let mut scratch = vec![0u8; CHUNK_SIZE];
        loop {
            let total = match wire::read_i64(stream).await {
                Ok(total) => total,
                Err(Error::EndOfStream) => {
                    tracing::debug!("connection closed by peer");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if total < 0 {
                wire::ack(stream, tag::ERROR).await?;
                return Err(Error::UnsupportedSize(total));
            }
            wire::ack(stream, tag::SUCCESS_SIZE).await?;

            if total == 0 {
                // Zero-length transfer is a ping; the connection stays warm.
                tracing::trace!("ping");
                continue;
            }

            let first_format = wire::read_string(stream).await?;
            if first_format.is_empty() {
                wire::ack(stream, tag::ERROR).await?;
                return Err(Error::UnsupportedFormat(first_format));
            }

            if format::is_file_drop(&first_format) {
                let progress =
                    ProgressScope::begin(Arc::clone(&self.progress), ProgressMode::Receive);
                let paths = transfer::receive_file_drop(
                    stream,
                    first_format,
                    total as u64,
                    &progress,
                    &mut scratch,
                )
                .await?;
                tracing::info!(count = paths.len(), "file drop received");
                self.dispatch.deliver_files(paths)?;
            } else {
                let data = self.receive_clipboard(stream, first_format, total as u64).await?;
                tracing::info!(items = data.len(), "clipboard data received");
                self.deliver(data)?;
            }
        }
    }

    async fn receive_clipboard<S>(
        &self,
        stream: &mut S,
        first_format: String,
        total: u64,
    ) -> Result<ClipboardData>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let progress = ProgressScope::begin(Arc::clone(&self.progress), ProgressMode::Receive);
        progress.set_max(total);

        let mut data = ClipboardData::new();
        let mut format_name = first_format;
        let mut remaining = total;

        loop {
            if !format::is_known(&format_name) {
                tracing::debug!(format = %format_name, "unknown format, passing through");
            }
            wire::ack(stream, tag::SUCCESS_FORMAT).await?;

            let size = wire::read_i64(stream).await?;
            if size < 0 || size as u64 > remaining {
                wire::ack(stream, tag::ERROR).await?;
                return Err(Error::UnsupportedSize(size));
            }
            wire::ack(stream, tag::SUCCESS_SIZE).await?;

            let payload = wire::read_payload(stream, size as u64).await?;
            remaining -= size as u64;
            progress.tick(size as u64);
            data.add(format_name.clone(), payload)?;
            wire::ack(stream, tag::SUCCESS_DATA).await?;

            match wire::read_u16(stream).await? {
                tag::MORE_DATA => {
                    format_name = wire::read_string(stream).await?;
                    if format_name.is_empty() {
                        wire::ack(stream, tag::ERROR).await?;
                        return Err(Error::UnsupportedFormat(format_name));
                    }
                }
                tag::FINISH => break,
                other => {
                    return Err(Error::TransferFailed(format!(
                        "unexpected trailer tag {:#06x}",
                        other
                    )))
                }
            }
        }

        Ok(data)
    }

    /// Hand an assembled payload to the host: DIB items become standalone
    /// BMP images, everything else is delivered as clipboard data.
    fn deliver(&self, data: ClipboardData) -> Result<()> {
        let mut rest = ClipboardData::new();
        for item in data.into_items() {
            if item.format == format::DIB {
                let bmp = image::dib_to_bmp(&item.payload)?;
                self.dispatch.deliver_image(bmp)?;
            } else {
                rest.add(item.format, item.payload)?;
            }
        }
        if !rest.is_empty() {
            self.dispatch.deliver_data(rest)?;
        }
        Ok(())
    }
}

/// Handle to the running accept loop.
pub struct ServerHandle {
    task: tokio::task::JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ServerHandle {
    /// Stop accepting and wait for the loop to unwind.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

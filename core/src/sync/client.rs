//! Outbound data client
//!
//! The client owns at most one TCP connection to the partner, reusing it
//! across sends and pings while it stays healthy. A new send cancels any
//! in-flight one, waits briefly for it to unwind, and proceeds under a
//! fresh cancellation token; the keep-alive ping is suppressed while a
//! transfer holds the connection.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;

use crate::clipboard::ClipboardData;
use crate::host::{AddressDiscovery, ConnectStatus, Progress, ProgressMode, ProgressScope};
use crate::protocol::constants::{CHUNK_SIZE, SEND_QUIESCENCE_TIMEOUT};
use crate::protocol::{tag, wire};
use crate::sync::client_handshake;
use crate::transfer;
use crate::{Config, Error, PartnerAddress, Result};

/// Connection phase of the client role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Idle,
    Connecting,
    Online,
    Sending,
    Disconnected,
}

struct ClientState {
    socket: Option<TcpStream>,
    phase: ClientPhase,
}

enum Payload {
    Data(ClipboardData),
    Files(Vec<PathBuf>),
}

/// Outbound role: connects, handshakes, pushes clipboard payloads or
/// file-drop streams, and keeps the link warm with periodic pings.
pub struct DataClient {
    config: Config,
    discovery: Arc<dyn AddressDiscovery>,
    progress: Arc<dyn Progress>,
    status: Arc<dyn ConnectStatus>,
    state: Arc<Mutex<ClientState>>,
    /// Held for the duration of any transfer or ping on the connection.
    transfer_gate: Arc<Mutex<()>>,
    /// Current cancellation token; replaced by each new send.
    cancel: std::sync::Mutex<watch::Sender<bool>>,
    ping_suppressed: AtomicBool,
    ping_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DataClient {
    pub fn new(
        config: Config,
        discovery: Arc<dyn AddressDiscovery>,
        progress: Arc<dyn Progress>,
        status: Arc<dyn ConnectStatus>,
    ) -> Arc<Self> {
        let (cancel_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            discovery,
            progress,
            status,
            state: Arc::new(Mutex::new(ClientState {
                socket: None,
                phase: ClientPhase::Idle,
            })),
            transfer_gate: Arc::new(Mutex::new(())),
            cancel: std::sync::Mutex::new(cancel_tx),
            ping_suppressed: AtomicBool::new(false),
            ping_task: std::sync::Mutex::new(None),
        })
    }

    /// Current connection phase.
    pub async fn phase(&self) -> ClientPhase {
        self.state.lock().await.phase
    }

    /// Enable the periodic keep-alive ping.
    ///
    /// The timer is single-shot and re-arms itself after every tick; it
    /// skips ticks while a transfer is in progress.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.ping_task.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let client = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(client.config.ping_period).await;
                if client.ping_suppressed.load(Ordering::Acquire) {
                    continue;
                }
                match client.ping().await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "ping failed");
                        client.status.client_offline();
                    }
                }
            }
        }));
    }

    /// Disable the ping, cancel any in-flight transfer and close the
    /// connection.
    pub async fn stop(&self) {
        if let Some(task) = self.ping_task.lock().unwrap().take() {
            task.abort();
        }
        let _ = self.cancel.lock().unwrap().send(true);
        // Let an in-flight send unwind before tearing the socket down.
        let _ = timeout(SEND_QUIESCENCE_TIMEOUT, self.transfer_gate.lock()).await;

        let mut state = self.state.lock().await;
        state.socket = None;
        state.phase = ClientPhase::Disconnected;
        drop(state);

        self.status.client_offline();
    }

    /// Send a multi-format clipboard payload to the partner.
    pub async fn send_data(&self, data: ClipboardData) -> Result<()> {
        self.send(Payload::Data(data)).await
    }

    /// Stream a file-drop list to the partner.
    pub async fn send_file_drop_list(&self, paths: Vec<PathBuf>) -> Result<()> {
        self.send(Payload::Files(paths)).await
    }

    async fn send(&self, payload: Payload) -> Result<()> {
        // Cancel whatever transfer currently holds the connection and
        // wait up to a second for it to let go.
        let _ = self.cancel.lock().unwrap().send(true);
        let gate = match timeout(SEND_QUIESCENCE_TIMEOUT, Arc::clone(&self.transfer_gate).lock_owned())
            .await
        {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::warn!("previous transfer did not quiesce in time");
                None
            }
        };

        let cancel_rx = self.install_token();
        self.ping_suppressed.store(true, Ordering::Release);

        let result = self.run_transfer(cancel_rx, payload).await;

        self.ping_suppressed.store(false, Ordering::Release);
        drop(gate);
        result
    }

    fn install_token(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        *self.cancel.lock().unwrap() = tx;
        rx
    }

    async fn run_transfer(&self, cancel: watch::Receiver<bool>, payload: Payload) -> Result<()> {
        let mut stream = match self.obtain_connection(cancel.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                self.disconnect().await;
                return Err(e);
            }
        };

        self.state.lock().await.phase = ClientPhase::Sending;

        let result = run_cancellable(cancel, async {
            let progress = ProgressScope::begin(Arc::clone(&self.progress), ProgressMode::Send);
            let mut scratch = vec![0u8; CHUNK_SIZE];
            match &payload {
                Payload::Data(data) => send_clipboard(&mut stream, data, &progress).await,
                Payload::Files(paths) => {
                    transfer::send_file_drop(&mut stream, paths, &progress, &mut scratch).await
                }
            }
        })
        .await;

        match result {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.socket = Some(stream);
                state.phase = ClientPhase::Online;
                Ok(())
            }
            Err(e) => {
                // Deterministic close: the socket drops here, never back
                // into the reuse slot.
                drop(stream);
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.socket = None;
        state.phase = ClientPhase::Disconnected;
        drop(state);
        self.status.client_offline();
    }

    /// Reuse the held connection when it is still live, otherwise open a
    /// fresh one and handshake it.
    async fn obtain_connection(&self, cancel: watch::Receiver<bool>) -> Result<TcpStream> {
        {
            let mut state = self.state.lock().await;
            if let Some(stream) = state.socket.take() {
                if connection_is_live(&stream) {
                    return Ok(stream);
                }
                tracing::debug!("held connection is stale, reconnecting");
            }
            state.phase = ClientPhase::Connecting;
        }

        let endpoint = self.resolve_partner().await?;
        let stream = run_cancellable(cancel, async {
            let mut stream = TcpStream::connect(endpoint.as_str())
                .await
                .map_err(|e| Error::Network(format!("connect to {}: {}", endpoint, e)))?;
            client_handshake(&mut stream).await?;
            Ok(stream)
        })
        .await?;

        self.state.lock().await.phase = ClientPhase::Online;
        self.status.client_online();
        Ok(stream)
    }

    async fn resolve_partner(&self) -> Result<String> {
        match PartnerAddress::parse(&self.config.partner_address)? {
            PartnerAddress::Endpoint(endpoint) => Ok(endpoint),
            PartnerAddress::DiscoveryId(id) => {
                let discovery = Arc::clone(&self.discovery);
                let addr = tokio::task::spawn_blocking(move || discovery.discover(&id))
                    .await
                    .map_err(|e| Error::Discovery(e.to_string()))??;
                Ok(addr.to_string())
            }
        }
    }

    /// One keep-alive round: zero-length transfer, single acknowledgment.
    async fn ping(&self) -> Result<()> {
        // A transfer owns the connection; skip this tick.
        let _gate = match self.transfer_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Ok(()),
        };

        let cancel = self.cancel.lock().unwrap().subscribe();
        let mut stream = match self.obtain_connection(cancel.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                self.disconnect().await;
                return Err(e);
            }
        };

        let result = run_cancellable(cancel, async {
            wire::write_i64(&mut stream, 0).await?;
            wire::expect_tag(&mut stream, tag::SUCCESS_SIZE, |got| {
                Error::TransferFailed(format!("unexpected ping acknowledgment {:#06x}", got))
            })
            .await?;
            Ok(())
        })
        .await;

        match result {
            Ok(()) => {
                self.state.lock().await.socket = Some(stream);
                Ok(())
            }
            Err(e) => {
                drop(stream);
                self.disconnect().await;
                Err(e)
            }
        }
    }
}

/// Run a transfer future until it completes or the token trips; the
/// caller closes the connection on cancellation.
async fn run_cancellable<T, F>(mut cancel: watch::Receiver<bool>, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        res = fut => res,
        _ = cancel.wait_for(|cancelled| *cancelled) => Err(Error::Cancelled),
    }
}

/// True when a subsequent write on the held socket can be expected to
/// succeed: the peer has neither closed nor sent unsolicited bytes.
fn connection_is_live(stream: &TcpStream) -> bool {
    let mut probe = [0u8; 1];
    match stream.try_read(&mut probe) {
        // 0 is peer-closed; anything buffered on an idle connection is
        // protocol garbage, so reconnect in both cases.
        Ok(_) => false,
        Err(e) => e.kind() == std::io::ErrorKind::WouldBlock,
    }
}

/// Push a clipboard payload through an established, handshaken
/// connection, one acknowledged (format, size, payload) round per item.
pub(crate) async fn send_clipboard<S>(
    stream: &mut S,
    data: &ClipboardData,
    progress: &ProgressScope,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let total = data.total_len();
    progress.set_max(total);

    wire::write_i64(stream, total as i64).await?;
    wire::expect_tag(stream, tag::SUCCESS_SIZE, |_| Error::UnsupportedSize(total as i64)).await?;

    let last = data.len().saturating_sub(1);
    for (index, item) in data.items().iter().enumerate() {
        wire::write_string(stream, &item.format).await?;
        wire::expect_tag(stream, tag::SUCCESS_FORMAT, |_| {
            Error::UnsupportedFormat(item.format.clone())
        })
        .await?;

        let size = item.payload.len() as i64;
        wire::write_i64(stream, size).await?;
        wire::expect_tag(stream, tag::SUCCESS_SIZE, |_| Error::UnsupportedSize(size)).await?;

        stream.write_all(&item.payload).await?;
        progress.tick(item.payload.len() as u64);
        wire::expect_tag(stream, tag::SUCCESS_DATA, |_| {
            Error::TransferFailed(format!("no data acknowledgment for {:?}", item.format))
        })
        .await?;

        let trailer = if index == last { tag::FINISH } else { tag::MORE_DATA };
        wire::write_u16(stream, trailer).await?;
    }

    stream.flush().await?;
    Ok(())
}

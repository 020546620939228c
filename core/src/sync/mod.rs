//! Connection roles: outbound data client, inbound data server
//!
//! Both roles share the version handshake that opens every fresh
//! connection; nothing else crosses the wire before it succeeds.

pub mod client;
pub mod server;

pub use client::{ClientPhase, DataClient};
pub use server::{DataServer, ServerHandle};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::protocol::{tag, wire, PROTOCOL_VERSION};
use crate::{Error, Result};

/// Client side of the version handshake.
pub(crate) async fn client_handshake<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    wire::write_u16(stream, PROTOCOL_VERSION).await?;
    stream.flush().await?;

    let ack = wire::read_u16(stream).await?;
    if ack != tag::SUCCESS_VERSION {
        let _ = wire::ack(stream, tag::ERROR).await;
        return Err(Error::UnsupportedVersion(PROTOCOL_VERSION));
    }
    Ok(())
}

/// Server side of the version handshake.
pub(crate) async fn server_handshake<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let version = wire::read_u16(stream).await?;
    if version != PROTOCOL_VERSION {
        let _ = wire::ack(stream, tag::ERROR).await;
        return Err(Error::UnsupportedVersion(version));
    }
    wire::ack(stream, tag::SUCCESS_VERSION).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    use crate::clipboard::{format, ClipboardData};
    use crate::host::testing::{
        NoDiscovery, NullProgress, RecordingDispatch, RecordingErrors, RecordingStatus,
    };
    use crate::protocol::{tag, wire};
    use crate::Config;

    struct TestServer {
        addr: SocketAddr,
        handle: ServerHandle,
        dispatch: Arc<RecordingDispatch>,
        status: Arc<RecordingStatus>,
        errors: Arc<RecordingErrors>,
    }

    async fn spawn_server() -> TestServer {
        let dispatch = Arc::new(RecordingDispatch::default());
        let status = Arc::new(RecordingStatus::default());
        let errors = Arc::new(RecordingErrors::default());

        let server = DataServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::clone(&dispatch) as _,
            Arc::new(NullProgress) as _,
            Arc::clone(&status) as _,
            Arc::clone(&errors) as _,
        )
        .await
        .unwrap();
        let addr = server.local_addr();

        TestServer {
            addr,
            handle: server.start(),
            dispatch,
            status,
            errors,
        }
    }

    fn test_client(addr: SocketAddr, ping_period: Duration) -> Arc<DataClient> {
        let config = Config {
            partner_address: addr.to_string(),
            ping_period,
            ..Config::default()
        };
        DataClient::new(
            config,
            Arc::new(NoDiscovery),
            Arc::new(NullProgress),
            Arc::new(RecordingStatus::default()),
        )
    }

    async fn wait_until(mut probe: impl FnMut() -> bool) {
        for _ in 0..200 {
            if probe() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_single_text_roundtrip() {
        let server = spawn_server().await;
        let client = test_client(server.addr, Duration::from_secs(60));

        let mut data = ClipboardData::new();
        data.add(format::TEXT, b"hi".to_vec()).unwrap();
        client.send_data(data).await.unwrap();

        wait_until(|| !server.dispatch.data.lock().unwrap().is_empty()).await;

        let received = server.dispatch.data.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].items().len(), 1);
        assert_eq!(received[0].items()[0].format, format::TEXT);
        assert_eq!(received[0].items()[0].payload, b"hi");

        server.handle.stop().await;
    }

    #[tokio::test]
    async fn test_multi_item_order_preserved() {
        let server = spawn_server().await;
        let client = test_client(server.addr, Duration::from_secs(60));

        let unicode: Vec<u8> = "αβ".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut data = ClipboardData::new();
        data.add(format::UNICODE_TEXT, unicode.clone()).unwrap();
        data.add(format::HTML, b"<b>x</b>".to_vec()).unwrap();
        assert_eq!(data.total_len(), 12);

        client.send_data(data).await.unwrap();
        wait_until(|| !server.dispatch.data.lock().unwrap().is_empty()).await;

        let received = server.dispatch.data.lock().unwrap();
        let items = received[0].items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].format, format::UNICODE_TEXT);
        assert_eq!(items[0].payload, unicode);
        assert_eq!(items[1].format, format::HTML);
        assert_eq!(items[1].payload, b"<b>x</b>");

        server.handle.stop().await;
    }

    #[tokio::test]
    async fn test_dib_delivered_as_image() {
        let server = spawn_server().await;
        let client = test_client(server.addr, Duration::from_secs(60));

        // Minimal well-formed 2x2 32-bit DIB
        let mut dib = Vec::new();
        dib.extend_from_slice(&40u32.to_le_bytes());
        dib.extend_from_slice(&2i32.to_le_bytes());
        dib.extend_from_slice(&2i32.to_le_bytes());
        dib.extend_from_slice(&1u16.to_le_bytes());
        dib.extend_from_slice(&32u16.to_le_bytes());
        dib.extend_from_slice(&[0u8; 24]);
        dib.extend_from_slice(&[0xAAu8; 16]);

        let mut data = ClipboardData::new();
        data.add(format::DIB, dib.clone()).unwrap();
        client.send_data(data).await.unwrap();

        wait_until(|| !server.dispatch.images.lock().unwrap().is_empty()).await;

        let images = server.dispatch.images.lock().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(&images[0][0..2], b"BM");
        assert_eq!(&images[0][14..], &dib[..]);
        // Nothing left over for the data path
        assert!(server.dispatch.data.lock().unwrap().is_empty());

        server.handle.stop().await;
    }

    #[tokio::test]
    async fn test_ping_keeps_one_connection_and_no_dispatch() {
        let server = spawn_server().await;
        let client = test_client(server.addr, Duration::from_millis(20));
        client.start();

        tokio::time::sleep(Duration::from_millis(300)).await;
        client.stop().await;

        // Every ping reused the same handshaken connection
        assert_eq!(*server.status.online_count.lock().unwrap(), 1);
        assert!(server.dispatch.data.lock().unwrap().is_empty());
        assert!(server.dispatch.files.lock().unwrap().is_empty());
        assert!(server.dispatch.images.lock().unwrap().is_empty());

        server.handle.stop().await;
    }

    #[tokio::test]
    async fn test_handshake_rejection_by_server() {
        let server = spawn_server().await;

        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        wire::write_u16(&mut stream, 0xFFFF).await.unwrap();
        stream.flush().await.unwrap();

        let answer = wire::read_u16(&mut stream).await.unwrap();
        assert_eq!(answer, tag::ERROR);

        wait_until(|| !server.errors.errors.lock().unwrap().is_empty()).await;
        assert!(server.errors.errors.lock().unwrap()[0].contains("version"));
        assert!(server.dispatch.data.lock().unwrap().is_empty());

        // The listener survived and still accepts valid clients
        let client = test_client(server.addr, Duration::from_secs(60));
        let mut data = ClipboardData::new();
        data.add(format::TEXT, b"ok".to_vec()).unwrap();
        client.send_data(data).await.unwrap();
        wait_until(|| !server.dispatch.data.lock().unwrap().is_empty()).await;

        server.handle.stop().await;
    }

    #[tokio::test]
    async fn test_handshake_rejection_by_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Reject whatever version arrives
            let _ = wire::read_u16(&mut stream).await;
            let _ = wire::ack(&mut stream, tag::ERROR).await;
        });

        let client = test_client(addr, Duration::from_secs(60));
        let mut data = ClipboardData::new();
        data.add(format::TEXT, b"hi".to_vec()).unwrap();

        let result = client.send_data(data).await;
        assert!(matches!(result, Err(crate::Error::UnsupportedVersion(_))));
    }

    #[tokio::test]
    async fn test_truncated_session_fails_without_dispatch() {
        let server = spawn_server().await;

        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        client_handshake(&mut stream).await.unwrap();

        wire::write_i64(&mut stream, 10).await.unwrap();
        assert_eq!(wire::read_u16(&mut stream).await.unwrap(), tag::SUCCESS_SIZE);
        wire::write_string(&mut stream, format::TEXT).await.unwrap();
        assert_eq!(wire::read_u16(&mut stream).await.unwrap(), tag::SUCCESS_FORMAT);
        wire::write_i64(&mut stream, 10).await.unwrap();
        assert_eq!(wire::read_u16(&mut stream).await.unwrap(), tag::SUCCESS_SIZE);
        // Promise 10 payload bytes, deliver none
        drop(stream);

        wait_until(|| !server.errors.errors.lock().unwrap().is_empty()).await;
        assert!(server.dispatch.data.lock().unwrap().is_empty());

        server.handle.stop().await;
    }

    /// Both file-drop cases share one test because the spool directory is
    /// process-wide and destructively re-initialized per session.
    #[tokio::test]
    async fn test_file_drop_sessions() {
        let server = spawn_server().await;
        let client = test_client(server.addr, Duration::from_secs(60));

        // Round trip: a directory with one file lands in the spool
        let source = tempfile::tempdir().unwrap();
        let drop_root = source.path().join("d");
        std::fs::create_dir(&drop_root).unwrap();
        std::fs::write(drop_root.join("a.txt"), b"hello").unwrap();

        client.send_file_drop_list(vec![drop_root]).await.unwrap();
        wait_until(|| !server.dispatch.files.lock().unwrap().is_empty()).await;

        {
            let files = server.dispatch.files.lock().unwrap();
            let spool = crate::transfer::spool_dir();
            assert_eq!(files[0], vec![spool.join("d"), spool.join("d/a.txt")]);
            assert_eq!(std::fs::read(spool.join("d/a.txt")).unwrap(), b"hello");
        }

        // Release the held connection so the single-session server can
        // accept the next one.
        client.stop().await;

        // Unsafe path: the record is rejected before anything is written
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        client_handshake(&mut stream).await.unwrap();
        wire::write_i64(&mut stream, 5).await.unwrap();
        assert_eq!(wire::read_u16(&mut stream).await.unwrap(), tag::SUCCESS_SIZE);
        wire::write_string(&mut stream, format::FILE_DROP).await.unwrap();
        assert_eq!(wire::read_u16(&mut stream).await.unwrap(), tag::SUCCESS_FORMAT);
        wire::write_string(&mut stream, "../evil").await.unwrap();
        assert_eq!(wire::read_u16(&mut stream).await.unwrap(), tag::ERROR);
        drop(stream);

        wait_until(|| {
            server.errors.errors.lock().unwrap().iter().any(|e| e.contains("unsafe path"))
        })
        .await;
        assert!(!crate::transfer::spool_dir().join("../evil").exists());
        assert!(!crate::transfer::spool_dir().join("evil").exists());
        assert_eq!(server.dispatch.files.lock().unwrap().len(), 1);

        server.handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_cancels_inflight_send() {
        // A server that acknowledges the size frame and then stalls
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            server_handshake(&mut stream).await.unwrap();
            let _ = wire::read_i64(&mut stream).await;
            let _ = wire::ack(&mut stream, tag::SUCCESS_SIZE).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = test_client(addr, Duration::from_secs(60));
        let mut data = ClipboardData::new();
        data.add(format::TEXT, vec![0u8; 1024]).unwrap();

        let sender = Arc::clone(&client);
        let send_task =
            tokio::spawn(async move { sender.send_data(data).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        client.stop().await;

        let result = tokio::time::timeout(Duration::from_secs(1), send_task)
            .await
            .expect("send did not unwind after stop")
            .unwrap();
        assert!(matches!(result, Err(crate::Error::Cancelled)));
        assert_eq!(client.phase().await, ClientPhase::Disconnected);
    }
}

//! Little-endian wire codec for the transfer protocol
//!
//! This module provides the primitive reads and writes every frame of the
//! protocol is built from: fixed-width little-endian integers, `i32`
//! length-prefixed UTF-8 strings, and a chunked bulk copy for payload
//! bodies. Every read fails with [`Error::EndOfStream`] if the stream
//! closes before the requested count is satisfied.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::constants::MAX_STRING_LEN;
use crate::{Error, Result};

fn map_read_err(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::EndOfStream
    } else {
        Error::Io(e)
    }
}

/// Read a little-endian `u16` control tag.
pub async fn read_u16<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).await.map_err(map_read_err)?;
    Ok(u16::from_le_bytes(buf))
}

/// Write a little-endian `u16` control tag.
pub async fn write_u16<W: AsyncWrite + Unpin>(writer: &mut W, value: u16) -> Result<()> {
    writer.write_all(&value.to_le_bytes()).await?;
    Ok(())
}

/// Read a little-endian `i64` size frame.
pub async fn read_i64<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).await.map_err(map_read_err)?;
    Ok(i64::from_le_bytes(buf))
}

/// Write a little-endian `i64` size frame.
pub async fn write_i64<W: AsyncWrite + Unpin>(writer: &mut W, value: i64) -> Result<()> {
    writer.write_all(&value.to_le_bytes()).await?;
    Ok(())
}

/// Read a length-prefixed UTF-8 string.
///
/// The wire format is a little-endian `i32` byte count followed by that
/// many UTF-8 bytes; the empty string is length 0. Lengths that are
/// negative or exceed [`MAX_STRING_LEN`] are rejected.
pub async fn read_string<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(map_read_err)?;
    let len = i32::from_le_bytes(len_buf);

    if len < 0 || len as usize > MAX_STRING_LEN {
        return Err(Error::Network(format!("invalid string length: {}", len)));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await.map_err(map_read_err)?;

    String::from_utf8(buf).map_err(|_| Error::InvalidUtf8)
}

/// Write a length-prefixed UTF-8 string.
pub async fn write_string<W: AsyncWrite + Unpin>(writer: &mut W, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(Error::Network(format!("string too long: {} bytes", bytes.len())));
    }
    writer.write_all(&(bytes.len() as i32).to_le_bytes()).await?;
    writer.write_all(bytes).await?;
    Ok(())
}

/// Copy exactly `len` bytes from `reader` to `writer` through `scratch`.
///
/// The scratch buffer is allocated once per session by the caller and
/// reused across chunks. `tick` is called with the byte count of each
/// chunk as it lands, for progress reporting.
pub async fn copy_exact<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    len: u64,
    scratch: &mut [u8],
    mut tick: F,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(u64),
{
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(scratch.len() as u64) as usize;
        let n = reader.read(&mut scratch[..want]).await?;
        if n == 0 {
            return Err(Error::EndOfStream);
        }
        writer.write_all(&scratch[..n]).await?;
        remaining -= n as u64;
        tick(n as u64);
    }
    Ok(())
}

/// Read exactly `len` bytes into a fresh buffer.
pub async fn read_payload<R: AsyncRead + Unpin>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await.map_err(map_read_err)?;
    Ok(buf)
}

/// Write an acknowledgment tag and flush it to the peer, which is
/// blocked waiting on it.
pub async fn ack<W: AsyncWrite + Unpin>(writer: &mut W, tag: u16) -> Result<()> {
    write_u16(writer, tag).await?;
    writer.flush().await?;
    Ok(())
}

/// Flush pending writes, then read one acknowledgment tag and verify it.
///
/// On mismatch the observed tag is handed to `err` to build the failure;
/// the peer typically answered [`tag::ERROR`](crate::protocol::tag::ERROR).
pub async fn expect_tag<S, F>(stream: &mut S, want: u16, err: F) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnOnce(u16) -> Error,
{
    stream.flush().await?;
    let got = read_u16(stream).await?;
    if got == want {
        Ok(())
    } else {
        Err(err(got))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_u16_roundtrip() {
        let mut buffer = Vec::new();
        write_u16(&mut buffer, 0x0203).await.unwrap();
        assert_eq!(buffer, [0x03, 0x02]);

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_u16(&mut cursor).await.unwrap(), 0x0203);
    }

    #[tokio::test]
    async fn test_i64_roundtrip() {
        let mut buffer = Vec::new();
        write_i64(&mut buffer, -42).await.unwrap();

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_i64(&mut cursor).await.unwrap(), -42);
    }

    #[tokio::test]
    async fn test_string_roundtrip() {
        let mut buffer = Vec::new();
        write_string(&mut buffer, "Rich Text Format").await.unwrap();

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_string(&mut cursor).await.unwrap(), "Rich Text Format");
    }

    #[tokio::test]
    async fn test_empty_string() {
        let mut buffer = Vec::new();
        write_string(&mut buffer, "").await.unwrap();
        assert_eq!(buffer, [0, 0, 0, 0]);

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_string(&mut cursor).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_short_read_is_end_of_stream() {
        // A u16 tag truncated to one byte
        let mut cursor = Cursor::new(vec![0x01]);
        assert!(matches!(read_u16(&mut cursor).await, Err(Error::EndOfStream)));

        // A string whose prefix promises more bytes than follow
        let mut buffer = Vec::new();
        write_string(&mut buffer, "hello").await.unwrap();
        buffer.truncate(buffer.len() - 2);
        let mut cursor = Cursor::new(buffer);
        assert!(matches!(read_string(&mut cursor).await, Err(Error::EndOfStream)));
    }

    #[tokio::test]
    async fn test_negative_string_length_rejected() {
        let mut cursor = Cursor::new((-1i32).to_le_bytes().to_vec());
        assert!(read_string(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn test_copy_exact() {
        let payload = vec![7u8; 200_000];
        let mut src = Cursor::new(payload.clone());
        let mut dst = Vec::new();
        let mut scratch = vec![0u8; 64 * 1024];

        let mut ticked = 0u64;
        copy_exact(&mut src, &mut dst, payload.len() as u64, &mut scratch, |n| ticked += n)
            .await
            .unwrap();

        assert_eq!(dst, payload);
        assert_eq!(ticked, payload.len() as u64);
    }

    #[tokio::test]
    async fn test_copy_exact_short_source() {
        let mut src = Cursor::new(vec![0u8; 10]);
        let mut dst = Vec::new();
        let mut scratch = vec![0u8; 1024];

        let result = copy_exact(&mut src, &mut dst, 20, &mut scratch, |_| {}).await;
        assert!(matches!(result, Err(Error::EndOfStream)));
    }
}

//! Inbound half of a file-drop transfer
//!
//! Records are materialized under a spool directory in the OS temp root.
//! The spool is destructively re-initialized at the start of every drop
//! session; files written there must never escape it.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::clipboard::format;
use crate::host::ProgressScope;
use crate::protocol::constants::SPOOL_DIR_NAME;
use crate::protocol::{tag, wire};
use crate::{Error, Result};

/// Location of the receiver spool directory.
pub fn spool_dir() -> PathBuf {
    std::env::temp_dir().join(SPOOL_DIR_NAME)
}

/// Best-effort recursive delete, then recreate.
async fn prepare_spool() -> Result<PathBuf> {
    let spool = spool_dir();
    if let Err(e) = fs::remove_dir_all(&spool).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, "could not clear spool directory");
        }
    }
    fs::create_dir_all(&spool).await?;
    Ok(spool)
}

/// Validate a received relative path: forward-slash segments, no
/// absolute prefix, no parent traversal.
fn safe_relative(path: &str) -> Result<PathBuf> {
    if path.is_empty() || path.starts_with('/') || path.starts_with('\\') {
        return Err(Error::UnsafePath(path.to_string()));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(Error::UnsafePath(path.to_string()));
    }
    let relative = Path::new(path);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(Error::UnsafePath(path.to_string())),
        }
    }
    Ok(relative.to_path_buf())
}

/// Consume a file-drop stream into a freshly recreated spool.
///
/// `first_kind` is the kind tag the session loop already read when it
/// recognized the transfer as a file drop; it has not been acknowledged
/// yet. Returns the spool contents, each directory ahead of its files,
/// for delivery to the host.
pub async fn receive_file_drop<S>(
    stream: &mut S,
    first_kind: String,
    total: u64,
    progress: &ProgressScope,
    scratch: &mut [u8],
) -> Result<Vec<PathBuf>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let spool = prepare_spool().await?;
    progress.set_max(total);

    let mut kind = first_kind;
    loop {
        if !format::is_file_drop(&kind) {
            wire::ack(stream, tag::ERROR).await?;
            return Err(Error::TransferFailed(format!("unexpected record kind {:?}", kind)));
        }
        wire::ack(stream, tag::SUCCESS_FORMAT).await?;

        let relative = wire::read_string(stream).await?;
        let dest = match safe_relative(&relative) {
            Ok(rel) => spool.join(rel),
            Err(e) => {
                wire::ack(stream, tag::ERROR).await?;
                return Err(e);
            }
        };
        wire::ack(stream, tag::SUCCESS_FORMAT).await?;

        let size = wire::read_i64(stream).await?;
        if size < 0 {
            wire::ack(stream, tag::ERROR).await?;
            return Err(Error::UnsupportedSize(size));
        }
        wire::ack(stream, tag::SUCCESS_SIZE).await?;

        if kind == format::DIRECTORY_DROP {
            if size != 0 {
                wire::ack(stream, tag::ERROR).await?;
                return Err(Error::TransferFailed(format!(
                    "directory record {:?} announced {} bytes",
                    relative, size
                )));
            }
            fs::create_dir_all(&dest).await?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).await?;
            }
            let mut file = fs::File::create(&dest).await?;
            wire::copy_exact(stream, &mut file, size as u64, scratch, |n| progress.tick(n))
                .await?;
            file.flush().await?;
        }
        tracing::debug!(path = %relative, size, "spooled file drop record");
        wire::ack(stream, tag::SUCCESS_DATA).await?;

        match wire::read_u16(stream).await? {
            tag::MORE_DATA => {
                kind = wire::read_string(stream).await?;
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

    enumerate_spool(&spool)
}

/// Walk the spool in preorder, directories ahead of their contents,
/// siblings sorted by name.
fn enumerate_spool(spool: &Path) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        let mut children: Vec<PathBuf> =
            std::fs::read_dir(dir)?.map(|e| e.map(|e| e.path())).collect::<std::io::Result<_>>()?;
        children.sort();
        for child in children {
            out.push(child.clone());
            if child.is_dir() {
                walk(&child, out)?;
            }
        }
        Ok(())
    }

    let mut paths = Vec::new();
    walk(spool, &mut paths)?;
    Ok(paths)
}

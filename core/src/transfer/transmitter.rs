//! Outbound half of a file-drop transfer

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::clipboard::format;
use crate::host::ProgressScope;
use crate::protocol::{tag, wire};
use crate::transfer::EntryKind;
use crate::{Error, Result};

/// One record of the outgoing stream.
#[derive(Debug, Clone)]
struct DropEntry {
    kind: EntryKind,
    /// Forward-slash path relative to the drop root.
    relative: String,
    /// File length in bytes; 0 for directories.
    size: u64,
    /// Source location on the local filesystem.
    source: PathBuf,
}

impl DropEntry {
    fn kind_tag(&self) -> &'static str {
        match self.kind {
            EntryKind::Directory => format::DIRECTORY_DROP,
            EntryKind::File => format::FILE_DROP,
        }
    }
}

fn entry_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidConfiguration(format!("drop path {:?} has no name", path)))
}

/// Walk the drop list into a record sequence, each directory ahead of its
/// contents.
async fn collect_entries(paths: &[PathBuf]) -> Result<Vec<DropEntry>> {
    let mut entries = Vec::new();

    for root in paths {
        let meta = fs::metadata(root).await?;
        let name = entry_name(root)?;

        if meta.is_file() {
            entries.push(DropEntry {
                kind: EntryKind::File,
                relative: name,
                size: meta.len(),
                source: root.clone(),
            });
            continue;
        }

        let mut stack = vec![(root.clone(), name)];
        while let Some((dir, relative)) = stack.pop() {
            entries.push(DropEntry {
                kind: EntryKind::Directory,
                relative: relative.clone(),
                size: 0,
                source: dir.clone(),
            });

            let mut children = Vec::new();
            let mut read_dir = fs::read_dir(&dir).await?;
            while let Some(child) = read_dir.next_entry().await? {
                children.push(child.path());
            }
            children.sort();

            // Subdirectories are visited after this directory's files;
            // pushing them reversed keeps sibling order sorted.
            let mut subdirs = Vec::new();
            for child in &children {
                let child_rel = format!("{}/{}", relative, entry_name(child)?);
                let child_meta = fs::metadata(child).await?;
                if child_meta.is_dir() {
                    subdirs.push((child.clone(), child_rel));
                } else {
                    entries.push(DropEntry {
                        kind: EntryKind::File,
                        relative: child_rel,
                        size: child_meta.len(),
                        source: child.clone(),
                    });
                }
            }
            for subdir in subdirs.into_iter().rev() {
                stack.push(subdir);
            }
        }
    }

    Ok(entries)
}

/// Stream a file-drop list through an established, handshaken connection.
///
/// Announces the summed file sizes, then emits each record through the
/// usual (format, size, payload) envelope with the relative path framed
/// between the kind tag and the size.
pub async fn send_file_drop<S>(
    stream: &mut S,
    paths: &[PathBuf],
    progress: &ProgressScope,
    scratch: &mut [u8],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let entries = collect_entries(paths).await?;
    if entries.is_empty() {
        return Err(Error::InvalidConfiguration("empty file drop list".to_string()));
    }

    let total: u64 = entries.iter().map(|e| e.size).sum();
    progress.set_max(total);

    tracing::debug!(records = entries.len(), total, "sending file drop");

    wire::write_i64(stream, total as i64).await?;
    wire::expect_tag(stream, tag::SUCCESS_SIZE, |_| Error::UnsupportedSize(total as i64)).await?;

    let last = entries.len() - 1;
    for (index, entry) in entries.iter().enumerate() {
        wire::write_string(stream, entry.kind_tag()).await?;
        wire::expect_tag(stream, tag::SUCCESS_FORMAT, |_| {
            Error::UnsupportedFormat(entry.kind_tag().to_string())
        })
        .await?;

        wire::write_string(stream, &entry.relative).await?;
        wire::expect_tag(stream, tag::SUCCESS_FORMAT, |_| {
            Error::UnsupportedFormat(entry.relative.clone())
        })
        .await?;

        wire::write_i64(stream, entry.size as i64).await?;
        wire::expect_tag(stream, tag::SUCCESS_SIZE, |_| Error::UnsupportedSize(entry.size as i64))
            .await?;

        if entry.kind == EntryKind::File {
            let mut file = fs::File::open(&entry.source).await?;
            wire::copy_exact(&mut file, stream, entry.size, scratch, |n| progress.tick(n)).await?;
        }

        wire::expect_tag(stream, tag::SUCCESS_DATA, |_| {
            Error::TransferFailed(format!("no data acknowledgment for {:?}", entry.relative))
        })
        .await?;

        let trailer = if index == last { tag::FINISH } else { tag::MORE_DATA };
        wire::write_u16(stream, trailer).await?;
    }

    stream.flush().await?;
    Ok(())
}

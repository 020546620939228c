//! File-drop streaming
//!
//! A file drop travels as a sequence of records through the same framed
//! envelope as clipboard items: the format slot carries the record kind
//! (`DirectoryDrop` or `FileDrop`), followed by the relative path, the
//! body size (0 for directories) and the body bytes. Directories are
//! emitted before the files they contain.

mod receiver;
mod transmitter;

pub use receiver::{receive_file_drop, spool_dir};
pub use transmitter::send_file_drop;

/// Kind of a file-drop record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

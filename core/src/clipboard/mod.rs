//! Multi-format clipboard payload model
//!
//! A [`ClipboardData`] is an ordered list of `(format, payload)` items.
//! Insertion order is transmission order. Known formats carry a converter
//! pair describing how host values become wire bytes and back; unknown
//! formats pass through as raw bytes.

pub mod image;

use crate::{Error, Result};

/// Well-known clipboard format names, transmitted verbatim and
/// case-sensitive.
pub mod format {
    pub const TEXT: &str = "Text";
    pub const UNICODE_TEXT: &str = "UnicodeText";
    pub const SYSTEM_STRING: &str = "System.String";
    pub const OEM_TEXT: &str = "OEMText";
    pub const RICH_TEXT: &str = "Rich Text Format";
    pub const LOCALE: &str = "Locale";
    pub const HTML: &str = "HTML Format";
    pub const WAVE_AUDIO: &str = "WaveAudio";
    pub const BITMAP: &str = "Bitmap";
    pub const DIB: &str = "Dib";
    /// File-drop record carrying a file body
    pub const FILE_DROP: &str = "FileDrop";
    /// File-drop record announcing a directory
    pub const DIRECTORY_DROP: &str = "DirectoryDrop";

    /// Returns true for the kind tags that route a transfer to the file
    /// receiver.
    pub fn is_file_drop(name: &str) -> bool {
        name == FILE_DROP || name == DIRECTORY_DROP
    }

    /// Returns true for format names this implementation recognizes.
    pub fn is_known(name: &str) -> bool {
        matches!(
            name,
            TEXT | UNICODE_TEXT
                | SYSTEM_STRING
                | OEM_TEXT
                | RICH_TEXT
                | LOCALE
                | HTML
                | WAVE_AUDIO
                | BITMAP
                | DIB
                | FILE_DROP
                | DIRECTORY_DROP
        )
    }
}

/// A single clipboard item: a format name and its serialized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardItem {
    pub format: String,
    pub payload: Vec<u8>,
}

/// Ordered multi-format clipboard payload.
///
/// Duplicate formats are permitted; later items override on the receiver
/// when the host paste semantics allow it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardData {
    items: Vec<ClipboardItem>,
}

impl ClipboardData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. The format name must be non-empty.
    pub fn add(&mut self, format: impl Into<String>, payload: Vec<u8>) -> Result<()> {
        let format = format.into();
        if format.is_empty() {
            return Err(Error::Clipboard("empty format name".to_string()));
        }
        self.items.push(ClipboardItem { format, payload });
        Ok(())
    }

    pub fn items(&self) -> &[ClipboardItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ClipboardItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all payload lengths, announced as the transfer total.
    pub fn total_len(&self) -> u64 {
        self.items.iter().map(|i| i.payload.len() as u64).sum()
    }
}

/// A clipboard value at the host boundary: either text in the host's
/// native representation or an opaque byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Text(String),
    Bytes(Vec<u8>),
}

/// Serialize a host value into the wire payload for `format`.
pub fn encode(format: &str, value: &HostValue) -> Result<Vec<u8>> {
    let text = match value {
        HostValue::Text(s) => s,
        // A pre-built stream is forwarded as-is for every format.
        HostValue::Bytes(b) => return Ok(b.clone()),
    };

    match format {
        format::TEXT | format::SYSTEM_STRING | format::HTML | format::RICH_TEXT => {
            Ok(text.as_bytes().to_vec())
        }
        format::UNICODE_TEXT => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        format::OEM_TEXT => {
            if !text.is_ascii() {
                return Err(Error::InvalidAscii);
            }
            Ok(text.as_bytes().to_vec())
        }
        // Locale and Dib payloads are raw buffers; WaveAudio and Bitmap
        // are recognized names with no converter wired.
        _ => Ok(text.as_bytes().to_vec()),
    }
}

/// Deserialize a wire payload for `format` back into a host value.
///
/// Unknown formats fall through to identity bytes.
pub fn decode(format: &str, payload: Vec<u8>) -> Result<HostValue> {
    match format {
        format::TEXT | format::SYSTEM_STRING | format::HTML | format::RICH_TEXT => {
            String::from_utf8(payload).map(HostValue::Text).map_err(|_| Error::InvalidUtf8)
        }
        format::UNICODE_TEXT => {
            if payload.len() % 2 != 0 {
                return Err(Error::InvalidUtf16);
            }
            let units: Vec<u16> = payload
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).map(HostValue::Text).map_err(|_| Error::InvalidUtf16)
        }
        format::OEM_TEXT => {
            if !payload.is_ascii() {
                return Err(Error::InvalidAscii);
            }
            String::from_utf8(payload).map(HostValue::Text).map_err(|_| Error::InvalidAscii)
        }
        // Recognized, but no converter is wired for them yet
        format::WAVE_AUDIO | format::BITMAP => Ok(HostValue::Bytes(payload)),
        _ => Ok(HostValue::Bytes(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_total() {
        let mut data = ClipboardData::new();
        data.add(format::TEXT, b"hi".to_vec()).unwrap();
        data.add(format::HTML, b"<b>x</b>".to_vec()).unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data.total_len(), 10);
        assert_eq!(data.items()[0].format, format::TEXT);
        assert_eq!(data.items()[1].format, format::HTML);
    }

    #[test]
    fn test_empty_format_rejected() {
        let mut data = ClipboardData::new();
        assert!(data.add("", vec![1, 2]).is_err());
    }

    #[test]
    fn test_utf8_roundtrip() {
        let value = HostValue::Text("grüße".to_string());
        let bytes = encode(format::TEXT, &value).unwrap();
        assert_eq!(decode(format::TEXT, bytes).unwrap(), value);
    }

    #[test]
    fn test_utf16_roundtrip() {
        let value = HostValue::Text("αβ𝄞".to_string());
        let bytes = encode(format::UNICODE_TEXT, &value).unwrap();
        // "αβ" is two UTF-16 units, the clef is a surrogate pair
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode(format::UNICODE_TEXT, bytes).unwrap(), value);
    }

    #[test]
    fn test_utf16_odd_length_rejected() {
        assert!(matches!(
            decode(format::UNICODE_TEXT, vec![0x61, 0x00, 0x62]),
            Err(Error::InvalidUtf16)
        ));
    }

    #[test]
    fn test_oem_text_ascii_only() {
        let value = HostValue::Text("plain".to_string());
        let bytes = encode(format::OEM_TEXT, &value).unwrap();
        assert_eq!(decode(format::OEM_TEXT, bytes).unwrap(), value);

        assert!(matches!(
            encode(format::OEM_TEXT, &HostValue::Text("naïve".to_string())),
            Err(Error::InvalidAscii)
        ));
        assert!(matches!(decode(format::OEM_TEXT, vec![0xFF]), Err(Error::InvalidAscii)));
    }

    #[test]
    fn test_unknown_format_is_identity() {
        let payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
        match decode("SomeVendorFormat", payload.clone()).unwrap() {
            HostValue::Bytes(b) => assert_eq!(b, payload),
            other => panic!("expected bytes, got {:?}", other),
        }
    }

    #[test]
    fn test_locale_is_raw() {
        let payload = 0x0409u32.to_le_bytes().to_vec();
        match decode(format::LOCALE, payload.clone()).unwrap() {
            HostValue::Bytes(b) => assert_eq!(b, payload),
            other => panic!("expected bytes, got {:?}", other),
        }
    }

    #[test]
    fn test_prebuilt_stream_passthrough() {
        let raw = vec![1u8, 2, 3];
        let bytes = encode(format::DIB, &HostValue::Bytes(raw.clone())).unwrap();
        assert_eq!(bytes, raw);
    }

    #[test]
    fn test_file_drop_kind_tags() {
        assert!(format::is_file_drop(format::FILE_DROP));
        assert!(format::is_file_drop(format::DIRECTORY_DROP));
        assert!(!format::is_file_drop(format::TEXT));
    }
}

//! DIB to BMP conversion
//!
//! Windows clipboards carry images as DIBs: a 40-byte BITMAPINFOHEADER
//! followed by optional palette/mask tables and pixel data, with no file
//! header. Writing one out as a standalone `.bmp` requires prepending a
//! 14-byte BITMAPFILEHEADER whose pixel-data offset accounts for the
//! tables between the info header and the pixels.

use bytes::{BufMut, BytesMut};

use crate::{Error, Result};

/// BITMAPFILEHEADER size in bytes.
const FILE_HEADER_SIZE: u32 = 14;

/// BITMAPINFOHEADER size in bytes.
const INFO_HEADER_SIZE: u32 = 40;

/// BI_BITFIELDS compression: three DWORD channel masks follow the header.
const BI_BITFIELDS: u32 = 3;

/// Parsed BITMAPINFOHEADER fields needed for offset computation.
#[derive(Debug, Clone, Copy)]
struct BitmapInfoHeader {
    width: i32,
    height: i32,
    bit_count: u16,
    compression: u32,
    colors_used: u32,
}

impl BitmapInfoHeader {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < INFO_HEADER_SIZE as usize {
            return Err(Error::InvalidDib(
                "deserializing BITMAPINFOHEADER: data invalid".to_string(),
            ));
        }

        let size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if size != INFO_HEADER_SIZE {
            return Err(Error::InvalidDib(
                "deserializing BITMAPINFOHEADER: data invalid".to_string(),
            ));
        }

        let header = Self {
            width: i32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            height: i32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            bit_count: u16::from_le_bytes([data[14], data[15]]),
            compression: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            colors_used: u32::from_le_bytes([data[32], data[33], data[34], data[35]]),
        };

        if header.width <= 0 || header.height == 0 {
            return Err(Error::InvalidDib(format!(
                "impossible dimensions {}x{}",
                header.width, header.height
            )));
        }

        Ok(header)
    }

    /// Bytes occupied by the color table, if any.
    fn palette_bytes(&self) -> u32 {
        if self.colors_used > 0 {
            self.colors_used * 4
        } else if self.bit_count <= 8 {
            (1u32 << self.bit_count) * 4
        } else {
            0
        }
    }

    /// Bytes occupied by the BI_BITFIELDS channel masks, if any.
    fn masks_bytes(&self) -> u32 {
        if self.compression == BI_BITFIELDS {
            12
        } else {
            0
        }
    }
}

/// Convert DIB data to a standalone BMP file.
///
/// Prepends a BITMAPFILEHEADER: `bfType` is the `BM` signature, `bfSize`
/// the total file length, `bfOffBits` the offset of the pixel data past
/// both headers and any palette or mask tables. The conversion is pure;
/// the input is not modified.
pub fn dib_to_bmp(dib: &[u8]) -> Result<Vec<u8>> {
    let header = BitmapInfoHeader::parse(dib)?;

    let file_size = u32::try_from(FILE_HEADER_SIZE as usize + dib.len())
        .map_err(|_| Error::InvalidDib("DIB too large".to_string()))?;
    let off_bits =
        FILE_HEADER_SIZE + INFO_HEADER_SIZE + header.palette_bytes() + header.masks_bytes();

    let mut bmp = BytesMut::with_capacity(file_size as usize);
    bmp.put_slice(b"BM");
    bmp.put_u32_le(file_size);
    bmp.put_u16_le(0); // bfReserved1
    bmp.put_u16_le(0); // bfReserved2
    bmp.put_u32_le(off_bits);
    bmp.put_slice(dib);

    Ok(bmp.to_vec())
}

//! Pluggable decompressors for the compression codes JFFS2 permits.
//!
//! Every decoder takes `(compressed_bytes, expected_uncompressed_length)`
//! and returns uncompressed bytes, or a [`crate::error::Error::Decompress`]
//! on format failure.

pub mod rtime;

use std::io::Read;

use crate::error::{Error, Result};

pub const COMPR_NONE: u8 = 0x00;
pub const COMPR_ZERO: u8 = 0x01;
pub const COMPR_RTIME: u8 = 0x02;
pub const COMPR_ZLIB: u8 = 0x06;
pub const COMPR_LZMA: u8 = 0x08;

// JFFS2's embedded LZMA: lc=0, lp=0, pb=0, dictionary sized for one NAND page.
const LZMA_LC: u8 = 0;
const LZMA_LP: u8 = 0;
const LZMA_PB: u8 = 0;
const LZMA_DICT_SIZE: u32 = 0x2000;

pub fn decompress(compr: u8, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    match compr {
        COMPR_NONE => Ok(compressed.to_vec()),
        COMPR_ZERO => Ok(vec![0u8; expected_len]),
        COMPR_ZLIB => decompress_zlib(compressed, expected_len),
        COMPR_RTIME => rtime::decompress(compressed, expected_len),
        COMPR_LZMA => decompress_lzma(compressed, expected_len),
        other => Err(Error::Decompress {
            compr: other,
            detail: "unsupported compression method".to_string(),
        }),
    }
}

fn decompress_zlib(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    let mut out = Vec::with_capacity(expected_len);
    decoder.read_to_end(&mut out).map_err(|e| Error::Decompress {
        compr: COMPR_ZLIB,
        detail: e.to_string(),
    })?;
    Ok(out)
}

/// JFFS2's LZMA payload is a raw LZMA1 bitstream with no 13-byte container
/// header. `lzma-rs` expects that header, so one is synthesized here with
/// the fixed properties and dictionary size JFFS2 uses, and the externally
/// known uncompressed length.
fn decompress_lzma(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let properties = (LZMA_PB * 5 + LZMA_LP) * 9 + LZMA_LC;

    let mut framed = Vec::with_capacity(13 + compressed.len());
    framed.push(properties);
    framed.extend_from_slice(&LZMA_DICT_SIZE.to_le_bytes());
    framed.extend_from_slice(&(expected_len as u64).to_le_bytes());
    framed.extend_from_slice(compressed);

    let mut out = Vec::with_capacity(expected_len);
    let mut cursor = std::io::Cursor::new(&framed);
    lzma_rs::lzma_decompress(&mut cursor, &mut out).map_err(|e| Error::Decompress {
        compr: COMPR_LZMA,
        detail: e.to_string(),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let out = decompress(COMPR_NONE, b"hello", 5).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn zero_ignores_input() {
        let out = decompress(COMPR_ZERO, b"garbage", 4).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn zlib_round_trip() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"aaaaaaaaaa").unwrap();
        let compressed = encoder.finish().unwrap();

        let out = decompress(COMPR_ZLIB, &compressed, 10).unwrap();
        assert_eq!(out, b"aaaaaaaaaa");
    }

    #[test]
    fn unknown_method_errors() {
        assert!(decompress(0x7F, b"", 0).is_err());
    }
}

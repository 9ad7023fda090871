//! JFFS2's RTIME compressor (decode direction only).
//!
//! A 256-entry position table, keyed by byte value, records where that
//! value was last emitted. Each step copies one literal then replays
//! `repeat` bytes starting at the table's recorded position; because the
//! source and destination indices both advance, overlapping ranges behave
//! like run-length expansion.

use crate::compress::COMPR_RTIME;
use crate::error::{Error, Result};

pub fn decompress(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut dst = Vec::with_capacity(expected_len);
    let mut positions = [0usize; 256];
    let mut pos = 0usize;

    let truncated = || Error::Decompress {
        compr: COMPR_RTIME,
        detail: "truncated RTIME stream".to_string(),
    };
    let overrun = || Error::Decompress {
        compr: COMPR_RTIME,
        detail: "RTIME stream overran expected length".to_string(),
    };

    while dst.len() < expected_len {
        let literal = *compressed.get(pos).ok_or_else(truncated)?;
        pos += 1;
        dst.push(literal);

        let repeat = *compressed.get(pos).ok_or_else(truncated)?;
        pos += 1;

        let backoff = positions[literal as usize];
        positions[literal as usize] = dst.len();

        let mut remaining = repeat;
        let mut src = backoff;
        while remaining != 0 {
            if dst.len() >= expected_len {
                return Err(overrun());
            }
            let byte = *dst.get(src).ok_or_else(overrun)?;
            dst.push(byte);
            src += 1;
            remaining -= 1;
        }
    }

    Ok(dst)
}

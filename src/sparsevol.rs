//! Binary sparse-volume payload, as uploaded for a split and returned by
//! sparse-volume reads.
//!
//! Layout:
//!
//! ```text
//! [0]      u8   encoding tag, ENCODING_BINARY
//! [1]      u8   dimensionality (3)
//! [2]      u8   run dimension (0 = X)
//! [3..12]       reserved
//! [12..16] u32  run count, LE
//! [16..]        run records, 16 bytes each
//! ```

use crate::codec::{RLE_RECORD_SIZE, read_u32_le, rle_pack, rle_read_records};
use crate::error::{Error, Result};
use crate::rle::Rles;
use std::io::Read;

pub const ENCODING_BINARY: u8 = 0x00;
pub const HEADER_SIZE: usize = 12;

/// Decode a payload into its runs, exactly as sent.
pub fn decode<R: Read>(mut r: R) -> Result<Rles> {
    let mut header = [0u8; HEADER_SIZE];
    r.read_exact(&mut header)
        .map_err(|e| Error::Decode(format!("sparse volume header unreadable: {e}")))?;
    if header[0] != ENCODING_BINARY {
        return Err(Error::UnknownEncoding(header[0]));
    }
    let num_spans = read_u32_le(&mut r)?;
    rle_read_records(&mut r, num_spans)
}

pub fn encode(rles: &Rles) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + 4 + rles.len() * RLE_RECORD_SIZE);
    out.push(ENCODING_BINARY);
    out.push(3);
    out.push(0);
    out.resize(HEADER_SIZE, 0);
    out.extend_from_slice(&(rles.len() as u32).to_le_bytes());
    for rle in rles {
        rle_pack(rle, &mut out);
    }
    out
}

use crate::error::{Error, Result};
use crate::rle::{Point3, Rle, Rles};
use std::io::Read;

/// Bytes per serialized run: x, y, z (i32 LE) then length (u32 LE).
pub const RLE_RECORD_SIZE: usize = 16;

pub fn rle_pack(rle: &Rle, out: &mut Vec<u8>) {
    out.extend_from_slice(&rle.start.x.to_le_bytes());
    out.extend_from_slice(&rle.start.y.to_le_bytes());
    out.extend_from_slice(&rle.start.z.to_le_bytes());
    out.extend_from_slice(&rle.length.to_le_bytes());
}

/// Decode one record, rejecting empty runs and runs past the i32 X range.
pub fn rle_unpack(rec: &[u8; RLE_RECORD_SIZE]) -> Result<Rle> {
    let word = |i: usize| {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&rec[i * 4..i * 4 + 4]);
        arr
    };
    let rle = Rle::new(
        Point3::new(
            i32::from_le_bytes(word(0)),
            i32::from_le_bytes(word(1)),
            i32::from_le_bytes(word(2)),
        ),
        u32::from_le_bytes(word(3)),
    );
    rle.check_bounds()?;
    Ok(rle)
}

/// Read exactly `count` run records from `r`.
pub fn rle_read_records<R: Read>(r: &mut R, count: u32) -> Result<Rles> {
    let mut out = Vec::with_capacity(count.min(1 << 16) as usize);
    let mut rec = [0u8; RLE_RECORD_SIZE];
    for i in 0..count {
        r.read_exact(&mut rec).map_err(|e| {
            Error::Decode(format!("run {i} of {count} unreadable: {e}"))
        })?;
        out.push(rle_unpack(&rec)?);
    }
    Ok(Rles::from(out))
}

pub fn read_u32_le<R: Read>(r: &mut R) -> Result<u32> {
    let mut arr = [0u8; 4];
    r.read_exact(&mut arr)
        .map_err(|e| Error::Decode(format!("run count unreadable: {e}")))?;
    Ok(u32::from_le_bytes(arr))
}

/// Encode a block's runs as stored: run count (u32 LE) then the records.
pub fn block_value_pack(rles: &Rles) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + rles.len() * RLE_RECORD_SIZE);
    out.extend_from_slice(&(rles.len() as u32).to_le_bytes());
    for rle in rles {
        rle_pack(rle, &mut out);
    }
    out
}

pub fn block_value_unpack(bytes: &[u8]) -> Result<Rles> {
    let mut r = bytes;
    let count = read_u32_le(&mut r)?;
    let expected = count as usize * RLE_RECORD_SIZE;
    if r.len() != expected {
        return Err(Error::Decode(format!(
            "block value holds {} record bytes, expected {expected} for {count} runs",
            r.len()
        )));
    }
    rle_read_records(&mut r, count)
}

use crate::block::{BLOCK_COORD_SIZE, BlockCoord};
use crate::error::{Error, Result};
use crate::Label;

/// Width of a `(label, block)` index key.
pub const INDEX_KEY_SIZE: usize = 8 + BLOCK_COORD_SIZE;

/// Key of one label's runs in one block: label (u64 BE) then the block coordinate.
pub fn new_index(label: Label, block: &BlockCoord) -> Vec<u8> {
    let mut out = Vec::with_capacity(INDEX_KEY_SIZE);
    out.extend_from_slice(&label.to_be_bytes());
    out.extend_from_slice(&block.to_bytes());
    out
}

pub fn decode_index(key: &[u8]) -> Result<(Label, BlockCoord)> {
    if key.len() != INDEX_KEY_SIZE {
        return Err(Error::BadKey(format!(
            "index key is {} bytes: {}",
            key.len(),
            hex::encode(key)
        )));
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&key[..8]);
    let block = BlockCoord::from_bytes(&key[8..])?;
    Ok((Label::from_be_bytes(arr), block))
}

/// Inclusive key bounds covering every block of `label`.
pub fn label_range(label: Label) -> (Vec<u8>, Vec<u8>) {
    let mut beg = label.to_be_bytes().to_vec();
    let mut end = beg.clone();
    beg.extend_from_slice(&[0x00; BLOCK_COORD_SIZE]);
    end.extend_from_slice(&[0xff; BLOCK_COORD_SIZE]);
    (beg, end)
}

/// Inclusive key bounds covering the blocks of `label` whose Z index lies in
/// `[zmin, zmax]`.
pub fn label_z_range(label: Label, zmin: i32, zmax: i32) -> (Vec<u8>, Vec<u8>) {
    let beg = BlockCoord::new(i32::MIN, i32::MIN, zmin);
    let end = BlockCoord::new(i32::MAX, i32::MAX, zmax);
    (new_index(label, &beg), new_index(label, &end))
}

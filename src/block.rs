use crate::error::{Error, Result};
use crate::rle::{Rle, Rles, X_LIMIT};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Encoded width of a [`BlockCoord`].
pub const BLOCK_COORD_SIZE: usize = 12;

/// Voxel dimensions of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSize {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockSize {
    pub fn new(x: i32, y: i32, z: i32) -> Result<Self> {
        if x <= 0 || y <= 0 || z <= 0 {
            return Err(Error::InvalidBlockSize(format!("{x}x{y}x{z}")));
        }
        Ok(Self { x, y, z })
    }

    pub fn cubic(n: i32) -> Result<Self> {
        Self::new(n, n, n)
    }

    /// Block containing voxel `(x, y, z)`.
    pub fn block_of(&self, x: i32, y: i32, z: i32) -> BlockCoord {
        BlockCoord::new(x.div_euclid(self.x), y.div_euclid(self.y), z.div_euclid(self.z))
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self { x: 32, y: 32, z: 32 }
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Index of a block in the block grid.
///
/// Orders by Z, then Y, then X, and [`BlockCoord::to_bytes`] preserves that
/// order byte-lexicographically so key range scans visit blocks in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockCoord {
    pub const MIN: BlockCoord = BlockCoord::new(i32::MIN, i32::MIN, i32::MIN);
    pub const MAX: BlockCoord = BlockCoord::new(i32::MAX, i32::MAX, i32::MAX);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_COORD_SIZE] {
        let mut out = [0u8; BLOCK_COORD_SIZE];
        for (i, v) in [self.z, self.y, self.x].into_iter().enumerate() {
            let flipped = (v as u32) ^ 0x8000_0000;
            out[i * 4..i * 4 + 4].copy_from_slice(&flipped.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BLOCK_COORD_SIZE {
            return Err(Error::BadKey(format!(
                "block coordinate is {} bytes: {}",
                bytes.len(),
                hex::encode(bytes)
            )));
        }
        let word = |i: usize| {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            (u32::from_be_bytes(arr) ^ 0x8000_0000) as i32
        };
        Ok(Self::new(word(2), word(1), word(0)))
    }
}

impl Ord for BlockCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.z, self.y, self.x).cmp(&(other.z, other.y, other.x))
    }
}

impl PartialOrd for BlockCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Runs of one label grouped by block, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRles(BTreeMap<BlockCoord, Rles>);

impl BlockRles {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, block: &BlockCoord) -> Option<&Rles> {
        self.0.get(block)
    }

    pub fn insert(&mut self, block: BlockCoord, rles: Rles) -> Option<Rles> {
        self.0.insert(block, rles)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockCoord, &Rles)> {
        self.0.iter()
    }

    /// Folds `rles` into the entry for `block`, creating it if absent.
    pub fn union_into(&mut self, block: BlockCoord, rles: &Rles) {
        match self.0.get_mut(&block) {
            Some(existing) => existing.add(rles),
            None => {
                self.0.insert(block, rles.normalized());
            }
        }
    }

    /// Block coordinates in ascending key order.
    pub fn sorted_keys(&self) -> Vec<BlockCoord> {
        self.0.keys().copied().collect()
    }

    pub fn num_voxels(&self) -> u64 {
        self.0.values().map(Rles::num_voxels).sum()
    }

    pub fn num_runs(&self) -> usize {
        self.0.values().map(Rles::len).sum()
    }

    /// All runs of all blocks, in block order.
    pub fn flatten(&self) -> Rles {
        self.0.values().flat_map(|r| r.iter().copied()).collect()
    }
}

impl Rles {
    /// Cut runs at block boundaries and group them by block.
    ///
    /// Every run in the result lies inside one block and each block's list is
    /// sorted and coalesced. Voxels at or past [`X_LIMIT`] are dropped; callers
    /// reject such runs with [`Rles::check_bounds`] first.
    pub fn partition(&self, size: BlockSize) -> BlockRles {
        let mut blocks: BTreeMap<BlockCoord, Rles> = BTreeMap::new();
        for rle in self {
            let (y, z) = (rle.start.y, rle.start.z);
            let end = rle.end_x().min(X_LIMIT);
            let mut x = rle.start.x as i64;
            while x < end {
                let block = size.block_of(x as i32, y, z);
                let block_end = (block.x as i64 + 1) * size.x as i64;
                let seg_end = end.min(block_end);
                blocks
                    .entry(block)
                    .or_default()
                    .push(Rle::at(x as i32, y, z, (seg_end - x) as u32));
                x = seg_end;
            }
        }
        BlockRles(
            blocks
                .into_iter()
                .map(|(blk, rles)| (blk, rles.normalized()))
                .collect(),
        )
    }
}

impl FromIterator<(BlockCoord, Rles)> for BlockRles {
    fn from_iter<I: IntoIterator<Item = (BlockCoord, Rles)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

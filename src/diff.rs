use crate::error::{Error, Result};
use crate::rle::{Rle, Rles};

/// What is left of a block after subtracting a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDiff {
    /// The split took every voxel of the block.
    Duplicate,
    /// Sorted runs left over.
    Remaining(Rles),
}

impl BlockDiff {
    pub fn is_full_duplicate(&self) -> bool {
        matches!(self, BlockDiff::Duplicate)
    }
}

/// Subtract the `split` runs from the `orig` runs of one block.
///
/// `split` is expected to be a subset of `orig`. A split run that meets no
/// remaining original run is an error; partial overlaps are not detected.
pub fn diff_block(split: &[Rle], orig: &[Rle]) -> Result<BlockDiff> {
    let mut srles = split.to_vec();
    srles.sort_unstable();
    let mut remaining = orig.to_vec();
    remaining.sort_unstable();

    // Both lists are sorted, so the cursor into `remaining` only moves forward.
    let mut pos = 0;
    for cut in &srles {
        loop {
            let Some(cur) = remaining.get(pos) else {
                return Err(Error::SplitNotContained { run: *cut });
            };
            match cur.excise(cut) {
                None => pos += 1,
                Some(frags) => {
                    remaining.splice(pos..=pos, frags);
                    break;
                }
            }
        }
    }

    if remaining.is_empty() {
        Ok(BlockDiff::Duplicate)
    } else {
        Ok(BlockDiff::Remaining(Rles::from(remaining)))
    }
}

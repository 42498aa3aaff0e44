use crate::codec::{block_value_pack, block_value_unpack};
use crate::diff::{BlockDiff, diff_block};
use crate::error::{Error, Result};
use crate::events::{Delta, EventKind};
use crate::keys;
use crate::labelvol::LabelVol;
use crate::sparsevol;
use crate::store::Batch;
use crate::{Label, VersionId};
use std::io::Read;
use std::sync::Arc;

impl LabelVol {
    /// Move the voxels of a binary sparse volume out of `from_label` into a
    /// newly allocated label, which is returned.
    ///
    /// The sparse volume must be a subset of `from_label`; callers should send
    /// the smaller side of a split.
    ///
    /// Emits, in order: `SplitStart`, `SplitLabel`, `ChangeSize` new for the
    /// new label, `ChangeSize` modify for `from_label`, `SplitEnd`.
    ///
    /// A malformed or empty payload fails before anything is written. Later
    /// failures leave the new label's runs in place: an error while reducing
    /// `from_label` means some voxels may belong to both labels.
    pub fn split_labels<R: Read>(&self, v: VersionId, from_label: Label, r: R) -> Result<Label> {
        let batcher = self.batcher()?;
        let ctx = self.ctx(v);

        let split = sparsevol::decode(r)?.normalized();
        if split.is_empty() {
            return Err(Error::EmptySplit);
        }

        let _dirty = self.dirty().guard_label(&ctx, from_label);

        let to_label = self.new_label(&ctx)?;
        tracing::debug!(
            %ctx,
            from_label,
            to_label,
            runs = split.len(),
            dirty = self.dirty().num_dirty(&ctx),
            "splitting label"
        );

        self.notify(
            v,
            EventKind::SplitStart,
            Delta::SplitStart {
                old_label: from_label,
                new_label: to_label,
            },
        )?;

        let to_label_size = split.num_voxels();
        let splitmap = Arc::new(split.partition(self.block_size()));
        let splitblks = Arc::new(splitmap.sorted_keys());

        self.notify(
            v,
            EventKind::SplitLabel,
            Delta::Split {
                old_label: from_label,
                new_label: to_label,
                split: splitmap.clone(),
                sorted_blocks: splitblks.clone(),
            },
        )?;

        self.write_label_vol(v, to_label, &splitblks, &splitmap)?;

        // Blocks outside the split's Z extent can't be touched by it.
        let (Some(first), Some(last)) = (splitblks.first(), splitblks.last()) else {
            return Err(Error::EmptySplit);
        };
        let (beg, end) = keys::label_z_range(from_label, first.z, last.z);

        // Walk the original blocks and the split blocks together, both in key
        // order. Matching blocks are reduced, or deleted when fully taken.
        let mut batch = Batch::new(batcher, &ctx);
        let mut pos = 0usize;
        self.store().process_range(&ctx, &beg, &end, &mut |k, val| {
            let (_, origblk) = keys::decode_index(k)?;
            if pos < splitblks.len() && splitblks[pos] < origblk {
                return Err(Error::SplitBlockMissing {
                    label: from_label,
                    block: splitblks[pos],
                });
            }
            if pos >= splitblks.len() || splitblks[pos] != origblk {
                return Ok(());
            }

            let orig = block_value_unpack(val).map_err(|e| {
                Error::Decode(format!("label {from_label} block {origblk}: {e}"))
            })?;
            let Some(split_rles) = splitmap.get(&origblk) else {
                return Ok(());
            };
            let diff = diff_block(split_rles.as_slice(), orig.as_slice()).inspect_err(|e| {
                tracing::error!(%ctx, from_label, block = %origblk, error = %e, "bad split");
            })?;
            match diff {
                BlockDiff::Duplicate => batch.delete(k.to_vec()),
                BlockDiff::Remaining(rles) => batch.put(k.to_vec(), block_value_pack(&rles)),
            }
            pos += 1;
            Ok(())
        })?;

        if let Some(block) = splitblks.get(pos) {
            return Err(Error::SplitBlockMissing {
                label: from_label,
                block: *block,
            });
        }

        tracing::debug!(%ctx, from_label, ops = batch.len(), "reducing split source");
        batch.commit().inspect_err(|e| {
            tracing::error!(%ctx, label = from_label, error = %e, "batch PUT during split");
        })?;

        self.notify(
            v,
            EventKind::ChangeSize,
            Delta::NewSize {
                label: to_label,
                size: to_label_size,
            },
        )?;
        self.notify(
            v,
            EventKind::ChangeSize,
            Delta::ModSize {
                label: from_label,
                size_change: -(to_label_size as i64),
            },
        )?;
        self.notify(
            v,
            EventKind::SplitEnd,
            Delta::SplitEnd {
                old_label: from_label,
                new_label: to_label,
            },
        )?;

        tracing::debug!(%ctx, from_label, to_label, voxels = to_label_size, "split complete");
        Ok(to_label)
    }
}

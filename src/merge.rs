use crate::block::BlockCoord;
use crate::codec::block_value_pack;
use crate::error::Result;
use crate::events::{Delta, EventKind};
use crate::keys;
use crate::labelvol::LabelVol;
use crate::store::Batch;
use crate::{Label, VersionId};
use std::collections::BTreeSet;

/// Fold every label in `merged` into `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOp {
    pub target: Label,
    pub merged: BTreeSet<Label>,
}

impl MergeOp {
    pub fn new(target: Label, merged: impl IntoIterator<Item = Label>) -> Self {
        Self {
            target,
            merged: merged.into_iter().collect(),
        }
    }

    /// Target first, then the merged labels.
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        std::iter::once(self.target).chain(self.merged.iter().copied())
    }
}

impl LabelVol {
    /// Merge the labels of `op` into its target.
    ///
    /// Merges must already be flattened: no label in `op.merged` may itself be
    /// the target of another pending merge, and `op.merged` must not contain
    /// `op.target`.
    ///
    /// Emits, in order: `MergeStart`, one `ChangeSize` delete per merged
    /// label, `MergeBlock`, `ChangeSize` replace for the target, `MergeEnd`.
    ///
    /// Not atomic. Merged labels are deleted from the store before the
    /// target's new runs are committed, so an error part way through can leave
    /// their voxels in neither label.
    pub fn merge_labels(&self, v: VersionId, op: &MergeOp) -> Result<()> {
        let batcher = self.batcher()?;
        let ctx = self.ctx(v);

        tracing::debug!(%ctx, to_label = op.target, merged = ?op.merged, "merging labels");

        self.notify(v, EventKind::MergeStart, Delta::MergeStart(op.clone()))?;

        let _dirty = self.dirty().guard_merge(&ctx, op);
        tracing::trace!(%ctx, dirty = self.dirty().num_dirty(&ctx), "labels marked dirty");

        let mut blocks_changed: BTreeSet<BlockCoord> = BTreeSet::new();

        let to_label = op.target;
        let mut to_label_rles = self.get_label_rles(v, to_label)?;
        let to_label_size = to_label_rles.num_voxels();

        let mut added_voxels = 0u64;
        for &from_label in &op.merged {
            tracing::trace!(%ctx, from_label, to_label, "merging label");

            let from_label_rles = self.get_label_rles(v, from_label)?;
            let from_label_size = from_label_rles.num_voxels();
            added_voxels += from_label_size;

            self.notify(
                v,
                EventKind::ChangeSize,
                Delta::DeleteSize {
                    label: from_label,
                    old_size: from_label_size,
                    old_known: true,
                },
            )?;

            for (blk, from_rles) in from_label_rles.iter() {
                blocks_changed.insert(*blk);
                to_label_rles.union_into(*blk, from_rles);
            }

            let (beg, end) = keys::label_range(from_label);
            self.store().delete_range(&ctx, &beg, &end).inspect_err(|e| {
                tracing::error!(%ctx, from_label, error = %e, "can't delete label RLEs");
            })?;
        }

        self.notify(
            v,
            EventKind::MergeBlock,
            Delta::MergeBlock {
                op: op.clone(),
                blocks: blocks_changed.clone(),
            },
        )?;

        let mut batch = Batch::new(batcher, &ctx);
        for blk in &blocks_changed {
            if let Some(rles) = to_label_rles.get(blk) {
                batch.put(keys::new_index(to_label, blk), block_value_pack(rles));
            }
        }
        tracing::trace!(%ctx, to_label, ops = batch.len(), "writing merged blocks");
        batch.commit().inspect_err(|e| {
            tracing::error!(%ctx, label = to_label, error = %e, "error on updating RLEs");
        })?;

        self.notify(
            v,
            EventKind::ChangeSize,
            Delta::ReplaceSize {
                label: to_label,
                old_size: to_label_size,
                new_size: to_label_size + added_voxels,
            },
        )?;

        self.notify(v, EventKind::MergeEnd, Delta::MergeEnd(op.clone()))?;

        tracing::debug!(
            %ctx,
            to_label,
            blocks = blocks_changed.len(),
            added_voxels,
            "merge complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_lists_target_then_merged() {
        let op = MergeOp::new(4, [9, 2, 9]);
        assert_eq!(op.labels().collect::<Vec<_>>(), vec![4, 2, 9]);
    }
}

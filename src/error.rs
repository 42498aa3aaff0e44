use crate::block::BlockCoord;
use crate::events::EventKind;
use crate::rle::Rle;
use crate::Label;
use thiserror::Error;

/// Errors returned by label-volume reads, merges and splits.
///
/// Once a merge or split has started mutating the store, an error means the
/// volume may be partially updated. Nothing is rolled back.
#[derive(Debug, Error)]
pub enum Error {
    #[error("data instance {0:?} requires a batch-enabled store")]
    NotBatcher(String),

    #[error("sparse vol for split has unknown encoding format: {0:#04x}")]
    UnknownEncoding(u8),

    #[error("malformed RLE data: {0}")]
    Decode(String),

    #[error("split sparse volume has no runs")]
    EmptySplit,

    #[error("split is not contained within single label (run {run})")]
    SplitNotContained { run: Rle },

    #[error("split block {block} has no voxels of label {label}")]
    SplitBlockMissing { label: Label, block: BlockCoord },

    #[error("malformed label block key: {0}")]
    BadKey(String),

    #[error("label {0} is being modified by a merge or split")]
    LabelDirty(Label),

    #[error("invalid block size {0}")]
    InvalidBlockSize(String),

    #[error("subscriber failed on {kind:?}: {reason}")]
    Subscriber { kind: EventKind, reason: String },

    #[error(transparent)]
    Redb(#[from] redb::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// redb reports each phase with its own error type; all of them fold into redb::Error.
macro_rules! from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(e: $ty) -> Self {
                    Error::Redb(redb::Error::from(e))
                }
            }
        )*
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

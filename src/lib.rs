//! Merge and split of label volumes stored as per-block run-length encoded
//! sparse volumes in a versioned key-value store.
//!
//! [`LabelVol`] is the entry point. It owns no global state: the store, label
//! allocator, [`EventBus`] and [`DirtyLabels`] registry are handed to it.

pub mod block;
pub mod codec;
pub mod config;
pub mod db;
pub mod diff;
pub mod dirty;
pub mod error;
pub mod events;
pub mod keys;
pub mod labelvol;
pub mod memory;
pub mod merge;
pub mod rle;
pub mod schema;
pub mod sparsevol;
pub mod split;
pub mod stats;
pub mod store;
pub mod util;

/// Identifier of a segmented body. Labels are never reused.
pub type Label = u64;

/// Node of the version graph that reads and writes are scoped to.
pub type VersionId = u32;

pub use block::{BlockCoord, BlockRles, BlockSize};
pub use config::InstanceConfig;
pub use diff::{BlockDiff, diff_block};
pub use dirty::{DirtyGuard, DirtyLabels};
pub use error::{Error, Result};
pub use events::{ChannelSubscriber, Delta, EventBus, EventKind, Subscriber, SyncEvent, SyncMessage};
pub use labelvol::LabelVol;
pub use memory::MemoryStore;
pub use merge::MergeOp;
pub use rle::{Point3, Rle, Rles};
pub use store::{Batch, BatchOp, KeyValueBatcher, KeyValueStore, LabelAllocator, VersionedContext};

use crate::block::BlockSize;

pub const DEFAULT_INSTANCE: &str = "labels";

/// Settings of one label-volume data instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Data instance name; scopes keys, dirty marks and sync events.
    pub name: String,
    pub block_size: BlockSize,
}

impl InstanceConfig {
    pub fn new(name: impl Into<String>, block_size: BlockSize) -> Self {
        Self {
            name: name.into(),
            block_size,
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INSTANCE, BlockSize::default())
    }
}

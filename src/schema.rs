use redb::TableDefinition;

// context prefix + (label, block) index key -> block value (run count + records)
pub const LABEL_BLOCKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("label_blocks");

pub const KV_U64: TableDefinition<&str, u64> = TableDefinition::new("kv_u64");

/// Per-instance label counter lives under this prefix in `KV_U64`.
pub const KEY_NEXT_LABEL_PREFIX: &str = "next_label/";

pub fn next_label_key(instance: &str) -> String {
    format!("{KEY_NEXT_LABEL_PREFIX}{instance}")
}

use crate::error::{Error, Result};
use crate::schema;
use crate::store::{
    BatchOp, ChunkProcessor, KeyValueBatcher, KeyValueStore, LabelAllocator, VersionedContext,
};
use crate::Label;
use fs2::FileExt;
use redb::{Database, ReadableTable, ReadableTableMetadata};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DB_FILE: &str = "labelvol.redb";
pub const META_FILE: &str = "meta.toml";
pub const LOCK_FILE: &str = "LOCK";

/// Persistent store backed by a single redb file.
pub struct DbHandle {
    pub db_dir: PathBuf,
    pub db: Database,
    // Keep the lock file open for the lifetime of DbHandle, so the lock is held.
    _lock_file: File,
}

/// Open (initializing if needed) a labelvol database directory and take its
/// exclusive lock.
pub fn open(db_dir: &Path) -> Result<DbHandle> {
    std::fs::create_dir_all(db_dir)?;
    let lock_file = open_and_lock(db_dir)?;

    let meta_path = db_dir.join(META_FILE);
    if !meta_path.exists() {
        write_meta(&meta_path)?;
    }

    let db = Database::create(db_dir.join(DB_FILE))?;
    let handle = DbHandle {
        db_dir: db_dir.to_path_buf(),
        db,
        _lock_file: lock_file,
    };
    handle.ensure_schema()?;

    tracing::debug!(db_dir = %db_dir.display(), "database opened");
    Ok(handle)
}

fn full_key(ctx: &VersionedContext, key: &[u8]) -> Vec<u8> {
    let mut out = ctx.key_prefix();
    out.extend_from_slice(key);
    out
}

impl DbHandle {
    pub fn ensure_schema(&self) -> Result<()> {
        let tx = self.db.begin_write()?;
        {
            let _ = tx.open_table(schema::LABEL_BLOCKS)?;
            let _ = tx.open_table(schema::KV_U64)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of block entries stored across all instances and versions.
    pub fn count_blocks(&self) -> Result<u64> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(schema::LABEL_BLOCKS)?;
        Ok(table.len()?)
    }
}

impl KeyValueStore for DbHandle {
    fn get(&self, ctx: &VersionedContext, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(schema::LABEL_BLOCKS)?;
        let full = full_key(ctx, key);
        Ok(table.get(full.as_slice())?.map(|v| v.value().to_vec()))
    }

    fn process_range(
        &self,
        ctx: &VersionedContext,
        beg: &[u8],
        end: &[u8],
        f: &mut ChunkProcessor<'_>,
    ) -> Result<()> {
        let prefix_len = ctx.key_prefix().len();
        let (beg, end) = (full_key(ctx, beg), full_key(ctx, end));

        let tx = self.db.begin_read()?;
        let table = tx.open_table(schema::LABEL_BLOCKS)?;
        for entry in table.range::<&[u8]>(beg.as_slice()..=end.as_slice())? {
            let (k, v) = entry?;
            f(&k.value()[prefix_len..], v.value())?;
        }
        Ok(())
    }

    fn delete_range(&self, ctx: &VersionedContext, beg: &[u8], end: &[u8]) -> Result<()> {
        let (beg, end) = (full_key(ctx, beg), full_key(ctx, end));

        let tx = self.db.begin_write()?;
        let mut deleted = 0usize;
        {
            let mut table = tx.open_table(schema::LABEL_BLOCKS)?;
            let doomed: Vec<Vec<u8>> = {
                let mut keys = Vec::new();
                for entry in table.range::<&[u8]>(beg.as_slice()..=end.as_slice())? {
                    let (k, _) = entry?;
                    keys.push(k.value().to_vec());
                }
                keys
            };
            for k in &doomed {
                table.remove(k.as_slice())?;
                deleted += 1;
            }
        }
        tx.commit()?;

        tracing::trace!(%ctx, deleted, "delete_range");
        Ok(())
    }

    fn batcher(&self) -> Option<&dyn KeyValueBatcher> {
        Some(self)
    }
}

impl KeyValueBatcher for DbHandle {
    fn apply_batch(&self, ctx: &VersionedContext, ops: &[BatchOp]) -> Result<()> {
        tracing::trace!(%ctx, batch_size = ops.len(), "writing batch");

        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(schema::LABEL_BLOCKS)?;
            for op in ops {
                match op {
                    BatchOp::Put { key, value } => {
                        let full = full_key(ctx, key);
                        table.insert(full.as_slice(), value.as_slice())?;
                    }
                    BatchOp::Delete { key } => {
                        let full = full_key(ctx, key);
                        table.remove(full.as_slice())?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl LabelAllocator for DbHandle {
    fn new_label(&self, ctx: &VersionedContext) -> Result<Label> {
        let key = schema::next_label_key(&ctx.instance);
        let tx = self.db.begin_write()?;
        let label = {
            let mut kv = tx.open_table(schema::KV_U64)?;
            let next: u64 = kv.get(key.as_str())?.map(|v| v.value()).unwrap_or(1);
            kv.insert(key.as_str(), next + 1)?;
            next
        };
        tx.commit()?;
        Ok(label)
    }

    fn bump_past(&self, ctx: &VersionedContext, label: Label) -> Result<()> {
        let key = schema::next_label_key(&ctx.instance);
        let tx = self.db.begin_write()?;
        {
            let mut kv = tx.open_table(schema::KV_U64)?;
            // Copy the counter out of the AccessGuard so it drops before insert.
            let next: u64 = kv.get(key.as_str())?.map(|v| v.value()).unwrap_or(1);
            if next <= label {
                kv.insert(key.as_str(), label.saturating_add(1))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn open_and_lock(db_dir: &Path) -> Result<File> {
    let lock_path = db_dir.join(LOCK_FILE);
    let f = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)?;

    // Exclusive lock: one writer process at a time.
    f.try_lock_exclusive().map_err(|e| {
        Error::Store(format!("database is locked (in use?): {}: {e}", db_dir.display()))
    })?;

    Ok(f)
}

fn write_meta(meta_path: &Path) -> Result<()> {
    let mut f = File::create(meta_path)?;

    let contents = r#"# labelvol database metadata
format = 1
app = "labelvol"
db_kind = "redb"
block_value = "u32_count_rle16"
"#;

    f.write_all(contents.as_bytes())?;
    f.sync_all()?;
    Ok(())
}

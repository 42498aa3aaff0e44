use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use labelvol::util::parse_block_size;
use labelvol::{
    BlockSize, DirtyLabels, EventBus, InstanceConfig, Label, LabelVol, MergeOp, Subscriber,
    SyncEvent, SyncMessage, VersionId,
};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

mod dbpath;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "labelvol")]
#[command(version, about = "Merge and split labels of a block-partitioned RLE label volume")]
struct Cli {
    /// Database name (no slashes) or path to a database directory.
    ///
    /// If it contains no path separators, it is treated as a name and placed under
    /// the default labelvol data directory (platform-specific).
    #[arg(long, default_value = "default")]
    db: String,

    /// Data instance name
    #[arg(long, default_value = labelvol::config::DEFAULT_INSTANCE)]
    instance: String,

    /// Block size: "32" for cubic blocks or "x,y,z"
    #[arg(long, default_value = "32", value_parser = parse_block_size)]
    block_size: BlockSize,

    /// Increase logging verbosity (use together with RUST_LOG for fine control).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace a label's voxels with a binary sparse volume
    Put {
        label: Label,
        /// Binary sparse volume file
        payload: PathBuf,
        #[arg(long, default_value_t = 1)]
        version: VersionId,
    },

    /// Write a label's voxels as a binary sparse volume
    Get {
        label: Label,
        /// Output file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        version: VersionId,
    },

    /// Merge labels into a target label
    Merge {
        #[arg(long)]
        target: Label,
        /// Comma-separated labels to fold into the target
        #[arg(long, value_delimiter = ',', required = true)]
        merged: Vec<Label>,
        #[arg(long, default_value_t = 1)]
        version: VersionId,
    },

    /// Move a sparse volume out of a label into a new label
    Split {
        label: Label,
        /// Binary sparse volume file; must be a subset of the label
        payload: PathBuf,
        #[arg(long, default_value_t = 1)]
        version: VersionId,
    },

    /// Print voxel, run and block counts of a label
    Size {
        label: Label,
        #[arg(long, default_value_t = 1)]
        version: VersionId,
    },

    /// Print basic DB info
    DbInfo,
}

/// Logs every sync message; stands in for derived indices in the CLI.
struct TraceSubscriber;

impl Subscriber for TraceSubscriber {
    fn handle(&self, evt: &SyncEvent, msg: &SyncMessage) -> labelvol::Result<()> {
        tracing::debug!(instance = %evt.instance, kind = ?evt.kind, version = msg.version, delta = ?msg.delta, "sync");
        Ok(())
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let db_dir = dbpath::resolve_db_dir(&cli.db)
        .with_context(|| format!("Failed to resolve --db {}", cli.db))?;
    dbpath::ensure_db_dir_is_valid_or_empty(&db_dir)?;

    let dbh = labelvol::db::open(&db_dir)
        .with_context(|| format!("Failed to open database in {}", db_dir.display()))?;
    let dbh = Arc::new(dbh);

    let bus = Arc::new(EventBus::new());
    bus.subscribe_all(&cli.instance, Arc::new(TraceSubscriber));

    let config = InstanceConfig::new(cli.instance.clone(), cli.block_size);
    let vol = LabelVol::with_store(config, dbh.clone(), bus, Arc::new(DirtyLabels::new()));

    match cli.cmd {
        Command::Put {
            label,
            payload,
            version,
        } => {
            let f = File::open(&payload)
                .with_context(|| format!("Failed to open {}", payload.display()))?;
            let rles = labelvol::sparsevol::decode(BufReader::new(f))
                .with_context(|| format!("Failed to decode {}", payload.display()))?;
            vol.put_sparse_vol(version, label, &rles)
                .with_context(|| format!("Failed to store label {label}"))?;
            tracing::info!(label, version, runs = rles.len(), "label stored");
            Ok(())
        }

        Command::Get {
            label,
            out,
            version,
        } => {
            let rles = vol.get_sparse_vol(version, label)?;
            if rles.is_empty() {
                return Err(anyhow!("label {label} has no voxels at version {version}"));
            }
            let bytes = labelvol::sparsevol::encode(&rles);
            match out {
                Some(path) => std::fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout().write_all(&bytes)?,
            }
            Ok(())
        }

        Command::Merge {
            target,
            merged,
            version,
        } => {
            if merged.contains(&target) {
                return Err(anyhow!("target {target} is also listed in --merged"));
            }
            let op = MergeOp::new(target, merged);
            vol.merge_labels(version, &op)
                .with_context(|| format!("Merge into label {target} failed"))?;
            tracing::info!(to_label = target, merged = ?op.merged, version, "merge complete");
            Ok(())
        }

        Command::Split {
            label,
            payload,
            version,
        } => {
            let f = File::open(&payload)
                .with_context(|| format!("Failed to open {}", payload.display()))?;
            let new_label = vol
                .split_labels(version, label, BufReader::new(f))
                .with_context(|| format!("Split of label {label} failed"))?;
            println!("{new_label}");
            Ok(())
        }

        Command::Size { label, version } => {
            let s = labelvol::stats::compute(&vol, version, label)?;
            labelvol::stats::print(&s);
            Ok(())
        }

        Command::DbInfo => {
            println!("DB directory: {}", dbh.db_dir.display());
            println!("Instance:     {}", vol.name());
            println!("Block size:   {}", vol.block_size());
            println!("Block keys:   {}", dbh.count_blocks()?);
            Ok(())
        }
    }
}

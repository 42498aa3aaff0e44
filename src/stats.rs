use crate::block::BlockRles;
use crate::error::Result;
use crate::labelvol::LabelVol;
use crate::{Label, VersionId};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LabelStats {
    pub label: Label,
    pub voxels: u64,
    pub runs: u64,
    pub blocks: u64,
}

impl LabelStats {
    pub fn from_blocks(label: Label, blocks: &BlockRles) -> Self {
        Self {
            label,
            voxels: blocks.num_voxels(),
            runs: blocks.num_runs() as u64,
            blocks: blocks.len() as u64,
        }
    }
}

pub fn compute(vol: &LabelVol, v: VersionId, label: Label) -> Result<LabelStats> {
    let blocks = vol.get_label_rles(v, label)?;
    Ok(LabelStats::from_blocks(label, &blocks))
}

pub fn print(s: &LabelStats) {
    println!("Label:        {}", s.label);
    println!("Voxels:       {}", format_count(s.voxels));
    println!("Runs:         {}", s.runs);
    println!("Blocks:       {}", s.blocks);
}

// Thousands separators for large voxel counts
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

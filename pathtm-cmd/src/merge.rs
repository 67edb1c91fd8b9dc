use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use pathtm::merge::{extract_offset, merge_files};

pub fn merge(inputs: &[PathBuf], output: &Path, clobber: bool) -> Result<()> {
    if inputs.is_empty() {
        bail!("no inputs provided");
    }
    if !clobber && output.exists() {
        bail!("{output:?} exists; use --clobber");
    }
    info!("merging {inputs:?} to {output:?}");

    let dest = File::create(output)
        .with_context(|| format!("failed to create output {output:?}"))?;
    merge_files(inputs, BufWriter::new(dest), extract_offset)
        .with_context(|| format!("merging {} inputs", inputs.len()))?;
    Ok(())
}

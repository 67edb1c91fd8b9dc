use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hifitime::Duration;

use pathtm::archive::{browse, ArchiveBuilder};
use pathtm::decoder::Decoder;
use pathtm::filter::WithApid;
use pathtm::take::Take;

pub fn take(
    datadir: &Path,
    paths: &[PathBuf],
    interval: Duration,
    apid: Option<u16>,
    format: &str,
    prefix: Option<String>,
    wall_clock: bool,
) -> Result<()> {
    let mut builder = ArchiveBuilder::new(datadir, format).context("parsing layout format")?;
    if let Some(prefix) = prefix {
        builder = builder.with_prefix(&prefix);
    }

    let reader = browse(paths, true).context("browsing archive")?;
    let mut decoder = Decoder::with_filter(reader, WithApid(apid));
    let mut take = Take::new(builder, interval)
        .with_apid(apid)
        .with_wall_clock(wall_clock);

    while let Some(packet) = decoder.decode(true)? {
        take.add(&packet)?;
    }
    let summary = take.finish()?;
    println!(
        "{} packets written ({} skipped, {}KB)",
        summary.count,
        summary.skipped,
        summary.size >> 10
    );
    Ok(())
}

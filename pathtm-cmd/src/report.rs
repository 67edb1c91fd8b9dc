use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use hifitime::{Duration, Epoch};
use serde::Serialize;

use pathtm::archive::browse;
use pathtm::decoder::Decoder;
use pathtm::filter::WithApid;
use pathtm::gap::{count_packets, CountBy, CountKey, GapScan, Tally};
use pathtm::Error;

use crate::render::{format_size, format_time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum By {
    Apid,
    Sid,
}

pub fn diff(
    paths: &[PathBuf],
    apid: Option<u16>,
    csv: bool,
    duration: Option<Duration>,
) -> Result<()> {
    let reader = browse(paths, true).context("browsing archive")?;
    let mut decoder = Decoder::with_filter(reader, WithApid(apid));
    let mut scan = GapScan::new();
    if let Some(duration) = duration {
        scan = scan.with_min_duration(duration);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    loop {
        let packet = match decoder.decode(false) {
            Ok(Some(packet)) => packet,
            Ok(None) | Err(Error::Invalid) => break,
            Err(err) => return Err(err.into()),
        };
        if let Some(gap) = scan.add(&packet) {
            let from = format_time(gap.last_time);
            let to = format_time(gap.time);
            if csv {
                writeln!(
                    out,
                    "{},{from},{to},{},{},{},{}",
                    gap.apid, gap.last_sequence, gap.sequence, gap.missing, gap.dt
                )?;
            } else {
                writeln!(
                    out,
                    "{:>4} | {from} | {to} | {:>6} | {:>6} | {:>6} | {:>12}",
                    gap.apid, gap.last_sequence, gap.sequence, gap.missing, gap.dt
                )?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CountRow {
    apid: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket: Option<Epoch>,
    count: u64,
    missing: u64,
    size: u64,
    first: u16,
    first_time: Option<Epoch>,
    last: u16,
    last_time: Option<Epoch>,
}

impl From<(CountKey, Tally)> for CountRow {
    fn from((key, tally): (CountKey, Tally)) -> Self {
        CountRow {
            apid: key.apid,
            sid: key.sid,
            bucket: key.bucket,
            count: tally.count,
            missing: tally.missing,
            size: tally.size,
            first: tally.first,
            first_time: tally.first_time,
            last: tally.last,
            last_time: tally.last_time,
        }
    }
}

pub fn count(
    paths: &[PathBuf],
    apid: Option<u16>,
    by: By,
    interval: Option<Duration>,
    csv: bool,
    json: bool,
) -> Result<()> {
    let reader = browse(paths, true).context("browsing archive")?;
    let mut decoder = Decoder::with_filter(reader, WithApid(apid));
    let count_by = match by {
        By::Apid => CountBy::Apid,
        By::Sid => CountBy::Source,
    };
    let stats = count_packets(&mut decoder, count_by, interval)?;
    let rows: Vec<CountRow> = stats.into_iter().map(CountRow::from).collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &rows).context("serializing counts")?;
        writeln!(out)?;
        return Ok(());
    }
    for row in rows {
        write_count_row(&mut out, &row, by, csv)?;
    }
    Ok(())
}

fn write_count_row<W: Write>(out: &mut W, row: &CountRow, by: By, csv: bool) -> Result<()> {
    let first_time = row.first_time.map(format_time).unwrap_or_default();
    let last_time = row.last_time.map(format_time).unwrap_or_default();
    if csv {
        let mut fields = vec![row.apid.to_string()];
        if by == By::Sid {
            fields.push(row.sid.map(|sid| sid.to_string()).unwrap_or_default());
        }
        fields.push(row.count.to_string());
        if by == By::Apid {
            fields.push(row.missing.to_string());
        }
        fields.extend([
            row.size.to_string(),
            row.first.to_string(),
            first_time,
            row.last.to_string(),
            last_time,
        ]);
        writeln!(out, "{}", fields.join(","))?;
    } else {
        write!(out, "{:<6}", row.apid)?;
        if by == By::Sid {
            write!(out, " | {:<6}", row.sid.unwrap_or_default())?;
        }
        write!(out, " | {:>8}", row.count)?;
        if by == By::Apid {
            write!(out, " | {:>8}", row.missing)?;
        }
        writeln!(
            out,
            " | {:>8} | {:>8} | {first_time} | {:>8} | {last_time}",
            format_size(row.size),
            row.first,
            row.last
        )?;
    }
    Ok(())
}

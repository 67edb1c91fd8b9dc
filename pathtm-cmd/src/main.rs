mod digest;
mod list;
mod merge;
mod render;
mod report;
mod serve;
mod take;

use std::io::stderr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hifitime::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Inspect and consolidate PTH-framed telemetry archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print packet headers found in the archive, one line per packet.
    List {
        /// Only packets with this APID.
        #[arg(short = 'p', long)]
        apid: Option<u16>,

        /// CSV output.
        #[arg(short = 'c', long)]
        csv: bool,

        /// Archive files or directories.
        paths: Vec<PathBuf>,
    },
    /// Print packet sequence gaps found in the archive.
    Diff {
        /// Only packets with this APID.
        #[arg(short = 'p', long)]
        apid: Option<u16>,

        /// CSV output.
        #[arg(short = 'c', long)]
        csv: bool,

        /// Report only gaps spanning at least this much stream time,
        /// e.g. 30s or 5min.
        #[arg(short = 'd', long, value_parser = parse_duration)]
        duration: Option<Duration>,

        /// Archive files or directories.
        paths: Vec<PathBuf>,
    },
    /// Count packets found in the archive.
    Count {
        /// Only packets with this APID.
        #[arg(short = 'p', long)]
        apid: Option<u16>,

        /// Bucket counts by truncating packet times to this interval
        /// (minimum 5s).
        #[arg(short = 'i', long, value_parser = parse_duration)]
        interval: Option<Duration>,

        /// Group counts by APID or by (APID, source id).
        #[arg(short = 'b', long, value_enum, default_value = "apid")]
        by: report::By,

        /// CSV output.
        #[arg(short = 'c', long)]
        csv: bool,

        /// JSON output.
        #[arg(long, conflicts_with = "csv")]
        json: bool,

        /// Archive files or directories.
        paths: Vec<PathBuf>,
    },
    /// Print a 64-bit payload digest per packet.
    Digest {
        /// Only packets with this APID.
        #[arg(short = 'p', long)]
        apid: Option<u16>,

        /// Archive files or directories.
        paths: Vec<PathBuf>,
    },
    /// Re-partition the archive into fixed-duration window files under a
    /// destination layout.
    Take {
        /// Window duration (minimum 5s).
        #[arg(short = 'd', long, value_parser = parse_duration, default_value = "5 s")]
        interval: Duration,

        /// Only packets with this APID.
        #[arg(short = 'p', long)]
        apid: Option<u16>,

        /// Destination directory layout, built from the specifiers
        /// %Y %M %d %D %h %m %A, e.g. %Y/%D/%6h/%A.
        #[arg(short = 'f', long, default_value = "")]
        format: String,

        /// Window file-name prefix; defaults to the APID, or rt.
        #[arg(short = 'n', long)]
        prefix: Option<String>,

        /// Promote windows under the current wall-clock time instead of the
        /// first packet's timestamp.
        #[arg(short = 'x', long)]
        wall_clock: bool,

        /// Destination root directory.
        datadir: PathBuf,

        /// Archive files or directories.
        paths: Vec<PathBuf>,
    },
    /// Merge packet files into a single time-ordered file.
    Merge {
        /// Output file path.
        #[arg(short, long, default_value = "merged.dat", value_name = "path")]
        output: PathBuf,

        /// Delete the output file if it already exists.
        #[arg(long, action)]
        clobber: bool,

        /// Input packet files.
        inputs: Vec<PathBuf>,
    },
    /// Serve the archive listing over HTTP.
    Serve {
        /// Listen address, e.g. 127.0.0.1:8080.
        addr: String,

        /// Archive root directory.
        datadir: PathBuf,
    },
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    if let Ok(d) = Duration::from_str(s) {
        return Ok(d);
    }
    // bare numbers are taken as seconds
    s.parse::<u64>()
        .map(|secs| Duration::from_seconds(secs as f64))
        .map_err(|_| format!("invalid duration: {s}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("TMCAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::List { apid, csv, paths } => list::list(&paths, apid, csv),
        Commands::Diff {
            apid,
            csv,
            duration,
            paths,
        } => report::diff(&paths, apid, csv, duration),
        Commands::Count {
            apid,
            interval,
            by,
            csv,
            json,
            paths,
        } => report::count(&paths, apid, by, interval, csv, json),
        Commands::Digest { apid, paths } => digest::digest(&paths, apid),
        Commands::Take {
            interval,
            apid,
            format,
            prefix,
            wall_clock,
            datadir,
            paths,
        } => take::take(&datadir, &paths, interval, apid, &format, prefix, wall_clock),
        Commands::Merge {
            output,
            clobber,
            inputs,
        } => merge::merge(&inputs, &output, clobber),
        Commands::Serve { addr, datadir } => serve::serve(&addr, datadir),
    }
}

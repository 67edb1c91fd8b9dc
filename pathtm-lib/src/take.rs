//! Time-bucketed rotating sink.
//!
//! Re-partitions a packet stream into fixed-duration windows: packets are
//! staged in a scratch file and, when a packet's timestamp falls outside the
//! current window, the staged bytes are promoted into the archive layout and
//! a fresh window begins. A window is anchored at its first packet's
//! timestamp, not at an interval boundary.

use std::io::{Seek, SeekFrom, Write};

use hifitime::{Duration, Epoch};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::archive::Builder;
use crate::packet::{Apid, Packet};
use crate::{Error, Result};

/// Windows shorter than this are rejected.
const MIN_INTERVAL_SECS: f64 = 5.0;

/// Totals reported once a [`Take`] is finished.
#[derive(Debug, Default, Clone, Copy)]
pub struct TakeSummary {
    /// Packets written to window files.
    pub count: u64,
    /// Packets dropped on marshal or write failure.
    pub skipped: u64,
    /// Total bytes written across windows.
    pub size: u64,
}

/// The rotating sink. Feed packets with [`add`](Take::add), then call
/// [`finish`](Take::finish) to flush the final window.
pub struct Take<B> {
    builder: B,
    interval: Duration,
    apid: Option<Apid>,
    use_wall_clock: bool,
    scratch: Option<NamedTempFile>,
    anchor: Option<Epoch>,
    written: u64,
    summary: TakeSummary,
}

impl<B: Builder> Take<B> {
    /// Sink windows of `interval` into `builder`. Intervals below the 5 s
    /// floor are clamped.
    pub fn new(builder: B, interval: Duration) -> Self {
        Take {
            builder,
            interval: interval.max(Duration::from_seconds(MIN_INTERVAL_SECS)),
            apid: None,
            use_wall_clock: false,
            scratch: None,
            anchor: None,
            written: 0,
            summary: TakeSummary::default(),
        }
    }

    /// APID the promoted files are labeled with.
    #[must_use]
    pub fn with_apid(mut self, apid: Option<Apid>) -> Self {
        self.apid = apid;
        self
    }

    /// Promote windows under the wall-clock UTC time instead of the window
    /// anchor.
    #[must_use]
    pub fn with_wall_clock(mut self, yes: bool) -> Self {
        self.use_wall_clock = yes;
        self
    }

    /// Feed one accepted packet into the current window.
    ///
    /// Marshal and scratch-write failures skip the packet (counted in the
    /// summary); promotion failures are fatal.
    pub fn add(&mut self, packet: &Packet) -> Result<()> {
        let when = packet.timestamp();
        match self.anchor {
            Some(anchor) if when - anchor >= self.interval => {
                self.promote(anchor)?;
                self.anchor = Some(when);
            }
            None => self.anchor = Some(when),
            Some(_) => {}
        }

        let buf = match packet.marshal() {
            Ok(buf) => buf,
            Err(err) => {
                warn!(%err, apid = packet.ccsds.apid(), "skipping packet");
                self.summary.skipped += 1;
                return Ok(());
            }
        };
        let scratch = self.scratch()?;
        match scratch.as_file_mut().write_all(&buf) {
            Ok(()) => {
                self.written += buf.len() as u64;
                self.summary.size += buf.len() as u64;
                self.summary.count += 1;
            }
            Err(err) => {
                warn!(%err, "window scratch write failed; skipping packet");
                self.summary.skipped += 1;
            }
        }
        Ok(())
    }

    /// Promote the final window, if any, and return the totals.
    pub fn finish(mut self) -> Result<TakeSummary> {
        if let Some(anchor) = self.anchor {
            self.promote(anchor)?;
        }
        Ok(self.summary)
    }

    fn scratch(&mut self) -> Result<&mut NamedTempFile> {
        match self.scratch {
            Some(ref mut scratch) => Ok(scratch),
            None => {
                let scratch = tempfile::Builder::new()
                    .prefix("tmc-tk-")
                    .suffix(".dat")
                    .tempfile()?;
                debug!(path = ?scratch.path(), "opened window scratch");
                Ok(self.scratch.insert(scratch))
            }
        }
    }

    /// Hand the staged window to the builder and drop the scratch file.
    /// Empty windows are dropped without promotion.
    fn promote(&mut self, anchor: Epoch) -> Result<()> {
        if self.written == 0 {
            return Ok(());
        }
        let Some(mut scratch) = self.scratch.take() else {
            return Ok(());
        };
        let when = if self.use_wall_clock {
            Epoch::now().map_err(|_| Error::Clock)?
        } else {
            anchor
        };
        let file = scratch.as_file_mut();
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;
        debug!(bytes = self.written, "promoting window");
        self.builder.copy(file, self.apid, when)?;
        self.written = 0;
        Ok(())
    }
}

//! Sequence-gap analysis and keyed packet counting.

use std::collections::HashMap;
use std::io::Read;

use hifitime::{Duration, Epoch};
use serde::Serialize;

use crate::decoder::Decoder;
use crate::filter::Filter;
use crate::packet::{Apid, Packet};
use crate::time;
use crate::{Error, Result};

/// Buckets shorter than this are meaningless for archive streams.
const MIN_BUCKET_SECS: f64 = 5.0;

/// A run of missing sequence ids between two packets of one APID.
#[derive(Debug, Clone, Serialize)]
pub struct Gap {
    pub apid: Apid,
    pub last_time: Epoch,
    pub time: Epoch,
    pub last_sequence: u16,
    pub sequence: u16,
    pub missing: u16,
    pub dt: Duration,
}

/// Detects per-APID sequence gaps over an ordered packet stream.
///
/// Feed packets in arrival order; each APID keeps its own lagging anchor,
/// which advances on every packet whether or not it closed a gap.
#[derive(Default)]
pub struct GapScan {
    min_duration: Option<Duration>,
    seen: HashMap<Apid, Packet>,
}

impl GapScan {
    #[must_use]
    pub fn new() -> Self {
        GapScan::default()
    }

    /// Report only gaps spanning at least `min` of stream time.
    #[must_use]
    pub fn with_min_duration(mut self, min: Duration) -> Self {
        if min > Duration::ZERO {
            self.min_duration = Some(min);
        }
        self
    }

    /// Feed the next packet; returns the gap it closes, if any.
    pub fn add(&mut self, packet: &Packet) -> Option<Gap> {
        let apid = packet.ccsds.apid();
        let gap = self.seen.get(&apid).and_then(|last| {
            let missing = packet.missing(last);
            if missing == 0 {
                return None;
            }
            let (last_time, time) = (last.timestamp(), packet.timestamp());
            let dt = time - last_time;
            if self.min_duration.is_some_and(|min| dt < min) {
                return None;
            }
            Some(Gap {
                apid,
                last_time,
                time,
                last_sequence: last.ccsds.sequence(),
                sequence: packet.ccsds.sequence(),
                missing,
                dt,
            })
        });
        self.seen.insert(apid, packet.clone());
        gap
    }
}

/// What packets are tallied by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountBy {
    Apid,
    /// APID plus ESA source id.
    Source,
}

/// Aggregation key: APID, optional source id, optional time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CountKey {
    pub apid: Apid,
    pub sid: Option<u32>,
    pub bucket: Option<Epoch>,
}

/// Per-key packet statistics.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Tally {
    pub count: u64,
    pub size: u64,
    pub missing: u64,
    pub first: u16,
    pub first_time: Option<Epoch>,
    pub last: u16,
    pub last_time: Option<Epoch>,
}

fn count_key(packet: &Packet, by: CountBy, interval: Option<Duration>) -> CountKey {
    let bucket = interval
        .filter(|d| *d >= Duration::from_seconds(MIN_BUCKET_SECS))
        .map(|d| time::truncate(packet.timestamp(), d));
    CountKey {
        apid: packet.ccsds.apid(),
        sid: match by {
            CountBy::Apid => None,
            CountBy::Source => packet.esa.map(|esa| esa.sid),
        },
        bucket,
    }
}

/// Drain `decoder` and tally packets per key, sorted ascending by
/// (APID, bucket).
///
/// The missing counts always follow the APID-keyed sequence stream, whatever
/// the grouping key: a gap spanning a bucket boundary is charged to the
/// bucket that closes it.
///
/// A truncated archive tail ([`Error::Invalid`]) ends the count cleanly.
pub fn count_packets<R, F>(
    decoder: &mut Decoder<R, F>,
    by: CountBy,
    interval: Option<Duration>,
) -> Result<Vec<(CountKey, Tally)>>
where
    R: Read,
    F: Filter,
{
    let mut stats: HashMap<CountKey, Tally> = HashMap::new();
    let mut seen: HashMap<Apid, Packet> = HashMap::new();

    loop {
        let packet = match decoder.decode(false) {
            Ok(Some(packet)) => packet,
            Ok(None) | Err(Error::Invalid) => break,
            Err(err) => return Err(err),
        };

        let missing = seen
            .get(&packet.ccsds.apid())
            .map_or(0, |other| packet.missing(other));

        let tally = stats.entry(count_key(&packet, by, interval)).or_default();
        tally.count += 1;
        tally.size += u64::from(packet.ccsds.length);
        tally.missing += u64::from(missing);
        tally.last = packet.ccsds.sequence();
        tally.last_time = Some(packet.timestamp());
        if tally.first_time.is_none() {
            tally.first = tally.last;
            tally.first_time = tally.last_time;
        }

        seen.insert(packet.ccsds.apid(), packet);
    }

    let mut out: Vec<(CountKey, Tally)> = stats.into_iter().collect();
    out.sort_by_key(|(key, _)| (key.apid, key.bucket, key.sid));
    Ok(out)
}

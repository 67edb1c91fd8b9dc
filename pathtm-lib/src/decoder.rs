//! Streaming packet decoder.

use std::io::Read;

use tracing::trace;

use crate::archive::RecordReader;
use crate::filter::{All, Filter};
use crate::packet::Packet;
use crate::Result;

/// Size of the scratch buffer a [`Decoder`] reuses across records.
pub const BUFFER_SIZE: usize = 4 << 10;

/// Pulls framed records from a byte source and decodes them one packet at a
/// time, skipping records the filter rejects.
///
/// The decoder owns a single scratch buffer that is overwritten on every
/// read; returned packets carry their own payload copy.
pub struct Decoder<R, F = All> {
    records: RecordReader<R>,
    filter: F,
    buffer: Vec<u8>,
}

impl<R: Read> Decoder<R, All> {
    pub fn new(inner: R) -> Self {
        Self::with_filter(inner, All)
    }
}

impl<R: Read, F: Filter> Decoder<R, F> {
    pub fn with_filter(inner: R, filter: F) -> Self {
        Decoder {
            records: RecordReader::new(inner),
            filter,
            buffer: vec![0u8; BUFFER_SIZE],
        }
    }

    /// Decode the next accepted packet, or `None` at end of stream.
    ///
    /// Records the filter rejects are skipped silently; everything else —
    /// decode failures, filter failures, source failures — surfaces to the
    /// caller after a single record attempt.
    pub fn decode(&mut self, want_data: bool) -> Result<Option<Packet>> {
        loop {
            let n = match self.records.next_record(&mut self.buffer)? {
                Some(n) => n,
                None => return Ok(None),
            };
            let packet = Packet::decode(&self.buffer[..n], want_data)?;
            if self.filter.keep(&packet.ccsds, packet.esa.as_ref())? {
                return Ok(Some(packet));
            }
            trace!(apid = packet.ccsds.apid(), "packet filtered out");
        }
    }

    /// Iterate over accepted packets until end of stream or the first error.
    pub fn packets(&mut self, want_data: bool) -> impl Iterator<Item = Result<Packet>> + '_ {
        std::iter::from_fn(move || self.decode(want_data).transpose())
    }
}

//! Offset-indexed chronological merge.
//!
//! Inputs are treated as a bag of framed packets in no particular order.
//! Every record is staged in a scratch file and indexed by (time, APID,
//! sequence, position); the index is sorted and the records re-emitted in
//! that order, byte for byte. Holding only the index in memory keeps the
//! merge viable for multi-gigabyte archives.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hifitime::Epoch;
use tracing::{debug, trace};

use crate::archive::{MultiReader, RecordReader};
use crate::decoder::BUFFER_SIZE;
use crate::packet::{Apid, CcsdsHeader, EsaHeader, PthHeader};
use crate::Result;

/// Index entry addressing one record staged in the merge scratch file.
#[derive(Debug, Clone, Copy)]
pub struct Offset {
    pub apid: Apid,
    pub sequence: u16,
    pub time: Epoch,
    /// Byte range in the scratch file; filled in while staging.
    pub position: u64,
    pub size: usize,
}

/// Merge framed packet files into `writer`, ordered by (time, APID,
/// sequence). Records with equal keys keep their input order.
///
/// `extract` keys each raw record; returning `None` drops the record from
/// the merge, any error aborts it. The scratch file is removed on every exit
/// path.
pub fn merge_files<P, W, F>(files: &[P], mut writer: W, extract: F) -> Result<()>
where
    P: AsRef<Path>,
    W: Write,
    F: Fn(&[u8]) -> Result<Option<Offset>>,
{
    let mut scratch = tempfile::tempfile()?;
    let mut index: Vec<Offset> = Vec::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    let paths: Vec<PathBuf> = files.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let mut records = RecordReader::new(MultiReader::new(paths));
    let mut staged: u64 = 0;
    while let Some(n) = records.next_record(&mut buffer)? {
        let record = &buffer[..n];
        let Some(mut offset) = extract(record)? else {
            trace!("record skipped by extractor");
            continue;
        };
        scratch.write_all(record)?;
        offset.position = staged;
        offset.size = n;
        index.push(offset);
        staged += n as u64;
    }
    debug!(packets = index.len(), bytes = staged, "staged merge input");

    index.sort_by_key(|offset| (offset.time, offset.apid, offset.sequence));

    for offset in &index {
        trace!(?offset, "emitting record");
        scratch.seek(SeekFrom::Start(offset.position))?;
        let record = &mut buffer[..offset.size];
        scratch.read_exact(record)?;
        writer.write_all(record)?;
    }
    Ok(())
}

/// The standard extractor for PTH-framed telemetry records: APID and
/// sequence from the primary header, time from the secondary header.
/// Records too short to carry both headers are dropped.
pub fn extract_offset(record: &[u8]) -> Result<Option<Offset>> {
    if record.len() < PthHeader::LEN + EsaHeader::LEN {
        return Ok(None);
    }
    let ccsds = CcsdsHeader::decode(&record[PthHeader::LEN..])?;
    let esa = EsaHeader::decode(&record[PthHeader::LEN + CcsdsHeader::LEN..])?;
    Ok(Some(Offset {
        apid: ccsds.apid(),
        sequence: ccsds.sequence(),
        time: esa.timestamp(),
        position: 0,
        size: 0,
    }))
}

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use md5::{Digest, Md5};

use pathtm::archive::{browse, RecordReader};
use pathtm::decoder::BUFFER_SIZE;
use pathtm::packet::{Apid, CcsdsHeader, PthHeader};
use pathtm::Error;

/// Print one line per record: APID, missing count, sequence, segmentation,
/// data length, and a 64-bit digest of the CCSDS data field.
pub fn digest(paths: &[PathBuf], apid: Option<u16>) -> Result<()> {
    let reader = browse(paths, true).context("browsing archive")?;
    let mut records = RecordReader::new(reader);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut seen: HashMap<Apid, CcsdsHeader> = HashMap::new();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    loop {
        let n = match records.next_record(&mut buffer) {
            Ok(Some(n)) => n,
            Ok(None) | Err(Error::Invalid) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let record = &buffer[..n];
        let ccsds = CcsdsHeader::decode(&record[PthHeader::LEN..])?;
        if apid.is_some_and(|apid| apid != ccsds.apid()) {
            continue;
        }

        let sum = sum64(&record[PthHeader::LEN + CcsdsHeader::LEN..]);

        let missing = seen
            .get(&ccsds.apid())
            .map_or(0, |other| ccsds.missing(other));
        seen.insert(ccsds.apid(), ccsds);

        writeln!(
            out,
            "{:>4} | {missing:>6} | {:>6} | {:>12} | {:>6} | {sum:016x}",
            ccsds.apid(),
            ccsds.sequence(),
            ccsds.segmentation(),
            ccsds.data_len(),
        )?;
    }
}

/// Stable 64-bit content digest: the leading eight bytes of an MD5.
fn sum64(data: &[u8]) -> u64 {
    let mut hasher = Md5::new();
    hasher.update(data);
    let sum = hasher.finalize();
    u64::from_be_bytes([
        sum[0], sum[1], sum[2], sum[3], sum[4], sum[5], sum[6], sum[7],
    ])
}

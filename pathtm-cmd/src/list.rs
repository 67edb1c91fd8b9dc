use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use pathtm::archive::browse;
use pathtm::decoder::Decoder;
use pathtm::filter::WithApid;
use pathtm::packet::Packet;
use pathtm::Error;

use crate::render::format_time;

pub fn list(paths: &[PathBuf], apid: Option<u16>, csv: bool) -> Result<()> {
    let reader = browse(paths, true).context("browsing archive")?;
    let mut decoder = Decoder::with_filter(reader, WithApid(apid));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_listing(&mut decoder, &mut out, csv)?;
    Ok(())
}

/// Drain `decoder` writing one line per packet. A truncated archive tail
/// ends the listing cleanly.
pub fn write_listing<R, F, W>(decoder: &mut Decoder<R, F>, out: &mut W, csv: bool) -> Result<()>
where
    R: std::io::Read,
    F: pathtm::filter::Filter,
    W: Write,
{
    loop {
        match decoder.decode(false) {
            Ok(Some(packet)) => write_line(out, &packet, csv)?,
            Ok(None) | Err(Error::Invalid) => return Ok(()),
            Err(err) => return Err(err.into()),
        }
    }
}

fn write_line<W: Write>(out: &mut W, packet: &Packet, csv: bool) -> io::Result<()> {
    let time = format_time(packet.timestamp());
    let relay_time = format_time(packet.pth.timestamp());
    let sequence = packet.ccsds.sequence();
    let segmentation = packet.ccsds.segmentation();
    let apid = packet.ccsds.apid();
    let len = packet.ccsds.data_len();
    let packet_type = packet.esa.map(|esa| esa.packet_type()).unwrap_or_default();
    let sid = packet.esa.map_or(0, |esa| esa.sid);

    if csv {
        writeln!(
            out,
            "{time},{relay_time},{sequence},{segmentation},{apid},{len},{packet_type},{sid}"
        )
    } else {
        writeln!(
            out,
            "{time} | {relay_time} | {sequence:>6} | {segmentation:>16} | {apid:>4} | \
             {len:>6} | {packet_type:>16} | {sid:>8}"
        )
    }
}

use pathtm::packet::{CcsdsHeader, EsaHeader, Packet, PthHeader};

/// A coarse-time base aligned to 5 s bucket boundaries after the leap
/// correction.
pub const BASE: u32 = 0x5F00_0003;

/// Build a complete framed record: transport header, primary header,
/// secondary header, payload.
pub fn record(apid: u16, seq: u16, coarse: u32, sid: u32, payload: &[u8]) -> Vec<u8> {
    packet(apid, seq, coarse, sid, payload).marshal().unwrap()
}

pub fn packet(apid: u16, seq: u16, coarse: u32, sid: u32, payload: &[u8]) -> Packet {
    let data_len = EsaHeader::LEN + payload.len();
    Packet {
        pth: PthHeader {
            size: (CcsdsHeader::LEN + data_len) as u32,
            kind: 2,
            coarse,
            fine: 0,
        },
        ccsds: CcsdsHeader {
            pid: 0x0800 | apid,
            fragment: 0xC000 | seq,
            length: (data_len - 1) as u16,
        },
        esa: Some(EsaHeader {
            coarse,
            fine: 0,
            info: 0x05,
            sid,
        }),
        data: payload.to_vec(),
    }
}

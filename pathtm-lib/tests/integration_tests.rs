mod common;

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use hifitime::Duration;
use pathtm::archive::{browse, ArchiveBuilder};
use pathtm::decoder::Decoder;
use pathtm::filter::WithApid;
use pathtm::gap::{count_packets, CountBy, GapScan};
use pathtm::merge::{extract_offset, merge_files};
use pathtm::packet::Packet;
use pathtm::take::Take;

use common::{packet, record, BASE};

fn write_file(path: &PathBuf, records: &[Vec<u8>]) {
    let mut file = File::create(path).unwrap();
    for r in records {
        file.write_all(r).unwrap();
    }
}

#[test]
fn browse_walks_lexicographically() {
    let dir = tempfile::tempdir().unwrap();
    // named so creation order differs from listing order
    let sub = dir.path().join("2020");
    fs::create_dir(&sub).unwrap();
    write_file(&sub.join("b.dat"), &[record(1, 2, BASE + 1, 7, &[0xBB])]);
    write_file(&sub.join("a.dat"), &[record(1, 1, BASE, 7, &[0xAA])]);

    let reader = browse(&[dir.path()], true).unwrap();
    let mut decoder = Decoder::new(reader);
    let seqs: Vec<u16> = decoder
        .packets(false)
        .map(|zult| zult.unwrap().ccsds.sequence())
        .collect();
    assert_eq!(seqs, vec![1, 2]);
}

#[test]
fn decode_filter_and_gap_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tm.dat");
    let records: Vec<Vec<u8>> = [(100u16, 10u16), (100, 11), (200, 1), (100, 14), (100, 14)]
        .iter()
        .enumerate()
        .map(|(i, (apid, seq))| record(*apid, *seq, BASE + i as u32, 7, &[0xAA; 4]))
        .collect();
    write_file(&path, &records);

    let reader = browse(&[path], true).unwrap();
    let mut decoder = Decoder::with_filter(reader, WithApid(Some(100)));
    let mut scan = GapScan::new();
    let mut gaps = Vec::new();
    while let Some(packet) = decoder.decode(false).unwrap() {
        assert_eq!(packet.ccsds.apid(), 100);
        if let Some(gap) = scan.add(&packet) {
            gaps.push(gap);
        }
    }
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].missing, 2);
    assert_eq!(gaps[0].last_sequence, 11);
    assert_eq!(gaps[0].sequence, 14);
}

#[test]
fn count_buckets_across_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tm.dat");
    write_file(
        &path,
        &[
            record(100, 1, BASE, 7, &[0xAA; 4]),
            record(100, 2, BASE + 3, 7, &[0xAA; 4]),
            record(100, 3, BASE + 7, 7, &[0xAA; 4]),
        ],
    );

    let reader = browse(&[path], true).unwrap();
    let mut decoder = Decoder::new(reader);
    let stats = count_packets(
        &mut decoder,
        CountBy::Apid,
        Some(Duration::from_seconds(5.0)),
    )
    .unwrap();

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].1.count, 2);
    assert_eq!(stats[1].1.count, 1);
}

#[test]
fn take_into_archive_layout() {
    let src = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let path = src.path().join("tm.dat");
    let records: Vec<Vec<u8>> = [0u32, 2, 6, 11]
        .iter()
        .enumerate()
        .map(|(i, offset)| record(42, i as u16, BASE + offset, 7, &[i as u8; 4]))
        .collect();
    write_file(&path, &records);

    let builder = ArchiveBuilder::new(dest.path(), "%Y/%D/%A").unwrap();
    let reader = browse(&[path], true).unwrap();
    let mut decoder = Decoder::with_filter(reader, WithApid(Some(42)));
    let mut take =
        Take::new(builder, Duration::from_seconds(5.0)).with_apid(Some(42));
    while let Some(packet) = decoder.decode(true).unwrap() {
        take.add(&packet).unwrap();
    }
    let summary = take.finish().unwrap();
    assert_eq!(summary.count, 4);
    assert_eq!(summary.skipped, 0);

    // all windows share the same day, so successive promotions land on the
    // same path and the last window wins; total staged bytes still add up
    let mut promoted = Vec::new();
    for entry in walk_files(dest.path()) {
        promoted.push(entry);
    }
    assert_eq!(promoted.len(), 1);
    let contents = fs::read(&promoted[0]).unwrap();
    assert_eq!(contents, records[3]);

    let total: u64 = records.iter().map(|r| r.len() as u64).sum();
    assert_eq!(summary.size, total);
}

fn walk_files(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(walk_files(&path));
        } else {
            out.push(path);
        }
    }
    out
}

#[test]
fn merge_files_is_chronological_and_content_preserving() {
    let dir = tempfile::tempdir().unwrap();
    let r_t3 = record(1, 3, BASE + 3, 7, &[3; 4]);
    let r_t1 = record(1, 1, BASE + 1, 7, &[1; 4]);
    let r_t2 = record(1, 2, BASE + 2, 7, &[2; 4]);
    let r_t4 = record(1, 4, BASE + 4, 7, &[4; 4]);
    let a = dir.path().join("a.dat");
    let b = dir.path().join("b.dat");
    write_file(&a, &[r_t3.clone(), r_t1.clone()]);
    write_file(&b, &[r_t2.clone(), r_t4.clone()]);

    let out_path = dir.path().join("merged.dat");
    let out = File::create(&out_path).unwrap();
    merge_files(&[a, b], out, extract_offset).unwrap();

    let merged = fs::read(&out_path).unwrap();
    assert_eq!(merged, [r_t1, r_t2, r_t3, r_t4].concat());

    // the merged stream decodes to monotonically increasing times
    let mut decoder = Decoder::new(File::open(&out_path).unwrap());
    let packets: Vec<Packet> = decoder.packets(true).map(|zult| zult.unwrap()).collect();
    assert_eq!(packets.len(), 4);
    for pair in packets.windows(2) {
        assert!(pair[0].timestamp() < pair[1].timestamp());
    }
}

#[test]
fn round_trip_through_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tm.dat");
    let original = packet(9, 77, BASE, 0x1234, &[0x5A; 16]);
    write_file(&path, &[original.marshal().unwrap()]);

    let reader = browse(&[path], true).unwrap();
    let mut decoder = Decoder::new(reader);
    let decoded = decoder.decode(true).unwrap().unwrap();
    assert_eq!(decoded, original);
    assert_eq!(decoded.marshal().unwrap(), original.marshal().unwrap());
    assert!(decoder.decode(true).unwrap().is_none());
}

//! Integration tests: end-to-end checking of interleaved UBX / NMEA / RTCM streams, resync after
//! corruption, repair to memory and to files, and rewind-ceiling termination.

use gnss_integrity::cursor::{ByteSource, SeekableSource};
use gnss_integrity::{
    check_file, encode_nmea, encode_rtcm, encode_ubx, repair_file, CheckerConfig,
    IntegrityChecker, IntegrityError, IntegrityReport, Outcome, Protocol,
};
use std::io::{self, Cursor};

const GNTXT_BODY: &str = "GNTXT,01,01,02,u-blox AG - www.u-blox.com";

fn check(bytes: &[u8]) -> IntegrityReport {
    IntegrityChecker::default()
        .check(&mut SeekableSource::from_slice(bytes))
        .expect("check")
}

fn repair_with(config: CheckerConfig, bytes: &[u8]) -> (IntegrityReport, Vec<u8>) {
    let mut out = Cursor::new(Vec::new());
    let report = IntegrityChecker::new(config)
        .check_and_repair(&mut SeekableSource::from_slice(bytes), &mut out)
        .expect("repair");
    (report, out.into_inner())
}

fn repair(bytes: &[u8]) -> (IntegrityReport, Vec<u8>) {
    repair_with(CheckerConfig::default(), bytes)
}

fn counts(report: &IntegrityReport) -> Vec<(String, u64)> {
    report
        .statistics
        .messages
        .iter()
        .map(|r| (r.type_identifier.clone(), r.count))
        .collect()
}

/// NMEA GGA, then a UBX NAV-POSLLH-sized message with one payload byte dropped.
fn dropped_byte_pair() -> (Vec<u8>, Vec<u8>) {
    let good = encode_nmea("GNGGA,1");
    let ubx = encode_ubx(0x01, 0x02, &[0x11; 8]);
    let mut damaged = ubx[..6].to_vec();
    damaged.extend_from_slice(&ubx[7..]);
    (good, damaged)
}

#[test]
fn clean_stream_is_counted_and_repaired_verbatim() {
    let mut stream = encode_ubx(0x01, 0x07, &[]);
    stream.extend(encode_nmea(GNTXT_BODY));
    let (report, repaired) = repair(&stream);

    assert_eq!(
        counts(&report),
        vec![("0x01 0x07".to_string(), 1), ("GNTXT".to_string(), 1)]
    );
    assert_eq!(report.statistics.successful_resyncs, 0);
    assert_eq!(report.sync_losses, 0);
    assert_eq!(report.outcome, Outcome::Completed);
    assert!(report.size_matches());
    assert_eq!(report.statistics.ubx.longest, 8);
    assert_eq!(report.statistics.nmea.longest, GNTXT_BODY.len() + 1);
    assert!(!report.statistics.rtcm.observed);
    assert_eq!(repaired, stream);
    assert_eq!(report.repaired_len, Some(stream.len() as u64));
}

#[test]
fn corrupted_checksum_is_dropped_from_repair() {
    let ubx = encode_ubx(0x01, 0x07, &[]);
    let nmea = encode_nmea(GNTXT_BODY);
    let mut stream = ubx.clone();
    stream.extend_from_slice(&nmea);
    stream[7] ^= 0xFF;

    let (report, repaired) = repair(&stream);
    assert_eq!(report.sync_losses, 1);
    assert_eq!(report.statistics.successful_resyncs, 1);
    assert_eq!(counts(&report), vec![("GNTXT".to_string(), 1)]);
    // the UBX marker was still seen
    assert!(report.statistics.ubx.observed);
    assert_eq!(report.statistics.ubx.longest, 0);
    assert!(report.size_matches());
    assert_eq!(repaired, nmea);
}

#[test]
fn stray_bytes_between_messages_are_not_repaired() {
    let gga = encode_nmea("GNGGA,1");
    let ubx = encode_ubx(0x01, 0x07, &[]);
    let mut stream = gga.clone();
    stream.extend_from_slice(&[0x00, 0x7F, 0x0A]);
    stream.extend_from_slice(&ubx);

    let (report, repaired) = repair(&stream);
    assert_eq!(report.sync_losses, 0);
    assert_eq!(report.statistics.messages.total(), 2);
    let mut expected = gga;
    expected.extend_from_slice(&ubx);
    assert_eq!(repaired, expected);
}

#[test]
fn dropped_payload_byte_rewinds_and_keeps_next_message() {
    let (good, damaged) = dropped_byte_pair();
    let next = encode_ubx(0x01, 0x07, &[]);
    let tail = encode_nmea("GNRMC,2");
    let mut stream = good.clone();
    stream.extend_from_slice(&damaged);
    stream.extend_from_slice(&next);
    stream.extend_from_slice(&tail);

    let (report, repaired) = repair(&stream);
    assert_eq!(report.sync_losses, 1);
    assert_eq!(report.rewind_attempts, 1);
    assert_eq!(report.statistics.successful_resyncs, 1);
    assert_eq!(
        counts(&report),
        vec![
            ("GNGGA".to_string(), 1),
            ("0x01 0x07".to_string(), 1),
            ("GNRMC".to_string(), 1),
        ]
    );
    assert_eq!(report.outcome, Outcome::Completed);
    assert!(report.size_matches());

    let mut expected = good;
    expected.extend_from_slice(&next);
    expected.extend_from_slice(&tail);
    assert_eq!(repaired, expected);
}

#[test]
fn repaired_output_checks_clean() {
    let (good, damaged) = dropped_byte_pair();
    let mut stream = Vec::new();
    for _ in 0..3 {
        stream.extend_from_slice(&good);
        stream.extend_from_slice(&damaged);
    }
    stream.extend_from_slice(&encode_rtcm(&[0x3E, 0xD0, 0x00, 0x01, 0x02]));
    stream.extend_from_slice(&good);

    let (first, repaired) = repair(&stream);
    assert!(first.sync_losses > 0);

    let (second, again) = repair(&repaired);
    assert_eq!(second.sync_losses, 0);
    assert_eq!(second.statistics.successful_resyncs, 0);
    assert_eq!(again, repaired);
    assert_eq!(counts(&first), counts(&second));
}

#[test]
fn rewind_ceiling_stops_processing() {
    let (good, damaged) = dropped_byte_pair();
    let mut stream = Vec::new();
    for _ in 0..6 {
        stream.extend_from_slice(&good);
        stream.extend_from_slice(&damaged);
    }
    stream.extend_from_slice(&good);

    let config = CheckerConfig::default().with_max_rewinds(3);
    let (report, repaired) = repair_with(config, &stream);
    assert!(report.aborted());
    assert_eq!(report.rewind_attempts, 4);
    assert_eq!(report.statistics.successful_resyncs, 3);
    // the fourth failure is detected on the '$' of the fifth GGA
    let cycle = (good.len() + damaged.len()) as u64;
    assert_eq!(
        report.outcome,
        Outcome::RewindLimitExceeded { offset: 4 * cycle }
    );
    assert_eq!(report.statistics.bytes_processed, 4 * cycle + 1);
    assert!(!report.size_matches());
    assert_eq!(counts(&report), vec![("GNGGA".to_string(), 4)]);
    assert_eq!(repaired, good.repeat(4));
}

#[test]
fn default_ceiling_allows_every_rewind() {
    let (good, damaged) = dropped_byte_pair();
    let mut stream = Vec::new();
    for _ in 0..6 {
        stream.extend_from_slice(&good);
        stream.extend_from_slice(&damaged);
    }
    stream.extend_from_slice(&good);

    let (report, repaired) = repair(&stream);
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.rewind_attempts, 6);
    assert_eq!(report.statistics.successful_resyncs, 6);
    assert_eq!(repaired, good.repeat(7));
}

#[test]
fn noise_terminates() {
    // xorshift noise; no valid frames expected but processing must reach the end
    let mut x: u32 = 0x2545_F491;
    let noise: Vec<u8> = (0..20_000)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            x as u8
        })
        .collect();
    let report = check(&noise);
    assert!(!report.aborted());
    assert!(report.statistics.bytes_processed <= noise.len() as u64);
}

#[test]
fn mixed_protocols_are_tallied() {
    let mut stream = encode_nmea("GNGGA,1");
    stream.extend(encode_rtcm(&[0x3E, 0xD0, 0x00, 0x00]));
    stream.extend(encode_ubx(0x02, 0x15, &[0; 16]));
    stream.extend(encode_rtcm(&[0xFE, 0x81, 0x23, 0x00]));
    stream.extend(encode_rtcm(&[0x3E, 0xD0, 0x00, 0x00, 0x00, 0x00]));

    let report = check(&stream);
    assert_eq!(
        counts(&report),
        vec![
            ("GNGGA".to_string(), 1),
            ("1005".to_string(), 2),
            ("0x02 0x15".to_string(), 1),
            ("4072_291".to_string(), 1),
        ]
    );
    assert_eq!(report.statistics.rtcm.longest, 12);
    assert_eq!(report.statistics.ubx.longest, 24);
    assert!(report.statistics.protocol(Protocol::Rtcm).observed);
}

#[test]
fn gntxt_is_reported_when_requested() {
    let mut stream = encode_ubx(0x01, 0x07, &[]);
    stream.extend(encode_nmea(GNTXT_BODY));
    let config = CheckerConfig::default().with_capture_gntxt(true);
    let (report, _) = repair_with(config, &stream);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].starts_with("$GNTXT,01,01,02,u-blox AG"));
    assert!(report.diagnostics[0].ends_with("\r\n"));

    assert!(check(&stream).diagnostics.is_empty());
}

#[test]
fn truncated_last_message() {
    let first = encode_ubx(0x01, 0x07, &[]);
    let mut stream = first.clone();
    stream.extend_from_slice(&encode_nmea("GNGSA,A,3")[..6]);
    let (report, repaired) = repair(&stream);
    assert_eq!(
        report.outcome,
        Outcome::TruncatedMessage {
            protocol: Protocol::Nmea,
            started_at: first.len() as u64,
        }
    );
    assert!(report.size_matches());
    assert_eq!(repaired, first);
}

#[test]
fn empty_input_is_rejected() {
    let err = IntegrityChecker::default()
        .check(&mut SeekableSource::from_slice(&[]))
        .unwrap_err();
    assert!(matches!(err, IntegrityError::EmptyInput));
}

/// Claims more bytes than it can deliver.
struct ShortSource {
    bytes: Vec<u8>,
    pos: usize,
    claimed: u64,
}

impl ByteSource for ShortSource {
    fn read_one(&mut self) -> io::Result<Option<u8>> {
        let b = self.bytes.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset as usize;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.claimed
    }
}

#[test]
fn source_ending_early_is_reported() {
    let bytes = encode_ubx(0x01, 0x07, &[]);
    let mut src = ShortSource {
        claimed: bytes.len() as u64 + 10,
        bytes,
        pos: 0,
    };
    let report = IntegrityChecker::default().check(&mut src).expect("check");
    assert_eq!(report.outcome, Outcome::EndedEarly { at: 8 });
    assert_eq!(report.statistics.bytes_processed, 8);
    assert!(!report.size_matches());
    assert_eq!(report.statistics.messages.total(), 1);
}

#[test]
fn file_check_and_repair() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("capture.ubx");
    let output = dir.path().join("capture_repaired.ubx");

    let (good, damaged) = dropped_byte_pair();
    let next = encode_ubx(0x01, 0x07, &[]);
    let mut stream = good.clone();
    stream.extend_from_slice(&damaged);
    stream.extend_from_slice(&next);
    std::fs::write(&input, &stream).expect("write input");

    let checked = check_file(&input, CheckerConfig::default()).expect("check_file");
    assert_eq!(checked.statistics.successful_resyncs, 1);
    assert_eq!(checked.input_len, stream.len() as u64);

    let repaired = repair_file(&input, &output, CheckerConfig::default()).expect("repair_file");
    assert_eq!(counts(&repaired), counts(&checked));
    let mut expected = good;
    expected.extend_from_slice(&next);
    assert_eq!(std::fs::read(&output).expect("read output"), expected);
    assert_eq!(repaired.repaired_len, Some(expected.len() as u64));

    // a longer stale file at the output path is truncated
    std::fs::write(&output, vec![0xAA; 500]).expect("write stale");
    repair_file(&input, &output, CheckerConfig::default()).expect("repair_file");
    assert_eq!(std::fs::read(&output).expect("read output").len(), expected.len());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = check_file(dir.path().join("absent.ubx"), CheckerConfig::default()).unwrap_err();
    assert!(matches!(err, IntegrityError::Io(_)));
}

//! Benchmark: check and check+repair over a synthetic receiver log (UBX NAV-PVT, NMEA GGA/RMC,
//! RTCM 1005/1077) with and without periodic single-byte drops that force rewinds.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gnss_integrity::{encode_nmea, encode_rtcm, encode_ubx, IntegrityChecker, SeekableSource};
use std::io::Cursor;

const EPOCHS: usize = 2_000;

fn epoch(i: usize) -> Vec<u8> {
    let mut out = encode_ubx(0x01, 0x07, &[(i & 0x7F) as u8; 92]);
    out.extend(encode_nmea(&format!(
        "GNGGA,{:06}.00,5230.1234,N,01324.5678,E,1,12,0.8,35.2,M,44.1,M,,",
        i % 240_000
    )));
    out.extend(encode_nmea(&format!(
        "GNRMC,{:06}.00,A,5230.1234,N,01324.5678,E,0.02,,180926,,,A,V",
        i % 240_000
    )));
    let mut station = vec![0x3E, 0xD0, 0x00];
    station.extend_from_slice(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x11, 0x22]);
    out.extend(encode_rtcm(&station));
    let mut msm = vec![0x43, 0x50, 0x00];
    msm.extend(std::iter::repeat(0x2A).take(120));
    out.extend(encode_rtcm(&msm));
    out
}

fn clean_stream() -> Vec<u8> {
    (0..EPOCHS).flat_map(epoch).collect()
}

/// Drop one UBX payload byte every 50th epoch.
fn damaged_stream() -> Vec<u8> {
    (0..EPOCHS)
        .flat_map(|i| {
            let mut e = epoch(i);
            if i % 50 == 49 {
                e.remove(20);
            }
            e
        })
        .collect()
}

fn bench_check_stream(c: &mut Criterion) {
    let checker = IntegrityChecker::default();
    let clean = clean_stream();
    let damaged = damaged_stream();

    let mut group = c.benchmark_group("check_stream");
    group.throughput(Throughput::Bytes(clean.len() as u64));

    group.bench_function("check_clean", |b| {
        b.iter(|| {
            let mut src = SeekableSource::from_slice(black_box(&clean));
            checker.check(&mut src).map(|r| r.statistics.messages.total())
        })
    });

    group.bench_function("check_damaged", |b| {
        b.iter(|| {
            let mut src = SeekableSource::from_slice(black_box(&damaged));
            checker.check(&mut src).map(|r| r.statistics.successful_resyncs)
        })
    });

    group.bench_function("repair_damaged", |b| {
        b.iter(|| {
            let mut src = SeekableSource::from_slice(black_box(&damaged));
            let mut out = Cursor::new(Vec::with_capacity(damaged.len()));
            checker
                .check_and_repair(&mut src, &mut out)
                .map(|r| r.repaired_len)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_check_stream);
criterion_main!(benches);

//! Checker fuzz target: feed arbitrary bytes through check and check+repair.
//! Neither may panic, processing must terminate, and the repaired output must re-check
//! without sync loss.
//! Build with: cargo fuzz run check_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use gnss_integrity::{IntegrityChecker, SeekableSource};
    use std::io::Cursor;

    let checker = IntegrityChecker::default();
    let mut out = Cursor::new(Vec::new());
    let Ok(report) = checker.check_and_repair(&mut SeekableSource::from_slice(data), &mut out)
    else {
        return;
    };
    assert!(report.statistics.bytes_processed <= data.len() as u64);
    let repaired = out.into_inner();
    if repaired.is_empty() {
        return;
    }
    let again = checker
        .check(&mut SeekableSource::from_slice(&repaired))
        .expect("repaired output is non-empty");
    assert_eq!(again.sync_losses, 0);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run check_fuzz");
}

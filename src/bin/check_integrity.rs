//! Check a GNSS receiver log (UBX / NMEA / RTCM 3) and optionally write a repaired copy.
//!
//! Usage: check_integrity <input> [-r repaired.ubx] [--gntxt] [--rewinds N] [--max-nmea-len N]
//! Set RUST_LOG to control verbosity (default: info).

use anyhow::Context;
use clap::Parser;
use gnss_integrity::{check_file, repair_file, CheckerConfig, IntegrityReport, Outcome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log file to check
    input: PathBuf,

    /// Write the validated messages to this file
    #[arg(short, long)]
    repair_file: Option<PathBuf>,

    /// Print the text of GNTXT sentences
    #[arg(long)]
    gntxt: bool,

    /// Rewinds allowed before giving up
    #[arg(long, default_value_t = 100)]
    rewinds: u32,

    /// Longest accepted NMEA sentence body
    #[arg(long, default_value_t = 128)]
    max_nmea_len: usize,
}

fn print_summary(report: &IntegrityReport, repair_path: Option<&PathBuf>) {
    let stats = &report.statistics;
    println!();
    println!("Processed {} bytes", stats.bytes_processed);
    println!("File size was {}", report.input_len);
    if !report.size_matches() {
        println!("FILE SIZE MISMATCH!!");
    }
    println!("Longest valid UBX message was {} bytes", stats.ubx.longest);
    if stats.nmea.observed {
        println!("Longest valid NMEA message was {} characters", stats.nmea.longest);
    }
    if stats.rtcm.observed {
        println!("Longest valid RTCM message was {} bytes", stats.rtcm.longest);
    }
    if !stats.messages.is_empty() {
        println!("Message types and totals were:");
        for record in stats.messages.iter() {
            println!("  {:<12} {}", record.type_identifier, record.count);
        }
    }
    if report.sync_losses > 0 {
        println!("Sync losses: {}", report.sync_losses);
    }
    if stats.successful_resyncs > 0 {
        println!("Number of successful resyncs: {}", stats.successful_resyncs);
    }
    match report.outcome {
        Outcome::Completed => {}
        Outcome::TruncatedMessage {
            protocol,
            started_at,
        } => println!("Trailing {} message at byte {} is incomplete", protocol, started_at),
        Outcome::EndedEarly { at } => println!("Input ended early at byte {}", at),
        Outcome::RewindLimitExceeded { offset } => {
            println!("Aborted at byte {}: maximum rewind attempts reached", offset)
        }
    }
    if let (Some(path), Some(len)) = (repair_path, report.repaired_len) {
        println!("Repaired data ({} bytes) written to: {}", len, path.display());
    }
    if !report.diagnostics.is_empty() {
        println!("GNTXT:");
        for line in &report.diagnostics {
            println!("  {}", line.trim_end());
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = CheckerConfig::default()
        .with_max_nmea_len(cli.max_nmea_len)
        .with_max_rewinds(cli.rewinds)
        .with_capture_gntxt(cli.gntxt);

    let report = match &cli.repair_file {
        Some(out) => repair_file(&cli.input, out, config)
            .with_context(|| format!("repairing {} into {}", cli.input.display(), out.display()))?,
        None => check_file(&cli.input, config)
            .with_context(|| format!("checking {}", cli.input.display()))?,
    };

    print_summary(&report, cli.repair_file.as_ref());
    if report.aborted() {
        std::process::exit(1);
    }
    Ok(())
}

//! # gnss_integrity — integrity checker and repairer for GNSS receiver logs
//!
//! Scans a byte stream that interleaves UBX, NMEA 0183 and RTCM 3 messages, validates every
//! message's framing and checksum, counts messages per type, and optionally writes a repaired
//! copy that contains only the validated messages.
//!
//! ## Pipeline
//!
//! - **Classifier** ([`classifier`]): byte-at-a-time framing state machine; emits message
//!   starts, rewind points, completed messages and sync losses
//! - **Resync** ([`resync`]): decides when to seek back to a rewind point after sync loss
//! - **Statistics** ([`stats`]): per-type counts and per-protocol longest message
//! - **Repair** ([`repair`]): mirrors input to an output, keeping only confirmed messages
//! - **Driver** ([`checker`]): ties the above together over a [`cursor::ByteSource`]
//!
//! ## Usage
//!
//! ```no_run
//! use gnss_integrity::{check_file, CheckerConfig};
//!
//! let report = check_file("capture.ubx", CheckerConfig::default())?;
//! for record in report.statistics.messages.iter() {
//!     println!("{}: {}", record.type_identifier, record.count);
//! }
//! # Ok::<(), gnss_integrity::IntegrityError>(())
//! ```
//!
//! See `tests/integration.rs` for repair examples.

pub mod checker;
pub mod checksum;
pub mod classifier;
pub mod cursor;
pub mod encode;
pub mod repair;
pub mod resync;
pub mod stats;

pub use checker::{
    check_file, repair_file, CheckerConfig, IntegrityChecker, IntegrityError, IntegrityReport,
    Outcome,
};
pub use classifier::{
    CompletedMessage, FrameClassifier, FrameEvent, FrameState, FramingError, Protocol, SyncLoss,
};
pub use cursor::{ByteSink, ByteSource, FileSource, SeekableSource};
pub use encode::{encode_nmea, encode_rtcm, encode_ubx};
pub use stats::{MessageRecord, MessageTally, ProtocolStats, StreamStatistics};

//! Driver: pulls bytes from the input, feeds the classifier and routes its events to the
//! resync controller, the statistics and the optional repair stream.
//!
//! The input is read strictly forward except when the resync controller asks for a rewind.
//! Processing ends at the declared input length, when the source runs dry early, or when the
//! rewind ceiling is exceeded. In every case the statistics and the repaired output (truncated
//! to the last confirmed message) are valid results.

use crate::classifier::{ClassifierConfig, FrameClassifier, FrameEvent, Protocol, DEFAULT_MAX_NMEA_LEN};
use crate::cursor::{create_repair_file, ByteSink, ByteSource, FileSource};
use crate::repair::RepairStream;
use crate::resync::{ResyncController, ResyncDecision, DEFAULT_MAX_REWINDS};
use crate::stats::StreamStatistics;
use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    #[error("input is empty")]
    EmptyInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Longest accepted NMEA body (characters after `$` through `*`).
    pub max_nmea_len: usize,
    /// Rewinds allowed before the stream is abandoned.
    pub max_rewinds: u32,
    /// Return the text of valid GNTXT sentences in [`IntegrityReport::diagnostics`].
    pub capture_gntxt: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            max_nmea_len: DEFAULT_MAX_NMEA_LEN,
            max_rewinds: DEFAULT_MAX_REWINDS,
            capture_gntxt: false,
        }
    }
}

impl CheckerConfig {
    pub fn with_max_nmea_len(mut self, max_nmea_len: usize) -> Self {
        self.max_nmea_len = max_nmea_len;
        self
    }

    pub fn with_max_rewinds(mut self, max_rewinds: u32) -> Self {
        self.max_rewinds = max_rewinds;
        self
    }

    pub fn with_capture_gntxt(mut self, capture_gntxt: bool) -> Self {
        self.capture_gntxt = capture_gntxt;
        self
    }

    fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            max_nmea_len: self.max_nmea_len,
            capture_gntxt: self.capture_gntxt,
        }
    }
}

/// How processing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every byte up to the declared length was classified.
    Completed,
    /// The input ended inside a message that started at `started_at`.
    TruncatedMessage { protocol: Protocol, started_at: u64 },
    /// The source returned end of input at `at`, before its declared length.
    EndedEarly { at: u64 },
    /// The rewind ceiling was exceeded while processing byte `offset`.
    RewindLimitExceeded { offset: u64 },
}

#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub statistics: StreamStatistics,
    pub input_len: u64,
    pub sync_losses: u64,
    pub rewind_attempts: u32,
    pub outcome: Outcome,
    /// Captured GNTXT sentences, in stream order.
    pub diagnostics: Vec<String>,
    /// Length of the repaired output, when one was written.
    pub repaired_len: Option<u64>,
}

impl IntegrityReport {
    /// True when the number of processed bytes equals the declared input length.
    pub fn size_matches(&self) -> bool {
        self.statistics.bytes_processed == self.input_len
    }

    pub fn aborted(&self) -> bool {
        matches!(self.outcome, Outcome::RewindLimitExceeded { .. })
    }
}

#[derive(Debug, Default, Clone)]
pub struct IntegrityChecker {
    config: CheckerConfig,
}

impl IntegrityChecker {
    pub fn new(config: CheckerConfig) -> Self {
        IntegrityChecker { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Classify the whole input and collect statistics.
    pub fn check(&self, input: &mut dyn ByteSource) -> Result<IntegrityReport, IntegrityError> {
        self.run(input, None)
    }

    /// Classify the input and write every validated message to `output`.
    pub fn check_and_repair(
        &self,
        input: &mut dyn ByteSource,
        output: &mut dyn ByteSink,
    ) -> Result<IntegrityReport, IntegrityError> {
        let mut repair = RepairStream::new(output);
        self.run(input, Some(&mut repair))
    }

    fn run(
        &self,
        input: &mut dyn ByteSource,
        mut repair: Option<&mut RepairStream<'_>>,
    ) -> Result<IntegrityReport, IntegrityError> {
        let input_len = input.len();
        if input_len == 0 {
            return Err(IntegrityError::EmptyInput);
        }

        let mut classifier = FrameClassifier::new(self.config.classifier_config());
        let mut resync = ResyncController::new(self.config.max_rewinds);
        let mut stats = StreamStatistics::default();
        let mut diagnostics = Vec::new();
        let mut sync_losses = 0u64;
        let mut outcome = Outcome::Completed;
        // offset of the next byte to read
        let mut offset = 0u64;

        while offset < input_len {
            let Some(byte) = input.read_one()? else {
                log::warn!("input ended at byte {} of {}", offset, input_len);
                outcome = Outcome::EndedEarly { at: offset };
                break;
            };
            let at = offset;
            offset += 1;

            if let Some(r) = repair.as_deref_mut() {
                r.mirror(byte)?;
            }

            match classifier.feed(byte, at) {
                None => {}
                Some(FrameEvent::MessageStart {
                    protocol,
                    offset: start,
                    after_sync_loss,
                }) => {
                    stats.observe(protocol);
                    if let Some(r) = repair.as_deref_mut() {
                        r.drop_before_marker(byte)?;
                    }
                    if after_sync_loss {
                        log::info!("{} sync marker found at byte {}", protocol, start);
                    }
                }
                Some(FrameEvent::RewindPoint(point)) => resync.set_rewind_point(point),
                Some(FrameEvent::SyncLost(loss)) => {
                    sync_losses += 1;
                    log::warn!(
                        "{}; sync lost at byte {}, attempting to resync",
                        loss.error,
                        loss.offset
                    );
                    resync.on_sync_lost(loss.offset);
                }
                Some(FrameEvent::Complete(message)) => {
                    log::debug!(
                        "{} {} ({} bytes) at {}..={}",
                        message.protocol,
                        message.type_identifier.as_deref().unwrap_or("-"),
                        message.byte_len(),
                        message.start_offset,
                        message.end_offset
                    );
                    stats.record(&message);
                    if let Some(text) = message.diagnostic.as_deref() {
                        log::info!("{}", text.trim_end());
                        diagnostics.push(text.to_string());
                    }
                    if resync.on_message_complete() {
                        log::info!(
                            "sync re-established at byte {}; the {} message started at byte {}",
                            message.end_offset,
                            message.protocol,
                            message.start_offset
                        );
                        if let Some(r) = repair.as_deref_mut() {
                            let bytes = reread(input, message.start_offset, message.byte_len())?;
                            r.replace_unconfirmed(&bytes)?;
                        }
                    } else if let Some(r) = repair.as_deref_mut() {
                        r.confirm();
                    }
                }
            }

            let at_end = offset >= input_len;
            match resync.check(classifier.is_sync_lost(), stats.any_message_recorded(), at_end) {
                ResyncDecision::Continue => {}
                ResyncDecision::Rewind(point) => {
                    log::warn!(
                        "sync has been lost while processing byte {}; rewinding to byte {}",
                        at,
                        point
                    );
                    input.seek_to(point)?;
                    offset = point;
                    if let Some(r) = repair.as_deref_mut() {
                        r.rewind()?;
                    }
                }
                ResyncDecision::Abort => {
                    log::error!(
                        "maximum rewind attempts ({}) reached at byte {}; aborting",
                        self.config.max_rewinds,
                        at
                    );
                    outcome = Outcome::RewindLimitExceeded { offset: at };
                    break;
                }
            }
        }

        if outcome == Outcome::Completed {
            if let Some(started_at) = classifier.pending_start() {
                let protocol = classifier.pending_protocol().unwrap_or(Protocol::Ubx);
                log::warn!(
                    "input ended inside a {} message that started at byte {}",
                    protocol,
                    started_at
                );
                outcome = Outcome::TruncatedMessage {
                    protocol,
                    started_at,
                };
            }
        }

        stats.bytes_processed = offset;
        stats.successful_resyncs = resync.state().successful_resyncs;
        let repaired_len = match repair {
            Some(r) => Some(r.finish()?),
            None => None,
        };

        Ok(IntegrityReport {
            statistics: stats,
            input_len,
            sync_losses,
            rewind_attempts: resync.state().rewind_attempts,
            outcome,
            diagnostics,
            repaired_len,
        })
    }
}

/// Read `len` bytes starting at `start`; leaves the input positioned after them.
fn reread(input: &mut dyn ByteSource, start: u64, len: u64) -> io::Result<Vec<u8>> {
    input.seek_to(start)?;
    let mut bytes = Vec::with_capacity(len as usize);
    for _ in 0..len {
        match input.read_one()? {
            Some(b) => bytes.push(b),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input shrank while copying a message to the repair output",
                ))
            }
        }
    }
    Ok(bytes)
}

/// Check a file on disk.
pub fn check_file(path: impl AsRef<Path>, config: CheckerConfig) -> Result<IntegrityReport, IntegrityError> {
    let mut input = FileSource::open(path)?;
    IntegrityChecker::new(config).check(&mut input)
}

/// Check a file on disk and write the validated messages to `repair_path`.
pub fn repair_file(
    path: impl AsRef<Path>,
    repair_path: impl AsRef<Path>,
    config: CheckerConfig,
) -> Result<IntegrityReport, IntegrityError> {
    let mut input = FileSource::open(path)?;
    let mut output = create_repair_file(repair_path)?;
    IntegrityChecker::new(config).check_and_repair(&mut input, &mut output)
}

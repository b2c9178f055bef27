//! Rewind bookkeeping after sync loss.
//!
//! A single dropped byte inside a message shifts its checksum onto the header of the next
//! message, so by the time the checksum fails the next message has already been partly
//! consumed. The controller remembers the last rewind point the classifier reported and,
//! once sync is lost, asks the driver to seek back there and rescan. At most one rewind is
//! allowed until the next valid message completes, and the total number of rewinds is capped.

/// Default ceiling on rewinds for one stream.
pub const DEFAULT_MAX_REWINDS: u32 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResyncState {
    /// Offset of the most recent sync loss.
    pub sync_lost_at: Option<u64>,
    pub resync_in_progress: bool,
    pub rewind_in_progress: bool,
    pub rewind_attempts: u32,
    pub successful_resyncs: u64,
}

/// What the driver should do after the current byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncDecision {
    Continue,
    /// Seek the input to this offset and keep scanning.
    Rewind(u64),
    /// Rewind ceiling exceeded; stop processing.
    Abort,
}

#[derive(Debug, Clone)]
pub struct ResyncController {
    max_rewinds: u32,
    state: ResyncState,
    rewind_point: Option<u64>,
}

impl Default for ResyncController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REWINDS)
    }
}

impl ResyncController {
    pub fn new(max_rewinds: u32) -> Self {
        ResyncController {
            max_rewinds,
            state: ResyncState::default(),
            rewind_point: None,
        }
    }

    pub fn state(&self) -> &ResyncState {
        &self.state
    }

    pub fn rewind_point(&self) -> Option<u64> {
        self.rewind_point
    }

    pub fn set_rewind_point(&mut self, offset: u64) {
        self.rewind_point = Some(offset);
    }

    pub fn on_sync_lost(&mut self, offset: u64) {
        self.state.sync_lost_at = Some(offset);
        self.state.resync_in_progress = true;
    }

    /// A valid message completed. Returns true if it ended a resync.
    pub fn on_message_complete(&mut self) -> bool {
        self.state.rewind_in_progress = false;
        self.rewind_point = None;
        if self.state.resync_in_progress {
            self.state.resync_in_progress = false;
            self.state.successful_resyncs += 1;
            true
        } else {
            false
        }
    }

    /// Decide whether to rewind after a byte has been classified.
    ///
    /// A rewind needs: sync lost, at least one message already recorded, no rewind already in
    /// flight, a known rewind point, and input left to read.
    pub fn check(&mut self, sync_lost: bool, any_message_recorded: bool, at_end: bool) -> ResyncDecision {
        if !sync_lost || !any_message_recorded || self.state.rewind_in_progress || at_end {
            return ResyncDecision::Continue;
        }
        let Some(point) = self.rewind_point else {
            return ResyncDecision::Continue;
        };
        self.state.rewind_attempts += 1;
        if self.state.rewind_attempts > self.max_rewinds {
            return ResyncDecision::Abort;
        }
        self.state.rewind_in_progress = true;
        ResyncDecision::Rewind(point)
    }
}

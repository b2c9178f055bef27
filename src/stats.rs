//! Per-type message counts and per-protocol length records.

use crate::classifier::{CompletedMessage, Protocol};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub type_identifier: String,
    pub count: u64,
}

/// Message counts keyed by type identifier, iterated in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct MessageTally {
    records: Vec<MessageRecord>,
    index: HashMap<String, usize>,
}

impl MessageTally {
    pub fn increment(&mut self, type_identifier: &str) {
        let records = &mut self.records;
        let i = *self
            .index
            .entry(type_identifier.to_string())
            .or_insert_with(|| {
                records.push(MessageRecord {
                    type_identifier: type_identifier.to_string(),
                    count: 0,
                });
                records.len() - 1
            });
        records[i].count += 1;
    }

    pub fn count(&self, type_identifier: &str) -> u64 {
        self.index
            .get(type_identifier)
            .map(|&i| self.records[i].count)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.records.iter().map(|r| r.count).sum()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolStats {
    /// A sync marker for this protocol was seen (valid or not).
    pub observed: bool,
    /// Longest valid message, in the protocol's own length measure.
    pub longest: usize,
}

#[derive(Debug, Default, Clone)]
pub struct StreamStatistics {
    pub ubx: ProtocolStats,
    pub nmea: ProtocolStats,
    pub rtcm: ProtocolStats,
    pub messages: MessageTally,
    pub bytes_processed: u64,
    pub successful_resyncs: u64,
}

impl StreamStatistics {
    pub fn protocol(&self, protocol: Protocol) -> &ProtocolStats {
        match protocol {
            Protocol::Ubx => &self.ubx,
            Protocol::Nmea => &self.nmea,
            Protocol::Rtcm => &self.rtcm,
        }
    }

    fn protocol_mut(&mut self, protocol: Protocol) -> &mut ProtocolStats {
        match protocol {
            Protocol::Ubx => &mut self.ubx,
            Protocol::Nmea => &mut self.nmea,
            Protocol::Rtcm => &mut self.rtcm,
        }
    }

    pub fn observe(&mut self, protocol: Protocol) {
        self.protocol_mut(protocol).observed = true;
    }

    /// Count a completed message. Messages without a type identifier are not tallied and do
    /// not contribute to the length record; returns whether the message was counted.
    pub fn record(&mut self, message: &CompletedMessage) -> bool {
        let Some(type_identifier) = message.type_identifier.as_deref() else {
            return false;
        };
        self.messages.increment(type_identifier);
        let stats = self.protocol_mut(message.protocol);
        stats.longest = stats.longest.max(message.length);
        true
    }

    pub fn any_message_recorded(&self) -> bool {
        !self.messages.is_empty()
    }
}

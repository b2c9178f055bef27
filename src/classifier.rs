//! Byte-level framing state machine for interleaved UBX, NMEA and RTCM 3 data.
//!
//! [`FrameClassifier::feed`] takes one byte and its absolute offset in the input and returns
//! at most one [`FrameEvent`]. The classifier never touches the input itself: rewinding and
//! repair are the driver's job (see [`crate::checker`]).
//!
//! ## Framing
//!
//! | Protocol | Layout | Check |
//! |----------|--------|-------|
//! | UBX | `B5 62` class id len(2, LE) payload ck_a ck_b | 8-bit dual sum over class..payload |
//! | NMEA | `$` address `,` fields `*` hex hex `CR LF` | XOR of chars between `$` and `*` |
//! | RTCM 3 | `D3` len(10 bits) type(12 bits) payload crc(3, BE) | CRC-24Q over `D3`..payload |
//!
//! ## Rewind points
//!
//! Once a message has advanced far enough that a dropped byte would shift its checksum onto
//! the next message's header, the classifier emits [`FrameEvent::RewindPoint`]. Resync then
//! restarts from that byte instead of from the byte after the failure, so the message that
//! follows the corrupted one is not swallowed.

use crate::checksum::{crc24q, dual_sum, xor_accumulate, xor_to_ascii_hex, DualSum};
use std::fmt;

pub const UBX_SYNC_1: u8 = 0xB5;
pub const UBX_SYNC_2: u8 = 0x62;
pub const NMEA_START: u8 = b'$';
pub const NMEA_CHECKSUM_MARK: u8 = b'*';
pub const RTCM_PREAMBLE: u8 = 0xD3;

/// Default bound on the characters between `$` and `*` (inclusive of `*`).
pub const DEFAULT_MAX_NMEA_LEN: usize = 128;

/// RTCM message type whose subtype is part of the reported type identifier.
pub const RTCM_SUBTYPED_MESSAGE: u16 = 4072;

/// NMEA address whose full sentence can be captured as a diagnostic.
pub const GNTXT: &str = "GNTXT";

const NMEA_ADDRESS_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ubx,
    Nmea,
    Rtcm,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Ubx => "UBX",
            Protocol::Nmea => "NMEA",
            Protocol::Rtcm => "RTCM",
        };
        f.write_str(name)
    }
}

/// Framing state. Exactly one is active; the classifier starts in [`FrameState::SyncLost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between messages, expecting `B5`, `$` or `D3`.
    AwaitingSync,
    /// No frame established; scanning for a sync marker.
    SyncLost,
    UbxSync2,
    UbxClass,
    UbxId,
    UbxLengthLsb,
    UbxLengthMsb,
    UbxPayload,
    UbxChecksumA,
    UbxChecksumB,
    /// Address and fields, up to and including `*`.
    NmeaBody,
    NmeaChecksum1,
    NmeaChecksum2,
    NmeaCr,
    NmeaLf,
    /// Six reserved bits and the two high length bits.
    RtcmLength1,
    RtcmLength2,
    RtcmType1,
    RtcmType2,
    RtcmSubtype,
    RtcmPayload,
    RtcmCrc1,
    RtcmCrc2,
    RtcmCrc3,
}

impl FrameState {
    /// True while a message has started but not yet completed or failed.
    pub fn in_message(self) -> bool {
        !matches!(self, FrameState::AwaitingSync | FrameState::SyncLost)
    }
}

/// Why the classifier lost sync.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("expected UBX sync char 2 (0x62), found 0x{found:02X}")]
    UbxSync2 { found: u8 },
    #[error("UBX checksum error: expected {expected:02X?}, found {found:02X?}")]
    UbxChecksum { expected: [u8; 2], found: [u8; 2] },
    #[error("excessive NMEA message length (limit {limit})")]
    NmeaTooLong { limit: usize },
    #[error("NMEA checksum error: expected {}, found {}", ascii(expected), ascii(found))]
    NmeaChecksum { expected: [u8; 2], found: [u8; 2] },
    #[error("NMEA CR not found (0x{found:02X})")]
    NmeaMissingCr { found: u8 },
    #[error("NMEA LF not found (0x{found:02X})")]
    NmeaMissingLf { found: u8 },
    #[error("RTCM checksum error: expected 0x{expected:06X}, found 0x{found:06X}")]
    RtcmCrc { expected: u32, found: u32 },
}

fn ascii(pair: &[u8; 2]) -> String {
    String::from_utf8_lossy(pair).into_owned()
}

/// A checksum-valid message that just finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMessage {
    pub protocol: Protocol,
    /// `"0x01 0x07"` (UBX), `"GNGGA"` (NMEA), `"1005"` or `"4072_0"` (RTCM). `None` for RTCM
    /// frames too short to carry a message type.
    pub type_identifier: Option<String>,
    /// UBX: payload + 8. NMEA: characters after `$` through `*`. RTCM: payload + 6.
    pub length: usize,
    pub start_offset: u64,
    pub end_offset: u64,
    /// Full sentence text for captured GNTXT messages.
    pub diagnostic: Option<String>,
}

impl CompletedMessage {
    /// Bytes from the sync marker through the last checksum/terminator byte.
    pub fn byte_len(&self) -> u64 {
        self.end_offset - self.start_offset + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLoss {
    pub offset: u64,
    pub protocol: Protocol,
    pub error: FramingError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A sync marker was accepted.
    MessageStart {
        protocol: Protocol,
        offset: u64,
        after_sync_loss: bool,
    },
    /// Resync may restart from this offset if the current message fails.
    RewindPoint(u64),
    Complete(CompletedMessage),
    SyncLost(SyncLoss),
}

/// Classifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub max_nmea_len: usize,
    pub capture_gntxt: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            max_nmea_len: DEFAULT_MAX_NMEA_LEN,
            capture_gntxt: false,
        }
    }
}

/// Framing fields of the message in progress.
#[derive(Debug, Default, Clone)]
struct PendingMessage {
    protocol: Option<Protocol>,
    start_offset: u64,
    /// Declared payload length (UBX, RTCM) or observed character count (NMEA).
    length: usize,
    /// Payload bytes still to come (UBX, RTCM).
    remaining: usize,
    ubx_class: u8,
    ubx_id: u8,
    ubx_sum: DualSum,
    ubx_received_a: u8,
    nmea_address: [u8; NMEA_ADDRESS_LEN],
    nmea_address_len: usize,
    /// Set once `,` or `*` ends the address before five characters.
    nmea_address_done: bool,
    nmea_xor: u8,
    nmea_expected: [u8; 2],
    nmea_received_1: u8,
    rtcm_type: u16,
    rtcm_subtype: u16,
    rtcm_has_type: bool,
    rtcm_has_subtype: bool,
    rtcm_crc: u32,
    rtcm_received: u32,
    /// Sentence text; only allocated when GNTXT capture is on and the address may still match.
    diagnostic: Option<Vec<u8>>,
}

impl PendingMessage {
    fn begin(protocol: Protocol, offset: u64) -> Self {
        PendingMessage {
            protocol: Some(protocol),
            start_offset: offset,
            ..Default::default()
        }
    }

    fn nmea_address(&self) -> &[u8] {
        &self.nmea_address[..self.nmea_address_len]
    }

    fn type_identifier(&self) -> Option<String> {
        match self.protocol? {
            Protocol::Ubx => Some(format!("0x{:02X} 0x{:02X}", self.ubx_class, self.ubx_id)),
            Protocol::Nmea => Some(String::from_utf8_lossy(self.nmea_address()).into_owned()),
            Protocol::Rtcm if !self.rtcm_has_type => None,
            Protocol::Rtcm if self.rtcm_has_subtype && self.rtcm_type == RTCM_SUBTYPED_MESSAGE => {
                Some(format!("{:04}_{}", self.rtcm_type, self.rtcm_subtype))
            }
            Protocol::Rtcm => Some(format!("{:04}", self.rtcm_type)),
        }
    }
}

/// The framing state machine. One instance per input stream.
#[derive(Debug, Clone)]
pub struct FrameClassifier {
    config: ClassifierConfig,
    state: FrameState,
    pending: PendingMessage,
}

impl Default for FrameClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl FrameClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        FrameClassifier {
            config,
            state: FrameState::SyncLost,
            pending: PendingMessage::default(),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_sync_lost(&self) -> bool {
        self.state == FrameState::SyncLost
    }

    /// Offset of the sync marker of the message in progress, if any.
    pub fn pending_start(&self) -> Option<u64> {
        self.state.in_message().then_some(self.pending.start_offset)
    }

    pub fn pending_protocol(&self) -> Option<Protocol> {
        if self.state.in_message() {
            self.pending.protocol
        } else {
            None
        }
    }

    /// Consume one byte at absolute `offset`.
    pub fn feed(&mut self, byte: u8, offset: u64) -> Option<FrameEvent> {
        match self.state {
            FrameState::AwaitingSync | FrameState::SyncLost => self.on_sync(byte, offset),
            FrameState::UbxSync2
            | FrameState::UbxClass
            | FrameState::UbxId
            | FrameState::UbxLengthLsb
            | FrameState::UbxLengthMsb
            | FrameState::UbxPayload
            | FrameState::UbxChecksumA
            | FrameState::UbxChecksumB => self.on_ubx(byte, offset),
            FrameState::NmeaBody
            | FrameState::NmeaChecksum1
            | FrameState::NmeaChecksum2
            | FrameState::NmeaCr
            | FrameState::NmeaLf => self.on_nmea(byte, offset),
            FrameState::RtcmLength1
            | FrameState::RtcmLength2
            | FrameState::RtcmType1
            | FrameState::RtcmType2
            | FrameState::RtcmSubtype
            | FrameState::RtcmPayload
            | FrameState::RtcmCrc1
            | FrameState::RtcmCrc2
            | FrameState::RtcmCrc3 => self.on_rtcm(byte, offset),
        }
    }

    fn on_sync(&mut self, byte: u8, offset: u64) -> Option<FrameEvent> {
        let after_sync_loss = self.state == FrameState::SyncLost;
        let protocol = match byte {
            UBX_SYNC_1 => {
                self.state = FrameState::UbxSync2;
                Protocol::Ubx
            }
            NMEA_START => {
                self.state = FrameState::NmeaBody;
                Protocol::Nmea
            }
            RTCM_PREAMBLE => {
                self.state = FrameState::RtcmLength1;
                Protocol::Rtcm
            }
            _ => {
                self.state = FrameState::SyncLost;
                return None;
            }
        };
        self.pending = PendingMessage::begin(protocol, offset);
        match protocol {
            Protocol::Nmea if self.config.capture_gntxt => {
                self.pending.diagnostic = Some(vec![NMEA_START]);
            }
            Protocol::Rtcm => self.pending.rtcm_crc = crc24q(byte, 0),
            _ => {}
        }
        Some(FrameEvent::MessageStart {
            protocol,
            offset,
            after_sync_loss,
        })
    }

    fn on_ubx(&mut self, byte: u8, offset: u64) -> Option<FrameEvent> {
        let p = &mut self.pending;
        match self.state {
            FrameState::UbxSync2 => {
                if byte != UBX_SYNC_2 {
                    return self.lose_sync(offset, FramingError::UbxSync2 { found: byte });
                }
                p.ubx_sum = DualSum::default();
                self.state = FrameState::UbxClass;
            }
            FrameState::UbxClass => {
                p.ubx_class = byte;
                p.ubx_sum = dual_sum(byte, p.ubx_sum);
                self.state = FrameState::UbxId;
            }
            FrameState::UbxId => {
                p.ubx_id = byte;
                p.ubx_sum = dual_sum(byte, p.ubx_sum);
                self.state = FrameState::UbxLengthLsb;
            }
            FrameState::UbxLengthLsb => {
                p.length = byte as usize;
                p.ubx_sum = dual_sum(byte, p.ubx_sum);
                self.state = FrameState::UbxLengthMsb;
            }
            FrameState::UbxLengthMsb => {
                p.length |= (byte as usize) << 8;
                p.remaining = p.length;
                p.ubx_sum = dual_sum(byte, p.ubx_sum);
                self.state = if p.remaining > 0 {
                    FrameState::UbxPayload
                } else {
                    FrameState::UbxChecksumA
                };
                return Some(FrameEvent::RewindPoint(offset));
            }
            FrameState::UbxPayload => {
                p.ubx_sum = dual_sum(byte, p.ubx_sum);
                p.remaining -= 1;
                if p.remaining == 0 {
                    self.state = FrameState::UbxChecksumA;
                }
            }
            FrameState::UbxChecksumA => {
                p.ubx_received_a = byte;
                self.state = FrameState::UbxChecksumB;
            }
            FrameState::UbxChecksumB => {
                let expected = p.ubx_sum.to_bytes();
                let found = [p.ubx_received_a, byte];
                if expected != found {
                    return self.lose_sync(offset, FramingError::UbxChecksum { expected, found });
                }
                let length = p.length + 8;
                return self.complete(length, offset, None);
            }
            _ => unreachable!("on_ubx called in {:?}", self.state),
        }
        None
    }

    fn on_nmea(&mut self, byte: u8, offset: u64) -> Option<FrameEvent> {
        let p = &mut self.pending;
        if let Some(text) = p.diagnostic.as_mut() {
            text.push(byte);
        }
        match self.state {
            FrameState::NmeaBody => {
                p.length += 1;
                if p.length > self.config.max_nmea_len {
                    let limit = self.config.max_nmea_len;
                    return self.lose_sync(offset, FramingError::NmeaTooLong { limit });
                }
                let rewind = (p.length == 1).then_some(FrameEvent::RewindPoint(offset));
                if !p.nmea_address_done {
                    if byte == b',' || byte == NMEA_CHECKSUM_MARK {
                        p.nmea_address_done = true;
                    } else {
                        p.nmea_address[p.nmea_address_len] = byte;
                        p.nmea_address_len += 1;
                        p.nmea_address_done = p.nmea_address_len == NMEA_ADDRESS_LEN;
                    }
                    if p.nmea_address_done && p.nmea_address() != GNTXT.as_bytes() {
                        p.diagnostic = None;
                    }
                }
                if byte == NMEA_CHECKSUM_MARK {
                    p.nmea_expected = xor_to_ascii_hex(p.nmea_xor);
                    self.state = FrameState::NmeaChecksum1;
                } else {
                    p.nmea_xor = xor_accumulate(byte, p.nmea_xor);
                }
                return rewind;
            }
            FrameState::NmeaChecksum1 => {
                p.nmea_received_1 = byte;
                self.state = FrameState::NmeaChecksum2;
            }
            FrameState::NmeaChecksum2 => {
                let expected = p.nmea_expected;
                let found = [p.nmea_received_1, byte];
                if expected != found {
                    return self.lose_sync(offset, FramingError::NmeaChecksum { expected, found });
                }
                self.state = FrameState::NmeaCr;
            }
            FrameState::NmeaCr => {
                if byte != b'\r' {
                    return self.lose_sync(offset, FramingError::NmeaMissingCr { found: byte });
                }
                self.state = FrameState::NmeaLf;
            }
            FrameState::NmeaLf => {
                if byte != b'\n' {
                    return self.lose_sync(offset, FramingError::NmeaMissingLf { found: byte });
                }
                let length = p.length;
                let diagnostic = p
                    .diagnostic
                    .take()
                    .map(|text| String::from_utf8_lossy(&text).into_owned());
                return self.complete(length, offset, diagnostic);
            }
            _ => unreachable!("on_nmea called in {:?}", self.state),
        }
        None
    }

    fn on_rtcm(&mut self, byte: u8, offset: u64) -> Option<FrameEvent> {
        let p = &mut self.pending;
        match self.state {
            FrameState::RtcmLength1 => {
                p.length = ((byte & 0x03) as usize) << 8;
                p.rtcm_crc = crc24q(byte, p.rtcm_crc);
                self.state = FrameState::RtcmLength2;
                return Some(FrameEvent::RewindPoint(offset));
            }
            FrameState::RtcmLength2 => {
                p.length |= byte as usize;
                p.remaining = p.length;
                p.rtcm_crc = crc24q(byte, p.rtcm_crc);
                self.state = if p.remaining > 0 {
                    FrameState::RtcmType1
                } else {
                    FrameState::RtcmCrc1
                };
            }
            FrameState::RtcmType1 => {
                p.rtcm_type = (byte as u16) << 4;
                p.rtcm_crc = crc24q(byte, p.rtcm_crc);
                p.remaining -= 1;
                self.state = rtcm_next(p.remaining, FrameState::RtcmType2);
            }
            FrameState::RtcmType2 => {
                p.rtcm_type |= (byte >> 4) as u16;
                p.rtcm_subtype = ((byte & 0x0F) as u16) << 8;
                p.rtcm_has_type = true;
                p.rtcm_crc = crc24q(byte, p.rtcm_crc);
                p.remaining -= 1;
                self.state = rtcm_next(p.remaining, FrameState::RtcmSubtype);
            }
            FrameState::RtcmSubtype => {
                p.rtcm_subtype |= byte as u16;
                p.rtcm_has_subtype = true;
                p.rtcm_crc = crc24q(byte, p.rtcm_crc);
                p.remaining -= 1;
                self.state = rtcm_next(p.remaining, FrameState::RtcmPayload);
            }
            FrameState::RtcmPayload => {
                p.rtcm_crc = crc24q(byte, p.rtcm_crc);
                p.remaining -= 1;
                if p.remaining == 0 {
                    self.state = FrameState::RtcmCrc1;
                }
            }
            FrameState::RtcmCrc1 => {
                p.rtcm_received = (byte as u32) << 16;
                self.state = FrameState::RtcmCrc2;
            }
            FrameState::RtcmCrc2 => {
                p.rtcm_received |= (byte as u32) << 8;
                self.state = FrameState::RtcmCrc3;
            }
            FrameState::RtcmCrc3 => {
                let found = p.rtcm_received | byte as u32;
                let expected = p.rtcm_crc;
                if expected != found {
                    return self.lose_sync(offset, FramingError::RtcmCrc { expected, found });
                }
                let length = p.length + 6;
                return self.complete(length, offset, None);
            }
            _ => unreachable!("on_rtcm called in {:?}", self.state),
        }
        None
    }

    fn complete(
        &mut self,
        length: usize,
        offset: u64,
        diagnostic: Option<String>,
    ) -> Option<FrameEvent> {
        let protocol = self.pending.protocol?;
        self.state = FrameState::AwaitingSync;
        Some(FrameEvent::Complete(CompletedMessage {
            protocol,
            type_identifier: self.pending.type_identifier(),
            length,
            start_offset: self.pending.start_offset,
            end_offset: offset,
            diagnostic,
        }))
    }

    fn lose_sync(&mut self, offset: u64, error: FramingError) -> Option<FrameEvent> {
        let protocol = self.pending.protocol?;
        self.state = FrameState::SyncLost;
        self.pending.diagnostic = None;
        Some(FrameEvent::SyncLost(SyncLoss {
            offset,
            protocol,
            error,
        }))
    }
}

fn rtcm_next(remaining: usize, next: FrameState) -> FrameState {
    if remaining > 0 {
        next
    } else {
        FrameState::RtcmCrc1
    }
}

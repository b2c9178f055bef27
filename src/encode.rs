//! Build checksum-valid UBX, NMEA and RTCM 3 frames.
//!
//! The checker never needs these; they produce fixtures for tests, benchmarks and fuzzing,
//! and let callers synthesise streams with known-good framing.

use crate::checksum::{crc24q_of, dual_sum_of, xor_of, xor_to_ascii_hex};
use crate::classifier::{NMEA_CHECKSUM_MARK, NMEA_START, RTCM_PREAMBLE, UBX_SYNC_1, UBX_SYNC_2};
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

/// Largest payload an RTCM 3 frame can declare (10-bit length).
pub const RTCM_MAX_PAYLOAD: usize = 0x3FF;

/// Encode a UBX frame: sync, class, id, little-endian length, payload, checksum.
///
/// Panics if `payload` is longer than `u16::MAX`.
pub fn encode_ubx(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= u16::MAX as usize, "UBX payload longer than 65535 bytes");
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.push(UBX_SYNC_1);
    out.push(UBX_SYNC_2);
    out.push(class);
    out.push(id);
    // Vec<u8> writes are infallible
    let _ = out.write_u16::<LittleEndian>(payload.len() as u16);
    out.extend_from_slice(payload);
    let ck = dual_sum_of(&out[2..]);
    out.extend_from_slice(&ck.to_bytes());
    out
}

/// Encode an NMEA sentence from the text between `$` and `*`, e.g. `"GNTXT,01,01,02,hello"`.
pub fn encode_nmea(body: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 6);
    out.push(NMEA_START);
    out.extend_from_slice(body.as_bytes());
    out.push(NMEA_CHECKSUM_MARK);
    out.extend_from_slice(&xor_to_ascii_hex(xor_of(body.as_bytes())));
    out.extend_from_slice(b"\r\n");
    out
}

/// Encode an RTCM 3 frame around `payload` (which starts with the 12-bit message type).
///
/// Panics if `payload` is longer than [`RTCM_MAX_PAYLOAD`].
pub fn encode_rtcm(payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= RTCM_MAX_PAYLOAD, "RTCM payload longer than 1023 bytes");
    let mut out = Vec::with_capacity(payload.len() + 6);
    out.push(RTCM_PREAMBLE);
    let _ = out.write_u16::<BigEndian>(payload.len() as u16);
    out.extend_from_slice(payload);
    let crc = crc24q_of(&out);
    let _ = out.write_u24::<BigEndian>(crc);
    out
}

/// First two payload bytes of an RTCM 3 message carrying `message_type` (12 bits) and the
/// top nibble of `subtype`.
pub fn rtcm_type_header(message_type: u16, subtype: u16) -> [u8; 3] {
    [
        (message_type >> 4) as u8,
        (((message_type & 0x0F) << 4) as u8) | ((subtype >> 8) & 0x0F) as u8,
        (subtype & 0xFF) as u8,
    ]
}

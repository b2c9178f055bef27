//! Checksum primitives for the three framings.
//!
//! Every function is incremental: the caller keeps the accumulator and feeds one byte at a
//! time. The slice helpers (`*_of`) fold a whole buffer and exist for encoders and tests.

/// UBX running checksum: two 8-bit accumulators (`CK_A`, `CK_B`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DualSum {
    pub a: u8,
    pub b: u8,
}

impl DualSum {
    pub fn to_bytes(self) -> [u8; 2] {
        [self.a, self.b]
    }
}

/// Add one byte to a UBX checksum. `a` sums the bytes, `b` sums the successive values of `a`.
#[inline]
pub fn dual_sum(byte: u8, acc: DualSum) -> DualSum {
    let a = acc.a.wrapping_add(byte);
    let b = acc.b.wrapping_add(a);
    DualSum { a, b }
}

/// UBX checksum over class, id, length and payload bytes.
pub fn dual_sum_of(bytes: &[u8]) -> DualSum {
    bytes.iter().fold(DualSum::default(), |acc, &b| dual_sum(b, acc))
}

/// Add one character to an NMEA checksum.
#[inline]
pub fn xor_accumulate(byte: u8, acc: u8) -> u8 {
    acc ^ byte
}

/// NMEA checksum over the characters between `$` and `*`.
pub fn xor_of(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &b| xor_accumulate(b, acc))
}

/// Render an NMEA checksum as two uppercase ASCII-hex characters, high nibble first.
pub fn xor_to_ascii_hex(acc: u8) -> [u8; 2] {
    [nibble_to_ascii(acc >> 4), nibble_to_ascii(acc & 0x0F)]
}

fn nibble_to_ascii(nibble: u8) -> u8 {
    let c = nibble + 0x30;
    // ':' follows '9'; skip the punctuation gap to land on 'A'..'F'
    if c >= 0x3A {
        c + 7
    } else {
        c
    }
}

/// CRC-24Q generator polynomial (x^24 + x^23 + x^18 + x^17 + x^14 + x^11 + x^10 + x^7 + x^6 +
/// x^5 + x^4 + x^3 + x + 1).
pub const CRC24Q_POLY: u32 = 0x0186_4CFB;

const CRC24_MASK: u32 = 0x00FF_FFFF;

/// Add one byte to an RTCM 3 CRC-24Q. The seed at the start of each message is zero.
#[inline]
pub fn crc24q(byte: u8, acc: u32) -> u32 {
    let mut crc = acc ^ ((byte as u32) << 16);
    for _ in 0..8 {
        crc <<= 1;
        if crc & 0x0100_0000 != 0 {
            crc ^= CRC24Q_POLY;
        }
    }
    crc & CRC24_MASK
}

/// CRC-24Q over an RTCM 3 frame from the `0xD3` header through the last payload byte.
pub fn crc24q_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, &b| crc24q(b, acc))
}

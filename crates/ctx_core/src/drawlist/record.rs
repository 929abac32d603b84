//! Fixed-size drawlist record

use bytemuck::{Pod, Zeroable};

/// Size of one record in bytes
pub const RECORD_SIZE: usize = 9;

/// Payload bytes carried by one record
pub const PAYLOAD_SIZE: usize = 8;

/// One 9-byte record: an opcode followed by an 8-byte payload.
///
/// The payload is read as two `f32`, two `u32`, four `i16` or eight `u8`,
/// all little-endian. Continuation records carry opcode `0`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Record {
    pub code: u8,
    pub data: [u8; PAYLOAD_SIZE],
}

impl Record {
    pub const fn new(code: u8, data: [u8; PAYLOAD_SIZE]) -> Self {
        Self { code, data }
    }

    pub fn with_f32(code: u8, a: f32, b: f32) -> Self {
        let mut data = [0u8; PAYLOAD_SIZE];
        data[..4].copy_from_slice(&a.to_le_bytes());
        data[4..].copy_from_slice(&b.to_le_bytes());
        Self { code, data }
    }

    pub fn with_u32(code: u8, a: u32, b: u32) -> Self {
        let mut data = [0u8; PAYLOAD_SIZE];
        data[..4].copy_from_slice(&a.to_le_bytes());
        data[4..].copy_from_slice(&b.to_le_bytes());
        Self { code, data }
    }

    pub fn with_i16(code: u8, v: [i16; 4]) -> Self {
        let mut data = [0u8; PAYLOAD_SIZE];
        for (i, x) in v.iter().enumerate() {
            data[i * 2..i * 2 + 2].copy_from_slice(&x.to_le_bytes());
        }
        Self { code, data }
    }

    pub fn with_i8(code: u8, v: [i8; 8]) -> Self {
        Self {
            code,
            data: v.map(|x| x as u8),
        }
    }

    /// `f32` slot 0 or 1
    pub fn f32(&self, slot: usize) -> f32 {
        f32::from_le_bytes(self.word(slot))
    }

    /// `u32` slot 0 or 1
    pub fn u32(&self, slot: usize) -> u32 {
        u32::from_le_bytes(self.word(slot))
    }

    /// `i16` slot 0..4
    pub fn i16(&self, slot: usize) -> i16 {
        i16::from_le_bytes([self.data[slot * 2], self.data[slot * 2 + 1]])
    }

    /// `i8` slot 0..8
    pub fn i8(&self, slot: usize) -> i8 {
        self.data[slot] as i8
    }

    fn word(&self, slot: usize) -> [u8; 4] {
        let o = slot * 4;
        [
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_nine_bytes() {
        assert_eq!(std::mem::size_of::<Record>(), RECORD_SIZE);
        assert_eq!(std::mem::align_of::<Record>(), 1);
    }

    #[test]
    fn test_payload_views_share_storage() {
        let r = Record::with_f32(b'M', 1.5, -2.0);
        assert_eq!(r.f32(0), 1.5);
        assert_eq!(r.f32(1), -2.0);
        assert_eq!(r.u32(0), 1.5f32.to_bits());

        let r = Record::with_i16(b'4', [1, -2, 300, -400]);
        assert_eq!((r.i16(0), r.i16(1), r.i16(2), r.i16(3)), (1, -2, 300, -400));

        let r = Record::with_i8(b'0', [1, -1, 2, -2, 3, -3, 127, -128]);
        assert_eq!(r.i8(6), 127);
        assert_eq!(r.i8(7), -128);
    }
}

//! Deterministic state digest for desync detection.
//!
//! A 32-bit FNV-1a fold over an explicitly ordered traversal of the
//! simulation state. Floats are scaled by 1000 and floored to integers
//! before mixing, so two runs that agree to millimeter precision produce
//! the same digest while any real divergence flips it. Collections are
//! always mixed as count-then-items in storage order; the traversal
//! itself lives with the simulation, which owns the field order.

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Fixed-point scale applied to floats before mixing.
const FLOAT_SCALE: f32 = 1000.0;

/// Incremental FNV-1a 32-bit hasher.
///
/// Not a `std::hash::Hasher`: the simulation needs a stable, documented
/// byte order across platforms and versions, not interop with std
/// collections.
#[derive(Debug, Clone)]
pub struct StateHasher {
    hash: u32,
}

impl Default for StateHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHasher {
    /// Start a fresh digest at the FNV offset basis.
    #[must_use]
    pub fn new() -> Self {
        Self { hash: FNV_OFFSET }
    }

    #[inline]
    fn write_byte(&mut self, byte: u8) {
        self.hash ^= u32::from(byte);
        self.hash = self.hash.wrapping_mul(FNV_PRIME);
    }

    /// Mix raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Mix a u64 as little-endian bytes.
    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Mix an i64 as little-endian bytes.
    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Mix a float after scaling and flooring to an integer.
    ///
    /// `x1000, floored` keeps the digest insensitive to sub-millimeter
    /// noise while catching any divergence that matters.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_f32(&mut self, value: f32) {
        self.write_i64((value * FLOAT_SCALE).floor() as i64);
    }

    /// Mix a string discriminator as length then bytes.
    pub fn write_str(&mut self, value: &str) {
        self.write_u64(value.len() as u64);
        self.write_bytes(value.as_bytes());
    }

    /// Mix a boolean as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_byte(u8::from(value));
    }

    /// Finish and return the digest.
    #[must_use]
    pub fn finish(&self) -> u32 {
        self.hash
    }
}

//! Stable 32-bit FNV-1a hashing.
//!
//! Layout hashes and asset hashes must not change between runs or builds, so
//! they never go through `std`'s randomly seeded hasher.

use std::hash::Hasher;

pub const FNV_PRIME: u32 = 16777619;
pub const OFFSET_BASIS: u32 = 2166136261;

/// Sentinel for "no hash", e.g. the vertex factory hash of a pixel shader.
pub const INVALID_HASH: u32 = u32::MAX;

/// Hash a byte buffer with 32-bit FNV-1a.
pub fn fnv1a_hash(buffer: &[u8]) -> u32 {
    let mut hasher = Fnv1aHasher::new();
    hasher.write(buffer);
    hasher.finish32()
}

/// Incremental 32-bit FNV-1a hasher.
///
/// Integers are fed little-endian through the `write_u*` helpers, so the
/// result does not depend on the host.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1aHasher {
    state: u32,
}

impl Fnv1aHasher {
    pub const fn new() -> Self {
        Self {
            state: OFFSET_BASIS,
        }
    }

    pub fn finish32(&self) -> u32 {
        self.state
    }
}

impl Default for Fnv1aHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Fnv1aHasher {
    fn finish(&self) -> u64 {
        self.state as u64
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u32;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u8(&mut self, i: u8) {
        self.write(&[i]);
    }

    fn write_u16(&mut self, i: u16) {
        self.write(&i.to_le_bytes());
    }

    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(fnv1a_hash(b""), 0x811c9dc5);
        assert_eq!(fnv1a_hash(b"a"), 0xe40c292c);
        assert_eq!(fnv1a_hash(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = Fnv1aHasher::new();
        hasher.write(b"foo");
        hasher.write(b"bar");
        assert_eq!(hasher.finish32(), fnv1a_hash(b"foobar"));
    }

    #[test]
    fn integers_are_little_endian() {
        let mut hasher = Fnv1aHasher::new();
        hasher.write_u32(0x0403_0201);
        assert_eq!(hasher.finish32(), fnv1a_hash(&[1, 2, 3, 4]));
    }
}

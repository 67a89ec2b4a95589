//! Heap-allocated byte store

use std::sync::atomic::{AtomicU64, Ordering};

use super::traits::{BytesAccess, BytesStore};
use crate::schema::RecordSchema;

/// Owned, zero-initialised, 8-byte aligned store.
///
/// Backed by atomic words so every access mode (including word CAS on the
/// word containing the last byte) stays in bounds and is sound through a
/// shared reference.
#[derive(Debug)]
pub struct HeapBytes {
    words: Box<[AtomicU64]>,
    len: usize,
}

impl HeapBytes {
    /// Allocate `len` zeroed bytes (rounded up to whole words internally)
    pub fn new(len: usize) -> Self {
        let word_count = len.div_ceil(8).max(1);
        let words = (0..word_count).map(|_| AtomicU64::new(0)).collect();
        Self { words, len }
    }

    /// Allocate room for `count` records of `schema`, one [`RecordSchema::stride`] apart
    pub fn for_records(schema: &RecordSchema, count: usize) -> Self {
        Self::new((schema.stride() as usize).saturating_mul(count))
    }

    /// Copy an existing byte slice into a new store
    pub fn from_slice(data: &[u8]) -> Self {
        let store = Self::new(data.len());
        for (i, chunk) in data.chunks(8).enumerate() {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            store.words[i].store(u64::from_le_bytes(word), Ordering::Relaxed);
        }
        store
    }

    /// Requested length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the store holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Snapshot the requested bytes
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len];
        // `len` never exceeds capacity, so the copy cannot fail
        if self.read_bytes(0, &mut out).is_err() {
            out.clear();
        }
        out
    }

    /// Zero the whole store
    pub fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
    }
}

unsafe impl BytesStore for HeapBytes {
    fn as_ptr(&self) -> *mut u8 {
        self.words.as_ptr() as *mut u8
    }

    fn capacity(&self) -> usize {
        self.words.len() * 8
    }
}

impl Clone for HeapBytes {
    fn clone(&self) -> Self {
        let words = self
            .words
            .iter()
            .map(|w| AtomicU64::new(w.load(Ordering::Acquire)))
            .collect();
        Self {
            words,
            len: self.len,
        }
    }
}

impl PartialEq for HeapBytes {
    fn eq(&self, other: &Self) -> bool {
        self.to_vec() == other.to_vec()
    }
}

impl Eq for HeapBytes {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackError;

    #[test]
    fn test_heap_bytes_basic() {
        let store = HeapBytes::new(13);
        assert_eq!(store.len(), 13);
        assert_eq!(store.capacity(), 16);
        assert_eq!(store.as_ptr() as usize % 8, 0);

        store.write_u32(1, 0xDEAD_BEEF).unwrap();
        assert_eq!(store.read_u32(1).unwrap(), 0xDEAD_BEEF);
        assert_eq!(store.read_u8(1).unwrap(), 0xEF);

        let err = store.read_u64(12).unwrap_err();
        assert!(matches!(err, PackError::OutOfBounds { .. }));
    }

    #[test]
    fn test_atomic_alignment() {
        let store = HeapBytes::new(16);
        assert!(store.compare_and_swap_u32(4, 0, 7).unwrap());
        assert!(!store.compare_and_swap_u32(4, 0, 9).unwrap());
        assert_eq!(store.read_volatile_u32(4).unwrap(), 7);

        let err = store.write_volatile_u32(2, 1).unwrap_err();
        assert!(matches!(err, PackError::Alignment { alignment: 4, .. }));

        assert_eq!(store.add_and_get_u64(8, 5).unwrap(), 5);
        assert_eq!(store.add_and_get_u64(8, u64::MAX).unwrap(), 4);
    }

    #[test]
    fn test_from_slice_and_offsets() {
        let store = HeapBytes::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(store.to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let addr = store.address_of(3);
        assert_eq!(store.offset_of(addr, 4), Some(3));
        assert_eq!(store.offset_of(addr, 64), None);
        assert_eq!(store.offset_of(0, 1), None);

        let copy = store.clone();
        assert_eq!(copy, store);
        store.clear();
        assert_ne!(copy, store);
    }

    #[test]
    fn test_plain_reads_alongside_atomic_writers() {
        use std::{sync::Arc, thread};

        let store = Arc::new(HeapBytes::new(16));
        store.write_u64(3, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(store.read_u64(3).unwrap(), 0x0102_0304_0506_0708);

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    store.add_and_get_u64(8, 1).unwrap();
                }
            })
        };
        let mut last = 0;
        while last < 10_000 {
            let seen = store.read_u64(8).unwrap();
            assert!(seen >= last);
            last = seen;
        }
        writer.join().unwrap();
        assert_eq!(store.read_u64(8).unwrap(), 10_000);
    }
}

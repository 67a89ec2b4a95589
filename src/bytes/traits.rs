//! Byte store traits: raw storage plus the typed, atomic access layer

use std::{
    mem::size_of,
    ptr,
    sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering},
};

use crate::error::{PackError, Result};

/// Contiguous memory that packed records live in.
///
/// # Safety
/// Implementors must guarantee that:
/// - `as_ptr()` is valid for reads and writes of `capacity()` bytes for as
///   long as the store is alive
/// - the memory may be mutated through a shared reference (it is backed by
///   atomics, an `UnsafeCell`, or foreign memory such as a mapping)
/// - the pointer does not change for the lifetime of the store
pub unsafe trait BytesStore: Send + Sync + std::fmt::Debug {
    /// Base pointer of the store
    fn as_ptr(&self) -> *mut u8;

    /// Number of addressable bytes
    fn capacity(&self) -> usize;

    /// Get store type name for debugging
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

macro_rules! plain_access {
    ($read:ident, $write:ident, $ty:ty, $atomic:ty) => {
        /// Plain little-endian read; no alignment requirement.
        /// Aligned words are loaded relaxed so they never tear against atomic writers.
        fn $read(&self, offset: usize) -> Result<$ty> {
            let ptr = self.span(offset, size_of::<$ty>())?;
            if (ptr as usize) % size_of::<$ty>() == 0 {
                let atomic = unsafe { &*(ptr as *const $atomic) };
                return Ok(<$ty>::from_le(atomic.load(Ordering::Relaxed)));
            }
            let bytes = unsafe { ptr::read_unaligned(ptr as *const [u8; size_of::<$ty>()]) };
            Ok(<$ty>::from_le_bytes(bytes))
        }

        /// Plain little-endian write; no alignment requirement
        fn $write(&self, offset: usize, value: $ty) -> Result<()> {
            let ptr = self.span(offset, size_of::<$ty>())?;
            if (ptr as usize) % size_of::<$ty>() == 0 {
                let atomic = unsafe { &*(ptr as *const $atomic) };
                atomic.store(value.to_le(), Ordering::Relaxed);
                return Ok(());
            }
            unsafe { ptr::write_unaligned(ptr as *mut [u8; size_of::<$ty>()], value.to_le_bytes()) };
            Ok(())
        }
    };
}

macro_rules! volatile_access {
    ($read:ident, $write:ident, $ty:ty, $atomic:ty) => {
        /// Acquire load of a naturally aligned word
        fn $read(&self, offset: usize) -> Result<$ty> {
            let ptr = self.aligned(offset, size_of::<$ty>())?;
            let atomic = unsafe { &*(ptr as *const $atomic) };
            Ok(<$ty>::from_le(atomic.load(Ordering::Acquire)))
        }

        /// Sequentially consistent store of a naturally aligned word
        fn $write(&self, offset: usize, value: $ty) -> Result<()> {
            let ptr = self.aligned(offset, size_of::<$ty>())?;
            let atomic = unsafe { &*(ptr as *const $atomic) };
            atomic.store(value.to_le(), Ordering::SeqCst);
            Ok(())
        }
    };
}

macro_rules! word_atomics {
    ($ordered:ident, $cas:ident, $add:ident, $ty:ty, $atomic:ty) => {
        /// Release-only store of a naturally aligned word
        fn $ordered(&self, offset: usize, value: $ty) -> Result<()> {
            let ptr = self.aligned(offset, size_of::<$ty>())?;
            let atomic = unsafe { &*(ptr as *const $atomic) };
            atomic.store(value.to_le(), Ordering::Release);
            Ok(())
        }

        /// Compare-and-swap a naturally aligned word, returning whether it succeeded
        fn $cas(&self, offset: usize, expected: $ty, new: $ty) -> Result<bool> {
            let ptr = self.aligned(offset, size_of::<$ty>())?;
            let atomic = unsafe { &*(ptr as *const $atomic) };
            Ok(atomic
                .compare_exchange(
                    expected.to_le(),
                    new.to_le(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok())
        }

        /// Atomically add `delta` (wrapping) and return the new value
        fn $add(&self, offset: usize, delta: $ty) -> Result<$ty> {
            let ptr = self.aligned(offset, size_of::<$ty>())?;
            let atomic = unsafe { &*(ptr as *const $atomic) };
            if cfg!(target_endian = "little") {
                return Ok(atomic.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta));
            }
            let mut current = atomic.load(Ordering::Acquire);
            loop {
                let next = <$ty>::from_le(current).wrapping_add(delta);
                match atomic.compare_exchange_weak(
                    current,
                    next.to_le(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Ok(next),
                    Err(actual) => current = actual,
                }
            }
        }
    };
}

/// Typed access over any [`BytesStore`].
///
/// Multi-byte values are little-endian. Plain accessors tolerate any
/// alignment; volatile, ordered and atomic accessors require the absolute
/// address to be naturally aligned and report [`PackError::Alignment`]
/// otherwise.
pub trait BytesAccess: BytesStore {
    /// Bounds-checked pointer to `len` bytes at `offset`
    fn span(&self, offset: usize, len: usize) -> Result<*mut u8> {
        let capacity = self.capacity();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(unsafe { self.as_ptr().add(offset) }),
            _ => Err(PackError::out_of_bounds(offset, len, capacity)),
        }
    }

    /// Bounds-checked pointer that must also be aligned to `alignment`
    fn aligned(&self, offset: usize, alignment: usize) -> Result<*mut u8> {
        let ptr = self.span(offset, alignment)?;
        if (ptr as usize) % alignment != 0 {
            return Err(PackError::alignment(ptr as usize, alignment));
        }
        Ok(ptr)
    }

    /// Absolute address of the byte at `offset`
    fn address_of(&self, offset: usize) -> u64 {
        self.as_ptr() as u64 + offset as u64
    }

    /// Map an absolute address back to an offset if `len` bytes from it lie in the store
    fn offset_of(&self, address: u64, len: usize) -> Option<usize> {
        let base = self.as_ptr() as u64;
        let offset = address.checked_sub(base)? as usize;
        let end = offset.checked_add(len)?;
        (end <= self.capacity()).then_some(offset)
    }

    /// Plain byte read
    fn read_u8(&self, offset: usize) -> Result<u8> {
        let ptr = self.span(offset, 1)?;
        let atomic = unsafe { &*(ptr as *const AtomicU8) };
        Ok(atomic.load(Ordering::Relaxed))
    }

    /// Plain byte write
    fn write_u8(&self, offset: usize, value: u8) -> Result<()> {
        let ptr = self.span(offset, 1)?;
        let atomic = unsafe { &*(ptr as *const AtomicU8) };
        atomic.store(value, Ordering::Relaxed);
        Ok(())
    }

    plain_access!(read_u16, write_u16, u16, AtomicU16);
    plain_access!(read_u32, write_u32, u32, AtomicU32);
    plain_access!(read_u64, write_u64, u64, AtomicU64);

    /// Acquire load of a byte
    fn read_volatile_u8(&self, offset: usize) -> Result<u8> {
        let ptr = self.span(offset, 1)?;
        let atomic = unsafe { &*(ptr as *const AtomicU8) };
        Ok(atomic.load(Ordering::Acquire))
    }

    /// Sequentially consistent store of a byte
    fn write_volatile_u8(&self, offset: usize, value: u8) -> Result<()> {
        let ptr = self.span(offset, 1)?;
        let atomic = unsafe { &*(ptr as *const AtomicU8) };
        atomic.store(value, Ordering::SeqCst);
        Ok(())
    }

    volatile_access!(read_volatile_u16, write_volatile_u16, u16, AtomicU16);
    volatile_access!(read_volatile_u32, write_volatile_u32, u32, AtomicU32);
    volatile_access!(read_volatile_u64, write_volatile_u64, u64, AtomicU64);

    word_atomics!(write_ordered_u32, compare_and_swap_u32, add_and_get_u32, u32, AtomicU32);
    word_atomics!(write_ordered_u64, compare_and_swap_u64, add_and_get_u64, u64, AtomicU64);

    /// Copy `dst.len()` bytes out of the store
    fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let ptr = self.span(offset, dst.len())?;
        unsafe { ptr::copy_nonoverlapping(ptr as *const u8, dst.as_mut_ptr(), dst.len()) };
        Ok(())
    }

    /// Copy `src` into the store
    fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<()> {
        let ptr = self.span(offset, src.len())?;
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), ptr, src.len()) };
        Ok(())
    }

    /// Zero `len` bytes at `offset`
    fn zero(&self, offset: usize, len: usize) -> Result<()> {
        let ptr = self.span(offset, len)?;
        unsafe { ptr::write_bytes(ptr, 0, len) };
        Ok(())
    }
}

// Blanket implementation for all stores
impl<T: BytesStore + ?Sized> BytesAccess for T {}

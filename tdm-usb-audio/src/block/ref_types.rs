use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::constants::AUDIO_BLOCK_SAMPLES;
use crate::error::AllocationExhausted;

use super::pool::AudioBlockPool;

/// Exclusive (mutable) handle to an audio block in a pool.
///
/// There is exactly one `AudioBlockMut` per allocated slot.
/// Provides `DerefMut` access to the underlying `[i16; 128]` samples.
/// Dropping an `AudioBlockMut` releases the block back to its pool.
pub struct AudioBlockMut<'p> {
    pool: &'p AudioBlockPool,
    slot: u8,
}

impl<'p> AudioBlockMut<'p> {
    /// Wrap a slot that was just allocated with refcount = 1.
    ///
    /// The caller must guarantee that no other handle exists for this slot.
    pub(crate) fn new(pool: &'p AudioBlockPool, slot: u8) -> Self {
        AudioBlockMut { pool, slot }
    }

    /// Allocate a new zeroed audio block from `pool`.
    /// Returns `None` if the pool is exhausted.
    pub fn alloc(pool: &'p AudioBlockPool) -> Option<Self> {
        pool.alloc().map(|slot| AudioBlockMut::new(pool, slot))
    }

    /// Like [`alloc`](Self::alloc), but reports exhaustion as an error so
    /// callers can use `?`.
    pub fn try_alloc(pool: &'p AudioBlockPool) -> Result<Self, AllocationExhausted> {
        Self::alloc(pool).ok_or(AllocationExhausted)
    }

    /// Convert this exclusive reference into a shared reference.
    /// This is a zero-cost conversion (no data copy, no refcount change).
    pub fn into_shared(self) -> AudioBlockRef<'p> {
        let this = core::mem::ManuallyDrop::new(self);
        AudioBlockRef {
            pool: this.pool,
            slot: this.slot,
        }
    }

    /// Get the pool slot index.
    pub fn slot(&self) -> u8 {
        self.slot
    }
}

impl Deref for AudioBlockMut<'_> {
    type Target = [i16; AUDIO_BLOCK_SAMPLES];

    fn deref(&self) -> &Self::Target {
        // SAFETY: We hold exclusive access (refcount == 1, unique AudioBlockMut).
        unsafe { &(*self.pool.data_ptr(self.slot)).samples }
    }
}

impl DerefMut for AudioBlockMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: We hold exclusive access (refcount == 1, unique AudioBlockMut).
        unsafe { &mut (*self.pool.data_ptr(self.slot)).samples }
    }
}

impl Drop for AudioBlockMut<'_> {
    fn drop(&mut self) {
        self.pool.dec_ref(self.slot);
    }
}

impl fmt::Debug for AudioBlockMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBlockMut").field("slot", &self.slot).finish()
    }
}

/// Shared (immutable) handle to an audio block in a pool.
///
/// Multiple `AudioBlockRef`s can point to the same slot. Cloning increments the
/// refcount; dropping decrements it. When the last reference is dropped, the
/// pool slot is freed.
pub struct AudioBlockRef<'p> {
    pool: &'p AudioBlockPool,
    slot: u8,
}

impl<'p> AudioBlockRef<'p> {
    /// Get the pool slot index.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Try to convert back to an exclusive mutable reference.
    ///
    /// - If this is the only reference (refcount == 1), converts in place (no copy).
    /// - If there are other references, allocates a new block, copies the data,
    ///   and returns the new exclusive block. Returns `None` if the pool is exhausted.
    pub fn into_mut(self) -> Option<AudioBlockMut<'p>> {
        let pool = self.pool;
        if pool.refcount(self.slot) == 1 {
            let this = core::mem::ManuallyDrop::new(self);
            Some(AudioBlockMut::new(pool, this.slot))
        } else {
            // Clone-on-write: allocate a new block and copy
            let mut copy = AudioBlockMut::alloc(pool)?;
            copy.copy_from_slice(&self[..]);
            Some(copy)
        }
    }
}

impl Deref for AudioBlockRef<'_> {
    type Target = [i16; AUDIO_BLOCK_SAMPLES];

    fn deref(&self) -> &Self::Target {
        // SAFETY: Slot is allocated and data is immutable through shared references.
        unsafe { &(*self.pool.data_ptr(self.slot)).samples }
    }
}

impl Clone for AudioBlockRef<'_> {
    fn clone(&self) -> Self {
        self.pool.inc_ref(self.slot);
        AudioBlockRef {
            pool: self.pool,
            slot: self.slot,
        }
    }
}

impl Drop for AudioBlockRef<'_> {
    fn drop(&mut self) {
        self.pool.dec_ref(self.slot);
    }
}

impl fmt::Debug for AudioBlockRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBlockRef").field("slot", &self.slot).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_drop() {
        let pool = AudioBlockPool::new();
        {
            let block = AudioBlockMut::alloc(&pool).unwrap();
            assert_eq!(pool.allocated_count(), 1);
            assert_eq!(pool.refcount(block.slot()), 1);
        }
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn try_alloc_reports_exhaustion() {
        let pool = AudioBlockPool::new();
        let mut held = heapless::Vec::<AudioBlockMut<'_>, { crate::constants::POOL_SIZE }>::new();
        while let Ok(block) = AudioBlockMut::try_alloc(&pool) {
            held.push(block).unwrap();
        }
        assert_eq!(
            AudioBlockMut::try_alloc(&pool).unwrap_err(),
            AllocationExhausted
        );
        drop(held);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn write_and_read() {
        let pool = AudioBlockPool::new();
        let mut block = AudioBlockMut::alloc(&pool).unwrap();
        block[0] = 1234;
        block[127] = -5678;
        assert_eq!(block[0], 1234);
        assert_eq!(block[127], -5678);
    }

    #[test]
    fn into_shared() {
        let pool = AudioBlockPool::new();
        let mut block = AudioBlockMut::alloc(&pool).unwrap();
        block[0] = 42;
        let slot = block.slot();

        let shared = block.into_shared();
        assert_eq!(shared.slot(), slot);
        assert_eq!(shared[0], 42);
        assert_eq!(pool.refcount(slot), 1); // no extra ref
        assert_eq!(pool.allocated_count(), 1);
    }

    #[test]
    fn shared_clone_and_drop() {
        let pool = AudioBlockPool::new();
        let mut block = AudioBlockMut::alloc(&pool).unwrap();
        block[0] = 99;
        let slot = block.slot();
        let shared = block.into_shared();

        let shared2 = shared.clone();
        assert_eq!(pool.refcount(slot), 2);
        assert_eq!(shared2[0], 99);

        drop(shared);
        assert_eq!(pool.refcount(slot), 1);
        assert_eq!(pool.allocated_count(), 1);

        drop(shared2);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn into_mut_sole_owner() {
        let pool = AudioBlockPool::new();
        let mut block = AudioBlockMut::alloc(&pool).unwrap();
        block[0] = 77;
        let slot = block.slot();
        let shared = block.into_shared();

        let mut exclusive = shared.into_mut().unwrap();
        assert_eq!(exclusive.slot(), slot); // same slot
        assert_eq!(exclusive[0], 77);
        exclusive[0] = 88;
        assert_eq!(exclusive[0], 88);
        assert_eq!(pool.allocated_count(), 1);
    }

    #[test]
    fn into_mut_clone_on_write() {
        let pool = AudioBlockPool::new();
        let mut block = AudioBlockMut::alloc(&pool).unwrap();
        block[0] = 55;
        let slot = block.slot();
        let shared = block.into_shared();
        let shared2 = shared.clone();
        assert_eq!(pool.refcount(slot), 2);

        let mut exclusive = shared.into_mut().unwrap();
        assert_ne!(exclusive.slot(), slot); // new allocation
        assert_eq!(exclusive[0], 55); // data was copied
        exclusive[0] = 66;

        assert_eq!(shared2[0], 55);
        assert_eq!(pool.refcount(slot), 1); // old slot refcount decremented
    }
}

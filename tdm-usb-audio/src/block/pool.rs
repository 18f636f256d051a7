use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::constants::{AUDIO_BLOCK_SAMPLES, POOL_SIZE};

/// Bitmap words needed to track `POOL_SIZE` slots.
const BITMAP_WORDS: usize = POOL_SIZE.div_ceil(32);

/// Raw audio block storage: 128 signed 16-bit samples, 4-byte aligned.
#[repr(C, align(4))]
pub struct AudioBlockData {
    pub samples: [i16; AUDIO_BLOCK_SAMPLES],
}

impl AudioBlockData {
    /// Create a zeroed audio block.
    const fn zeroed() -> Self {
        AudioBlockData {
            samples: [0i16; AUDIO_BLOCK_SAMPLES],
        }
    }
}

/// Lock-free pool allocator for audio blocks.
///
/// Uses atomic bitmap words to track which slots are allocated, and per-slot
/// atomic reference counts for shared ownership. All operations are lock-free
/// and ISR-safe, so the pool can be shared between the USB interrupt, the DMA
/// interrupt and the update pass.
///
/// The pool is an ordinary value: firmware places one in a `static`, tests
/// create their own.
pub struct AudioBlockPool {
    /// Bit N of word N / 32 set means slot N is allocated.
    bitmap: [AtomicU32; BITMAP_WORDS],
    /// Per-slot reference counts.
    refcounts: [AtomicU8; POOL_SIZE],
    /// Highest number of simultaneously allocated blocks seen.
    max_allocated: AtomicU32,
    /// Allocation attempts that found the pool empty.
    allocation_failures: AtomicU32,
    /// Block storage.
    storage: UnsafeCell<[MaybeUninit<AudioBlockData>; POOL_SIZE]>,
}

// SAFETY: The pool uses atomic operations for all shared state.
// The UnsafeCell<storage> is only accessed through slot indices that are
// exclusively owned (via bitmap allocation) or shared (via refcount).
unsafe impl Sync for AudioBlockPool {}

impl AudioBlockPool {
    /// Create a new pool. All slots start unallocated.
    #[allow(clippy::declare_interior_mut_const)]
    pub const fn new() -> Self {
        const ZERO_WORD: AtomicU32 = AtomicU32::new(0);
        const ZERO_REFCOUNT: AtomicU8 = AtomicU8::new(0);
        AudioBlockPool {
            bitmap: [ZERO_WORD; BITMAP_WORDS],
            refcounts: [ZERO_REFCOUNT; POOL_SIZE],
            max_allocated: AtomicU32::new(0),
            allocation_failures: AtomicU32::new(0),
            storage: UnsafeCell::new(unsafe {
                MaybeUninit::<[MaybeUninit<AudioBlockData>; POOL_SIZE]>::zeroed().assume_init()
            }),
        }
    }

    /// Allocate a block from the pool. Returns the slot index, or `None` if full.
    ///
    /// The returned slot has refcount = 1 and its data is zeroed. A failed
    /// attempt is counted in [`allocation_failures`](Self::allocation_failures).
    pub fn alloc(&self) -> Option<u8> {
        for (word_index, word) in self.bitmap.iter().enumerate() {
            let base = word_index * 32;
            loop {
                let bits = word.load(Ordering::Acquire);
                let free = !bits;
                if free == 0 {
                    break;
                }
                let bit_index = free.trailing_zeros() as usize;
                let slot = base + bit_index;
                if slot >= POOL_SIZE {
                    break;
                }
                let bit = 1u32 << bit_index;
                match word.compare_exchange_weak(
                    bits,
                    bits | bit,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        self.refcounts[slot].store(1, Ordering::Release);
                        let storage = self.storage.get();
                        // SAFETY: We just exclusively claimed this slot via the bitmap CAS.
                        unsafe {
                            let block_ptr = (*storage)[slot].as_mut_ptr();
                            (*block_ptr) = AudioBlockData::zeroed();
                        }
                        self.max_allocated
                            .fetch_max(self.allocated_count(), Ordering::Relaxed);
                        return Some(slot as u8);
                    }
                    Err(_) => continue, // an ISR raced us, retry
                }
            }
        }
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Increment the reference count for a slot (used by `AudioBlockRef::clone`).
    ///
    /// # Panics
    /// Debug-asserts that the slot is currently allocated and refcount won't overflow.
    pub fn inc_ref(&self, slot: u8) {
        debug_assert!((slot as usize) < POOL_SIZE);
        let old = self.refcounts[slot as usize].fetch_add(1, Ordering::AcqRel);
        debug_assert!(old > 0, "inc_ref on unallocated slot");
        debug_assert!(old < 255, "refcount overflow");
    }

    /// Decrement the reference count for a slot. If it reaches zero, the slot
    /// is returned to the free bitmap.
    pub fn dec_ref(&self, slot: u8) {
        debug_assert!((slot as usize) < POOL_SIZE);
        let old = self.refcounts[slot as usize].fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0, "dec_ref on slot with refcount 0");
        if old == 1 {
            let slot = slot as usize;
            let bit = 1u32 << (slot % 32);
            self.bitmap[slot / 32].fetch_and(!bit, Ordering::Release);
        }
    }

    /// Get the current reference count for a slot.
    pub fn refcount(&self, slot: u8) -> u8 {
        self.refcounts[slot as usize].load(Ordering::Acquire)
    }

    /// Get a pointer to the block data for a given slot.
    ///
    /// # Safety
    /// Caller must ensure the slot is currently allocated.
    pub unsafe fn data_ptr(&self, slot: u8) -> *mut AudioBlockData {
        let storage = self.storage.get();
        unsafe { (*storage)[slot as usize].as_mut_ptr() }
    }

    /// Return the number of currently allocated blocks.
    pub fn allocated_count(&self) -> u32 {
        self.bitmap
            .iter()
            .map(|word| word.load(Ordering::Acquire).count_ones())
            .sum()
    }

    /// Highest simultaneous allocation count since creation or the last
    /// [`reset_max_allocated`](Self::reset_max_allocated).
    pub fn max_allocated(&self) -> u32 {
        self.max_allocated.load(Ordering::Relaxed)
    }

    /// Restart high-water tracking from the current usage.
    pub fn reset_max_allocated(&self) {
        self.max_allocated
            .store(self.allocated_count(), Ordering::Relaxed);
    }

    /// Number of allocation attempts that found the pool exhausted.
    pub fn allocation_failures(&self) -> u32 {
        self.allocation_failures.load(Ordering::Relaxed)
    }
}

impl Default for AudioBlockPool {
    fn default() -> Self {
        Self::new()
    }
}

//! All-or-nothing groups of writable blocks.
//!
//! Multichannel paths need one block per channel at the same time. Acquiring
//! them one by one means every failure point has to hand back the siblings
//! it already holds. [`AudioBlockSet::alloc`] collects into a fixed-capacity
//! staging vector instead, so an exhausted pool simply drops the partial
//! vector and every acquired block goes back to the pool on that single exit
//! path.

use heapless::Vec;

use crate::error::AllocationExhausted;

use super::pool::AudioBlockPool;
use super::ref_types::{AudioBlockMut, AudioBlockRef};

/// `N` writable blocks that are owned, published and released together.
#[derive(Debug)]
pub struct AudioBlockSet<'p, const N: usize> {
    blocks: [AudioBlockMut<'p>; N],
}

impl<'p, const N: usize> AudioBlockSet<'p, N> {
    /// Allocate `N` zeroed blocks, or none at all.
    pub fn alloc(pool: &'p AudioBlockPool) -> Result<Self, AllocationExhausted> {
        let mut staged: Vec<AudioBlockMut<'p>, N> = Vec::new();
        for _ in 0..N {
            let block = AudioBlockMut::try_alloc(pool)?;
            staged.push(block).map_err(|_| AllocationExhausted)?;
        }
        let blocks = staged.into_array().map_err(|_| AllocationExhausted)?;
        Ok(AudioBlockSet { blocks })
    }

    /// Samples of channel `index`.
    pub fn channel(&self, index: usize) -> &[i16] {
        &self.blocks[index][..]
    }

    /// Mutable samples of channel `index`.
    pub fn channel_mut(&mut self, index: usize) -> &mut [i16] {
        &mut self.blocks[index][..]
    }

    /// Give up the group and return the individual blocks.
    pub fn into_blocks(self) -> [AudioBlockMut<'p>; N] {
        self.blocks
    }

    /// Convert every block into a shared reference for publication.
    pub fn into_shared(self) -> [AudioBlockRef<'p>; N] {
        self.blocks.map(AudioBlockMut::into_shared)
    }
}

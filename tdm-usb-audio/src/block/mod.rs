//! Audio block memory.
//!
//! Blocks live in an [`AudioBlockPool`] and are handed around as handles:
//! [`AudioBlockMut`] is the unique writable owner, [`AudioBlockRef`] is a
//! refcounted read-only view, and [`AudioBlockSet`] is a group of writable
//! blocks that is allocated all-or-nothing.

pub mod pool;
pub mod ref_types;
pub mod set;

pub use pool::AudioBlockPool;
pub use ref_types::{AudioBlockMut, AudioBlockRef};
pub use set::AudioBlockSet;

use crate::block::{AudioBlockMut, AudioBlockRef};

/// Core trait for all audio processing nodes.
///
/// Each node receives input blocks and produces output blocks during `update()`.
/// The number of inputs and outputs is declared via associated constants.
pub trait AudioNode<'p> {
    /// Number of input channels this node accepts.
    const NUM_INPUTS: usize;

    /// Number of output channels this node produces.
    const NUM_OUTPUTS: usize;

    /// Whether the graph hands this node freshly allocated output blocks.
    ///
    /// Nodes that publish blocks they already own (a capture path, for
    /// example) set this to `false` and receive empty output slots.
    const ALLOCATES_OUTPUTS: bool = true;

    /// Process one block of audio.
    ///
    /// `inputs` contains `NUM_INPUTS` slots, each optionally holding a shared
    /// audio block. A node that keeps a block `take()`s it out of its slot;
    /// whatever is left is released by the caller when the pass moves on.
    ///
    /// `outputs` contains `NUM_OUTPUTS` slots, each optionally holding an
    /// exclusive audio block allocated by the caller (always empty when
    /// `ALLOCATES_OUTPUTS` is `false`). A node may replace the block or clear
    /// the slot.
    fn update(
        &mut self,
        inputs: &mut [Option<AudioBlockRef<'p>>],
        outputs: &mut [Option<AudioBlockMut<'p>>],
    );
}

//! Audio graph macro for declarative node wiring.
//!
//! The [`audio_graph!`] macro generates a typed struct containing all audio nodes
//! with an `update_all()` method that processes them in the declared order and
//! routes audio blocks between connected ports.
//!
//! # Syntax
//!
//! Nodes are listed in **processing order** (sources first, then downstream
//! consumers). Each node's input connections are declared inline using `{ ... }`.
//! The first lifetime parameter of the struct is the block pool lifetime;
//! any further lifetimes are free for the nodes' own borrows.
//!
//! ```ignore
//! use tdm_usb_audio::audio_graph;
//! use tdm_usb_audio::io::AudioOutputTdm;
//! use tdm_usb_audio::usb::{AudioInputUsb, AudioOutputUsb};
//!
//! audio_graph! {
//!     pub struct Bridge<'p, 's> {
//!         host: AudioInputUsb<'s, 'p> {},
//!         tdm: AudioOutputTdm<'p> {
//!             (host, 0), (host, 1), (host, 2), (host, 3),
//!             _, _, _, _, _, _, _, _, _, _, _, _,
//!         },
//!         uplink: AudioOutputUsb<'s, 'p> { (host, 0), (host, 1), _, _ },
//!     }
//! }
//! ```
//!
//! ## Input connection syntax
//!
//! - `{}`: no inputs (source node)
//! - `{ (node, port) }`: input 0 connected to `node`'s output `port`
//! - `{ (node, 0), _ }`: input 0 connected, input 1 unconnected (silence)
//! - `{ (a, 0), (b, 0) }`: two inputs from different sources
//! - `{ (host, 0), (host, 0) }`: fan-out: same output to two inputs
//!
//! ## Generated API
//!
//! - A struct with `pub` fields for each node (direct access for configuration)
//! - `new(..)`: takes every node, already constructed, in declaration order
//! - `update_all(pool)`: processes one block cycle, routing audio between nodes
//!
//! ## Block routing
//!
//! - Output blocks are converted to shared `AudioBlockRef` for routing
//! - Fan-out uses `AudioBlockRef::clone()` (refcount increment, no copy)
//! - Unconnected inputs (`_`) receive `None` (silence)
//! - Inputs a node does not `take()` are released when its update returns
//! - Pool exhaustion degrades gracefully (nodes see `None` outputs)
//! - Nodes with `ALLOCATES_OUTPUTS = false` get empty output slots
//! - A node may have at most [`MAX_PORTS`] inputs and outputs

use crate::block::AudioBlockRef;
use crate::constants::TDM_CHANNELS;

/// Widest node the graph can route (the TDM transmitter).
pub const MAX_PORTS: usize = TDM_CHANNELS;

/// Fix the element type of a connection list, including an empty one.
#[doc(hidden)]
#[inline(always)]
pub fn input_ports<'p, const N: usize>(
    ports: [Option<AudioBlockRef<'p>>; N],
) -> [Option<AudioBlockRef<'p>>; N] {
    ports
}

/// Declare and wire an audio processing graph.
///
/// See the [module documentation](crate::graph) for full syntax.
#[macro_export]
macro_rules! audio_graph {
    // ── Main entry point ──────────────────────────────────────────────
    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident < $pool:lifetime $(, $lt:lifetime)* $(,)? > {
            $(
                $node_name:ident : $node_type:ty { $( $input_item:tt ),* $(,)? }
            ),+
            $(,)?
        }
    ) => {
        // ── Struct definition ─────────────────────────────────────────
        $(#[$struct_meta])*
        $vis struct $name<$pool $(, $lt)*> {
            $( pub $node_name: $node_type, )+
            _pool: core::marker::PhantomData<&$pool $crate::block::AudioBlockPool>,
        }

        impl<$pool $(, $lt)*> $name<$pool $(, $lt)*> {
            /// Assemble the graph from its nodes, in declaration order.
            #[allow(clippy::too_many_arguments)]
            pub fn new($( $node_name: $node_type ),+) -> Self {
                Self {
                    $( $node_name, )+
                    _pool: core::marker::PhantomData,
                }
            }

            /// Process one block cycle through the entire graph.
            ///
            /// Calls `update()` on each node in declaration order, allocating
            /// output blocks from `pool` and routing them to connected input
            /// ports. Every block allocated here is either handed to a node
            /// or released before this returns.
            #[allow(unused_variables)]
            pub fn update_all(&mut self, pool: &$pool $crate::block::AudioBlockPool) {
                $(
                    // Process node: $node_name
                    #[allow(unused_variables, unused_mut)]
                    let $node_name: [
                        Option<$crate::block::AudioBlockRef<$pool>>;
                        $crate::graph::MAX_PORTS
                    ] = {
                        let num_inputs = <$node_type as $crate::node::AudioNode<$pool>>::NUM_INPUTS;
                        let num_outputs = <$node_type as $crate::node::AudioNode<$pool>>::NUM_OUTPUTS;

                        // Build the input array from the declared connections
                        let mut _inputs = $crate::graph::input_ports(
                            [ $( $crate::audio_graph!(@input_expr $input_item) ),* ]
                        );
                        debug_assert_eq!(
                            _inputs.len(),
                            num_inputs,
                            concat!("wrong number of inputs for `", stringify!($node_name), "`")
                        );

                        // Allocate output blocks unless the node brings its own
                        let mut _outs: [
                            Option<$crate::block::AudioBlockMut<$pool>>;
                            $crate::graph::MAX_PORTS
                        ] = [const { None }; $crate::graph::MAX_PORTS];
                        if <$node_type as $crate::node::AudioNode<$pool>>::ALLOCATES_OUTPUTS {
                            for out in _outs.iter_mut().take(num_outputs) {
                                *out = $crate::block::AudioBlockMut::alloc(pool);
                            }
                        }

                        // Call the node's update method
                        <$node_type as $crate::node::AudioNode<$pool>>::update(
                            &mut self.$node_name,
                            &mut _inputs[..],
                            &mut _outs[..num_outputs],
                        );

                        // Convert outputs to shared refs for downstream routing
                        _outs.map(|opt| opt.map($crate::block::AudioBlockMut::into_shared))
                    };
                )+
            }
        }
    };

    // ── Input expression helpers ──────────────────────────────────────
    // Unconnected input: produces None (silence)
    (@input_expr _) => { None };

    // Connected input: clone a shared ref from a source node's output port
    (@input_expr ($src:ident, $port:expr)) => {
        $src[$port].clone()
    };
}

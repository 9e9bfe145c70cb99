//! Layer-ordered sweeps.
//!
//! Nodes in one routing layer never depend on each other, only on nodes of
//! earlier layers. A sweep therefore computes every node of a layer in
//! parallel against a read-only view of the state, then applies the updates
//! before moving on to the next layer. The result is independent of the
//! thread count.

use crate::strategy::{Executor, ParallelStrategy};
use rivulet_core::Result;
use tracing::trace;

/// Run `compute` for every node of every layer, in layer order.
///
/// `compute(node, &state)` must only read state written by earlier layers
/// (and by the node itself in the previous time step). Its result is handed
/// to `apply(node, update, &mut state)` once the whole layer has been
/// computed. The first error aborts the sweep.
pub fn sweep_layers<S, U, C, A>(
    exec: &Executor,
    layers: &[Vec<usize>],
    state: &mut S,
    compute: C,
    mut apply: A,
) -> Result<()>
where
    S: Sync,
    U: Send,
    C: Fn(usize, &S) -> Result<U> + Sync + Send,
    A: FnMut(usize, U, &mut S),
{
    for (depth, layer) in layers.iter().enumerate() {
        let updates = {
            let shared: &S = state;
            exec.try_map_slice(layer, |&node| compute(node, shared))?
        };
        for (&node, update) in layer.iter().zip(updates) {
            apply(node, update, state);
        }
        trace!(layer = depth, nodes = layer.len(), "layer swept");
    }
    Ok(())
}

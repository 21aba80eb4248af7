//! Condensation hand-off (`spec.md` §4.F): traces that cross the boredom/
//! confidence/mass thresholds are drained from the pending queue inside the
//! lock, handed to the caller's callback outside the lock (so the callback
//! can safely call back into the manager), and any resulting summary is
//! re-ingested through the normal registration path.

use std::sync::Arc;

use crate::state::{CondenseCallback, ManagerState};

/// Drain step: snapshot the pending ids as `(id, text)` pairs, clear
/// `pending_condense` on each still-present trace, and empty the queue.
/// Must be called with the lock held; the callback itself runs after the
/// lock is released (see `manager.rs`).
pub(crate) fn drain(
    state: &mut ManagerState,
) -> (Vec<(String, String)>, Option<Arc<CondenseCallback>>) {
    if state.pending_condense.is_empty() {
        return (Vec::new(), None);
    }
    let ids = std::mem::take(&mut state.pending_condense);
    let pairs = ids
        .into_iter()
        .filter_map(|id| {
            let trace = state.mem.get_mut(&id)?;
            trace.pending_condense = false;
            Some((id, trace.text.clone()))
        })
        .collect();
    (pairs, state.condense_callback.clone())
}

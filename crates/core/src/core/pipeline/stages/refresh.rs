//! Memory-dependence refresh.
//!
//! Loads never enter the ready list straight from dispatch or wakeup. Once a
//! load's address is known, refresh checks every older store on the load's path:
//! a store with an unknown address blocks the load, and a store to the same word
//! blocks it until the store's data has arrived. Stores on other paths are
//! ignored.

use tracing::trace;

use crate::core::pipeline::state::SchedulerState;

/// Executes the refresh stage.
pub fn refresh_stage(state: &mut SchedulerState) {
    let order: Vec<u32> = state.pool.memory.indices().collect();
    for (pos, &index) in order.iter().enumerate() {
        let load = state.pool.memory.get(index);
        if !load.is_load()
            || load.squashed
            || load.queued
            || load.issued
            || load.completed
            || !load.address_ready()
        {
            continue;
        }
        let (addr, ancestry) = (load.addr, load.ancestry);

        let blocked = order[..pos].iter().any(|&older| {
            let store = state.pool.memory.get(older);
            if !store.is_store() || store.squashed || !store.ancestry.is_prefix_of(&ancestry) {
                return false;
            }
            !store.address_ready() || (store.addr == addr && !store.data_ready())
        });
        if blocked {
            continue;
        }

        let r = state.pool.memory.slot_ref(index);
        let slot = state.pool.memory.get_mut(index);
        if !state.ready.enqueue(&mut state.links, r, slot) {
            state.stats.overflow_links += 1;
            break;
        }
        trace!(cycle = state.cycle, slot = %r, "load released");
    }
}

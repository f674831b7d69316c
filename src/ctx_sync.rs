//! Deferred actions executed at the next synchronization point (spec §4.7,
//! §9 "deferred TLB flush queue").
//!
//! Grounded on `add_ctx_sync_action`/`do_ctx_sync` in
//! `original_source/cpu/ppc/ppcemu.h`. BAT/SDR1/SR register-write handlers
//! enqueue a flush rather than performing it inline, because software is
//! only guaranteed to observe the change after `isync`/`sync`/`rfi`/`sc`
//! (spec §3 invariant, §4.3 "TLB flushing").

use crate::emulator::Emulator;

type CtxSyncAction = Box<dyn FnOnce(&mut Emulator)>;

#[derive(Default)]
pub struct CtxSyncQueue {
    actions: Vec<CtxSyncAction>,
}

impl CtxSyncQueue {
    pub fn new() -> Self {
        CtxSyncQueue { actions: Vec::new() }
    }

    pub fn add(&mut self, action: impl FnOnce(&mut Emulator) + 'static) {
        self.actions.push(Box::new(action));
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Drains the queue into a local copy before running it, per spec §9's
/// "avoid hidden recursion" note: an action that itself enqueues more work
/// (unlikely, but not forbidden) runs on the *next* sync point rather than
/// being executed while we're still draining this one.
pub fn do_ctx_sync(emulator: &mut Emulator) {
    let pending = std::mem::take(&mut emulator.ctx_sync.actions);
    for action in pending {
        action(emulator);
    }
}

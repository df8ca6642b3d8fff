// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Context records and the slot state machine.
//!
//! `Free --activate--> Active --finish--> Finished --reclaim--> Free`.
//! Yielding saves machine state but never changes the tag. Any other
//! transition means the scheduler itself is broken, so it panics.

use crate::machine::MachineState;
use crate::stack::Stack;

/// Lifecycle tag of a slot.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    /// Unclaimed. No stack, no saved state.
    Free = 0,
    /// Runnable or running.
    Active = 1,
    /// Body is done; waiting for the reaper to release the stack.
    Finished = 2,
}

/// Body of a context, run once by the trampoline.
pub(crate) type Entry = Box<dyn FnOnce() + 'static>;

pub(crate) struct ContextRecord {
    state: ContextState,
    machine: MachineState,
    /// `None` for main (it runs on the thread's own stack) and for free slots.
    stack: Option<Stack>,
    /// Where execution goes if the bound entry point returns.
    fallback: usize,
    entry: Option<Entry>,
}

impl ContextRecord {
    pub fn new() -> Self {
        Self {
            state: ContextState::Free,
            machine: MachineState::new(),
            stack: None,
            fallback: 0,
            entry: None,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn machine(&self) -> &MachineState {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut MachineState {
        &mut self.machine
    }

    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    pub fn fallback(&self) -> usize {
        self.fallback
    }

    /// Free → Active. The machine state must already be prepared.
    pub fn activate(&mut self, stack: Option<Stack>, entry: Option<Entry>, fallback: usize) {
        assert_eq!(
            self.state,
            ContextState::Free,
            "activate on a slot that is not free"
        );
        self.state = ContextState::Active;
        self.stack = stack;
        self.entry = entry;
        self.fallback = fallback;
    }

    /// Active → Finished. The stack stays owned until the reaper runs.
    pub fn finish(&mut self) {
        assert_eq!(
            self.state,
            ContextState::Active,
            "finish on a slot that is not active"
        );
        self.state = ContextState::Finished;
    }

    /// Finished → Free. Hands the stack back so the caller decides when it
    /// is unmapped.
    pub fn reclaim(&mut self) -> Option<Stack> {
        assert_eq!(
            self.state,
            ContextState::Finished,
            "reclaim on a slot that is not finished"
        );
        self.state = ContextState::Free;
        self.entry = None;
        self.machine.clear();
        self.stack.take()
    }

    /// The bound body, if it has not been started yet.
    pub fn take_entry(&mut self) -> Option<Entry> {
        self.entry.take()
    }
}

impl std::fmt::Debug for ContextRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRecord")
            .field("state", &self.state)
            .field("stack", &self.stack)
            .field("fallback", &self.fallback)
            .field("has_entry", &self.entry.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle() {
        let mut rec = ContextRecord::new();
        assert_eq!(rec.state(), ContextState::Free);

        let stack = Stack::new(16 * 1024).unwrap();
        rec.activate(Some(stack), Some(Box::new(|| {})), 0);
        assert_eq!(rec.state(), ContextState::Active);
        assert!(rec.stack().is_some());

        rec.finish();
        assert_eq!(rec.state(), ContextState::Finished);
        assert!(rec.stack().is_some(), "stack is kept until reclaimed");

        let released = rec.reclaim();
        assert!(released.is_some());
        assert_eq!(rec.state(), ContextState::Free);
        assert!(rec.stack().is_none());
        assert!(rec.take_entry().is_none());
    }

    #[test]
    fn entry_is_taken_once() {
        let mut rec = ContextRecord::new();
        rec.activate(None, Some(Box::new(|| {})), 0);
        assert!(rec.take_entry().is_some());
        assert!(rec.take_entry().is_none());
    }

    #[test]
    #[should_panic(expected = "not active")]
    fn finish_requires_active() {
        let mut rec = ContextRecord::new();
        rec.finish();
    }

    #[test]
    #[should_panic(expected = "not finished")]
    fn reclaim_requires_finished() {
        let mut rec = ContextRecord::new();
        rec.activate(None, None, 0);
        rec.reclaim();
    }

    #[test]
    #[should_panic(expected = "not free")]
    fn double_activate_panics() {
        let mut rec = ContextRecord::new();
        rec.activate(None, None, 0);
        rec.activate(None, None, 0);
    }
}

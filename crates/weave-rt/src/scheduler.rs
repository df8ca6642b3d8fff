// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Context table and round-robin bookkeeping.
//!
//! The scheduler never switches stacks itself. It decides who runs next,
//! hands out machine-state pointers, and mutates slot state; `runtime`
//! performs the actual transfers once every borrow of this struct is gone.

use std::io;

use log::trace;

use crate::config::{MAIN_SLOT, MAX_CONTEXTS, REAPER_SLOT};
use crate::error::FinishRefused;
use crate::record::{ContextRecord, ContextState, Entry};
use crate::stack::Stack;

/// Slot counts over main and the worker slots (the reaper is not counted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeStats {
    pub active: usize,
    pub finished: usize,
    pub free: usize,
}

/// Fixed-size table of contexts plus the cursor of the running one.
pub(crate) struct Scheduler {
    records: Box<[ContextRecord]>,
    cursor: usize,
    reaper_ready: bool,
}

impl Scheduler {
    /// Every slot free, cursor on main.
    pub fn new() -> Self {
        let records: Vec<ContextRecord> =
            (0..MAX_CONTEXTS).map(|_| ContextRecord::new()).collect();
        Self {
            records: records.into_boxed_slice(),
            cursor: MAIN_SLOT,
            reaper_ready: false,
        }
    }

    /// Slot of the running context.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, slot: usize) {
        debug_assert!(slot < MAX_CONTEXTS);
        self.cursor = slot;
    }

    pub fn state(&self, slot: usize) -> Option<ContextState> {
        self.records.get(slot).map(ContextRecord::state)
    }

    pub(crate) fn record(&self, slot: usize) -> &ContextRecord {
        &self.records[slot]
    }

    pub(crate) fn record_mut(&mut self, slot: usize) -> &mut ContextRecord {
        &mut self.records[slot]
    }

    /// Whether the reaper context was set up. `finish` needs it.
    pub fn reaper_ready(&self) -> bool {
        self.reaper_ready
    }

    /// Capture the calling context as main and mark it active.
    pub(crate) fn install_main(&mut self) -> io::Result<()> {
        let main = &mut self.records[MAIN_SLOT];
        main.machine_mut().capture()?;
        main.activate(None, None, MAIN_SLOT);
        self.cursor = MAIN_SLOT;
        Ok(())
    }

    /// Bind the reaper loop to its own stack. On failure the slot stays free
    /// and `reaper_ready` stays false.
    pub(crate) fn install_reaper(
        &mut self,
        stack: Stack,
        entry: extern "C" fn(),
    ) -> io::Result<()> {
        let link = self.records[MAIN_SLOT].machine().as_ptr();
        let reaper = &mut self.records[REAPER_SLOT];
        if let Err(err) = reaper.machine_mut().bind(&stack, entry, link) {
            reaper.machine_mut().clear();
            return Err(err);
        }
        reaper.activate(Some(stack), None, MAIN_SLOT);
        self.reaper_ready = true;
        Ok(())
    }

    /// Lowest-index free worker slot.
    pub fn free_slot(&self) -> Option<usize> {
        (MAIN_SLOT + 1..REAPER_SLOT).find(|&i| self.records[i].state() == ContextState::Free)
    }

    /// Bind a free slot to `trampoline` on `stack` and activate it.
    ///
    /// On error the slot is left free and `stack` is released.
    pub(crate) fn prepare(
        &mut self,
        slot: usize,
        stack: Stack,
        trampoline: extern "C" fn(),
        entry: Entry,
    ) -> io::Result<()> {
        assert!(
            slot != MAIN_SLOT && slot != REAPER_SLOT,
            "slot {} is reserved",
            slot
        );
        let link = self.records[MAIN_SLOT].machine().as_ptr();
        let rec = &mut self.records[slot];
        if let Err(err) = rec.machine_mut().bind(&stack, trampoline, link) {
            rec.machine_mut().clear();
            return Err(err);
        }
        rec.activate(Some(stack), Some(entry), MAIN_SLOT);
        Ok(())
    }

    /// Active schedulable slots other than `slot`.
    pub fn others_active(&self, slot: usize) -> usize {
        (0..MAX_CONTEXTS)
            .filter(|&i| i != slot && is_schedulable(i))
            .filter(|&i| self.records[i].state() == ContextState::Active)
            .count()
    }

    /// Next active schedulable slot after `slot`, wrapping. Never `slot`
    /// itself and never the reaper.
    pub fn next_active_after(&self, slot: usize) -> Option<usize> {
        (1..MAX_CONTEXTS)
            .map(|step| (slot + step) % MAX_CONTEXTS)
            .find(|&i| is_schedulable(i) && self.records[i].state() == ContextState::Active)
    }

    /// Whether `slot` may call `finish` right now.
    pub(crate) fn check_finish(&self, slot: usize) -> Result<(), FinishRefused> {
        if slot == MAIN_SLOT {
            Err(FinishRefused::MainContext)
        } else if slot == REAPER_SLOT {
            Err(FinishRefused::Reaper)
        } else if !self.reaper_ready {
            Err(FinishRefused::NoReaper)
        } else {
            Ok(())
        }
    }

    pub(crate) fn mark_finished(&mut self, slot: usize) {
        assert!(slot != MAIN_SLOT, "main context cannot finish");
        self.records[slot].finish();
    }

    /// Release the stacks of every finished slot and free them.
    /// Returns how many slots were reclaimed.
    pub(crate) fn reclaim_finished(&mut self) -> usize {
        let mut reclaimed = 0;
        for (slot, rec) in self.records.iter_mut().enumerate() {
            if rec.state() != ContextState::Finished {
                continue;
            }
            debug_assert!(slot != MAIN_SLOT && slot != REAPER_SLOT);
            let size = rec.stack().map_or(0, Stack::size);
            drop(rec.reclaim());
            trace!("reclaimed slot {} ({} byte stack)", slot, size);
            reclaimed += 1;
        }
        reclaimed
    }

    pub(crate) fn machine_ptr(&self, slot: usize) -> *mut libc::ucontext_t {
        self.records[slot].machine().as_ptr()
    }

    pub fn stats(&self) -> RuntimeStats {
        let mut stats = RuntimeStats::default();
        for rec in self.records[..REAPER_SLOT].iter() {
            match rec.state() {
                ContextState::Active => stats.active += 1,
                ContextState::Finished => stats.finished += 1,
                ContextState::Free => stats.free += 1,
            }
        }
        stats
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("cursor", &self.cursor)
            .field("reaper_ready", &self.reaper_ready)
            .field("stats", &self.stats())
            .finish()
    }
}

/// The reaper is only ever entered directly from `finish`.
fn is_schedulable(slot: usize) -> bool {
    slot != REAPER_SLOT
}

// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lifecycle operations: init, create/spawn, yield, finish, shutdown.
//!
//! The scheduler lives in a thread-local, so the runtime belongs to the
//! thread that called [`init`] and every context runs on that thread.
//! Borrows of the scheduler are always dropped before a transfer: the
//! context we switch to will borrow it again.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::process;

use log::{debug, error, trace, warn};

use crate::config::{MAIN_SLOT, REAPER_SLOT, STACK_SIZE, WORKER_CAPACITY};
use crate::error::{CreateError, FinishRefused, InitError, SwitchFailed};
use crate::machine;
use crate::record::ContextState;
use crate::scheduler::{RuntimeStats, Scheduler};
use crate::stack::Stack;

thread_local! {
    static SCHEDULER: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    SCHEDULER.with(|cell| {
        let mut guard = cell.borrow_mut();
        let sched = guard
            .as_mut()
            .expect("weave runtime not initialized on this thread; call init() first");
        f(sched)
    })
}

fn try_with_scheduler<R>(f: impl FnOnce(&Scheduler) -> R) -> Option<R> {
    SCHEDULER.with(|cell| cell.borrow().as_ref().map(f))
}

/// Start the runtime on the calling thread, which becomes the main context
/// (slot 0).
///
/// Also sets up the reaper. If its stack cannot be mapped the runtime still
/// starts, but [`finish`] (and therefore any context body returning) will
/// log an error and abort the process.
pub fn init() -> Result<(), InitError> {
    SCHEDULER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_some() {
            return Err(InitError::AlreadyInitialized);
        }

        let mut sched = Scheduler::new();
        sched.install_main().map_err(InitError::CaptureFailed)?;

        let reaper =
            Stack::new(STACK_SIZE).and_then(|stack| sched.install_reaper(stack, reaper_entry));
        match reaper {
            Ok(()) => debug!("runtime initialized, reaper in slot {}", REAPER_SLOT),
            Err(err) => warn!("reaper unavailable ({}); contexts cannot finish", err),
        }

        *slot = Some(sched);
        Ok(())
    })
}

/// Create a context that runs `entry(arg1, arg2)`.
///
/// The context does not run until someone yields to it. Returns its slot.
pub fn create(entry: fn(i32, i32), arg1: i32, arg2: i32) -> Result<usize, CreateError> {
    spawn(move || entry(arg1, arg2))
}

/// Create a context that runs `body`. Same rules as [`create`].
pub fn spawn<F>(body: F) -> Result<usize, CreateError>
where
    F: FnOnce() + 'static,
{
    with_scheduler(|sched| {
        let slot = sched.free_slot().ok_or(CreateError::CapacityExceeded {
            capacity: WORKER_CAPACITY,
        })?;
        let stack = Stack::new(STACK_SIZE).map_err(|source| CreateError::AllocationFailed {
            size: STACK_SIZE,
            source,
        })?;
        sched
            .prepare(slot, stack, trampoline, Box::new(body))
            .map_err(CreateError::CaptureFailed)?;
        debug!("created context in slot {}", slot);
        Ok(slot)
    })
}

/// Hand control to the next active context in slot order.
///
/// Returns immediately with `0` when the caller is the only active context.
/// Otherwise returns, once resumed, how many other contexts are still
/// active. That count can drop while we were suspended; `0` means the caller
/// is the last one left.
pub fn yield_now() -> Result<usize, SwitchFailed> {
    let switch = with_scheduler(|sched| {
        let cur = sched.cursor();
        if sched.others_active(cur) == 0 {
            return None;
        }
        let next = sched
            .next_active_after(cur)
            .expect("an active context was counted but not found");
        sched.set_cursor(next);
        Some((cur, next, sched.machine_ptr(cur), sched.machine_ptr(next)))
    });
    let Some((cur, next, from, to)) = switch else {
        return Ok(0);
    };

    trace!("yield {} -> {}", cur, next);
    // SAFETY: both states are owned by the live scheduler; `next` is active,
    // so it was bound by create or saved by its own last transfer.
    if let Err(source) = unsafe { machine::transfer(from, to) } {
        with_scheduler(|sched| sched.set_cursor(cur));
        return Err(SwitchFailed {
            from: cur,
            to: next,
            source,
        });
    }

    Ok(with_scheduler(|sched| sched.others_active(sched.cursor())))
}

/// End the calling context and hand control to the reaper.
///
/// Never returns. Panics when called from main or from the reaper. Aborts
/// the process when the reaper could not be set up or the transfer fails.
pub fn finish() -> ! {
    match finish_current() {
        Ok(()) => error!("context resumed after finish"),
        Err(err) => error!("{}", err),
    }
    process::abort()
}

fn finish_current() -> Result<(), SwitchFailed> {
    let checked = with_scheduler(|sched| -> Result<_, FinishRefused> {
        let slot = sched.cursor();
        sched.check_finish(slot)?;
        sched.mark_finished(slot);
        sched.set_cursor(REAPER_SLOT);
        Ok((slot, sched.machine_ptr(slot), sched.machine_ptr(REAPER_SLOT)))
    });
    let (slot, from, to) = match checked {
        Ok(switch) => switch,
        // Unwinding cannot leave a context stack.
        Err(err @ FinishRefused::NoReaper) => {
            error!("{}", err);
            process::abort()
        }
        Err(err) => panic!("{}", err),
    };

    debug!("context {} finished", slot);
    // SAFETY: the reaper was bound in init and only ever suspends inside
    // its own loop.
    unsafe { machine::transfer(from, to) }.map_err(|source| {
        with_scheduler(|sched| sched.set_cursor(slot));
        SwitchFailed {
            from: slot,
            to: REAPER_SLOT,
            source,
        }
    })
}

/// Entry point bound to every created context.
extern "C" fn trampoline() {
    let (slot, entry) = with_scheduler(|sched| {
        let slot = sched.cursor();
        (slot, sched.record_mut(slot).take_entry())
    });

    if let Some(entry) = entry {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
            error!("context {} panicked: {}", slot, panic_message(&*payload));
        }
    }

    if let Err(err) = finish_current() {
        error!("{}", err);
    }

    // Only reached if the transfer to the reaper came back. Returning
    // resumes the fallback context through uc_link.
    let fallback = with_scheduler(|sched| {
        let fallback = sched.record(slot).fallback();
        sched.set_cursor(fallback);
        fallback
    });
    warn!("context {} fell through to slot {}", slot, fallback);
}

/// Reaper loop. Entered only from `finish`; each pass frees every finished
/// slot and returns to main.
extern "C" fn reaper_entry() {
    loop {
        let (reclaimed, from, to) = with_scheduler(|sched| {
            let reclaimed = sched.reclaim_finished();
            sched.set_cursor(MAIN_SLOT);
            (
                reclaimed,
                sched.machine_ptr(REAPER_SLOT),
                sched.machine_ptr(MAIN_SLOT),
            )
        });
        debug!("reaper reclaimed {} context(s)", reclaimed);

        // SAFETY: main is always suspended in yield_now while any other
        // context runs.
        if let Err(source) = unsafe { machine::transfer(from, to) } {
            error!("reaper could not return to main: {}", source);
            process::abort();
        }
    }
}

/// Tear down the runtime on this thread, releasing every stack it owns.
///
/// Contexts that are still suspended are dropped without running further.
/// Must be called from main. Does nothing if the runtime is not running.
/// Dropping the thread has the same effect.
pub fn shutdown() {
    let sched = SCHEDULER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if let Some(sched) = slot.as_ref() {
            assert_eq!(
                sched.cursor(),
                MAIN_SLOT,
                "shutdown() must be called from the main context"
            );
        }
        slot.take()
    });
    let Some(sched) = sched else {
        return;
    };

    let stats = sched.stats();
    if stats.active > 1 || stats.finished > 0 {
        warn!(
            "shutting down with {} suspended and {} unreclaimed context(s)",
            stats.active - 1,
            stats.finished
        );
    }
    drop(sched);
    debug!("runtime shut down");
}

/// Whether [`init`] has run on this thread (and [`shutdown`] has not).
pub fn is_initialized() -> bool {
    try_with_scheduler(|_| ()).is_some()
}

/// Slot of the running context.
pub fn current_slot() -> Option<usize> {
    try_with_scheduler(Scheduler::cursor)
}

/// Lifecycle state of `slot`, or `None` if the runtime is not running or
/// the slot is out of range.
pub fn slot_state(slot: usize) -> Option<ContextState> {
    try_with_scheduler(|sched| sched.state(slot)).flatten()
}

/// Slot counts over main and the workers.
pub fn stats() -> Option<RuntimeStats> {
    try_with_scheduler(Scheduler::stats)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

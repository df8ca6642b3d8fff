// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Weave runtime: cooperative contexts on a single OS thread.
//!
//! A fixed table of contexts that hand control to each other explicitly.
//! Slot 0 is the thread that called [`init`]; the last slot is the reaper,
//! which frees the stacks of finished contexts and hands control back to
//! main. Nothing is preemptive and nothing crosses threads.
//!
//! Components:
//! - config    — table and stack sizes
//! - error     — init/create/switch errors
//! - stack     — guarded mmap stacks
//! - machine   — ucontext capture and transfer
//! - record    — per-slot state machine
//! - scheduler — table, cursor, round-robin selection, reclamation
//! - runtime   — public lifecycle operations, trampoline, reaper

pub mod config;
pub mod error;
mod machine;
mod record;
mod runtime;
mod scheduler;
mod stack;

pub use config::{MAIN_SLOT, MAX_CONTEXTS, REAPER_SLOT, STACK_SIZE, WORKER_CAPACITY};
pub use error::{CreateError, InitError, SwitchFailed};
pub use record::ContextState;
pub use runtime::{
    create, current_slot, finish, init, is_initialized, shutdown, slot_state, spawn, stats,
    yield_now,
};
pub use scheduler::RuntimeStats;

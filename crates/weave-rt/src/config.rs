// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Compile-time runtime limits.
//!
//! The table size and stack size are fixed at build time. Nothing here is
//! read from the environment.

/// Total number of context slots, including main and the reaper.
pub const MAX_CONTEXTS: usize = 16;

/// Usable stack bytes per context. A guard page is added on top of this.
pub const STACK_SIZE: usize = 256 * 1024;

/// Slot owned by the thread that called `init`. Runs on the thread's own stack.
pub const MAIN_SLOT: usize = 0;

/// Slot reserved for the reaper. Never picked by round-robin.
pub const REAPER_SLOT: usize = MAX_CONTEXTS - 1;

/// How many worker contexts can be alive at once.
pub const WORKER_CAPACITY: usize = MAX_CONTEXTS - 2;

const _: () = assert!(MAX_CONTEXTS >= 3, "need main, reaper and at least one worker");

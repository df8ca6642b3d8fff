// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime errors.
//!
//! Only recoverable conditions are errors. Misuse of the runtime (calling
//! into it before `init`, finishing main, illegal slot transitions) panics.
//! Finishing while the reaper is missing aborts the process.

use std::io;

use thiserror::Error;

/// Why `init` failed.
#[derive(Debug, Error)]
pub enum InitError {
    /// `init` was already called on this thread.
    #[error("runtime already initialized on this thread")]
    AlreadyInitialized,

    /// The main context's machine state could not be captured.
    #[error("failed to capture main context: {0}")]
    CaptureFailed(#[source] io::Error),
}

/// Why `create` / `spawn` failed. The table is unchanged on every variant.
#[derive(Debug, Error)]
pub enum CreateError {
    /// Every worker slot is `Active` or awaiting the reaper.
    #[error("no free context slot (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// The stack for the new context could not be mapped.
    #[error("failed to allocate a {size}-byte context stack: {source}")]
    AllocationFailed {
        size: usize,
        #[source]
        source: io::Error,
    },

    /// The machine-state template for the slot could not be captured.
    #[error("failed to prepare context: {0}")]
    CaptureFailed(#[source] io::Error),
}

/// A low-level context transfer failed.
///
/// The scheduler cursor is restored to `from` before this is returned, but
/// callers should treat it as fatal.
#[derive(Debug, Error)]
#[error("context switch from slot {from} to slot {to} failed: {source}")]
pub struct SwitchFailed {
    pub from: usize,
    pub to: usize,
    #[source]
    pub source: io::Error,
}

/// Why the running context may not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum FinishRefused {
    #[error("finish() called from the main context")]
    MainContext,

    #[error("finish() called from the reaper")]
    Reaper,

    /// `init` could not set up the reaper, so nothing can free the slot.
    #[error("finish() needs the reaper, which failed to initialize")]
    NoReaper,
}

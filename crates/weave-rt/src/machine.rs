// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Machine-state capture and transfer.
//!
//! The only place that touches `ucontext_t`. Everything above this module
//! deals in slots and pointers handed out by [`MachineState::as_ptr`].

use std::io;
use std::mem;
use std::ptr::{self, NonNull};

use crate::stack::Stack;

#[cfg(not(all(target_os = "linux", target_env = "gnu", target_arch = "x86_64")))]
compile_error!("weave-rt only supports x86_64 Linux with glibc");

/// Saved registers and stack pointer for one context.
///
/// Heap-allocated and never moved: glibc stores a pointer into the struct
/// itself (the FP register area), so a relocated `ucontext_t` would restore
/// garbage.
pub(crate) struct MachineState {
    raw: NonNull<libc::ucontext_t>,
}

impl MachineState {
    /// A cleared (all-zero) state. Not resumable until captured or bound.
    pub fn new() -> Self {
        // SAFETY: ucontext_t is plain C data; all-zero is a valid bit pattern.
        let boxed: Box<libc::ucontext_t> = Box::new(unsafe { mem::zeroed() });
        Self {
            raw: NonNull::from(Box::leak(boxed)),
        }
    }

    /// Forget whatever was saved here.
    pub fn clear(&mut self) {
        // SAFETY: we own the allocation; zero is valid for ucontext_t.
        unsafe { ptr::write_bytes(self.raw.as_ptr(), 0, 1) };
    }

    /// Snapshot the calling context into this state.
    pub fn capture(&mut self) -> io::Result<()> {
        // SAFETY: points at an owned, live ucontext_t.
        if unsafe { libc::getcontext(self.raw.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Prepare a fresh context that starts in `entry` on `stack`.
    ///
    /// If `entry` returns, execution continues at `link` (or the thread exits
    /// when `link` is null). `stack` must outlive every resumption of this
    /// state.
    pub fn bind(
        &mut self,
        stack: &Stack,
        entry: extern "C" fn(),
        link: *mut libc::ucontext_t,
    ) -> io::Result<()> {
        self.capture()?;
        // SAFETY: state was just captured; stack region is mapped and owned
        // by the caller's record.
        unsafe {
            let uc = self.raw.as_mut();
            uc.uc_stack.ss_sp = stack.bottom().cast();
            uc.uc_stack.ss_size = stack.size();
            uc.uc_stack.ss_flags = 0;
            uc.uc_link = link;
            libc::makecontext(self.raw.as_ptr(), entry, 0);
        }
        Ok(())
    }

    pub fn as_ptr(&self) -> *mut libc::ucontext_t {
        self.raw.as_ptr()
    }
}

impl Drop for MachineState {
    fn drop(&mut self) {
        // SAFETY: allocated by Box in `new`, freed exactly once here.
        unsafe { drop(Box::from_raw(self.raw.as_ptr())) };
    }
}

/// Save the running context into `from` and resume `to`.
///
/// Returns when something later transfers back into `from`.
///
/// # Safety
/// Both pointers must come from live [`MachineState`]s. `to` must have been
/// captured, bound, or saved by an earlier transfer, and its stack must still
/// be mapped. No `RefCell` borrow of scheduler state may be held across the
/// call.
pub(crate) unsafe fn transfer(
    from: *mut libc::ucontext_t,
    to: *const libc::ucontext_t,
) -> io::Result<()> {
    if libc::swapcontext(from, to) == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

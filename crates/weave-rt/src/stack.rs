// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Owned context stacks.
//!
//! Each stack is an anonymous private mapping with one `PROT_NONE` guard
//! page at its low end. Stacks grow down, so running off the end faults on
//! the guard page instead of scribbling over whatever is mapped below.

use std::io;
use std::ptr::{self, NonNull};

/// A mapped stack region. Unmapped on drop.
pub(crate) struct Stack {
    /// Start of the mapping (the guard page).
    base: NonNull<u8>,
    /// Whole mapping, guard included.
    mapped_len: usize,
    guard_len: usize,
}

impl Stack {
    /// Map a stack with at least `size` usable bytes.
    ///
    /// `size` is rounded up to whole pages. The guard page is extra.
    pub fn new(size: usize) -> io::Result<Self> {
        let page = page_size();
        let usable = size.max(1).div_ceil(page) * page;
        let mapped_len = usable + page;

        // SAFETY: anonymous mapping with no address hint; we own the result.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_STACK,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: `raw` is the start of a mapping at least one page long.
        if unsafe { libc::mprotect(raw, page, libc::PROT_NONE) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::munmap(raw, mapped_len) };
            return Err(err);
        }

        let base = NonNull::new(raw.cast::<u8>())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))?;

        Ok(Self {
            base,
            mapped_len,
            guard_len: page,
        })
    }

    /// Lowest usable address (just above the guard page).
    pub fn bottom(&self) -> *mut u8 {
        // SAFETY: guard_len < mapped_len, so this stays inside the mapping.
        unsafe { self.base.as_ptr().add(self.guard_len) }
    }

    /// Usable bytes, excluding the guard page.
    pub fn size(&self) -> usize {
        self.mapped_len - self.guard_len
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // SAFETY: exact region returned by mmap in `new`. Nothing runs on a
        // stack once its owner decides to drop it.
        unsafe {
            libc::munmap(self.base.as_ptr().cast(), self.mapped_len);
        }
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("size", &self.size())
            .finish()
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n > 0 {
        n as usize
    } else {
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rounds_up_to_pages() {
        let page = page_size();
        let stack = Stack::new(page + 1).unwrap();
        assert_eq!(stack.size(), 2 * page);
        assert_eq!(stack.bottom() as usize % page, 0);
    }

    #[test]
    fn usable_region_is_writable() {
        let stack = Stack::new(64 * 1024).unwrap();
        unsafe {
            let last = stack.bottom().add(stack.size() - 1);
            stack.bottom().write(0xAB);
            last.write(0xCD);
            assert_eq!(stack.bottom().read(), 0xAB);
            assert_eq!(last.read(), 0xCD);
        }
    }

    #[test]
    fn zero_size_still_maps_a_page() {
        let stack = Stack::new(0).unwrap();
        assert_eq!(stack.size(), page_size());
    }
}

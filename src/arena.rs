//! Byte-budgeted scratch allocator for bounding per-session memory use.
//!
//! The runtime this crate is modeled on leans on a bump-allocated arena
//! (`arena_create`/`arena_alloc`/`arena_reset`/`arena_destroy`) so that a
//! session's transient allocations — tool-call JSON, SSE line buffers,
//! provider scratch strings — can be freed in one shot and never outlive the
//! session that created them. Raw bump-pointer allocation isn't a safe
//! pattern in Rust (the allocator already gives us that for free), so
//! [`Arena`] keeps the *budget* the original design enforced without the
//! unsafe pointer arithmetic: every allocation is ordinary heap memory, but
//! each one is checked against (and counted against) a fixed capacity, and
//! `reset` drops everything handed out so far.
//!
//! Ownership is explicit: an [`ArenaHandle`] returned by [`Arena::alloc`]
//! owns its bytes and frees them on drop like any other Rust value. The
//! arena only tracks how much budget remains; it never reaches back into
//! handles it already gave out.

use crate::{Error, Result};
use std::sync::Mutex;

/// A single allocation made from an [`Arena`].
///
/// Released back to the arena's budget when dropped.
#[derive(Debug)]
pub struct ArenaHandle {
    bytes: Vec<u8>,
    arena: std::sync::Weak<ArenaInner>,
}

impl ArenaHandle {
    /// Borrow the allocation's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the allocation as a `str`, if it is valid UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes).map_err(|e| Error::invalid_state(e.to_string()))
    }

    /// Number of bytes this handle holds.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether this handle holds zero bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for ArenaHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.arena.upgrade() {
            let mut used = inner.used.lock().unwrap_or_else(|p| p.into_inner());
            *used = used.saturating_sub(self.bytes.len());
        }
    }
}

#[derive(Debug)]
struct ArenaInner {
    capacity: usize,
    used: Mutex<usize>,
}

/// Bounded scratch allocator with an explicit byte budget.
///
/// Every [`Arena::alloc`] call either succeeds and returns an
/// [`ArenaHandle`] counted against the budget, or fails with
/// [`Error::NoMemory`] if the allocation would exceed `capacity`.
/// [`Arena::reset`] reclaims the whole budget at once, mirroring the
/// original `arena_reset` semantics, without requiring outstanding handles
/// to be dropped first (their bytes simply stop being tracked).
#[derive(Debug, Clone)]
pub struct Arena {
    inner: std::sync::Arc<ArenaInner>,
}

impl Arena {
    /// Create a new arena with the given byte budget.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(ArenaInner {
                capacity,
                used: Mutex::new(0),
            }),
        }
    }

    /// Allocate `size` bytes (zero-initialized) from the arena's budget.
    pub fn alloc(&self, size: usize) -> Result<ArenaHandle> {
        let mut used = self.inner.used.lock().unwrap_or_else(|p| p.into_inner());
        if *used + size > self.inner.capacity {
            return Err(Error::no_memory(format!(
                "arena exhausted: requested {size} bytes, {} of {} already used",
                *used, self.inner.capacity
            )));
        }
        *used += size;
        Ok(ArenaHandle {
            bytes: vec![0u8; size],
            arena: std::sync::Arc::downgrade(&self.inner),
        })
    }

    /// Copy a string into the arena, counted against its budget.
    pub fn strdup(&self, s: &str) -> Result<ArenaHandle> {
        let mut handle = self.alloc(s.len())?;
        handle.bytes.copy_from_slice(s.as_bytes());
        Ok(handle)
    }

    /// Reclaim the entire budget, regardless of outstanding handles.
    ///
    /// Handles allocated before the reset remain valid (they own their own
    /// memory) but no longer count against the arena; this matches the
    /// original allocator's "everything is invalid after reset" contract
    /// in spirit, since callers are expected to drop prior handles at a
    /// session boundary rather than read from them afterward.
    pub fn reset(&self) {
        let mut used = self.inner.used.lock().unwrap_or_else(|p| p.into_inner());
        *used = 0;
    }

    /// Bytes currently counted against the budget.
    pub fn used(&self) -> usize {
        *self.inner.used.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Total byte budget this arena was created with.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Remaining budget before further allocations fail.
    pub fn remaining(&self) -> usize {
        self.inner.capacity.saturating_sub(self.used())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_within_capacity_succeeds() {
        let arena = Arena::new(1024);
        let handle = arena.alloc(100).unwrap();
        assert_eq!(handle.len(), 100);
        assert_eq!(arena.used(), 100);
    }

    #[test]
    fn alloc_beyond_capacity_fails() {
        let arena = Arena::new(64);
        assert!(arena.alloc(65).is_err());
        let err = arena.alloc(65).unwrap_err();
        assert!(matches!(err, Error::NoMemory(_)));
    }

    #[test]
    fn dropping_handle_frees_budget() {
        let arena = Arena::new(64);
        {
            let _handle = arena.alloc(64).unwrap();
            assert_eq!(arena.remaining(), 0);
        }
        assert_eq!(arena.remaining(), 64);
    }

    #[test]
    fn reset_reclaims_budget_immediately() {
        let arena = Arena::new(64);
        let _handle = arena.alloc(64).unwrap();
        assert_eq!(arena.remaining(), 0);
        arena.reset();
        assert_eq!(arena.remaining(), 64);
    }

    #[test]
    fn strdup_round_trips_utf8() {
        let arena = Arena::new(1024);
        let handle = arena.strdup("hello arena").unwrap();
        assert_eq!(handle.as_str().unwrap(), "hello arena");
    }
}

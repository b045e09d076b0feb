use core::sync::atomic::{AtomicU32, Ordering};

use crate::token::InvariantLifetime;

/// A branded `AtomicU32`.
///
/// Vertex ids, labels and predecessors are 32-bit, so every per-vertex and
/// per-frontier-slot cell of a problem is one of these.
#[repr(transparent)]
pub struct GhostAtomicU32<'brand> {
    inner: AtomicU32,
    _brand: InvariantLifetime<'brand>,
}

impl<'brand> GhostAtomicU32<'brand> {
    /// Creates a new branded atomic u32.
    #[inline(always)]
    pub const fn new(value: u32) -> Self {
        Self {
            inner: AtomicU32::new(value),
            _brand: InvariantLifetime::new(),
        }
    }

    /// Loads the current value.
    #[inline(always)]
    pub fn load(&self, order: Ordering) -> u32 {
        self.inner.load(order)
    }

    /// Stores a new value.
    #[inline(always)]
    pub fn store(&self, value: u32, order: Ordering) {
        self.inner.store(value, order);
    }
}

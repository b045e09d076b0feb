//! Read-mostly lookup views bound for the duration of one search.
//!
//! Workers read the row offsets and the visited mask at random positions. Both
//! are bound once per setup; binding fails if the array does not fit the
//! device's bound element limit.

use core::sync::atomic::Ordering;

use crate::concurrency::atomic::GhostAtomicBitset;
use crate::device::DeviceProps;
use crate::error::EnactError;

fn check_binding(what: &'static str, len: usize, props: &DeviceProps) -> Result<(), EnactError> {
    if len == 0 || len > props.max_bound_elements {
        return Err(EnactError::BindingFailure {
            what,
            len,
            limit: props.max_bound_elements,
        });
    }
    Ok(())
}

/// Bound CSR row offsets (`nodes + 1` entries).
#[derive(Clone, Copy)]
pub struct RowOffsetsView<'a> {
    offsets: &'a [usize],
}

impl<'a> RowOffsetsView<'a> {
    /// Binds `offsets`.
    ///
    /// # Errors
    /// `BindingFailure` if the array is empty or exceeds the bound limit.
    pub fn bind(offsets: &'a [usize], props: &DeviceProps) -> Result<Self, EnactError> {
        check_binding("row offsets", offsets.len(), props)?;
        Ok(Self { offsets })
    }

    /// Edge range `[begin, end)` of `vertex`.
    #[inline]
    pub fn row(&self, vertex: u32) -> (usize, usize) {
        let v = vertex as usize;
        (self.offsets[v], self.offsets[v + 1])
    }
}

/// Bound visited mask.
///
/// Reads through the view are a culling hint: a stale "not visited" is fine,
/// because the contract phase settles ownership with an atomic test-and-set.
#[derive(Clone, Copy)]
pub struct VisitedView<'a, 'brand> {
    mask: &'a GhostAtomicBitset<'brand>,
}

impl<'a, 'brand> VisitedView<'a, 'brand> {
    /// Binds the mask, measured in words of storage.
    ///
    /// # Errors
    /// `BindingFailure` if the mask is empty or exceeds the bound limit.
    pub fn bind(mask: &'a GhostAtomicBitset<'brand>, props: &DeviceProps) -> Result<Self, EnactError> {
        let words = mask.len_bits().div_ceil(usize::BITS as usize);
        check_binding("visited mask", words, props)?;
        Ok(Self { mask })
    }

    /// Whether `vertex` has already been claimed by some contract.
    #[inline]
    pub fn probably_visited(&self, vertex: u32) -> bool {
        self.mask.is_set(vertex as usize, Ordering::Relaxed)
    }
}

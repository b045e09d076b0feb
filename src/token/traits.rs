//! Traits for abstracting over token capabilities.

use crate::token::GhostToken;

/// A token that can authorize shared access to branded state.
///
/// Label and predecessor snapshots only need this capability.
pub trait GhostBorrow<'brand> {}

/// A token that can authorize exclusive access to branded state.
///
/// Searches require this capability because they rewrite every label.
pub trait GhostBorrowMut<'brand>: GhostBorrow<'brand> {}

impl<'brand> GhostBorrow<'brand> for GhostToken<'brand> {}
impl<'brand> GhostBorrowMut<'brand> for GhostToken<'brand> {}

use core::marker::PhantomData;

/// Marker that is invariant in `'id`.
///
/// Brands must not shrink through subtyping, otherwise a problem created under
/// one token could be handed to a search running under another.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct InvariantLifetime<'id>(PhantomData<fn(&'id ()) -> &'id ()>);

impl<'id> InvariantLifetime<'id> {
    /// The marker value, usable in `const` constructors.
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

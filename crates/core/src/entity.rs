//! Entity trait: identity that survives across reads.

/// Entity marker + minimal interface.
///
/// Accounts, transactions and entries are all immutable once written, so
/// identity is the only thing callers compare across store round trips.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

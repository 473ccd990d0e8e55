//! Identity for records that outlive a single state change.

/// A record addressed by a stable identifier rather than by its contents.
///
/// Ledger entries are entities: two sales of the same quantity at the same
/// instant are still distinct records.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> Self::Id;

    /// Both values refer to the same record, whatever their contents.
    fn same_identity(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        self.id() == other.id()
    }
}

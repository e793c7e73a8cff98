use crate::snapshot::model::SnapshotEntry;

/// Compares an observation with the cached entry.
///
/// Returns the entry to write back when the product changed (no cached entry,
/// or price / sold-out differ), `None` when the observation is identical.
pub fn diff(cached: Option<&SnapshotEntry>, price: u64, is_sold_out: bool) -> Option<SnapshotEntry> {
    match cached {
        None => Some(SnapshotEntry::first(price, is_sold_out)),
        Some(prev) if prev.matches(price, is_sold_out) => None,
        Some(prev) => Some(prev.advance(price, is_sold_out)),
    }
}

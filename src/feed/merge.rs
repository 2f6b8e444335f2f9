use crate::feed::normalize::NormalizedItem;

/// Flattens per-source item lists into one list, newest first, capped at `max_items`.
///
/// Lists are concatenated in the order given and sorted with a stable sort
/// on the parsed timestamp, so items with identical timestamps keep their
/// concatenation order.
pub fn merge(lists: Vec<Vec<NormalizedItem>>, max_items: usize) -> Vec<NormalizedItem> {
    let mut items: Vec<NormalizedItem> = lists.into_iter().flatten().collect();
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(max_items);
    items
}

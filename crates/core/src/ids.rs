//! Identifier generation and stable reordering.

use uuid::Uuid;

/// Generate a new opaque, collision-resistant identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Move the element at `from` so that it ends up at index `to`.
///
/// Standard array-move semantics: remove at `from`, insert at `to`. The
/// relative order of every other element is preserved. Out-of-range
/// indices leave the sequence untouched and return `false`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        tracing::debug!(
            "Ignoring move {} -> {} on sequence of length {}",
            from,
            to,
            items.len()
        );
        return false;
    }

    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }

    true
}

//! Display ordering for sibling collections
//!
//! Stored order is insertion order. `order` is only a display hint, so
//! callers get a sorted view and the underlying slice is never reordered.

pub trait DisplayOrder {
    fn display_order(&self) -> i32;
}

/// Stable sort by `order`; ties keep their stored position.
pub fn sorted_for_display<T: DisplayOrder>(items: &[T]) -> Vec<&T> {
    let mut view: Vec<&T> = items.iter().collect();
    view.sort_by_key(|item| item.display_order());
    view
}

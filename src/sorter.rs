use crate::models::{FilterOptions, Item, ItemCategory, SortKey, SortOrder};
use std::cmp::Ordering;

/// Steps run in a fixed order: category filter, ascending sort by key,
/// stable partition of the priority category to the front, then a full
/// reversal for descending order.
pub fn sort_items(items: &[Item], options: &FilterOptions) -> Vec<Item> {
    if items.len() <= 1 {
        return items.to_vec();
    }

    let mut sorted = match &options.category {
        ItemCategory::All => items.to_vec(),
        category => items.iter().filter(|item| category.matches(item)).cloned().collect(),
    };

    sorted.sort_by(|left, right| compare_by_key(left, right, options.sort_by));

    if let Some(priority) = &options.priority {
        let (mut first, rest): (Vec<Item>, Vec<Item>) = sorted.into_iter().partition(|item| priority.matches(item));
        first.extend(rest);
        sorted = first;
    }

    if options.order == SortOrder::Descending {
        sorted.reverse();
    }
    sorted
}

fn compare_by_key(left: &Item, right: &Item, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => compare_titles(&left.title, &right.title),
        SortKey::CreatedAt => left.created_at.cmp(&right.created_at),
        SortKey::ModifiedAt => left.modified_at.cmp(&right.modified_at),
        SortKey::ContentSize => left.content_len().cmp(&right.content_len()),
    }
}

fn compare_titles(left: &str, right: &str) -> Ordering {
    let left = left.chars().flat_map(char::to_lowercase);
    let right = right.chars().flat_map(char::to_lowercase);
    left.cmp(right)
}

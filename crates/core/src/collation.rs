//! Collation for person names across scripts.
//!
//! The sort key folds compatibility forms (NFKD), drops combining marks and
//! lowercases, so `"Émile Zola"` sorts next to `"Emile Zola"` and case never
//! decides order on its own. Ties fall back to the raw string, which keeps the
//! order total and deterministic.

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Build the primary sort key for `s`.
pub fn collation_key(s: &str) -> String {
    let folded: String = s
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compare two names in collation order.
pub fn compare(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

/// Sort `items` in collation order of the string `name_of` returns.
///
/// Stable; sorting an already-sorted slice leaves it unchanged.
pub fn sort_by_name<T>(items: &mut [T], name_of: impl Fn(&T) -> &str) {
    items.sort_by_cached_key(|item| {
        let name = name_of(item);
        (collation_key(name), name.to_string())
    });
}

/// Whether `items` is already in collation order.
pub fn is_sorted_by_name<T>(items: &[T], name_of: impl Fn(&T) -> &str) -> bool {
    items
        .windows(2)
        .all(|pair| compare(name_of(&pair[0]), name_of(&pair[1])) != Ordering::Greater)
}

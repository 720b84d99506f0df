use std::collections::HashSet;
use std::hash::Hash;

use crate::Record;

/// Returns the records of `current` whose identity key is absent from `previous`.
pub fn diff_new<R: Record>(previous: &[R], current: &[R]) -> Vec<R> {
    diff_new_by(previous, current, R::identity_key)
}

/// Order-preserving subsequence of `current` whose key is not in the key set
/// of `previous`.
///
/// Duplicates inside `current` are kept; they are only compared against
/// `previous`, never against each other.
pub fn diff_new_by<T, K, F>(previous: &[T], current: &[T], key_fn: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let seen: HashSet<K> = previous.iter().map(&key_fn).collect();
    current
        .iter()
        .filter(|item| !seen.contains(&key_fn(*item)))
        .cloned()
        .collect()
}

// ============================================================
// Layer 4 — Permutations
// ============================================================
// Reordering helpers for the corpus post-pass:
//
//   seeded_permutation(n, seed)  → reproducible shuffle order
//   stable_sort_order(keys)      → ascending order, ties keep position
//   apply_permutation(items, p)  → items[p[0]], items[p[1]], ...
//
// The shuffle uses ChaCha8 so the same (n, seed) gives the same
// order on every platform and every rand release.
//
// Reference: rand crate documentation (SliceRandom, SeedableRng)

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A deterministic permutation of `0..n` for the given seed.
pub fn seeded_permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut rng  = ChaCha8Rng::seed_from_u64(seed);
    let mut perm: Vec<usize> = (0..n).collect();
    // Fisher-Yates
    perm.shuffle(&mut rng);
    perm
}

/// Indices that sort `keys` ascending; equal keys keep their order.
pub fn stable_sort_order<K: Ord>(keys: &[K]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    order
}

/// Reorder `items` so that position `i` holds the old `items[perm[i]]`.
///
/// # Panics
/// Panics if `perm` is not a permutation of `0..items.len()`.
pub fn apply_permutation<T>(items: Vec<T>, perm: &[usize]) -> Vec<T> {
    assert_eq!(items.len(), perm.len(), "permutation length mismatch");
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    perm.iter()
        .map(|&i| slots[i].take().expect("index repeated in permutation"))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_order() {
        assert_eq!(seeded_permutation(50, 3435), seeded_permutation(50, 3435));
    }

    #[test]
    fn test_is_a_true_permutation() {
        let mut p = seeded_permutation(100, 7);
        p.sort_unstable();
        assert_eq!(p, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_different_seeds_differ() {
        assert_ne!(seeded_permutation(100, 1), seeded_permutation(100, 2));
    }

    #[test]
    fn test_empty_permutation() {
        assert!(seeded_permutation(0, 1).is_empty());
    }

    #[test]
    fn test_stable_sort_keeps_ties_in_place() {
        let keys = [3, 1, 2, 1, 3];
        assert_eq!(stable_sort_order(&keys), vec![1, 3, 2, 0, 4]);
    }

    #[test]
    fn test_apply_permutation() {
        let items = vec!["a", "b", "c"];
        assert_eq!(apply_permutation(items, &[2, 0, 1]), vec!["c", "a", "b"]);
    }

    #[test]
    #[should_panic]
    fn test_apply_permutation_rejects_repeats() {
        let _ = apply_permutation(vec![1, 2], &[0, 0]);
    }
}

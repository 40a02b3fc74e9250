//! Merkle root over a block's transactions.

use crate::hash::{hash_concat, Hash};

/// Compute the merkle root of a list of hashes.
///
/// Returns the zero hash if the list is empty.
/// Uses a binary merkle tree with pair-wise hashing.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return Hash::ZERO;
    }

    if hashes.len() == 1 {
        return hashes[0];
    }

    // Build the tree bottom-up
    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));

        for chunk in current_level.chunks(2) {
            let combined = if chunk.len() == 2 {
                hash_concat(&[chunk[0].as_ref(), chunk[1].as_ref()])
            } else {
                // Odd number of elements: hash the last one with itself
                hash_concat(&[chunk[0].as_ref(), chunk[0].as_ref()])
            };
            next_level.push(combined);
        }

        current_level = next_level;
    }

    current_level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(merkle_root(&[]), Hash::ZERO);
    }

    #[test]
    fn test_single_leaf_is_root() {
        let leaf = hash(b"register");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn test_two_leaves() {
        let a = hash(b"a");
        let b = hash(b"b");
        assert_eq!(merkle_root(&[a, b]), hash_concat(&[a.as_ref(), b.as_ref()]));
    }

    #[test]
    fn test_odd_leaf_duplicated() {
        let a = hash(b"a");
        let b = hash(b"b");
        let c = hash(b"c");

        let ab = hash_concat(&[a.as_ref(), b.as_ref()]);
        let cc = hash_concat(&[c.as_ref(), c.as_ref()]);
        let expected = hash_concat(&[ab.as_ref(), cc.as_ref()]);

        assert_eq!(merkle_root(&[a, b, c]), expected);
    }

    #[test]
    fn test_order_matters() {
        let a = hash(b"a");
        let b = hash(b"b");
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }
}

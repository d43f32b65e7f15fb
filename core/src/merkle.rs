//! Poseidon Merkle tree over Stark field elements
//!
//! The tree shape is pinned by the proving side and must not drift:
//!
//! - an empty sequence commits to `0`,
//! - a single leaf commits to itself, with no hashing,
//! - anything longer is zero-padded up to the next power of two and
//!   reduced bottom-up with the Poseidon two-element hash.
//!
//! Poseidon is the only hash family used for commitments; it is the
//! one the verifier recomputes, so a digest produced here must match
//! bit-for-bit.

use starknet_crypto::poseidon_hash;
use starknet_types_core::felt::Felt;

/// Poseidon hash of an ordered pair of field elements
///
/// Order matters: `hash_pair(a, b)` and `hash_pair(b, a)` disagree
/// except with negligible probability.
pub fn hash_pair(left: Felt, right: Felt) -> Felt {
    poseidon_hash(left, right)
}

/// Merkle root of a leaf sequence
pub fn merkle_root(leaves: &[Felt]) -> Felt {
    if leaves.is_empty() {
        return Felt::ZERO;
    }
    if leaves.len() == 1 {
        return leaves[0];
    }

    let mut level = leaves.to_vec();
    level.resize(leaves.len().next_power_of_two(), Felt::ZERO);

    while level.len() > 1 {
        level = level
            .chunks_exact(2)
            .map(|pair| hash_pair(pair[0], pair[1]))
            .collect();
    }
    level[0]
}

/// Sibling path for the leaf at `index`, bottom-up
///
/// Returns `None` when the index is outside the leaf sequence. The
/// path runs over the zero-padded tree, so it verifies against the
/// root that `merkle_root` computes for the same leaves. A singleton
/// tree has an empty path.
pub fn merkle_proof(leaves: &[Felt], index: usize) -> Option<Vec<Felt>> {
    if index >= leaves.len() {
        return None;
    }
    if leaves.len() == 1 {
        return Some(Vec::new());
    }

    let mut level = leaves.to_vec();
    level.resize(leaves.len().next_power_of_two(), Felt::ZERO);

    let mut path = Vec::new();
    let mut idx = index;
    while level.len() > 1 {
        path.push(level[idx ^ 1]);
        level = level
            .chunks_exact(2)
            .map(|pair| hash_pair(pair[0], pair[1]))
            .collect();
        idx /= 2;
    }
    Some(path)
}

/// Walk a sibling path and compare against the root
///
/// At each step the index parity decides the hash order: an even
/// index hashes `(current, sibling)`, an odd one `(sibling, current)`.
pub fn verify_merkle_proof(root: Felt, leaf: Felt, proof: &[Felt], index: usize) -> bool {
    let mut current = leaf;
    let mut idx = index;
    for &sibling in proof {
        current = if idx % 2 == 0 {
            hash_pair(current, sibling)
        } else {
            hash_pair(sibling, current)
        };
        idx /= 2;
    }
    current == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(values: &[u64]) -> Vec<Felt> {
        values.iter().map(|&v| Felt::from(v)).collect()
    }

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(merkle_root(&[]), Felt::ZERO);
    }

    #[test]
    fn test_single_leaf_is_its_own_root() {
        let leaf = Felt::from(12345u64);
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn test_two_leaves_reduce_to_hash_pair() {
        let ab = leaves(&[100, 200]);
        assert_eq!(merkle_root(&ab), hash_pair(ab[0], ab[1]));
    }

    #[test]
    fn test_hash_pair_is_ordered() {
        let a = Felt::from(100u64);
        let b = Felt::from(200u64);
        assert_eq!(hash_pair(a, b), hash_pair(a, b));
        assert_ne!(hash_pair(a, b), hash_pair(b, a));
    }

    #[test]
    fn test_padding_matches_explicit_zeros() {
        // Three leaves pad to four with a zero, nothing more
        let three = leaves(&[1, 2, 3]);
        let four = leaves(&[1, 2, 3, 0]);
        assert_eq!(merkle_root(&three), merkle_root(&four));
    }

    #[test]
    fn test_root_depends_on_order() {
        assert_ne!(merkle_root(&leaves(&[1, 2])), merkle_root(&leaves(&[2, 1])));
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        for len in [2usize, 4, 5, 8] {
            let values: Vec<u64> = (1..=len as u64).collect();
            let tree = leaves(&values);
            let root = merkle_root(&tree);
            for (index, &leaf) in tree.iter().enumerate() {
                let proof = merkle_proof(&tree, index).unwrap();
                assert!(
                    verify_merkle_proof(root, leaf, &proof, index),
                    "proof failed for leaf {} of {}",
                    index,
                    len
                );
            }
        }
    }

    #[test]
    fn test_singleton_proof_is_empty() {
        let tree = leaves(&[42]);
        let proof = merkle_proof(&tree, 0).unwrap();
        assert!(proof.is_empty());
        assert!(verify_merkle_proof(merkle_root(&tree), tree[0], &proof, 0));
    }

    #[test]
    fn test_wrong_leaf_or_index_rejected() {
        let tree = leaves(&[1, 2, 3, 4]);
        let root = merkle_root(&tree);
        let proof = merkle_proof(&tree, 2).unwrap();

        assert!(verify_merkle_proof(root, tree[2], &proof, 2));
        assert!(!verify_merkle_proof(root, tree[1], &proof, 2));
        assert!(!verify_merkle_proof(root, tree[2], &proof, 3));
        assert!(!verify_merkle_proof(Felt::from(99u64), tree[2], &proof, 2));
    }

    #[test]
    fn test_proof_index_out_of_range() {
        let tree = leaves(&[1, 2, 3]);
        assert!(merkle_proof(&tree, 3).is_none());
    }
}

//! Merkle root over transaction hashes.

use crate::hash::hash_pair;

/// Compute the merkle root of a list of hex transaction hashes.
///
/// Levels are built pairwise by hashing the concatenated hex strings; a
/// level with an odd count duplicates its last entry. A single hash is its
/// own root and an empty list yields the empty string.
pub fn merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return String::new();
    }

    let mut level: Vec<String> = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(level[level.len() - 1].clone());
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            next.push(hash_pair(&pair[0], &pair[1]));
        }
        level = next;
    }
    level.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;

    fn make_hashes(n: usize) -> Vec<String> {
        (0..n).map(|i| sha256_hex(&[i as u8])).collect()
    }

    #[test]
    fn test_empty_root_is_empty_string() {
        assert_eq!(merkle_root(&[]), "");
    }

    #[test]
    fn test_single_hash_is_its_own_root() {
        let hashes = make_hashes(1);
        assert_eq!(merkle_root(&hashes), hashes[0]);
    }

    #[test]
    fn test_two_hashes_pair_up() {
        let hashes = make_hashes(2);
        assert_eq!(merkle_root(&hashes), hash_pair(&hashes[0], &hashes[1]));
    }

    #[test]
    fn test_odd_count_duplicates_last() {
        let hashes = make_hashes(3);
        let left = hash_pair(&hashes[0], &hashes[1]);
        let right = hash_pair(&hashes[2], &hashes[2]);
        assert_eq!(merkle_root(&hashes), hash_pair(&left, &right));
    }

    #[test]
    fn test_root_deterministic() {
        let hashes = make_hashes(10);
        assert_eq!(merkle_root(&hashes), merkle_root(&hashes));
    }

    #[test]
    fn test_order_matters() {
        let hashes = make_hashes(4);
        let mut reversed = hashes.clone();
        reversed.reverse();
        assert_ne!(merkle_root(&hashes), merkle_root(&reversed));
    }
}

//! Per-step processing order.

use authority_canonical::hash_bytes;

fn draw(seed: u64, cycle: u64, counter: u64) -> u64 {
    let mut input = [0u8; 24];
    input[..8].copy_from_slice(&seed.to_be_bytes());
    input[8..16].copy_from_slice(&cycle.to_be_bytes());
    input[16..].copy_from_slice(&counter.to_be_bytes());
    let digest = hash_bytes(&input);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_be_bytes(head)
}

/// Fisher-Yates permutation of `0..len` keyed by `(seed, cycle)`.
///
/// Draw `k` is the first eight bytes of `SHA256(seed || cycle || k)`, all
/// big-endian. No other source of order exists.
pub fn processing_order(seed: u64, cycle: u64, len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for (counter, i) in (1..len).rev().enumerate() {
        let j = (draw(seed, cycle, counter as u64) % (i as u64 + 1)) as usize;
        order.swap(i, j);
    }
    order
}

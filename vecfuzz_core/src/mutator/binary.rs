//! Slice-level mutators for opaque binaries such as ELF executables and PDF documents.
//!
//! None of these are gated on a format: they only need a non-empty input.
//! Slice bounds come from `le(0)` and `le(1)` reduced modulo the input length
//! and are taken in ascending order.

use super::{Mutator, bounded, expanded_len};
use crate::params::{Params, reduce};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::ops::Range;

const MAX_REPEAT: usize = 5000;

/// Slice between the offsets picked by coordinates 0 and 1, in ascending order.
fn span(input: &[u8], params: Params<'_>) -> Range<usize> {
    let a = reduce(params.le(0, 2..4), input.len());
    let b = reduce(params.le(1, 2..4), input.len());
    a.min(b)..a.max(b)
}

/// Writes `value` into the insertion point.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryInsertMutator;

impl Mutator for BinaryInsertMutator {
    fn name(&self) -> &'static str {
        "Insert input between two indexes"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        if input.is_empty() {
            return input.to_vec();
        }
        let index = reduce(params.le(0, 2..4), input.len());
        let value = reduce(params.le(1, 2..7), input.len()) as u64;
        let mut out = Vec::with_capacity(input.len() + 5);
        out.extend_from_slice(&input[..index]);
        out.extend_from_slice(&value.to_le_bytes()[..5]);
        out.extend_from_slice(&input[index..]);
        bounded(input, out)
    }
}

/// Replaces the slice with four bytes derived from coordinate 2.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryReplaceMutator;

impl Mutator for BinaryReplaceMutator {
    fn name(&self) -> &'static str {
        "Replace input between two indexes"
    }

    fn dimension(&self) -> usize {
        3
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        if input.is_empty() {
            return input.to_vec();
        }
        let range = span(input, params);
        let value = reduce(params.le(2, 2..6), input.len()) as u32;
        let mut out = input.to_vec();
        out.splice(range, value.to_le_bytes());
        bounded(input, out)
    }
}

/// Moves the slice to the end of the input.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryAppendMutator;

impl Mutator for BinaryAppendMutator {
    fn name(&self) -> &'static str {
        "Append input between two indexes to the end"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        if input.is_empty() {
            return input.to_vec();
        }
        let range = span(input, params);
        let mut out = Vec::with_capacity(input.len());
        out.extend_from_slice(&input[..range.start]);
        out.extend_from_slice(&input[range.end..]);
        out.extend_from_slice(&input[range]);
        out
    }
}

/// Permutes the bytes of the slice.
///
/// The permutation comes from a ChaCha8 stream seeded with the bit patterns of
/// both coordinates, so equal sub-vectors always give equal output.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryShuffleMutator;

impl BinaryShuffleMutator {
    fn rng(params: Params<'_>) -> ChaCha8Rng {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&params.bits(0).to_le_bytes());
        seed[8..16].copy_from_slice(&params.bits(1).to_le_bytes());
        ChaCha8Rng::from_seed(seed)
    }
}

impl Mutator for BinaryShuffleMutator {
    fn name(&self) -> &'static str {
        "Shuffle input between two indexes"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        if input.is_empty() {
            return input.to_vec();
        }
        let range = span(input, params);
        let mut out = input.to_vec();
        out[range].shuffle(&mut Self::rng(params));
        out
    }
}

/// Repeats the slice `min(le(2), 5000)` times in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryRepeatMutator;

impl Mutator for BinaryRepeatMutator {
    fn name(&self) -> &'static str {
        "Repeat input between two indexes"
    }

    fn dimension(&self) -> usize {
        3
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let count = (params.le(2, 2..4) as usize).min(MAX_REPEAT);
        if input.is_empty() || expanded_len(input.len(), count).is_none() {
            return input.to_vec();
        }
        let range = span(input, params);
        let mut out = Vec::with_capacity(input.len() * count.max(1));
        out.extend_from_slice(&input[..range.start]);
        out.extend_from_slice(&input[range.clone()].repeat(count));
        out.extend_from_slice(&input[range.end..]);
        bounded(input, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::test_utils::coord;

    const ELF: &[u8] = b"\x7fELF0123456789";

    fn all() -> Vec<Box<dyn Mutator>> {
        vec![
            Box::new(BinaryInsertMutator),
            Box::new(BinaryReplaceMutator),
            Box::new(BinaryAppendMutator),
            Box::new(BinaryShuffleMutator),
            Box::new(BinaryRepeatMutator),
        ]
    }

    #[test]
    fn empty_input_is_identity() {
        for m in all() {
            assert!(m.mutate(b"", Params::new(&[0.3, 0.7, 0.9])).is_empty());
        }
    }

    #[test]
    fn insert_writes_five_le_bytes() {
        // index 4, value 6 % 14 = 6
        let out = BinaryInsertMutator.mutate(ELF, Params::new(&[coord(4), coord(6)]));
        assert_eq!(&out[..4], b"\x7fELF");
        assert_eq!(&out[4..9], &[6, 0, 0, 0, 0]);
        assert_eq!(&out[9..], b"0123456789");
    }

    #[test]
    fn replace_swaps_slice_for_four_bytes() {
        // bounds given in reverse order still select 4..8
        let out = BinaryReplaceMutator.mutate(ELF, Params::new(&[coord(8), coord(4), coord(1)]));
        assert_eq!(out, b"\x7fELF\x01\x00\x00\x00456789");
    }

    #[test]
    fn append_moves_slice_to_end() {
        let out = BinaryAppendMutator.mutate(ELF, Params::new(&[coord(0), coord(4)]));
        assert_eq!(out, b"0123456789\x7fELF");
    }

    #[test]
    fn shuffle_is_deterministic_permutation() {
        let params = [coord(4), coord(14 + 13)];
        let first = BinaryShuffleMutator.mutate(ELF, Params::new(&params));
        let second = BinaryShuffleMutator.mutate(ELF, Params::new(&params));
        assert_eq!(first, second);
        assert_eq!(&first[..4], b"\x7fELF");
        assert_eq!(&first[13..], b"9");
        let mut middle = first[4..13].to_vec();
        middle.sort_unstable();
        assert_eq!(middle, b"012345678");
    }

    #[test]
    fn repeat_expands_slice_within_budget() {
        let out = BinaryRepeatMutator.mutate(ELF, Params::new(&[coord(4), coord(6), coord(3)]));
        assert_eq!(out, b"\x7fELF01010123456789");
        let out = BinaryRepeatMutator.mutate(ELF, Params::new(&[coord(4), coord(6), 0.0]));
        assert_eq!(out, b"\x7fELF23456789");
        let big = vec![0u8; 4000];
        let out = BinaryRepeatMutator.mutate(&big, Params::new(&[0.0, coord(10), coord(3)]));
        assert_eq!(out, big);
    }
}

//! Format-agnostic mutators that treat the input as an opaque byte string.

use super::{Mutator, expanded_len};
use crate::params::{Params, reduce};

/// Upper bound on the repeat count decoded from a coordinate.
const MAX_REPEAT: u64 = 5000;

/// Repeats the whole input a number of times.
///
/// A count of zero leaves the input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepeatMutator;

impl Mutator for RepeatMutator {
    fn name(&self) -> &'static str {
        "Repeated input"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let count = params.le(0, 2..4).min(MAX_REPEAT) as usize;
        if count == 0 || expanded_len(input.len(), count).is_none() {
            return input.to_vec();
        }
        input.repeat(count)
    }
}

/// Keeps only the bytes between two decoded offsets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringMutator;

impl Mutator for SubstringMutator {
    fn name(&self) -> &'static str {
        "Substring of input"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        if input.is_empty() {
            return input.to_vec();
        }
        let a = reduce(params.le(0, 2..7), input.len());
        let b = reduce(params.le(1, 2..7), input.len());
        input[a.min(b)..a.max(b)].to_vec()
    }
}

/// Flips a single bit.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitFlipMutator;

impl Mutator for BitFlipMutator {
    fn name(&self) -> &'static str {
        "Random bit flip on input"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        flip_bit(input, params, input.len())
    }
}

/// Inverts every bit of a single byte.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteFlipMutator;

impl Mutator for ByteFlipMutator {
    fn name(&self) -> &'static str {
        "Random byte flip on input"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        flip_byte(input, params, input.len())
    }
}

/// Flips bit `be(1) % 8` of byte `be(0) % limit`. `limit` confines the flip to a prefix.
pub(crate) fn flip_bit(input: &[u8], params: Params<'_>, limit: usize) -> Vec<u8> {
    let mut out = input.to_vec();
    let limit = limit.min(out.len());
    if limit == 0 {
        return out;
    }
    let offset = reduce(params.be(0, 2..7), limit);
    let bit = params.be(1, 2..7) % 8;
    out[offset] ^= 1 << bit;
    out
}

/// XORs byte `be(0) % limit` with `0xFF`.
pub(crate) fn flip_byte(input: &[u8], params: Params<'_>, limit: usize) -> Vec<u8> {
    let mut out = input.to_vec();
    let limit = limit.min(out.len());
    if limit == 0 {
        return out;
    }
    let offset = reduce(params.be(0, 2..7), limit);
    out[offset] ^= 0xFF;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutator::SIZE_BUDGET;
    use crate::params::test_utils::coord;

    #[test]
    fn repeat_multiplies_input() {
        let coords = [coord(3)];
        let out = RepeatMutator.mutate(b"ab", Params::new(&coords));
        assert_eq!(out, b"ababab");
    }

    #[test]
    fn repeat_zero_is_identity() {
        let out = RepeatMutator.mutate(b"ab", Params::new(&[0.0]));
        assert_eq!(out, b"ab");
    }

    #[test]
    fn repeat_over_budget_is_identity() {
        let input = vec![b'x'; SIZE_BUDGET / 2 + 1];
        let coords = [coord(2)];
        assert_eq!(RepeatMutator.mutate(&input, Params::new(&coords)), input);
    }

    #[test]
    fn substring_orders_offsets() {
        let coords = [coord(4), coord(1)];
        let out = SubstringMutator.mutate(b"abcdef", Params::new(&coords));
        assert_eq!(out, b"bcd");
    }

    #[test]
    fn bit_flip_zero_vector_flips_lowest_bit_of_first_byte() {
        let out = BitFlipMutator.mutate(b"AB", Params::new(&[0.0, 0.0]));
        assert_eq!(out, b"@B");
    }

    #[test]
    fn bit_flip_uses_big_endian_window() {
        // be(2..7) of this coordinate is `low << 32`; a length of 3 keeps only
        // the remainder of that product.
        let coords = [coord(1), coord(1)];
        let out = BitFlipMutator.mutate(&[0u8; 3], Params::new(&coords));
        let expected_offset = ((1u64 << 32) % 3) as usize;
        let mut expected = vec![0u8; 3];
        expected[expected_offset] ^= 1;
        assert_eq!(out, expected);
    }

    #[test]
    fn byte_flip_inverts_selected_byte() {
        let out = ByteFlipMutator.mutate(b"AB", Params::new(&[0.0]));
        assert_eq!(out, vec![0xBE, b'B']);
    }

    #[test]
    fn empty_input_is_identity_everywhere() {
        let p = Params::new(&[0.3, 0.7]);
        assert!(RepeatMutator.mutate(b"", p).is_empty());
        assert!(SubstringMutator.mutate(b"", p).is_empty());
        assert!(BitFlipMutator.mutate(b"", p).is_empty());
        assert!(ByteFlipMutator.mutate(b"", p).is_empty());
    }
}

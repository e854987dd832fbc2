use crate::params::Params;

pub mod binary;
pub mod csv;
pub mod jpeg;
pub mod json;
pub mod plaintext;
pub mod xml;

pub use binary::{
    BinaryAppendMutator, BinaryInsertMutator, BinaryRepeatMutator, BinaryReplaceMutator,
    BinaryShuffleMutator,
};
pub use csv::{
    CsvEmptyCellMutator, CsvEmptyColKeepHeaderMutator, CsvEmptyColMutator, CsvEmptyRowMutator,
    CsvMultiplyCellMutator, CsvRepeatColMutator, CsvRepeatRowMutator,
};
pub use jpeg::{
    JpegHeaderBitFlipMutator, JpegHeaderByteFlipMutator, JpegHeightMutator, JpegSizeMutator,
    JpegWidthMutator,
};
pub use json::{
    JsonChangeTypeMutator, JsonExtremeIntMutator, JsonFloatInfMutator, JsonFloatNanMutator,
    JsonIntMutator, JsonRepeatEntryMutator, JsonRepeatListMutator,
};
pub use plaintext::{BitFlipMutator, ByteFlipMutator, RepeatMutator, SubstringMutator};
pub use xml::{
    XmlAttributeMutator, XmlHrefMutator, XmlNestedTagsMutator, XmlRenameTagsMutator,
    XmlRepeatChildrenMutator, XmlRootTagMutator,
};

/// Ceiling, in bytes, that no mutator may expand its output beyond.
///
/// A mutation that would exceed it returns its input unchanged instead.
pub const SIZE_BUDGET: usize = 10_000;

/// A `Mutator` is a deterministic byte transformer driven by a slice of the
/// global parameter vector.
///
/// Mutators are the leaves of a [`crate::pipeline::Pipeline`]. The pipeline
/// hands each one a [`Params`] window exactly `dimension()` coordinates wide
/// and feeds it the previous mutator's output.
///
/// # Contract
/// * `mutate` is a pure function of `(input, params)`: no hidden randomness, no
///   state carried between calls. The optimizer resamples vectors and expects
///   the same output for the same vector.
/// * `mutate` never fails. An empty buffer, an out-of-range derived index, a
///   rejected format guard or an output over [`SIZE_BUDGET`] all produce the
///   input unchanged.
/// * `dimension` is constant for the lifetime of the instance.
pub trait Mutator: Send + Sync {
    /// Human-readable identity, used for logging only.
    fn name(&self) -> &'static str;

    /// How many leading coordinates of the sub-vector this mutator consumes.
    fn dimension(&self) -> usize;

    /// Produces the mutated copy of `input`.
    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8>;
}

/// Whether `len` bytes of output stay within [`SIZE_BUDGET`].
pub(crate) fn within_budget(len: usize) -> bool {
    len <= SIZE_BUDGET
}

/// `output`, or a copy of `input` when `output` does not fit the budget.
pub(crate) fn bounded(input: &[u8], output: Vec<u8>) -> Vec<u8> {
    if within_budget(output.len()) {
        output
    } else {
        tracing::trace!(len = output.len(), "output over size budget, keeping input");
        input.to_vec()
    }
}

/// `len * count` if the product fits the budget.
pub(crate) fn expanded_len(len: usize, count: usize) -> Option<usize> {
    len.checked_mul(count).filter(|&total| within_budget(total))
}

/// Maps a `[-1, 1]` multiplier onto its extreme when it sits at either end or at the centre.
///
/// Returns `low`, `mid` or `high` when `signed` is within 0.01 of -1, 0 or 1 respectively.
pub(crate) fn extremize<T>(signed: f64, low: T, mid: T, high: T) -> Option<T> {
    if signed <= -0.99 {
        Some(low)
    } else if (-0.01..=0.01).contains(&signed) {
        Some(mid)
    } else if signed >= 0.99 {
        Some(high)
    } else {
        None
    }
}

/// Repeats the characters of `text` cyclically until the result holds `length` characters.
///
/// Empty text stays empty; lengths over the budget leave the text as is.
pub(crate) fn stretch_text(text: &str, length: i64) -> String {
    if text.is_empty() {
        return String::new();
    }
    if length > SIZE_BUDGET as i64 {
        return text.to_string();
    }
    let length = length.max(0) as usize;
    text.chars().cycle().take(length).collect()
}

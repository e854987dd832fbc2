use crate::pipeline::PipelineError;
use std::ops::Range;
use std::str::FromStr;

/// An immutable vector of coordinates, each within `[0, 1]`.
///
/// This is the only input an external optimizer controls. A `ParamVector` is
/// sliced by the pipeline into one [`Params`] per mutator and is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamVector(Vec<f64>);

impl ParamVector {
    /// Builds a vector, rejecting non-finite coordinates and coordinates outside `[0, 1]`.
    pub fn new(coords: Vec<f64>) -> Result<Self, PipelineError> {
        for (index, &value) in coords.iter().enumerate() {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::CoordinateOutOfRange { index, value });
            }
        }
        Ok(Self(coords))
    }

    /// A vector of `len` zero coordinates.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Borrows the contiguous window `range` as a mutator sub-vector.
    ///
    /// Out-of-bounds windows are clipped, missing coordinates decode as zero.
    pub fn window(&self, range: Range<usize>) -> Params<'_> {
        let end = range.end.min(self.0.len());
        let start = range.start.min(end);
        Params(&self.0[start..end])
    }
}

impl FromStr for ParamVector {
    type Err = anyhow::Error;

    /// Parses a comma or whitespace separated list of floats, e.g. `"0.1, 0.5 1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let coords = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<f64>()
                    .map_err(|e| anyhow::anyhow!("Invalid coordinate {:?}: {}", part, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ParamVector::new(coords)?)
    }
}

/// The sub-vector a single mutator receives.
///
/// Mutators turn continuous coordinates into discrete choices by reading a
/// fixed byte window of a coordinate's IEEE-754 image as an integer. The
/// image is always taken little-endian, the window is then read in the
/// requested byte order. All accessors are total: a coordinate that is not
/// present behaves like `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a>(&'a [f64]);

impl<'a> Params<'a> {
    pub fn new(coords: &'a [f64]) -> Self {
        Self(coords)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw coordinate `index`.
    pub fn unit(&self, index: usize) -> f64 {
        self.0.get(index).copied().unwrap_or(0.0)
    }

    /// The coordinate mapped onto `[-1, 1]`.
    pub fn signed(&self, index: usize) -> f64 {
        self.unit(index) * 2.0 - 1.0
    }

    /// Bytes `window` of the coordinate's image, read little-endian.
    pub fn le(&self, index: usize, window: Range<usize>) -> u64 {
        self.image_window(index, window)
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Bytes `window` of the coordinate's image, read big-endian.
    pub fn be(&self, index: usize, window: Range<usize>) -> u64 {
        self.image_window(index, window)
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// The full 64-bit pattern of the coordinate.
    pub fn bits(&self, index: usize) -> u64 {
        self.unit(index).to_bits()
    }

    fn image_window(&self, index: usize, window: Range<usize>) -> Vec<u8> {
        let image = self.unit(index).to_le_bytes();
        let end = window.end.min(image.len());
        let start = window.start.min(end);
        image[start..end].to_vec()
    }
}

/// Reduces `value` modulo `bound`, with a zero bound mapping to zero.
pub(crate) fn reduce(value: u64, bound: usize) -> usize {
    if bound == 0 {
        0
    } else {
        (value % bound as u64) as usize
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_coordinates_outside_unit_interval() {
        assert!(ParamVector::new(vec![0.0, 0.5, 1.0]).is_ok());
        match ParamVector::new(vec![0.2, 1.5]) {
            Err(PipelineError::CoordinateOutOfRange { index, value }) => {
                assert_eq!(index, 1);
                assert_eq!(value, 1.5);
            }
            other => panic!("Expected CoordinateOutOfRange, got {other:?}"),
        }
        assert!(ParamVector::new(vec![f64::NAN]).is_err());
        assert!(ParamVector::new(vec![-0.1]).is_err());
    }

    #[test]
    fn parses_comma_and_space_separated_lists() {
        let v: ParamVector = "0.1, 0.25 1".parse().unwrap();
        assert_eq!(v.as_slice(), &[0.1, 0.25, 1.0]);
        assert!("0.1, nope".parse::<ParamVector>().is_err());
        assert!("2.0".parse::<ParamVector>().is_err());
    }

    #[test]
    fn decodes_byte_windows_in_both_orders() {
        // 0.1 == 0x3FB999999999999A, image LE = 9A 99 99 99 99 99 B9 3F
        let coords = [0.1];
        let p = Params::new(&coords);
        assert_eq!(p.le(0, 0..2), 0x999A);
        assert_eq!(p.be(0, 0..2), 0x9A99);
        assert_eq!(p.le(0, 6..8), 0x3FB9);
        assert_eq!(p.be(0, 6..8), 0xB93F);
        assert_eq!(p.bits(0), 0x3FB9_9999_9999_999A);
    }

    #[test]
    fn round_values_decode_to_zero_in_low_bytes() {
        let coords = [0.0, 0.5, 1.0];
        let p = Params::new(&coords);
        for i in 0..3 {
            assert_eq!(p.le(i, 2..6), 0);
            assert_eq!(p.be(i, 2..6), 0);
        }
        // 1.0 == 0x3FF0000000000000, image byte 6 is 0xF0
        assert_eq!(p.le(2, 2..7), 0xF0 << 32);
        assert_eq!(p.be(2, 2..7), 0xF0);
    }

    #[test]
    fn missing_coordinates_decode_as_zero() {
        let p = Params::new(&[]);
        assert_eq!(p.unit(3), 0.0);
        assert_eq!(p.signed(3), -1.0);
        assert_eq!(p.le(3, 2..4), 0);
        assert_eq!(p.be(0, 0..8), 0);
    }

    #[test]
    fn window_clips_out_of_bounds_ranges() {
        let v = ParamVector::new(vec![0.1, 0.2, 0.3]).unwrap();
        assert_eq!(v.window(1..3).len(), 2);
        assert_eq!(v.window(2..10).len(), 1);
        assert!(v.window(5..9).is_empty());
    }

    #[test]
    fn test_coordinates_decode_to_requested_value() {
        let coords = [test_utils::coord(513)];
        let p = Params::new(&coords);
        assert!((0.0..=1.0).contains(&coords[0]));
        assert_eq!(p.le(0, 2..4), 513);
        assert_eq!(p.le(0, 2..7), 513);
        assert_eq!(p.be(0, 2..4), 0x0102);
    }

    #[test]
    fn reduce_handles_zero_bound() {
        assert_eq!(reduce(17, 0), 0);
        assert_eq!(reduce(17, 5), 2);
    }
}

//! JPEG mutators. They edit the marker segments in place and never touch entropy-coded data.

use super::Mutator;
use super::plaintext::{flip_bit, flip_byte};
use crate::format::{JpegLayout, is_jpeg, jpeg_layout};
use crate::params::Params;

fn layout(input: &[u8]) -> Option<JpegLayout> {
    if !is_jpeg(input) {
        tracing::trace!("jpeg guard rejected input");
        return None;
    }
    jpeg_layout(input)
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn write_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Multiplier `signed(i) * le(i)` applied to a dimension, clamped to the `u16` range.
fn scale(value: u16, params: Params<'_>, i: usize) -> u16 {
    let factor = params.signed(i) * params.le(i, 2..4) as f64;
    (f64::from(value) * factor).clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Rescales the frame-header field at `offset` (width or height) by coordinate `i`.
fn rescale(out: &mut [u8], offset: usize, params: Params<'_>, i: usize) {
    let scaled = scale(read_u16(out, offset), params, i);
    write_u16(out, offset, scaled);
}

/// Rewrites both frame dimensions: width by coordinate 0, height by coordinate 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegSizeMutator;

impl Mutator for JpegSizeMutator {
    fn name(&self) -> &'static str {
        "Multiplier for size mutator"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let mut out = input.to_vec();
        if let Some(layout) = layout(input) {
            rescale(&mut out, layout.width_offset(), params, 0);
            rescale(&mut out, layout.height_offset(), params, 1);
        }
        out
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JpegWidthMutator;

impl Mutator for JpegWidthMutator {
    fn name(&self) -> &'static str {
        "Multiplier for width mutator"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let mut out = input.to_vec();
        if let Some(layout) = layout(input) {
            rescale(&mut out, layout.width_offset(), params, 0);
        }
        out
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JpegHeightMutator;

impl Mutator for JpegHeightMutator {
    fn name(&self) -> &'static str {
        "Multiplier for height mutator"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let mut out = input.to_vec();
        if let Some(layout) = layout(input) {
            rescale(&mut out, layout.height_offset(), params, 0);
        }
        out
    }
}

/// Flips one bit among the bytes preceding the start-of-scan marker.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegHeaderBitFlipMutator;

impl Mutator for JpegHeaderBitFlipMutator {
    fn name(&self) -> &'static str {
        "Metadata Bit flipper"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        match layout(input) {
            Some(layout) => flip_bit(input, params, layout.scan),
            None => input.to_vec(),
        }
    }
}

/// Inverts one byte among the bytes preceding the start-of-scan marker.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegHeaderByteFlipMutator;

impl Mutator for JpegHeaderByteFlipMutator {
    fn name(&self) -> &'static str {
        "Metadata byte flipper"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        match layout(input) {
            Some(layout) => flip_byte(input, params, layout.scan),
            None => input.to_vec(),
        }
    }
}

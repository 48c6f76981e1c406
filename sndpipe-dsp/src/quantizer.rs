// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Quantizer with triangular-PDF dither (spec.md §4.5, C5), grounded on
//! `original_source/Quantizer.cpp`. The original dithers an already-32-bit integer or
//! float buffer in place with a 24.7 fixed-point trick; this adapter instead always stages
//! through [`sndpipe_core::conv::read_as_float`] (spec.md §4.2's universal float staging
//! contract) and works in the same `x * 2^(depth-1)` domain the original's float path
//! (`ditherFloat`) uses, so the int and float input cases share one code path.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use sndpipe_core::conv::read_as_float;
use sndpipe_core::{ByteOrder, Encoding, Metadata, Result, Source, StreamFormat};

/// Dither is only applied at or below this target bit depth (spec.md §4.5).
const DITHER_MAX_DEPTH: u32 = 18;

/// Anti-denormal epsilon used when the quantizer's output encoding is float.
const ANTI_DENORMAL_EPS: f32 = 1e-30;

pub struct Quantizer<S: Source> {
    inner: S,
    target: StreamFormat,
    target_depth: u32,
    dither: bool,
    to_float: bool,
    rng: SmallRng,
}

impl<S: Source> Quantizer<S> {
    /// `target_depth` is ignored when `to_float` is set (output format is 32-bit float).
    pub fn new(inner: S, target_depth: u32, dither: bool, to_float: bool) -> Result<Quantizer<S>> {
        let src = inner.format();
        let target = if to_float {
            StreamFormat::new(src.sample_rate, src.channels, Encoding::Float, 32, 32, ByteOrder::LittleEndian)?
        } else {
            let container_bits = target_depth.div_ceil(8) * 8;
            StreamFormat::new(src.sample_rate, src.channels, Encoding::SignedInt, target_depth, container_bits, ByteOrder::LittleEndian)?
        };
        Ok(Quantizer { inner, target, target_depth, dither, to_float, rng: SmallRng::from_entropy() })
    }

    fn quantize_int(&mut self, x: f32) -> i32 {
        let half = (1i64 << (self.target_depth - 1)) as f64;
        let mut value = x as f64 * half;
        if self.target_depth <= DITHER_MAX_DEPTH && self.dither {
            let u1: f64 = self.rng.gen_range(-0.5..0.5);
            let u2: f64 = self.rng.gen_range(-0.5..0.5);
            value += u1 + u2;
        }
        let min = -half;
        let max = half - 1.0;
        value.round().clamp(min, max) as i32
    }

    fn quantize_float(x: f32) -> f32 {
        (x + ANTI_DENORMAL_EPS) - ANTI_DENORMAL_EPS
    }
}

impl<S: Source> Source for Quantizer<S> {
    fn format(&self) -> StreamFormat {
        self.target
    }

    fn length(&self) -> Option<u64> {
        self.inner.length()
    }

    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let channels = self.target.channels as usize;
        let out_frame_bytes = self.target.frame_bytes();
        let want_frames = buf.len() / out_frame_bytes;
        if want_frames == 0 {
            return Ok(0);
        }

        let src_fmt = self.inner.format();
        let src_frame_bytes = src_fmt.frame_bytes();
        let mut src_buf = vec![0u8; want_frames * src_frame_bytes];
        let got = self.inner.read_frames(&mut src_buf)?;

        let out_bytes = self.target.container_bytes_per_sample();
        let mut floats = vec![0f32; channels];
        for f in 0..got {
            let raw = &src_buf[f * src_frame_bytes..(f + 1) * src_frame_bytes];
            read_as_float(&src_fmt, raw, &mut floats);
            for (c, &x) in floats.iter().enumerate() {
                let dst = &mut buf[(f * channels + c) * out_bytes..(f * channels + c + 1) * out_bytes];
                if self.to_float {
                    dst.copy_from_slice(&Self::quantize_float(x).to_le_bytes());
                } else {
                    let shift = self.target.container_bits_per_sample - self.target_depth;
                    let shifted = self.quantize_int(x) << shift;
                    dst.copy_from_slice(&shifted.to_le_bytes()[..out_bytes]);
                }
            }
        }
        Ok(got)
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        self.inner.seek(frame_pos)
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstSource {
        format: StreamFormat,
        value: f32,
        remaining: usize,
        metadata: Metadata,
    }

    impl Source for ConstSource {
        fn format(&self) -> StreamFormat {
            self.format
        }
        fn length(&self) -> Option<u64> {
            None
        }
        fn is_seekable(&self) -> bool {
            false
        }
        fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
            let frame_bytes = self.format.frame_bytes();
            let frames = (buf.len() / frame_bytes).min(self.remaining);
            for f in 0..frames {
                for c in 0..self.format.channels as usize {
                    let bytes = self.value.to_le_bytes();
                    let start = (f * self.format.channels as usize + c) * 4;
                    buf[start..start + 4].copy_from_slice(&bytes);
                }
            }
            self.remaining -= frames;
            Ok(frames)
        }
        fn seek(&mut self, _: u64) -> Result<()> {
            Ok(())
        }
        fn metadata(&self) -> &Metadata {
            &self.metadata
        }
    }

    fn float_source(value: f32, frames: usize) -> ConstSource {
        let format = StreamFormat::new(44_100, 1, Encoding::Float, 32, 32, ByteOrder::LittleEndian).unwrap();
        ConstSource { format, value, remaining: frames, metadata: Metadata::default() }
    }

    #[test]
    fn quantizes_full_scale_without_dither_to_16_bit_max() {
        let mut q = Quantizer::new(float_source(1.0 - f32::EPSILON, 1), 16, false, false).unwrap();
        let mut buf = [0u8; 2];
        let n = q.read_frames(&mut buf).unwrap();
        assert_eq!(n, 1);
        let sample = i16::from_le_bytes(buf);
        assert!(sample >= i16::MAX - 1);
    }

    #[test]
    fn clips_rather_than_wraps_on_overshoot() {
        let mut q = Quantizer::new(float_source(2.0, 1), 16, false, false).unwrap();
        let mut buf = [0u8; 2];
        q.read_frames(&mut buf).unwrap();
        let sample = i16::from_le_bytes(buf);
        assert_eq!(sample, i16::MAX);
    }

    #[test]
    fn float_target_applies_only_anti_denormal_conditioning() {
        let mut q = Quantizer::new(float_source(0.25, 1), 16, false, true).unwrap();
        let mut buf = [0u8; 4];
        q.read_frames(&mut buf).unwrap();
        let sample = f32::from_le_bytes(buf);
        assert!((sample - 0.25).abs() < 1e-6);
    }
}

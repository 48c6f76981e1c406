// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resampler harness (spec.md §4.9, C9), grounded on `original_source/resampler.{h,cpp}`.
//! The harness drives a [`ResamplerKernel`] rather than implementing rate conversion
//! itself (`original_source/resampler.h` loads `libsoxrate` as a dynamic library and calls
//! through `create`/`config`/`process` exactly this way); this crate owns end-of-input
//! draining, input-latency accounting, and the final peak-normalization pass.

use sndpipe_core::conv::read_as_float;
use sndpipe_core::{ByteOrder, Encoding, Metadata, Result, Source, StreamFormat};

/// Interleaved `f32` working-buffer size the harness reads/writes in (spec.md §4.9).
const CHUNK_FRAMES: usize = 4096;

/// A rate-conversion kernel the harness drives. Grounded on `SoxResamplerModule` in
/// `original_source/resampler.h`, which wraps `libsoxrate`'s `create`/`config`/`start`/
/// `process` C ABI.
pub trait ResamplerKernel {
    /// Consume as much of `input` as needed and produce as much output as `output` has
    /// room for. Returns `(frames_consumed, frames_produced)`, both in interleaved frames
    /// (not samples).
    fn process(&mut self, input: &[f32], output: &mut [f32], channels: usize) -> Result<(usize, usize)>;

    /// Samples still buffered inside the kernel once the input stream is exhausted. The
    /// harness feeds this many zero frames through [`ResamplerKernel::process`] to flush
    /// them, the way `original_source/resampler.cpp`'s `underflow()` does.
    fn input_latency(&self) -> usize;
}

impl ResamplerKernel for Box<dyn ResamplerKernel> {
    fn process(&mut self, input: &[f32], output: &mut [f32], channels: usize) -> Result<(usize, usize)> {
        (**self).process(input, output, channels)
    }

    fn input_latency(&self) -> usize {
        (**self).input_latency()
    }
}

pub struct Resampler<S: Source, K: ResamplerKernel> {
    inner: S,
    kernel: K,
    format: StreamFormat,
    in_buf: Vec<f32>,
    end_of_input: bool,
    peak: f32,
}

impl<S: Source, K: ResamplerKernel> Resampler<S, K> {
    pub fn new(inner: S, kernel: K, output_rate: u32) -> Result<Resampler<S, K>> {
        let src = inner.format();
        let format = StreamFormat::new(output_rate, src.channels, Encoding::Float, 32, 32, ByteOrder::LittleEndian)?;
        Ok(Resampler { inner, kernel, format, in_buf: Vec::new(), end_of_input: false, peak: 0.0 })
    }

    /// Reads one more chunk of upstream audio, staging it as float in `in_buf`. On EOF,
    /// pads `in_buf` once with `input_latency` zero frames so the kernel's internal
    /// buffering is flushed by ordinary `process` calls from then on (spec.md §4.9).
    fn fill_input(&mut self, channels: usize) -> Result<()> {
        if self.end_of_input {
            return Ok(());
        }
        let src_fmt = self.inner.format();
        let src_frame_bytes = src_fmt.frame_bytes();
        let mut raw = vec![0u8; CHUNK_FRAMES * src_frame_bytes];
        let got = self.inner.read_frames(&mut raw)?;
        if got == 0 {
            self.end_of_input = true;
            let latency = self.kernel.input_latency();
            self.in_buf.resize(self.in_buf.len() + latency * channels, 0.0);
            return Ok(());
        }
        let mut frame = vec![0f32; channels];
        for f in 0..got {
            read_as_float(&src_fmt, &raw[f * src_frame_bytes..(f + 1) * src_frame_bytes], &mut frame);
            self.in_buf.extend_from_slice(&frame);
        }
        Ok(())
    }
}

impl<S: Source, K: ResamplerKernel> Source for Resampler<S, K> {
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
        let channels = self.format.channels as usize;
        let want_frames = (buf.len() / (4 * channels)).min(CHUNK_FRAMES);
        if want_frames == 0 {
            return Ok(0);
        }

        if !self.end_of_input && self.in_buf.len() < CHUNK_FRAMES * channels {
            self.fill_input(channels)?;
        }

        let mut out = vec![0f32; want_frames * channels];
        let (consumed, produced) = self.kernel.process(&self.in_buf, &mut out, channels)?;
        self.in_buf.drain(0..consumed * channels);

        for &sample in &out[..produced * channels] {
            self.peak = self.peak.max(sample.abs());
        }
        if self.peak > 1.0 {
            for sample in &mut out[..produced * channels] {
                *sample /= self.peak;
            }
        }

        for (i, &sample) in out[..produced * channels].iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&sample.to_le_bytes());
        }
        Ok(produced)
    }

    fn seek(&mut self, _frame_pos: u64) -> Result<()> {
        sndpipe_core::error::unsupported("resampler: seeking across a rate-converted stream is not supported")
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use fakes::IdentityKernel;
    use sndpipe_core::{ByteOrder, Encoding};

    struct VecSource {
        format: StreamFormat,
        samples: Vec<f32>,
        pos: usize,
        metadata: Metadata,
    }

    impl Source for VecSource {
        fn format(&self) -> StreamFormat {
            self.format
        }
        fn length(&self) -> Option<u64> {
            Some((self.samples.len() / self.format.channels as usize) as u64)
        }
        fn is_seekable(&self) -> bool {
            false
        }
        fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
            let channels = self.format.channels as usize;
            let available = (self.samples.len() - self.pos) / channels;
            let want = (buf.len() / (4 * channels)).min(available);
            for i in 0..want * channels {
                buf[i * 4..i * 4 + 4].copy_from_slice(&self.samples[self.pos + i].to_le_bytes());
            }
            self.pos += want * channels;
            Ok(want)
        }
        fn seek(&mut self, _: u64) -> Result<()> {
            Ok(())
        }
        fn metadata(&self) -> &Metadata {
            &self.metadata
        }
    }

    fn mono_source(samples: Vec<f32>) -> VecSource {
        let format = StreamFormat::new(44_100, 1, Encoding::Float, 32, 32, ByteOrder::LittleEndian).unwrap();
        VecSource { format, samples, pos: 0, metadata: Metadata::default() }
    }

    #[test]
    fn identity_kernel_passes_samples_through() {
        let mut resampler = Resampler::new(mono_source(vec![0.1, 0.2, 0.3]), IdentityKernel, 48_000).unwrap();
        let mut buf = [0u8; 12];
        let n = resampler.read_frames(&mut buf).unwrap();
        assert_eq!(n, 3);
        assert!((f32::from_le_bytes(buf[4..8].try_into().unwrap()) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn rescales_output_when_peak_exceeds_unity() {
        let mut resampler = Resampler::new(mono_source(vec![2.0, -1.0]), IdentityKernel, 44_100).unwrap();
        let mut buf = [0u8; 8];
        resampler.read_frames(&mut buf).unwrap();
        let first = f32::from_le_bytes(buf[0..4].try_into().unwrap());
        assert!((first - 1.0).abs() < 1e-6);
    }
}

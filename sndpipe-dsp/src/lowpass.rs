// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Low-pass FIR filter stage (spec.md §4.14 step 4, `--lowpass`), grounded on
//! `original_source/soxdsp.h`'s `SoxLowpassFilter`: exactly like `SoxResampler`, it wraps
//! a handle obtained from the same dynamically-loaded `libsoxrate` (`lsx_fir_create`/
//! `lsx_fir_process_noninterleaved`), so this stage is driven by the same
//! [`ResamplerKernel`] contract as [`crate::Resampler`] rather than a second trait —
//! `SoxDSPProcessor` in the original is literally shared between the two filters.

use sndpipe_core::conv::read_as_float;
use sndpipe_core::{Metadata, Result, Source, StreamFormat};

use crate::resampler::ResamplerKernel;

const CHUNK_FRAMES: usize = 4096;

pub struct LowpassFilter<S: Source, K: ResamplerKernel> {
    inner: S,
    kernel: K,
    format: StreamFormat,
    in_buf: Vec<f32>,
    end_of_input: bool,
}

impl<S: Source, K: ResamplerKernel> LowpassFilter<S, K> {
    pub fn new(inner: S, kernel: K) -> LowpassFilter<S, K> {
        let format = inner.format();
        LowpassFilter { inner, kernel, format, in_buf: Vec::new(), end_of_input: false }
    }

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

impl<S: Source, K: ResamplerKernel> Source for LowpassFilter<S, K> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        self.inner.length()
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let channels = self.format.channels as usize;
        let frame_bytes = self.format.frame_bytes();
        let want_frames = (buf.len() / frame_bytes).min(CHUNK_FRAMES);
        if want_frames == 0 {
            return Ok(0);
        }

        if !self.end_of_input && self.in_buf.len() < CHUNK_FRAMES * channels {
            self.fill_input(channels)?;
        }

        let mut out = vec![0f32; want_frames * channels];
        let (consumed, produced) = self.kernel.process(&self.in_buf, &mut out, channels)?;
        self.in_buf.drain(0..consumed * channels);

        for (i, &sample) in out[..produced * channels].iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&sample.to_le_bytes());
        }
        Ok(produced)
    }

    fn seek(&mut self, _frame_pos: u64) -> Result<()> {
        sndpipe_core::error::unsupported("lowpass filter: seeking is not supported across a filtered stream")
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }
}

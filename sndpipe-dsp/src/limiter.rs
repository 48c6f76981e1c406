// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Soft-clip limiter (spec.md §4.6, C6), grounded directly on
//! `original_source/Limiter.cpp`: a per-channel scratch buffer is hard-clipped to `±3T` on
//! ingest, then shaped region by region so that no sample in the emitted prefix exceeds the
//! threshold `T`.

use sndpipe_core::conv::read_as_float;
use sndpipe_core::{Metadata, Result, Source, StreamFormat};

/// Default threshold, about -0.069 dBFS (spec.md §4.6).
pub const DEFAULT_THRESHOLD: f32 = 0.9921875;

pub struct Limiter<S: Source> {
    inner: S,
    threshold: f32,
    channels: Vec<Vec<f32>>,
    processed: Vec<usize>,
    metadata_format: StreamFormat,
}

impl<S: Source> Limiter<S> {
    pub fn new(inner: S) -> Limiter<S> {
        Self::with_threshold(inner, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(inner: S, threshold: f32) -> Limiter<S> {
        let format = inner.format();
        let n = format.channels as usize;
        Limiter {
            inner,
            threshold,
            channels: vec![Vec::new(); n],
            processed: vec![0; n],
            metadata_format: format,
        }
    }

    fn ingest(&mut self, frames: &[f32]) {
        let n_channels = self.channels.len();
        let clip_bound = 3.0 * self.threshold;
        for (c, ch) in self.channels.iter_mut().enumerate() {
            for frame in frames.chunks_exact(n_channels) {
                ch.push(frame[c].clamp(-clip_bound, clip_bound));
            }
        }
    }

    fn shape_channel(&mut self, c: usize) {
        let t = self.threshold;
        let x = &mut self.channels[c];

        let mut limit = x.len();
        if limit > 0 {
            let last = x[limit - 1];
            while limit > 0 && x[limit - 1] * last > 0.0 {
                limit -= 1;
            }
        }

        let mut end = self.processed[c];
        while end < limit {
            let mut peak_pos = end;
            while peak_pos < limit && x[peak_pos].abs() <= t {
                peak_pos += 1;
            }
            if peak_pos == limit {
                break;
            }
            let mut start = peak_pos;
            let mut peak = x[peak_pos].abs();

            while start > end && x[peak_pos] * x[start] >= 0.0 {
                start -= 1;
            }
            start += 1;

            end = peak_pos + 1;
            while end < limit {
                if x[peak_pos] * x[end] < 0.0 {
                    break;
                }
                let y = x[end].abs();
                if y > peak {
                    peak = y;
                    peak_pos = end;
                }
                end += 1;
            }

            if peak < 2.0 * t {
                let mut a = (peak - t) / (peak * peak);
                if x[peak_pos] > 0.0 {
                    a = -a;
                }
                for v in &mut x[start..end] {
                    *v += a * *v * *v;
                }
            } else {
                let u = peak;
                let v = t;
                let a = (u - 2.0 * v) / (u * u * u);
                let mut b = (3.0 * v - 2.0 * u) / (u * u);
                if x[peak_pos] < 0.0 {
                    b *= -1.0;
                }
                for s in &mut x[start..end] {
                    *s += b * *s * *s + a * *s * *s * *s;
                }
            }
        }
        self.processed[c] = limit;
    }

    fn drain(&mut self, out_frames: &mut [f32]) -> usize {
        let prod = (out_frames.len() / self.channels.len()).min(*self.processed.iter().min().unwrap_or(&0));
        let n_channels = self.channels.len();
        for i in 0..prod {
            for c in 0..n_channels {
                out_frames[i * n_channels + c] = self.channels[c][i];
            }
        }
        for (c, ch) in self.channels.iter_mut().enumerate() {
            if prod > 0 {
                ch.drain(0..prod);
                self.processed[c] -= prod;
            }
        }
        prod
    }
}

impl<S: Source> Source for Limiter<S> {
    fn format(&self) -> StreamFormat {
        self.metadata_format
    }

    fn length(&self) -> Option<u64> {
        self.inner.length()
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let channels = self.channels.len();
        let frame_bytes = 4 * channels;
        let want_frames = buf.len() / frame_bytes;
        if want_frames == 0 {
            return Ok(0);
        }

        let src_fmt = self.inner.format();
        let src_frame_bytes = src_fmt.frame_bytes();
        let mut src_buf = vec![0u8; want_frames * src_frame_bytes];
        let got = self.inner.read_frames(&mut src_buf)?;

        let mut floats = vec![0f32; want_frames * channels];
        let mut per_frame = vec![0f32; channels];
        for f in 0..got {
            let raw = &src_buf[f * src_frame_bytes..(f + 1) * src_frame_bytes];
            read_as_float(&src_fmt, raw, &mut per_frame);
            floats[f * channels..(f + 1) * channels].copy_from_slice(&per_frame);
        }
        self.ingest(&floats[..got * channels]);
        for c in 0..channels {
            self.shape_channel(c);
        }

        let mut out_floats = vec![0f32; want_frames * channels];
        let produced = self.drain(&mut out_floats);
        for i in 0..produced * channels {
            let bytes = out_floats[i].to_le_bytes();
            buf[i * 4..i * 4 + 4].copy_from_slice(&bytes);
        }
        Ok(produced)
    }

    fn seek(&mut self, _frame_pos: u64) -> Result<()> {
        sndpipe_core::error::unsupported("limiter: seeking is not supported across an in-flight shaping buffer")
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }
}

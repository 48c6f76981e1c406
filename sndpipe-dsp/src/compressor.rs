// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Knee compressor (spec.md §4.7, C7), grounded on `original_source/compressor.{h,cpp}`:
//! a quadratic-knee gain computer in the dB domain followed by a decoupled attack/release
//! peak-detector smoother, applied as a scalar multiplier to every channel of the frame.

use sndpipe_core::conv::read_as_float;
use sndpipe_core::{Metadata, Result, Source, StreamFormat};

/// Flushes denormals the same way `smoothAverage` does in the original (add then subtract
/// a value far below any audible gain-reduction figure).
const DENORMAL_EPS: f64 = 1e-120;

pub struct CompressorConfig {
    pub threshold_db: f64,
    pub ratio: f64,
    pub knee_width_db: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl Default for CompressorConfig {
    fn default() -> CompressorConfig {
        CompressorConfig { threshold_db: -18.0, ratio: 4.0, knee_width_db: 6.0, attack_ms: 5.0, release_ms: 50.0 }
    }
}

pub struct Compressor<S: Source> {
    inner: S,
    format: StreamFormat,
    threshold: f64,
    slope: f64,
    t_lo: f64,
    t_hi: f64,
    knee_factor: f64,
    y_r: f64,
    y_a: f64,
    attack_alpha: f64,
    release_alpha: f64,
    /// Per-frame linear gain applied, most recently computed first; exposed for an optional
    /// sidechain sink (spec.md §4.7 "Optional sidechain").
    pub last_gains: Vec<f32>,
}

impl<S: Source> Compressor<S> {
    pub fn new(inner: S, config: CompressorConfig) -> Compressor<S> {
        let format = inner.format();
        let slope = (1.0 - config.ratio) / config.ratio;
        let fs = format.sample_rate as f64;
        let attack_s = config.attack_ms / 1000.0;
        let release_s = config.release_ms / 1000.0;
        let attack_alpha = if attack_s > 0.0 { (-1.0 / (attack_s * fs)).exp() } else { 0.0 };
        let release_alpha = if release_s > 0.0 { (-1.0 / (release_s * fs)).exp() } else { 0.0 };
        Compressor {
            inner,
            format,
            threshold: config.threshold_db,
            slope,
            t_lo: config.threshold_db - config.knee_width_db / 2.0,
            t_hi: config.threshold_db + config.knee_width_db / 2.0,
            knee_factor: slope / (config.knee_width_db * 2.0),
            y_r: 0.0,
            y_a: 0.0,
            attack_alpha,
            release_alpha,
            last_gains: Vec::new(),
        }
    }

    fn compute_gain(&self, x: f64) -> f64 {
        if x < self.t_lo {
            0.0
        } else if x > self.t_hi {
            self.slope * (x - self.threshold)
        } else {
            let delta = x - self.t_lo;
            delta * delta * self.knee_factor
        }
    }

    fn smooth(&mut self, gain_db: f64, alpha_a: f64, alpha_r: f64) -> f64 {
        self.y_r = gain_db.min(alpha_r * self.y_r + (1.0 - alpha_r) * gain_db + DENORMAL_EPS - DENORMAL_EPS);
        self.y_a = alpha_a * self.y_a + (1.0 - alpha_a) * self.y_r + DENORMAL_EPS - DENORMAL_EPS;
        self.y_a
    }
}

fn scale_to_db(x: f32) -> f64 {
    20.0 * (x.abs() as f64).max(1e-12).log10()
}

fn db_to_scale(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

impl<S: Source> Source for Compressor<S> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        self.inner.length()
    }

    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let channels = self.format.channels as usize;
        let frame_bytes = 4 * channels;
        let want_frames = buf.len() / frame_bytes;
        if want_frames == 0 {
            return Ok(0);
        }

        let src_fmt = self.inner.format();
        let src_frame_bytes = src_fmt.frame_bytes();
        let mut src_buf = vec![0u8; want_frames * src_frame_bytes];
        let got = self.inner.read_frames(&mut src_buf)?;

        self.last_gains.clear();

        let mut frame = vec![0f32; channels];
        for f in 0..got {
            let raw = &src_buf[f * src_frame_bytes..(f + 1) * src_frame_bytes];
            read_as_float(&src_fmt, raw, &mut frame);

            let peak = frame.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
            let x_db = scale_to_db(peak);
            let y_db = self.compute_gain(x_db);
            let c_db = self.smooth(y_db, self.attack_alpha, self.release_alpha);
            let gain = db_to_scale(c_db) as f32;
            self.last_gains.push(gain);

            for (c, sample) in frame.iter().enumerate() {
                let bytes = (*sample * gain).to_le_bytes();
                buf[(f * channels + c) * 4..(f * channels + c) * 4 + 4].copy_from_slice(&bytes);
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
    use sndpipe_core::{ByteOrder, Encoding};

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
            let channels = self.format.channels as usize;
            let frames = (buf.len() / (4 * channels)).min(self.remaining);
            for i in 0..frames * channels {
                buf[i * 4..i * 4 + 4].copy_from_slice(&self.value.to_le_bytes());
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

    fn mono_source(value: f32, frames: usize) -> ConstSource {
        let format = StreamFormat::new(44_100, 1, Encoding::Float, 32, 32, ByteOrder::LittleEndian).unwrap();
        ConstSource { format, value, remaining: frames, metadata: Metadata::default() }
    }

    #[test]
    fn quiet_signal_is_not_reduced() {
        let mut comp = Compressor::new(mono_source(0.01, 4), CompressorConfig::default());
        let mut buf = [0u8; 16];
        comp.read_frames(&mut buf).unwrap();
        let out = f32::from_le_bytes(buf[12..16].try_into().unwrap());
        assert!((out - 0.01).abs() < 1e-4);
    }

    #[test]
    fn loud_signal_is_reduced_towards_threshold() {
        let mut comp = Compressor::new(mono_source(0.9, 32), CompressorConfig::default());
        let mut buf = vec![0u8; 32 * 4];
        comp.read_frames(&mut buf).unwrap();
        let last = f32::from_le_bytes(buf[28 * 4..28 * 4 + 4].try_into().unwrap());
        assert!(last < 0.9);
    }
}

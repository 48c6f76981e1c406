// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Matrix mixer with an optional Hilbert phase-shift path (spec.md §4.8, C8), grounded on
//! `original_source/mixer.cpp`. A coefficient may be real (direct gain) or imaginary (use
//! the 90°-shifted copy of that input channel); a column may not mix both. When any column
//! needs the shift, a windowed-sinc-free Hilbert FIR is built once at construction and
//! applied by direct convolution, with unshifted ("pass") channels delayed through a queue
//! so every output row stays phase-aligned.

use std::collections::VecDeque;
use std::f64::consts::PI;

use sndpipe_core::conv::read_as_float;
use sndpipe_core::error::invalid_matrix;
use sndpipe_core::{ByteOrder, Encoding, Metadata, Result, Source, StreamFormat};

/// A single mixing coefficient: `re` is a direct gain, `im` a gain applied to the 90°
/// phase-shifted copy of the input channel. Exactly one of the two must be non-zero for
/// any coefficient that contributes to a column using the shift (spec.md §4.8).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Coeff {
    pub re: f64,
    pub im: f64,
}

impl Coeff {
    pub fn real(v: f64) -> Coeff {
        Coeff { re: v, im: 0.0 }
    }
    pub fn shifted(v: f64) -> Coeff {
        Coeff { re: 0.0, im: v }
    }
    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.im == 0.0
    }
}

fn validate_matrix(matrix: &[Vec<Coeff>]) -> Result<u32> {
    if matrix.is_empty() {
        return invalid_matrix("mixer: matrix has no output rows");
    }
    let n_in = matrix[0].len();
    if n_in == 0 {
        return invalid_matrix("mixer: matrix rows are empty");
    }
    if matrix.iter().any(|row| row.len() != n_in) {
        return invalid_matrix("mixer: matrix rows do not all have the same length");
    }

    let mut shift_mask = 0u32;
    for input in 0..n_in {
        let shift = matrix[0][input].im != 0.0;
        if shift && matrix[0][input].re != 0.0 {
            return invalid_matrix("mixer: a column may not combine real and imaginary entries");
        }
        for row in matrix {
            let entry = row[input];
            if shift && entry.re != 0.0 {
                return invalid_matrix("mixer: a column may not combine real and imaginary entries");
            }
            if !shift && entry.im != 0.0 {
                return invalid_matrix("mixer: a column may not combine real and imaginary entries");
            }
        }
        if shift {
            shift_mask |= 1 << input;
        }
    }
    Ok(shift_mask)
}

fn normalize_matrix(matrix: &mut [Vec<Coeff>]) {
    for row in matrix.iter_mut() {
        let sum: f64 = row.iter().map(|c| (c.re.abs()).max(c.im.abs())).sum();
        if sum == 0.0 {
            continue;
        }
        for c in row.iter_mut() {
            c.re /= sum;
            c.im /= sum;
        }
    }
}

/// Builds Hilbert FIR coefficients, Hamming-windowed, the way `mixer.cpp`'s `hilbert()` +
/// `applyHamming()` do.
fn hilbert_coeffs(num_taps: usize) -> Vec<f64> {
    let origin = (num_taps - 1) / 2;
    let mut coeffs = vec![0.0; num_taps];
    for i in 1..=origin {
        let x = if i % 2 == 1 { 1.0 / i as f64 } else { 0.0 };
        coeffs[origin + i] = -x;
        coeffs[origin - i] = x;
    }
    for i in 1..=origin {
        let w = 0.54 - 0.46 * (2.0 * PI * (origin + i) as f64 / (num_taps - 1) as f64).cos();
        coeffs[origin + i] *= w;
        coeffs[origin - i] *= w;
    }
    coeffs
}

fn hilbert_gain(coeffs: &[f64]) -> f64 {
    let origin = (coeffs.len() - 1) / 2;
    let mut gain = 0.0;
    let mut odd = false;
    for &c in coeffs.iter().skip(origin + 1) {
        if odd {
            gain += c;
        } else {
            gain -= c;
        }
        odd = !odd;
    }
    if odd {
        gain = -gain;
    }
    gain * 2.0
}

pub struct Mixer<S: Source> {
    inner: S,
    format: StreamFormat,
    matrix: Vec<Vec<Coeff>>,
    shift_mask: u32,
    hilbert: Vec<f64>,
    hilbert_gain: f64,
    /// Per-input-channel convolution history for shifted channels.
    history: Vec<VecDeque<f32>>,
    /// Delay queue for unshifted channels so they stay aligned with the Hilbert filter's
    /// group delay.
    pass_queue: Vec<VecDeque<f32>>,
}

impl<S: Source> Mixer<S> {
    pub fn new(inner: S, matrix: Vec<Vec<Coeff>>, normalize: bool) -> Result<Mixer<S>> {
        let src = inner.format();
        let mut matrix = matrix;
        let shift_mask = validate_matrix(&matrix)?;
        if matrix[0].len() != src.channels as usize {
            return invalid_matrix("mixer: matrix input column count does not match source channel count");
        }
        if normalize {
            normalize_matrix(&mut matrix);
        }

        let n_out = matrix.len() as u8;
        let format = StreamFormat::new(src.sample_rate, n_out, Encoding::Float, 32, 32, ByteOrder::LittleEndian)?;

        let (hilbert, hilbert_gain) = if shift_mask != 0 {
            let mut num_taps = (src.sample_rate / 12) as usize;
            if num_taps % 2 == 0 {
                num_taps += 1;
            }
            let coeffs = hilbert_coeffs(num_taps);
            let gain = hilbert_gain(&coeffs);
            (coeffs, gain)
        } else {
            (Vec::new(), 1.0)
        };

        let latency = if hilbert.is_empty() { 0 } else { (hilbert.len() - 1) / 2 };
        let n_in = src.channels as usize;
        let history = vec![VecDeque::new(); n_in];
        let mut pass_queue = vec![VecDeque::new(); n_in];
        for q in pass_queue.iter_mut() {
            for _ in 0..latency {
                q.push_back(0.0);
            }
        }

        Ok(Mixer { inner, format, matrix, shift_mask, hilbert, hilbert_gain, history, pass_queue })
    }

    fn channel_is_shifted(&self, input: usize) -> bool {
        self.shift_mask & (1 << input) != 0
    }

    /// Phase-shifts (or delays) one input sample for channel `input`, returning the value
    /// to use for mixing this frame.
    fn stage_input(&mut self, input: usize, x: f32) -> f32 {
        if !self.channel_is_shifted(input) {
            self.pass_queue[input].push_back(x);
            return self.pass_queue[input].pop_front().unwrap_or(0.0);
        }
        let hist = &mut self.history[input];
        hist.push_back(x / self.hilbert_gain as f32);
        if hist.len() > self.hilbert.len() {
            hist.pop_front();
        }
        if hist.len() < self.hilbert.len() {
            return 0.0;
        }
        let mut acc = 0.0f64;
        for (tap, &sample) in self.hilbert.iter().zip(hist.iter()) {
            acc += tap * sample as f64;
        }
        acc as f32
    }
}

impl<S: Source> Source for Mixer<S> {
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
        let n_out = self.matrix.len();
        let n_in = self.matrix[0].len();
        let out_frame_bytes = 4 * n_out;
        let want_frames = buf.len() / out_frame_bytes;
        if want_frames == 0 {
            return Ok(0);
        }

        let src_fmt = self.inner.format();
        let src_frame_bytes = src_fmt.frame_bytes();
        let mut src_buf = vec![0u8; want_frames * src_frame_bytes];
        let got = self.inner.read_frames(&mut src_buf)?;

        let mut raw_frame = vec![0f32; n_in];
        let mut staged = vec![0f32; n_in];
        for f in 0..got {
            let raw = &src_buf[f * src_frame_bytes..(f + 1) * src_frame_bytes];
            read_as_float(&src_fmt, raw, &mut raw_frame);
            for input in 0..n_in {
                staged[input] = self.stage_input(input, raw_frame[input]);
            }
            for (out, row) in self.matrix.iter().enumerate() {
                let mut value = 0.0f64;
                for (input, coeff) in row.iter().enumerate() {
                    value += staged[input] as f64 * (coeff.re + coeff.im);
                }
                let bytes = (value as f32).to_le_bytes();
                buf[(f * n_out + out) * 4..(f * n_out + out) * 4 + 4].copy_from_slice(&bytes);
            }
        }
        Ok(got)
    }

    fn seek(&mut self, _frame_pos: u64) -> Result<()> {
        sndpipe_core::error::unsupported("mixer: seeking across an in-flight Hilbert filter is not supported")
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gain scaler (spec.md §4.14 step 6, `--gain`), grounded on
//! `original_source/scaler.h`: a constant linear multiplier applied to every sample after
//! staging through float, same as the original's `Scaler` delegate which refuses 64-bit
//! input and always emits float32.

use sndpipe_core::conv::read_as_float;
use sndpipe_core::error::unsupported;
use sndpipe_core::{ByteOrder, Encoding, Metadata, Result, Source, StreamFormat};

pub struct Scaler<S: Source> {
    inner: S,
    format: StreamFormat,
    scale: f32,
}

impl<S: Source> Scaler<S> {
    /// `scale` is a linear multiplier; use [`Self::from_db`] to build one from a dB value.
    pub fn new(inner: S, scale: f32) -> Result<Scaler<S>> {
        let src = inner.format();
        if src.bits_per_sample == 64 {
            return unsupported("scaler: 64-bit samples are not supported");
        }
        let format = StreamFormat::new(src.sample_rate, src.channels, Encoding::Float, 32, 32, ByteOrder::LittleEndian)?;
        Ok(Scaler { inner, format, scale })
    }

    pub fn from_db(inner: S, db: f64) -> Result<Scaler<S>> {
        Scaler::new(inner, 10f64.powf(db / 20.0) as f32)
    }
}

impl<S: Source> Source for Scaler<S> {
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

        let mut frame = vec![0f32; channels];
        for f in 0..got {
            let raw = &src_buf[f * src_frame_bytes..(f + 1) * src_frame_bytes];
            read_as_float(&src_fmt, raw, &mut frame);
            for (c, sample) in frame.iter().enumerate() {
                let bytes = (*sample * self.scale).to_le_bytes();
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
    use sndpipe_core::{ByteOrder as BO, Encoding as Enc};

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
        let format = StreamFormat::new(44_100, 1, Enc::Float, 32, 32, BO::LittleEndian).unwrap();
        ConstSource { format, value, remaining: frames, metadata: Metadata::default() }
    }

    #[test]
    fn applies_a_linear_gain() {
        let mut scaler = Scaler::new(mono_source(0.5, 1), 2.0).unwrap();
        let mut buf = [0u8; 4];
        scaler.read_frames(&mut buf).unwrap();
        assert!((f32::from_le_bytes(buf) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn from_db_matches_log_domain_conversion() {
        let mut scaler = Scaler::from_db(mono_source(1.0, 1), -6.0206).unwrap();
        let mut buf = [0u8; 4];
        scaler.read_frames(&mut buf).unwrap();
        assert!((f32::from_le_bytes(buf) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn rejects_64_bit_input() {
        let format = StreamFormat::new(44_100, 1, Enc::Float, 64, 64, BO::LittleEndian).unwrap();
        let src = ConstSource { format, value: 0.0, remaining: 0, metadata: Metadata::default() };
        assert!(Scaler::new(src, 1.0).is_err());
    }
}

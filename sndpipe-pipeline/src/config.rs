// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The pipeline assembler (spec.md §4.14, C14) and its plain-data configuration. Unlike the
//! original, which reads configuration off `argv`, [`PipelineConfig`] is constructed
//! programmatically (or deserialized, under the `serde` feature) by the embedding
//! application; this crate never parses command-line options.

use sndpipe_core::error::unsupported;
use sndpipe_core::{Result, Source};
use sndpipe_dsp::{Coeff, Compressor, CompressorConfig, Limiter, LowpassFilter, Mixer, Quantizer, Resampler, ResamplerKernel, Scaler};

use crate::{ChannelMapper, Trimmer};

/// A matrix-mixer stage's coefficients, row-major over output channels. Each entry is
/// `(re, im)`; a column may use `re` or `im` but never both (spec.md §4.8).
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatrixConfig {
    pub rows: Vec<Vec<(f64, f64)>>,
    pub normalize: bool,
}

/// Mirrors [`sndpipe_dsp::CompressorConfig`] so [`PipelineConfig`] stays plain data without
/// requiring `sndpipe-dsp` to grow a `serde` dependency of its own.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub ratio: f64,
    pub knee_width_db: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl Default for CompressorSettings {
    fn default() -> CompressorSettings {
        let d = CompressorConfig::default();
        CompressorSettings {
            threshold_db: d.threshold_db,
            ratio: d.ratio,
            knee_width_db: d.knee_width_db,
            attack_ms: d.attack_ms,
            release_ms: d.release_ms,
        }
    }
}

impl From<CompressorSettings> for CompressorConfig {
    fn from(s: CompressorSettings) -> CompressorConfig {
        CompressorConfig {
            threshold_db: s.threshold_db,
            ratio: s.ratio,
            knee_width_db: s.knee_width_db,
            attack_ms: s.attack_ms,
            release_ms: s.release_ms,
        }
    }
}

/// The quantizer's target depth and behavior (spec.md §4.5).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuantizeConfig {
    pub depth: u32,
    pub dither: bool,
    pub to_float: bool,
}

/// One field per assembler trigger in spec.md §4.14, plus sink selection is left to the
/// caller (this crate only builds the source-side filter chain).
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Trim window start, in frames. `None` with `trim_end` also `None` skips the Trimmer.
    pub trim_start: Option<u64>,
    /// Trim window end, in frames. `None` means "until EOF".
    pub trim_end: Option<u64>,
    /// 1-based permutation vector, one entry per input channel.
    pub channel_map: Option<Vec<u8>>,
    pub matrix: Option<MatrixConfig>,
    /// Requests a low-pass FIR ahead of a downsampling resample. Only takes effect when
    /// `output_rate` is also set to a rate below the source's.
    pub lowpass: bool,
    pub output_rate: Option<u32>,
    pub gain_db: Option<f64>,
    pub compressor: Option<CompressorSettings>,
    /// Limiter threshold; `None` disables the stage.
    pub limiter: Option<f32>,
    pub quantize: Option<QuantizeConfig>,
}

/// Stacks filters from `source` according to `config`, in the exact order spec.md §4.14
/// fixes: Trimmer, ChannelMapper, matrix mixer, low-pass FIR, resampler, scaler, compressor,
/// limiter, quantizer. `lowpass_kernel`/`resample_kernel` are supplied by the caller since
/// the kernel implementations live outside this crate (spec.md §4.9, §4.14 step 4).
///
/// Every stage wraps the previous one by value inside a `Box<dyn Source>`, so a
/// construction failure partway through drops `current` and everything already stacked
/// inside it — there is nothing left to tear down explicitly.
pub fn assemble<S>(
    source: S,
    config: PipelineConfig,
    lowpass_kernel: Option<Box<dyn ResamplerKernel>>,
    resample_kernel: Option<Box<dyn ResamplerKernel>>,
) -> Result<Box<dyn Source>>
where
    S: Source + 'static,
{
    let mut current: Box<dyn Source> = Box::new(source);

    if config.trim_start.is_some() || config.trim_end.is_some() {
        let start = config.trim_start.unwrap_or(0);
        let duration = config.trim_end.map(|end| end.saturating_sub(start));
        current = Box::new(Trimmer::new(current, start, duration)?);
    }

    if let Some(map) = config.channel_map {
        current = Box::new(ChannelMapper::new(current, map)?);
    }

    if let Some(matrix) = &config.matrix {
        let rows: Vec<Vec<Coeff>> = matrix.rows.iter().map(|row| row.iter().map(|&(re, im)| Coeff { re, im }).collect()).collect();
        current = Box::new(Mixer::new(current, rows, matrix.normalize)?);
    }

    let downsampling = config.output_rate.is_some_and(|rate| rate < current.format().sample_rate);
    if config.lowpass && downsampling {
        let kernel = match lowpass_kernel {
            Some(k) => k,
            None => return unsupported("lowpass requested but no kernel was supplied"),
        };
        current = Box::new(LowpassFilter::new(current, kernel));
    }

    if let Some(rate) = config.output_rate {
        if rate != current.format().sample_rate {
            let kernel = match resample_kernel {
                Some(k) => k,
                None => return unsupported("output rate differs but no resampler kernel was supplied"),
            };
            current = Box::new(Resampler::new(current, kernel, rate)?);
        }
    }

    if let Some(db) = config.gain_db {
        current = Box::new(Scaler::from_db(current, db)?);
    }

    if let Some(settings) = config.compressor {
        current = Box::new(Compressor::new(current, settings.into()));
    }

    if let Some(threshold) = config.limiter {
        current = Box::new(Limiter::with_threshold(current, threshold));
    }

    if let Some(q) = config.quantize {
        current = Box::new(Quantizer::new(current, q.depth, q.dither, q.to_float)?);
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sndpipe_core::{ByteOrder, Encoding, Metadata, StreamFormat};

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
            Some(self.remaining as u64)
        }
        fn is_seekable(&self) -> bool {
            true
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
    fn empty_config_passes_audio_through_unchanged() {
        let config = PipelineConfig::default();
        let mut assembled = assemble(mono_source(0.5, 4), config, None, None).unwrap();
        let mut buf = [0u8; 16];
        let n = assembled.read_frames(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert!((f32::from_le_bytes(buf[0..4].try_into().unwrap()) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn gain_and_quantize_stack_in_order() {
        let config = PipelineConfig {
            gain_db: Some(-6.0),
            quantize: Some(QuantizeConfig { depth: 16, dither: false, to_float: false }),
            ..PipelineConfig::default()
        };
        let mut assembled = assemble(mono_source(1.0, 1), config, None, None).unwrap();
        let mut buf = [0u8; 2];
        let n = assembled.read_frames(&mut buf).unwrap();
        assert_eq!(n, 1);
        let sample = i16::from_le_bytes(buf);
        let expected = (10f64.powf(-6.0 / 20.0) * (1i64 << 15) as f64).round() as i16;
        assert!((sample - expected).abs() <= 1);
    }

    #[test]
    fn trim_without_end_runs_to_source_eof() {
        let config = PipelineConfig { trim_start: Some(1), ..PipelineConfig::default() };
        let mut assembled = assemble(mono_source(1.0, 4), config, None, None).unwrap();
        let mut buf = [0u8; 16];
        let n = assembled.read_frames(&mut buf).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn lowpass_without_a_kernel_fails_even_when_requested() {
        let config = PipelineConfig { lowpass: true, output_rate: Some(22_050), ..PipelineConfig::default() };
        let err = assemble(mono_source(0.0, 1), config, None, None);
        assert!(err.is_err());
    }
}

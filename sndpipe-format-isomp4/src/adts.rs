// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw ADTS (`.aac`) sink (spec.md §4.13, §6 "Output formats produced"): no container,
//! just a 7-byte (plus optional PCE) header in front of every encoded AAC frame.

use std::io::Write;

use sndpipe_core::error::malformed;
use sndpipe_core::{Encoding, Result, Sink, StreamFormat};

use crate::asc::{self, AudioSpecificConfig};
use crate::kernel::AacEncoderKernel;

const AAC_SAMPLES_PER_FRAME: usize = 1024;

pub struct AdtsSink<W: Write, K: AacEncoderKernel> {
    out: W,
    kernel: K,
    format: StreamFormat,
    scratch: Vec<f32>,
    asc: Option<AudioSpecificConfig>,
}

impl<W: Write, K: AacEncoderKernel> AdtsSink<W, K> {
    pub fn create(out: W, format: StreamFormat, kernel: K) -> Result<AdtsSink<W, K>> {
        if !matches!(format.encoding, Encoding::Float) {
            return malformed("adts: sink requires 32-bit float input");
        }
        Ok(AdtsSink { out, kernel, format, scratch: Vec::new(), asc: None })
    }

    fn flush_frame(&mut self, pcm: &[f32]) -> Result<()> {
        let payload = self.kernel.encode(pcm, self.format.channels)?;
        if self.asc.is_none() {
            self.asc = Some(AudioSpecificConfig::parse(self.kernel.asc())?);
        }
        let asc = self.asc.as_ref().unwrap();
        let header = asc::write_adts_header(asc, payload.len());
        self.out.write_all(&header)?;
        self.out.write_all(&payload)?;
        Ok(())
    }
}

impl<W: Write, K: AacEncoderKernel> Sink for AdtsSink<W, K> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn write_frames(&mut self, buf: &[u8], n_frames: usize) -> Result<()> {
        let channels = self.format.channels as usize;
        for frame in buf[..n_frames * self.format.frame_bytes()].chunks(4 * channels) {
            for sample in frame.chunks(4) {
                self.scratch.push(f32::from_le_bytes(sample.try_into().unwrap()));
            }
            if self.scratch.len() >= AAC_SAMPLES_PER_FRAME * channels {
                let pcm: Vec<f32> = self.scratch.drain(..AAC_SAMPLES_PER_FRAME * channels).collect();
                self.flush_frame(&pcm)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.scratch.is_empty() {
            let mut pcm = std::mem::take(&mut self.scratch);
            pcm.resize(AAC_SAMPLES_PER_FRAME * self.format.channels as usize, 0.0);
            self.flush_frame(&pcm)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

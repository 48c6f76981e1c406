// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MP4 AAC/ALAC sinks (spec.md §4.13, C13). Layout is `ftyp`, `mdat`, `moov` — the
//! optional time-ordered re-mux that would place `moov` before `mdat` (spec.md §4.13
//! "MP4 optimization") is not implemented; every sample table and tag is still correct,
//! just not front-loaded for progressive playback.

use std::io::{Seek, SeekFrom, Write};

use sndpipe_core::error::malformed;
use sndpipe_core::{ByteOrder, Encoding, Metadata, Result, Sink, StreamFormat};

use crate::atom::{atom, concat};
use crate::boxes::{self, SampleTable};
use crate::kernel::{AacEncoderKernel, AlacEncoderKernel};
use crate::tags::{self, GaplessInfo};

const AAC_SAMPLES_PER_FRAME: u32 = 1024;

/// A running 1-second-windowed bitrate tracker, used for the `esds` `avgBitrate`/
/// `maxBitrate` fields (spec.md §4.13 "Bitrate accounting").
#[derive(Default)]
struct BitrateTracker {
    total_bytes: u64,
    total_seconds: f64,
    window_bytes: u64,
    window_seconds: f64,
    max_bitrate: u32,
}

impl BitrateTracker {
    fn push(&mut self, bytes: usize, seconds: f64) {
        self.total_bytes += bytes as u64;
        self.total_seconds += seconds;
        self.window_bytes += bytes as u64;
        self.window_seconds += seconds;
        while self.window_seconds >= 1.0 {
            let bps = (self.window_bytes as f64 * 8.0 / self.window_seconds) as u32;
            self.max_bitrate = self.max_bitrate.max(bps);
            self.window_bytes = 0;
            self.window_seconds = 0.0;
        }
    }

    fn finish(&mut self) -> (u32, u32) {
        if self.window_seconds > 0.0 {
            let bps = (self.window_bytes as f64 * 8.0 / self.window_seconds) as u32;
            self.max_bitrate = self.max_bitrate.max(bps);
        }
        let avg = if self.total_seconds > 0.0 {
            (self.total_bytes as f64 * 8.0 / self.total_seconds) as u32
        } else {
            0
        };
        (avg, self.max_bitrate)
    }
}

/// Gapless edit boundaries supplied by the caller up front (spec.md §4.13); `None` when
/// the sink should not emit gapless metadata at all.
pub type GaplessEdit = Option<(u64, u64)>;

pub struct Mp4AacSink<W: Write + Seek, K: AacEncoderKernel> {
    out: W,
    kernel: K,
    format: StreamFormat,
    scratch: Vec<f32>,
    table: SampleTable,
    mdat_payload_start: u64,
    bitrate: BitrateTracker,
    tags: sndpipe_core::Tags,
    gapless: GaplessEdit,
}

impl<W: Write + Seek, K: AacEncoderKernel> Mp4AacSink<W, K> {
    pub fn create(
        mut out: W,
        format: StreamFormat,
        kernel: K,
        metadata: &Metadata,
        gapless: GaplessEdit,
    ) -> Result<Mp4AacSink<W, K>> {
        if !matches!(format.encoding, Encoding::Float) {
            return malformed("mp4: aac sink requires 32-bit float input");
        }
        out.write_all(&boxes::ftyp())?;
        out.write_all(b"mdat")?;
        out.write_all(&0u32.to_be_bytes())?;
        let mdat_payload_start = out.stream_position()?;
        Ok(Mp4AacSink {
            out,
            kernel,
            format,
            scratch: Vec::new(),
            table: SampleTable::new(),
            mdat_payload_start,
            bitrate: BitrateTracker::default(),
            tags: metadata.tags.clone(),
            gapless,
        })
    }

    fn flush_frame(&mut self, pcm: &[f32]) -> Result<()> {
        let au = self.kernel.encode(pcm, self.format.channels)?;
        let offset = self.out.stream_position()?;
        self.out.write_all(&au)?;
        self.table.push(offset, au.len() as u32);
        self.bitrate.push(au.len(), AAC_SAMPLES_PER_FRAME as f64 / self.format.sample_rate as f64);
        Ok(())
    }
}

impl<W: Write + Seek, K: AacEncoderKernel> Sink for Mp4AacSink<W, K> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn write_frames(&mut self, buf: &[u8], n_frames: usize) -> Result<()> {
        let channels = self.format.channels as usize;
        for frame in buf[..n_frames * self.format.frame_bytes()].chunks(4 * channels) {
            for sample in frame.chunks(4) {
                self.scratch.push(f32::from_le_bytes(sample.try_into().unwrap()));
            }
            if self.scratch.len() >= AAC_SAMPLES_PER_FRAME as usize * channels {
                let pcm: Vec<f32> = self.scratch.drain(..AAC_SAMPLES_PER_FRAME as usize * channels).collect();
                self.flush_frame(&pcm)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.scratch.is_empty() {
            let mut pcm = std::mem::take(&mut self.scratch);
            pcm.resize(AAC_SAMPLES_PER_FRAME as usize * self.format.channels as usize, 0.0);
            self.flush_frame(&pcm)?;
        }

        let mdat_end = self.out.stream_position()?;
        let mdat_size = mdat_end - (self.mdat_payload_start - 8);
        self.out.seek(SeekFrom::Start(self.mdat_payload_start - 4))?;
        self.out.write_all(&(mdat_size as u32).to_be_bytes())?;
        self.out.seek(SeekFrom::Start(mdat_end))?;

        let duration_frames = self.table.sample_count() as u64 * AAC_SAMPLES_PER_FRAME as u64;
        let timescale = self.format.sample_rate;
        let (avg_bitrate, max_bitrate) = self.bitrate.finish();

        let sample_entry =
            boxes::mp4a_sample_entry(self.format.channels, timescale, boxes::esds(self.kernel.asc(), avg_bitrate, max_bitrate));
        let stbl = boxes::stbl(&self.table, AAC_SAMPLES_PER_FRAME, &sample_entry);
        let minf = boxes::minf(stbl);
        let mdia = boxes::mdia(timescale, duration_frames as u32, minf);
        let tkhd = boxes::tkhd(duration_frames as u32, self.format.channels);
        let edts = self.gapless.map(|(start, dur)| boxes::edts(start as u32, dur as u32));
        let trak = boxes::trak(tkhd, mdia, edts);
        let gapless_info = self.gapless.map(|(start, dur)| GaplessInfo {
            edit_start: start,
            edit_duration: dur,
            total_duration: duration_frames,
        });
        let udta = tags::udta(&self.tags, gapless_info);
        let moov = atom(b"moov", &concat(&[boxes::mvhd(timescale, duration_frames as u32), trak, udta]));

        self.out.write_all(&moov)?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct Mp4AlacSink<W: Write + Seek, K: AlacEncoderKernel> {
    out: W,
    kernel: K,
    format: StreamFormat,
    frame_length: u32,
    scratch: Vec<i32>,
    table: SampleTable,
    mdat_payload_start: u64,
    bitrate: BitrateTracker,
    tags: sndpipe_core::Tags,
    gapless: GaplessEdit,
}

impl<W: Write + Seek, K: AlacEncoderKernel> Mp4AlacSink<W, K> {
    pub fn create(
        mut out: W,
        format: StreamFormat,
        kernel: K,
        frame_length: u32,
        metadata: &Metadata,
        gapless: GaplessEdit,
    ) -> Result<Mp4AlacSink<W, K>> {
        if !matches!(format.encoding, Encoding::SignedInt) {
            return malformed("mp4: alac sink requires signed integer input");
        }
        out.write_all(&boxes::ftyp())?;
        out.write_all(b"mdat")?;
        out.write_all(&0u32.to_be_bytes())?;
        let mdat_payload_start = out.stream_position()?;
        Ok(Mp4AlacSink {
            out,
            kernel,
            format,
            frame_length,
            scratch: Vec::new(),
            table: SampleTable::new(),
            mdat_payload_start,
            bitrate: BitrateTracker::default(),
            tags: metadata.tags.clone(),
            gapless,
        })
    }

    fn flush_frame(&mut self, pcm: &[i32]) -> Result<()> {
        let au = self.kernel.encode(pcm, self.format.channels)?;
        let offset = self.out.stream_position()?;
        self.out.write_all(&au)?;
        self.table.push(offset, au.len() as u32);
        self.bitrate.push(au.len(), self.frame_length as f64 / self.format.sample_rate as f64);
        Ok(())
    }

    fn sample_from_container(&self, bytes: &[u8]) -> i32 {
        let swapped: Vec<u8> = if matches!(self.format.byte_order, ByteOrder::BigEndian) {
            bytes.iter().rev().copied().collect()
        } else {
            bytes.to_vec()
        };
        match self.format.container_bytes_per_sample() {
            2 => i16::from_le_bytes(swapped.try_into().unwrap()) as i32,
            3 => {
                let mut b = [0u8; 4];
                b[..3].copy_from_slice(&swapped);
                (i32::from_le_bytes(b) << 8) >> 8
            }
            4 => i32::from_le_bytes(swapped.try_into().unwrap()),
            _ => 0,
        }
    }
}

impl<W: Write + Seek, K: AlacEncoderKernel> Sink for Mp4AlacSink<W, K> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn write_frames(&mut self, buf: &[u8], n_frames: usize) -> Result<()> {
        let sample_bytes = self.format.container_bytes_per_sample();
        let channels = self.format.channels as usize;
        for sample in buf[..n_frames * self.format.frame_bytes()].chunks(sample_bytes) {
            self.scratch.push(self.sample_from_container(sample));
        }
        while self.scratch.len() >= self.frame_length as usize * channels {
            let pcm: Vec<i32> = self.scratch.drain(..self.frame_length as usize * channels).collect();
            self.flush_frame(&pcm)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.scratch.is_empty() {
            let mut pcm = std::mem::take(&mut self.scratch);
            pcm.resize(self.frame_length as usize * self.format.channels as usize, 0);
            self.flush_frame(&pcm)?;
        }

        let mdat_end = self.out.stream_position()?;
        let mdat_size = mdat_end - (self.mdat_payload_start - 8);
        self.out.seek(SeekFrom::Start(self.mdat_payload_start - 4))?;
        self.out.write_all(&(mdat_size as u32).to_be_bytes())?;
        self.out.seek(SeekFrom::Start(mdat_end))?;

        let duration_frames = self.table.sample_count() as u64 * self.frame_length as u64;
        let timescale = self.format.sample_rate;

        let sample_entry =
            boxes::alac_sample_entry(self.format.channels, timescale, self.kernel.magic_cookie());
        let stbl = boxes::stbl(&self.table, self.frame_length, &sample_entry);
        let minf = boxes::minf(stbl);
        let mdia = boxes::mdia(timescale, duration_frames as u32, minf);
        let tkhd = boxes::tkhd(duration_frames as u32, self.format.channels);
        let edts = self.gapless.map(|(start, dur)| boxes::edts(start as u32, dur as u32));
        let trak = boxes::trak(tkhd, mdia, edts);
        let gapless_info = self.gapless.map(|(start, dur)| GaplessInfo {
            edit_start: start,
            edit_duration: dur,
            total_duration: duration_frames,
        });
        let udta = tags::udta(&self.tags, gapless_info);
        let moov = atom(b"moov", &concat(&[boxes::mvhd(timescale, duration_frames as u32), trak, udta]));

        self.out.write_all(&moov)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::fakes::{FakeAacKernel, FakeAlacKernel};
    use std::io::Cursor;

    fn aac_format() -> StreamFormat {
        StreamFormat::new(44_100, 2, Encoding::Float, 32, 32, ByteOrder::LittleEndian).unwrap()
    }

    fn alac_format() -> StreamFormat {
        StreamFormat::new(44_100, 2, Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian).unwrap()
    }

    #[test]
    fn aac_sink_produces_ftyp_mdat_moov() {
        let kernel = FakeAacKernel { asc: vec![0x12, 0x10] };
        let metadata = Metadata::default();
        let mut sink =
            Mp4AacSink::create(Cursor::new(Vec::new()), aac_format(), kernel, &metadata, None).unwrap();

        let frames = 1024usize;
        let mut buf = Vec::new();
        for _ in 0..frames * 2 {
            buf.extend_from_slice(&0.0f32.to_le_bytes());
        }
        sink.write_frames(&buf, frames).unwrap();
        sink.finalize().unwrap();

        let out = sink.out.into_inner();
        let ftyp_size = u32::from_be_bytes(out[0..4].try_into().unwrap());
        assert_eq!(&out[4..8], b"ftyp");
        assert_eq!(&out[ftyp_size as usize + 4..ftyp_size as usize + 8], b"mdat");
        let as_str = String::from_utf8_lossy(&out);
        assert!(as_str.contains("moov"));
    }

    #[test]
    fn alac_sink_flushes_partial_tail_frame() {
        let kernel = FakeAlacKernel { cookie: vec![0u8; 24] };
        let metadata = Metadata::default();
        let mut sink =
            Mp4AlacSink::create(Cursor::new(Vec::new()), alac_format(), kernel, 4096, &metadata, None)
                .unwrap();
        let buf = vec![0u8; 100 * 4];
        sink.write_frames(&buf, 100).unwrap();
        sink.finalize().unwrap();
        let out = sink.out.into_inner();
        let as_str = String::from_utf8_lossy(&out);
        assert!(as_str.contains("alac"));
    }

    #[test]
    fn gapless_edit_produces_edts_and_itunsmpb() {
        let kernel = FakeAacKernel { asc: vec![0x12, 0x10] };
        let metadata = Metadata::default();
        let mut sink = Mp4AacSink::create(
            Cursor::new(Vec::new()),
            aac_format(),
            kernel,
            &metadata,
            Some((2112, 44_100)),
        )
        .unwrap();
        sink.write_frames(&[], 0).unwrap();
        sink.finalize().unwrap();
        let out = sink.out.into_inner();
        let as_str = String::from_utf8_lossy(&out);
        assert!(as_str.contains("edts"));
        assert!(as_str.contains("iTunSMPB"));
    }
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The TAK [`Source`] adapter (spec.md §4.3). Walks the `tBaK` metadata block chain to
//! build a [`StreamFormat`] and, once the end-of-metadata block is reached, hands the
//! remaining compressed payload to a [`TakDecoderKernel`] a chunk at a time.

use std::io::{Read, SeekFrom};

use log::warn;
use sndpipe_core::error::malformed;
use sndpipe_core::io::MediaSource;
use sndpipe_core::{ByteOrder, Encoding, Error, Metadata, Result, SeekErrorKind, Source, StreamFormat};

use crate::kernel::TakDecoderKernel;
use crate::stream_info::{BlockHeader, BlockType, StreamInfo, MAGIC};

/// Samples (per channel) decoded per call to the kernel.
const DECODE_CHUNK_FRAMES: usize = 4096;

pub struct TakSource<K: TakDecoderKernel> {
    audio: Vec<u8>,
    kernel: K,
    format: StreamFormat,
    length_frames: Option<u64>,
    position: u64,
    metadata: Metadata,
    pending: Vec<i32>,
    pending_pos: usize,
    exhausted: bool,
}

impl<K: TakDecoderKernel> TakSource<K> {
    pub fn try_new<M: MediaSource>(mut media: M, kernel: K) -> Result<TakSource<K>> {
        let mut magic = [0u8; 4];
        media.read_exact(&mut magic)?;
        if magic != MAGIC {
            return malformed("tak: stream does not start with the 'tBaK' magic");
        }

        let mut stream_info = None;
        loop {
            let header = match BlockHeader::read(&mut media) {
                Ok(header) => header,
                Err(_) => return malformed("tak: metadata block chain ended without an end-of-metadata block"),
            };
            let mut payload = vec![0u8; header.size];
            media.read_exact(&mut payload)?;
            match header.block_type {
                BlockType::StreamInfo => stream_info = Some(StreamInfo::parse(&payload)?),
                BlockType::End => break,
                BlockType::EncoderInfo | BlockType::Other(_) => {}
            }
        }
        let stream_info = stream_info.ok_or(Error::MalformedContainer("tak: stream has no stream info block"))?;

        let mut metadata = Metadata::default();
        if media.is_seekable() {
            if let Some(len) = media.byte_len() {
                let audio_start = std::io::Seek::stream_position(&mut media)?;
                match sndpipe_metadata::ape::read_tags(&mut media, len) {
                    Ok(tags) => metadata.tags = tags,
                    Err(_) => warn!("tak: no APEv2 tag block found"),
                }
                media.seek(SeekFrom::Start(audio_start))?;
            }
        }

        let bits = stream_info.bits_per_sample;
        let format = StreamFormat::new(
            stream_info.sample_rate,
            stream_info.channels,
            Encoding::SignedInt,
            bits,
            bits,
            ByteOrder::LittleEndian,
        )?;

        let mut audio = Vec::new();
        media.read_to_end(&mut audio)?;

        Ok(TakSource {
            audio,
            kernel,
            format,
            length_frames: stream_info.total_samples,
            position: 0,
            metadata,
            pending: Vec::new(),
            pending_pos: 0,
            exhausted: false,
        })
    }

    fn decode_next_chunk(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let channels = self.format.channels as usize;
        let mut out = vec![0i32; DECODE_CHUNK_FRAMES * channels];
        let n = self.kernel.decode_frame(&self.audio, &mut out)?;
        if n == 0 {
            self.exhausted = true;
            return Ok(false);
        }
        out.truncate(n);
        self.pending.extend_from_slice(&out);
        Ok(true)
    }

    fn fill_pending(&mut self, min_frames: usize) -> Result<()> {
        let channels = self.format.channels as usize;
        while (self.pending.len() - self.pending_pos) / channels < min_frames {
            if !self.decode_next_chunk()? {
                break;
            }
        }
        Ok(())
    }
}

impl<K: TakDecoderKernel> Source for TakSource<K> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        self.length_frames
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_bytes = self.format.frame_bytes();
        let channels = self.format.channels as usize;
        let bytes_per_sample = self.format.container_bytes_per_sample();
        let want_frames = buf.len() / frame_bytes;

        self.fill_pending(want_frames)?;

        let available_frames = (self.pending.len() - self.pending_pos) / channels;
        let frames = want_frames.min(available_frames);
        if frames == 0 {
            return Ok(0);
        }

        for i in 0..frames * channels {
            let sample = self.pending[self.pending_pos + i];
            let bytes = sample.to_le_bytes();
            let dst = &mut buf[i * bytes_per_sample..(i + 1) * bytes_per_sample];
            dst.copy_from_slice(&bytes[..bytes_per_sample]);
        }
        self.pending_pos += frames * channels;
        if self.pending_pos == self.pending.len() {
            self.pending.clear();
            self.pending_pos = 0;
        }
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, _frame_pos: u64) -> Result<()> {
        Err(Error::SeekUnsupported(SeekErrorKind::Unseekable))
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

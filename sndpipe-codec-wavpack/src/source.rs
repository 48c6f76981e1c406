// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WavPack [`Source`] adapter (spec.md §4.3). Walks the stream's `wvpk` blocks,
//! derives a [`StreamFormat`] from the first block's header, and hands each complete raw
//! block to a [`WavPackDecoderKernel`] for entropy decoding.
//!
//! A `.wvc` correction file (spec.md §6 "WavPack... with a `.wvc` correction file") would
//! layer lossless-correction blocks on top of the lossy main stream; this adapter only
//! reads the main stream, consistent with the kernel boundary owning hybrid mode
//! specifics (spec.md §4.13A).

use std::io::SeekFrom;

use log::warn;
use sndpipe_core::error::unsupported;
use sndpipe_core::io::MediaSource;
use sndpipe_core::{ByteOrder, Encoding, Error, Metadata, Result, SeekErrorKind, Source, StreamFormat};

use crate::header::Header;
use crate::kernel::WavPackDecoderKernel;

pub struct WavPackSource<M: MediaSource, K: WavPackDecoderKernel> {
    media: M,
    kernel: K,
    format: StreamFormat,
    length_frames: Option<u64>,
    position: u64,
    metadata: Metadata,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl<M: MediaSource, K: WavPackDecoderKernel> WavPackSource<M, K> {
    pub fn try_new(mut media: M, kernel: K) -> Result<WavPackSource<M, K>> {
        let start = std::io::Seek::stream_position(&mut media)?;
        let header = Header::read(&mut media)?;
        media.seek(SeekFrom::Start(start))?;

        if header.encoding() != crate::header::SampleEncoding::Pcm {
            return unsupported("wavpack: DSD encoding is not supported");
        }
        let sample_rate = header
            .sample_rate()
            .ok_or(Error::MalformedContainer("wavpack: custom sample rates are not supported"))?;
        let bits = header.bytes_per_sample() * 8;
        let format = StreamFormat::new(sample_rate, header.n_channels() as u8, Encoding::SignedInt, bits, bits, ByteOrder::LittleEndian)?;

        let length_frames = header.total_samples();

        let mut metadata = Metadata::default();
        if media.is_seekable() {
            if let Some(len) = media.byte_len() {
                match sndpipe_metadata::ape::read_tags(&mut media, len) {
                    Ok(tags) => metadata.tags = tags,
                    Err(_) => warn!("wavpack: no APEv2 tag block found"),
                }
                media.seek(SeekFrom::Start(start))?;
            }
        }

        Ok(WavPackSource {
            media,
            kernel,
            format,
            length_frames,
            position: 0,
            metadata,
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn decode_next_block(&mut self) -> Result<bool> {
        let mut header_bytes = [0u8; Header::SIZE];
        match std::io::Read::read(&mut self.media, &mut header_bytes)? {
            0 => return Ok(false),
            n if n < Header::SIZE => return Err(Error::ShortRead),
            _ => {}
        }
        let header = Header::read(&mut std::io::Cursor::new(&header_bytes[..]))?;

        let body_len = header.block_len() as usize - Header::SIZE;
        let mut block = Vec::with_capacity(header.block_len() as usize);
        block.extend_from_slice(&header_bytes);
        block.resize(block.len() + body_len, 0);
        let body_start = Header::SIZE;
        std::io::Read::read_exact(&mut self.media, &mut block[body_start..])?;

        let channels = header.n_channels() as usize;
        let mut out = vec![0i32; header.n_samples() as usize * channels];
        let n_samples = self.kernel.decode_block(&block, &mut out)?;
        out.truncate(n_samples);
        self.pending.extend_from_slice(&out);
        Ok(true)
    }

    fn fill_pending(&mut self, min_frames: usize) -> Result<()> {
        let channels = self.format.channels as usize;
        while (self.pending.len() - self.pending_pos) / channels < min_frames {
            if !self.decode_next_block()? {
                break;
            }
        }
        Ok(())
    }
}

impl<M: MediaSource, K: WavPackDecoderKernel> Source for WavPackSource<M, K> {
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

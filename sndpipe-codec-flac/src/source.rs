// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The FLAC [`Source`] adapter (spec.md §4.3). Reads the `fLaC` magic and metadata block
//! chain up front (`STREAMINFO` plus `VORBIS_COMMENT` tags), buffers the remaining audio
//! payload, then decodes frames sequentially on demand.
//!
//! Embedded `CUESHEET` metadata blocks are skipped rather than parsed here; cue-sheet
//! arrangement is a separate concern (spec.md §4.11) left to the caller to wire up once it
//! has located the block.

use std::io::Read;

use log::warn;
use sndpipe_core::error::malformed;
use sndpipe_core::io::{BitReader, MediaSource};
use sndpipe_core::{ByteOrder, Encoding, Error, Metadata, Result, SeekErrorKind, Source, StreamFormat};

use crate::frame::{self, ChannelAssignment};
use crate::stream_info::{BlockType, MetadataBlockHeader, StreamInfo, FLAC_MAGIC};
use crate::subframe;

pub struct FlacSource {
    format: StreamFormat,
    stream_info: StreamInfo,
    audio: Vec<u8>,
    bit_pos: usize,
    metadata: Metadata,
    position: u64,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl FlacSource {
    pub fn try_new<M: MediaSource>(mut media: M) -> Result<FlacSource> {
        let mut magic = [0u8; 4];
        std::io::Read::read_exact(&mut media, &mut magic).map_err(|_| Error::ShortRead)?;
        if magic != FLAC_MAGIC {
            return malformed("flac: missing 'fLaC' magic");
        }

        let mut stream_info = None;
        let mut tags = sndpipe_core::Tags::new();

        loop {
            let header = MetadataBlockHeader::read(&mut media)?;
            match header.block_type {
                BlockType::StreamInfo => {
                    if header.len as usize != StreamInfo::SIZE {
                        return malformed("flac: STREAMINFO block has the wrong size");
                    }
                    stream_info = Some(StreamInfo::read(&mut media)?);
                }
                BlockType::VorbisComment => {
                    let body = sndpipe_core::io::ReadBytes::read_boxed_slice(&mut media, header.len as usize)?;
                    read_vorbis_comments(&body, &mut tags);
                }
                _ => {
                    sndpipe_core::io::ReadBytes::ignore_bytes(&mut media, header.len as u64)?;
                }
            }
            if header.is_last {
                break;
            }
        }

        let stream_info = stream_info.ok_or(Error::MalformedContainer("flac: missing STREAMINFO block"))?;

        let container_bits = ((stream_info.bits_per_sample + 7) / 8) * 8;
        let format = StreamFormat::new(
            stream_info.sample_rate,
            stream_info.channels,
            Encoding::SignedInt,
            stream_info.bits_per_sample,
            container_bits,
            ByteOrder::LittleEndian,
        )?;

        let mut audio = Vec::new();
        media.read_to_end(&mut audio).map_err(Error::Io)?;

        Ok(FlacSource {
            format,
            stream_info,
            audio,
            bit_pos: 0,
            metadata: Metadata { tags, chapters: Vec::new() },
            position: 0,
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn decode_next_frame(&mut self) -> Result<bool> {
        if self.bit_pos / 8 >= self.audio.len() {
            return Ok(false);
        }

        let total_bits = self.audio.len() * 8;
        let mut bits = BitReader::new(&self.audio);
        bits.advance(self.bit_pos as u32);

        let header = frame::read_frame_header(&mut bits, &self.stream_info)?;
        let n_channels = header.channel_assignment.n_channels() as usize;
        let block_size = header.block_size as usize;

        let mut channels: Vec<Vec<i32>> = Vec::with_capacity(n_channels);
        for ch in 0..n_channels {
            let bps = match header.channel_assignment {
                ChannelAssignment::LeftSide if ch == 1 => header.bits_per_sample + 1,
                ChannelAssignment::RightSide if ch == 0 => header.bits_per_sample + 1,
                ChannelAssignment::MidSide if ch == 1 => header.bits_per_sample + 1,
                _ => header.bits_per_sample,
            };
            let mut buf = vec![0i32; block_size];
            subframe::decode_subframe(&mut bits, bps, block_size, &mut buf)?;
            channels.push(buf);
        }

        match header.channel_assignment {
            ChannelAssignment::LeftSide => {
                let (left, side) = channels.split_at_mut(1);
                subframe::decorrelate_left_side(&left[0], &mut side[0]);
                // side now holds the true right channel.
            }
            ChannelAssignment::RightSide => {
                let (side, right) = channels.split_at_mut(1);
                subframe::decorrelate_right_side(&mut side[0], &right[0]);
                // side now holds the true left channel.
            }
            ChannelAssignment::MidSide => {
                let (mid, side) = channels.split_at_mut(1);
                subframe::decorrelate_mid_side(&mut mid[0], &mut side[0]);
            }
            ChannelAssignment::Independent(_) => {}
        }

        bits.byte_align();
        if bits.bits_left() < 16 {
            return Err(Error::ShortRead);
        }
        bits.advance(16); // frame footer CRC-16, unchecked

        self.bit_pos = total_bits - bits.bits_left();

        self.pending.reserve(block_size * n_channels);
        for frame_idx in 0..block_size {
            for channel in &channels {
                self.pending.push(channel[frame_idx]);
            }
        }
        Ok(true)
    }

    fn fill_pending(&mut self, min_frames: usize) -> Result<()> {
        let channels = self.format.channels as usize;
        while (self.pending.len() - self.pending_pos) / channels < min_frames {
            if !self.decode_next_frame()? {
                break;
            }
        }
        Ok(())
    }
}

fn read_vorbis_comments(body: &[u8], tags: &mut sndpipe_core::Tags) {
    let Some(comments) = parse_vorbis_comments(body) else {
        warn!("flac: malformed VORBIS_COMMENT block, ignoring tags");
        return;
    };
    for entry in comments {
        sndpipe_metadata::vorbis::parse_comment_into(&entry, tags);
    }
}

fn parse_vorbis_comments(body: &[u8]) -> Option<Vec<String>> {
    let mut pos = 0usize;
    let read_u32 = |body: &[u8], pos: &mut usize| -> Option<u32> {
        let bytes: [u8; 4] = body.get(*pos..*pos + 4)?.try_into().ok()?;
        *pos += 4;
        Some(u32::from_le_bytes(bytes))
    };

    let vendor_len = read_u32(body, &mut pos)? as usize;
    pos += vendor_len;
    let count = read_u32(body, &mut pos)?;

    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_u32(body, &mut pos)? as usize;
        let slice = body.get(pos..pos + len)?;
        pos += len;
        out.push(String::from_utf8_lossy(slice).into_owned());
    }
    Some(out)
}

impl Source for FlacSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        self.stream_info.total_samples
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_bytes = self.format.frame_bytes();
        let channels = self.format.channels as usize;
        let container_bytes = self.format.container_bytes_per_sample();
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
            buf[i * container_bytes..(i + 1) * container_bytes].copy_from_slice(&bytes[..container_bytes]);
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

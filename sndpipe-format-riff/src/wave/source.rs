// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WAV/RF64 [`Source`] adapter (spec.md §4.3, §4.1). Parses the RIFF/RF64 top-level
//! chunk list up to and including `data`, folding any `LIST/INFO` sub-chunks into tags and
//! preferring a `ds64` chunk's 64-bit sizes over the 32-bit ones in `data` when present.
//!
//! Samples are handed upstream exactly as they sit in the container: 8-bit PCM stays
//! unsigned, everything else stays signed or float. Re-centring unsigned samples around
//! zero is float-staging's job (spec.md §4.2), not this adapter's.

use std::io::SeekFrom;

use log::warn;
use sndpipe_core::error::malformed;
use sndpipe_core::io::{MediaSource, ReadBytes};
use sndpipe_core::{ChannelMask, Error, Metadata, Result, SeekErrorKind, Source, StreamFormat};

use crate::chunk::{self, Ds64};
use crate::wave::format::{self, WaveFormat};

pub struct WavSource<M: MediaSource> {
    media: M,
    format: StreamFormat,
    #[allow(dead_code)] // carried for callers that want the explicit layout; not consulted internally.
    channel_mask: Option<ChannelMask>,
    data_start: u64,
    length_frames: Option<u64>,
    position: u64,
    metadata: Metadata,
}

impl<M: MediaSource> WavSource<M> {
    /// Parse `media` as a WAV or RF64 file. `ignore_length` mirrors the edge's
    /// `--ignore-length` flag (spec.md §4.3): a declared `data` size is disregarded in
    /// favor of reading until the stream ends.
    pub fn try_new(mut media: M, ignore_length: bool) -> Result<WavSource<M>> {
        let marker = media.read_quad_bytes()?;
        let is_rf64 = match &marker {
            b"RIFF" => false,
            b"RF64" => true,
            _ => return malformed("wav: not a RIFF or RF64 file"),
        };
        let _riff_size = media.read_u32le()?;
        let form = media.read_quad_bytes()?;
        if &form != b"WAVE" {
            return malformed("wav: missing WAVE form type");
        }

        let mut ds64: Option<Ds64> = None;
        let mut wave_format: Option<WaveFormat> = None;
        let mut tags = sndpipe_core::Tags::new();
        let mut first_chunk = true;

        let data_len_declared = loop {
            let header = chunk::read_header(&mut media)?;
            if is_rf64 && first_chunk && &header.id != b"ds64" {
                warn!("wav: RF64 file does not open with a ds64 chunk");
            }
            first_chunk = false;

            match &header.id {
                b"ds64" => {
                    ds64 = Some(Ds64::parse(&mut media, header.len)?);
                }
                b"fmt " => {
                    let body = media.read_boxed_slice(header.len as usize)?;
                    if header.len & 1 != 0 {
                        media.ignore_bytes(1)?;
                    }
                    wave_format = Some(format::parse(&body, header.len)?);
                }
                b"LIST" => {
                    if header.len < 4 {
                        return malformed("wav: LIST chunk too small to hold a form type");
                    }
                    let list_type = media.read_quad_bytes()?;
                    let remaining = header.len - 4;
                    if &list_type == b"INFO" {
                        read_info_chunks(&mut media, remaining, &mut tags)?;
                        if remaining & 1 != 0 {
                            media.ignore_bytes(1)?;
                        }
                    } else {
                        chunk::skip_padded(&mut media, remaining)?;
                    }
                }
                b"data" => {
                    if wave_format.is_none() {
                        return malformed("wav: data chunk precedes fmt chunk");
                    }
                    break header.len;
                }
                _ => {
                    chunk::skip_padded(&mut media, header.len)?;
                }
            }
        };
        let data_start = pos_after_header(&mut media)?;

        let WaveFormat { stream_format, channel_mask } =
            wave_format.ok_or(Error::MalformedContainer("wav: missing fmt chunk"))?;

        let data_len = if is_rf64 {
            match ds64 {
                Some(d) => d.data_size,
                None => u64::from(data_len_declared),
            }
        } else {
            u64::from(data_len_declared)
        };

        let frame_bytes = stream_format.frame_bytes() as u64;
        let length_frames = if ignore_length || data_len == 0 || data_len % frame_bytes != 0 {
            None
        } else {
            Some(data_len / frame_bytes)
        };

        Ok(WavSource {
            media,
            format: stream_format,
            channel_mask,
            data_start,
            length_frames,
            position: 0,
            metadata: Metadata { tags, chapters: Vec::new() },
        })
    }
}

/// The stream position is already sitting right after the `data` chunk's header (8 bytes)
/// once the loop above breaks, since no bytes of the payload were consumed.
fn pos_after_header<M: MediaSource>(media: &mut M) -> Result<u64> {
    use std::io::Seek;
    Ok(media.stream_position()?)
}

fn read_info_chunks<M: MediaSource>(
    media: &mut M,
    mut remaining: u32,
    tags: &mut sndpipe_core::Tags,
) -> Result<()> {
    while remaining >= 8 {
        let header = chunk::read_header(media)?;
        remaining -= 8;
        let len = header.len.min(remaining);
        let buf = media.read_boxed_slice(len as usize)?;
        if header.len & 1 != 0 && header.len <= remaining {
            media.ignore_bytes(1)?;
            remaining -= 1;
        }
        remaining -= len;
        sndpipe_metadata::riff::parse_into(header.id, &buf, tags);
    }
    if remaining > 0 {
        media.ignore_bytes(u64::from(remaining))?;
    }
    Ok(())
}

impl<M: MediaSource> Source for WavSource<M> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        self.length_frames
    }

    fn is_seekable(&self) -> bool {
        self.media.is_seekable()
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_bytes = self.format.frame_bytes();
        let mut want_frames = buf.len() / frame_bytes;
        if let Some(len) = self.length_frames {
            let remaining = len.saturating_sub(self.position);
            want_frames = want_frames.min(remaining as usize);
        }
        if want_frames == 0 {
            return Ok(0);
        }

        let want_bytes = want_frames * frame_bytes;
        let mut read = 0usize;
        while read < want_bytes {
            let n = std::io::Read::read(&mut self.media, &mut buf[read..want_bytes])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        let frames = read / frame_bytes;
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        if self.media.is_seekable() {
            let byte_pos = self.data_start + frame_pos * self.format.frame_bytes() as u64;
            self.media.seek(SeekFrom::Start(byte_pos))?;
            self.position = frame_pos;
            Ok(())
        } else if frame_pos >= self.position {
            let frame_bytes = self.format.frame_bytes() as u64;
            let skip = (frame_pos - self.position) * frame_bytes;
            self.media.ignore_bytes(skip)?;
            self.position = frame_pos;
            Ok(())
        } else {
            Err(Error::SeekUnsupported(SeekErrorKind::Unseekable))
        }
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_pcm_wav(channels: u16, rate: u32, bits: u16, samples: &[i16]) -> Vec<u8> {
        let block_align = channels * (bits / 8);
        let mut fmt_body = Vec::new();
        fmt_body.extend_from_slice(&1u16.to_le_bytes());
        fmt_body.extend_from_slice(&channels.to_le_bytes());
        fmt_body.extend_from_slice(&rate.to_le_bytes());
        fmt_body.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        fmt_body.extend_from_slice(&block_align.to_le_bytes());
        fmt_body.extend_from_slice(&bits.to_le_bytes());

        let mut data_body = Vec::new();
        for s in samples {
            data_body.extend_from_slice(&s.to_le_bytes());
        }

        let mut riff = Vec::new();
        riff.extend_from_slice(b"WAVE");
        riff.extend_from_slice(b"fmt ");
        riff.extend_from_slice(&(fmt_body.len() as u32).to_le_bytes());
        riff.extend_from_slice(&fmt_body);
        riff.extend_from_slice(b"data");
        riff.extend_from_slice(&(data_body.len() as u32).to_le_bytes());
        riff.extend_from_slice(&data_body);

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(riff.len() as u32).to_le_bytes());
        out.extend_from_slice(&riff);
        out
    }

    #[test]
    fn reads_pcm16_stereo_frames() {
        let bytes = build_pcm_wav(2, 44_100, 16, &[1, 2, 3, 4, 5, 6]);
        let mut src = WavSource::try_new(Cursor::new(bytes), false).unwrap();
        assert_eq!(src.length(), Some(3));
        let mut buf = [0u8; 12];
        let n = src.read_frames(&mut buf).unwrap();
        assert_eq!(n, 3);
        let mut eof = [0u8; 4];
        assert_eq!(src.read_frames(&mut eof).unwrap(), 0);
    }

    #[test]
    fn seek_then_read_lands_on_the_right_frame() {
        let bytes = build_pcm_wav(1, 8_000, 16, &[10, 20, 30, 40]);
        let mut src = WavSource::try_new(Cursor::new(bytes), false).unwrap();
        src.seek(2).unwrap();
        let mut buf = [0u8; 2];
        src.read_frames(&mut buf).unwrap();
        assert_eq!(i16::from_le_bytes(buf), 30);
    }

    #[test]
    fn list_info_tags_are_surfaced() {
        let mut info_body = Vec::new();
        info_body.extend_from_slice(b"INAM");
        info_body.extend_from_slice(&6u32.to_le_bytes());
        info_body.extend_from_slice(b"Title\0");

        let mut riff = Vec::new();
        riff.extend_from_slice(b"WAVE");
        let fmt_body = {
            let mut v = Vec::new();
            v.extend_from_slice(&1u16.to_le_bytes());
            v.extend_from_slice(&1u16.to_le_bytes());
            v.extend_from_slice(&8_000u32.to_le_bytes());
            v.extend_from_slice(&16_000u32.to_le_bytes());
            v.extend_from_slice(&2u16.to_le_bytes());
            v.extend_from_slice(&16u16.to_le_bytes());
            v
        };
        riff.extend_from_slice(b"fmt ");
        riff.extend_from_slice(&(fmt_body.len() as u32).to_le_bytes());
        riff.extend_from_slice(&fmt_body);
        riff.extend_from_slice(b"LIST");
        riff.extend_from_slice(&(4 + info_body.len() as u32).to_le_bytes());
        riff.extend_from_slice(b"INFO");
        riff.extend_from_slice(&info_body);
        riff.extend_from_slice(b"data");
        riff.extend_from_slice(&4u32.to_le_bytes());
        riff.extend_from_slice(&[0u8; 4]);

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(riff.len() as u32).to_le_bytes());
        out.extend_from_slice(&riff);

        let src = WavSource::try_new(Cursor::new(out), false).unwrap();
        assert_eq!(src.metadata().tags.get("title").map(String::as_str), Some("Title"));
    }
}

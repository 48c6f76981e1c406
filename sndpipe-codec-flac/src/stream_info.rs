// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The mandatory `STREAMINFO` metadata block (spec.md §4.3 "FLAC (native + Ogg)") and the
//! metadata block header that precedes every block, including it.

use sndpipe_core::error::malformed;
use sndpipe_core::io::{BitReader, ReadBytes};
use sndpipe_core::Result;

pub const FLAC_MAGIC: [u8; 4] = *b"fLaC";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    Cuesheet,
    Picture,
    Unknown(u8),
}

pub struct MetadataBlockHeader {
    pub is_last: bool,
    pub block_type: BlockType,
    pub len: u32,
}

impl MetadataBlockHeader {
    pub fn read<R: ReadBytes>(r: &mut R) -> Result<MetadataBlockHeader> {
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf)?;
        let is_last = buf[0] & 0x80 != 0;
        let block_type = match buf[0] & 0x7F {
            0 => BlockType::StreamInfo,
            1 => BlockType::Padding,
            2 => BlockType::Application,
            3 => BlockType::SeekTable,
            4 => BlockType::VorbisComment,
            5 => BlockType::Cuesheet,
            6 => BlockType::Picture,
            other => BlockType::Unknown(other),
        };
        let len = u32::from_be_bytes([0, buf[1], buf[2], buf[3]]);
        Ok(MetadataBlockHeader { is_last, block_type, len })
    }
}

#[derive(Clone, Debug)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u32,
    pub total_samples: Option<u64>,
    pub md5: [u8; 16],
}

impl StreamInfo {
    pub const SIZE: usize = 34;

    pub fn read<R: ReadBytes>(r: &mut R) -> Result<StreamInfo> {
        let min_block_size = r.read_u16be()?;
        let max_block_size = r.read_u16be()?;
        if min_block_size < 16 || max_block_size < min_block_size {
            return malformed("flac: invalid STREAMINFO block size range");
        }

        let mut frame_size = [0u8; 6];
        r.read_exact(&mut frame_size)?;
        let min_frame_size = u32::from_be_bytes([0, frame_size[0], frame_size[1], frame_size[2]]);
        let max_frame_size = u32::from_be_bytes([0, frame_size[3], frame_size[4], frame_size[5]]);

        let mut packed = [0u8; 8];
        r.read_exact(&mut packed)?;
        let mut bits = BitReader::new(&packed);
        let sample_rate = bits.get(20)?;
        let channels = bits.get(3)? as u8 + 1;
        let bits_per_sample = bits.get(5)? + 1;
        let total_hi = bits.get(4)? as u64;
        let total_lo = bits.get(32)? as u64;
        let total_samples_raw = (total_hi << 32) | total_lo;

        let mut md5 = [0u8; 16];
        r.read_exact(&mut md5)?;

        if !(1..=655_350).contains(&sample_rate) {
            return malformed("flac: STREAMINFO sample rate out of range");
        }
        if !(4..=32).contains(&bits_per_sample) {
            return malformed("flac: STREAMINFO bits per sample out of range");
        }

        Ok(StreamInfo {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples: if total_samples_raw == 0 { None } else { Some(total_samples_raw) },
            md5,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build(sample_rate: u32, channels: u8, bits_per_sample: u32, total_samples: u64) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&4096u16.to_be_bytes());
        v.extend_from_slice(&4096u16.to_be_bytes());
        v.extend_from_slice(&[0, 0, 16]); // min_frame_size
        v.extend_from_slice(&[0, 1, 0]); // max_frame_size
        let mut bits = sndpipe_core::io::BitWriter::new();
        bits.put(sample_rate, 20);
        bits.put((channels - 1) as u32, 3);
        bits.put(bits_per_sample - 1, 5);
        bits.put((total_samples >> 32) as u32, 4);
        bits.put((total_samples & 0xFFFF_FFFF) as u32, 32);
        v.extend_from_slice(&bits.into_bytes());
        v.extend_from_slice(&[0u8; 16]);
        v
    }

    #[test]
    fn parses_44100_stereo_16bit() {
        let bytes = build(44_100, 2, 16, 123_456);
        let info = StreamInfo::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.total_samples, Some(123_456));
    }

    #[test]
    fn zero_total_samples_is_unknown() {
        let bytes = build(48_000, 1, 24, 0);
        let info = StreamInfo::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(info.total_samples, None);
    }
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FLAC frame header parsing (spec.md §4.3). Frames are read sequentially for complete,
//! well-formed files (spec.md §1 "reads complete valid files start to finish"): this
//! reader syncs on the 14-bit frame marker, parses the header fields, and leaves the
//! fragment-resync machinery a streaming/corruption-tolerant demuxer would need out of
//! scope.

use sndpipe_core::error::{malformed, unsupported};
use sndpipe_core::io::BitReader;
use sndpipe_core::Result;

use crate::bitutil::read_utf8_coded_number;
use crate::stream_info::StreamInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelAssignment {
    Independent(u8),
    LeftSide,
    RightSide,
    MidSide,
}

impl ChannelAssignment {
    pub fn n_channels(&self) -> u8 {
        match self {
            ChannelAssignment::Independent(n) => *n,
            _ => 2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FrameHeader {
    pub block_size: u32,
    pub sample_rate: u32,
    pub channel_assignment: ChannelAssignment,
    pub bits_per_sample: u32,
}

pub fn read_frame_header(bits: &mut BitReader<'_>, stream_info: &StreamInfo) -> Result<FrameHeader> {
    let sync_and_strategy = bits.get(16)?;
    if sync_and_strategy & 0xFFFC != 0xFFF8 {
        return malformed("flac: frame does not start with the sync code");
    }

    let block_size_enc = bits.get(4)?;
    let sample_rate_enc = bits.get(4)?;
    let channels_enc = bits.get(4)?;
    let bits_per_sample_enc = bits.get(3)?;
    if bits.get(1)? != 0 {
        return malformed("flac: frame header reserved bit is set");
    }

    let _number = read_utf8_coded_number(bits)?;

    let block_size = match block_size_enc {
        0x1 => 192,
        0x2..=0x5 => 576u32 << (block_size_enc - 2),
        0x6 => bits.get(8)? + 1,
        0x7 => bits.get(16)? + 1,
        0x8..=0xF => 256u32 << (block_size_enc - 8),
        _ => return unsupported("flac: reserved block size code"),
    };

    let sample_rate = match sample_rate_enc {
        0x0 => stream_info.sample_rate,
        0x1 => 88_200,
        0x2 => 176_400,
        0x3 => 192_000,
        0x4 => 8_000,
        0x5 => 16_000,
        0x6 => 22_050,
        0x7 => 24_000,
        0x8 => 32_000,
        0x9 => 44_100,
        0xA => 48_000,
        0xB => 96_000,
        0xC => bits.get(8)? * 1_000,
        0xD => bits.get(16)?,
        0xE => bits.get(16)? * 10,
        _ => return unsupported("flac: reserved sample rate code"),
    };

    let channel_assignment = match channels_enc {
        0x0..=0x7 => ChannelAssignment::Independent(channels_enc as u8 + 1),
        0x8 => ChannelAssignment::LeftSide,
        0x9 => ChannelAssignment::RightSide,
        0xA => ChannelAssignment::MidSide,
        _ => return unsupported("flac: reserved channel assignment code"),
    };

    let bits_per_sample = match bits_per_sample_enc {
        0x0 => stream_info.bits_per_sample,
        0x1 => 8,
        0x2 => 12,
        0x4 => 16,
        0x5 => 20,
        0x6 => 24,
        _ => return unsupported("flac: reserved bits-per-sample code"),
    };

    let _crc8 = bits.get(8)?;

    Ok(FrameHeader { block_size, sample_rate, channel_assignment, bits_per_sample })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sndpipe_core::io::BitWriter;

    fn stream_info() -> StreamInfo {
        StreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
            total_samples: None,
            md5: [0; 16],
        }
    }

    fn build_header(block_size_enc: u32, sample_rate_enc: u32, channels_enc: u32, bps_enc: u32) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.put(0xFFF8, 16);
        w.put(block_size_enc, 4);
        w.put(sample_rate_enc, 4);
        w.put(channels_enc, 4);
        w.put(bps_enc, 3);
        w.put(0, 1); // reserved
        w.put(0x00, 8); // frame number 0
        w.put(0xAB, 8); // crc8 (unchecked)
        w.into_bytes()
    }

    #[test]
    fn parses_fixed_blocksize_header() {
        let bytes = build_header(0x8, 0x9, 0x1, 0x4); // 256 samples, 44100, stereo LR, 16-bit
        let mut bits = BitReader::new(&bytes);
        let header = read_frame_header(&mut bits, &stream_info()).unwrap();
        assert_eq!(header.block_size, 256);
        assert_eq!(header.sample_rate, 44_100);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.channel_assignment, ChannelAssignment::Independent(2));
    }

    #[test]
    fn falls_back_to_stream_info_for_implicit_fields() {
        let bytes = build_header(0x8, 0x0, 0x0, 0x0);
        let mut bits = BitReader::new(&bytes);
        let header = read_frame_header(&mut bits, &stream_info()).unwrap();
        assert_eq!(header.sample_rate, 44_100);
        assert_eq!(header.bits_per_sample, 16);
    }

    #[test]
    fn rejects_bad_sync_code() {
        let mut bytes = build_header(0x8, 0x9, 0x1, 0x4);
        bytes[0] = 0x00;
        let mut bits = BitReader::new(&bytes);
        assert!(read_frame_header(&mut bits, &stream_info()).is_err());
    }
}

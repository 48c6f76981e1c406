// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WAVE `fmt ` chunk: `WAVE_FORMAT_PCM`, `WAVE_FORMAT_IEEE_FLOAT`, and
//! `WAVE_FORMAT_EXTENSIBLE` (spec.md §4.3 "WAV via WAVEFORMATEXTENSIBLE"). ADPCM, A-law
//! and mu-law tags are rejected: `sndpipe_core::Encoding` has no representation for
//! companded or predictive encodings, and nothing in this pipeline decodes them.

use sndpipe_core::error::{malformed, unsupported};
use sndpipe_core::io::ReadBytes;
use sndpipe_core::{ByteOrder, ChannelMask, Encoding, Result, StreamFormat};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

// KSDATAFORMAT_SUBTYPE_PCM / _IEEE_FLOAT, little-endian GUID byte layout. The two differ
// only in the first `Data1` byte (1 vs 3); the rest is the standard media subtype suffix.
const SUBTYPE_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];
const SUBTYPE_IEEE_FLOAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];

/// The decoded `fmt ` chunk: the resulting [`StreamFormat`] plus an explicit channel
/// mask, present only when the chunk used `WAVE_FORMAT_EXTENSIBLE`.
pub struct WaveFormat {
    pub stream_format: StreamFormat,
    pub channel_mask: Option<ChannelMask>,
}

/// Parse a `fmt ` chunk body of `len` declared bytes from `buf` (already read in full,
/// including any trailing padding byte).
pub fn parse(buf: &[u8], len: u32) -> Result<WaveFormat> {
    if len < 16 || (buf.len() as u32) < len {
        return malformed("wav: fmt chunk too small");
    }
    let mut r = buf;

    let format_tag = r.read_u16le()?;
    if format_tag != WAVE_FORMAT_PCM
        && format_tag != WAVE_FORMAT_IEEE_FLOAT
        && format_tag != WAVE_FORMAT_EXTENSIBLE
    {
        return unsupported("wav: unsupported fmt tag (only PCM, IEEE float, extensible)");
    }

    let channels = r.read_u16le()?;
    let sample_rate = r.read_u32le()?;
    let avg_bytes_per_sec = r.read_u32le()?;
    let block_align = r.read_u16le()?;
    let bits_per_sample = r.read_u16le()?;

    if channels == 0 || sample_rate == 0 || avg_bytes_per_sec == 0 || block_align == 0 {
        return malformed("wav: fmt chunk has a zero-valued field");
    }
    if bits_per_sample == 0 || bits_per_sample % 8 != 0 {
        return malformed("wav: bits per sample must be a non-zero multiple of 8");
    }
    if u32::from(block_align) != u32::from(channels) * u32::from(bits_per_sample) / 8 {
        return malformed("wav: block align does not match channels * bits per sample");
    }
    if channels > 8 {
        return unsupported("wav: more than 8 channels");
    }

    let mut encoding = if format_tag == WAVE_FORMAT_IEEE_FLOAT {
        Encoding::Float
    } else if bits_per_sample == 8 {
        Encoding::UnsignedInt
    } else {
        Encoding::SignedInt
    };

    let mut valid_bits = u32::from(bits_per_sample);
    let mut channel_mask = None;

    if format_tag == WAVE_FORMAT_EXTENSIBLE {
        if len < 40 {
            return malformed("wav: extensible fmt chunk too small");
        }
        let _cb_size = r.read_u16le()?;
        let wvalid = r.read_u16le()?;
        let mask_bits = r.read_u32le()?;
        let mut guid = [0u8; 16];
        r.read_exact(&mut guid)?;

        if guid == SUBTYPE_IEEE_FLOAT {
            encoding = Encoding::Float;
        } else if guid == SUBTYPE_PCM {
            encoding = if bits_per_sample == 8 { Encoding::UnsignedInt } else { Encoding::SignedInt };
        } else {
            return unsupported("wav: extensible sub-format is not PCM or IEEE float");
        }

        if wvalid == 0 || u32::from(wvalid) > u32::from(bits_per_sample) {
            return malformed("wav: invalid valid-bits-per-sample");
        }
        valid_bits = u32::from(wvalid);

        if mask_bits != 0 {
            channel_mask = Some(ChannelMask::from_bits_truncate(mask_bits));
        }
    }

    let stream_format = StreamFormat::new(
        sample_rate,
        channels as u8,
        encoding,
        valid_bits,
        u32::from(bits_per_sample),
        ByteOrder::LittleEndian,
    )?;

    Ok(WaveFormat { stream_format, channel_mask })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm16_body(channels: u16, rate: u32) -> Vec<u8> {
        let block_align = channels * 2;
        let mut v = Vec::new();
        v.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        v.extend_from_slice(&channels.to_le_bytes());
        v.extend_from_slice(&rate.to_le_bytes());
        v.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        v.extend_from_slice(&block_align.to_le_bytes());
        v.extend_from_slice(&16u16.to_le_bytes());
        v
    }

    #[test]
    fn parses_plain_pcm16_stereo() {
        let body = pcm16_body(2, 44_100);
        let fmt = parse(&body, 16).unwrap();
        assert_eq!(fmt.stream_format.channels, 2);
        assert_eq!(fmt.stream_format.bits_per_sample, 16);
        assert_eq!(fmt.stream_format.encoding, Encoding::SignedInt);
        assert!(fmt.channel_mask.is_none());
    }

    #[test]
    fn eight_bit_pcm_is_unsigned() {
        let mut v = Vec::new();
        v.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&8_000u32.to_le_bytes());
        v.extend_from_slice(&8_000u32.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&8u16.to_le_bytes());
        let fmt = parse(&v, 16).unwrap();
        assert_eq!(fmt.stream_format.encoding, Encoding::UnsignedInt);
    }

    #[test]
    fn extensible_float_surfaces_channel_mask() {
        let mut v = Vec::new();
        v.extend_from_slice(&WAVE_FORMAT_EXTENSIBLE.to_le_bytes());
        v.extend_from_slice(&6u16.to_le_bytes());
        v.extend_from_slice(&48_000u32.to_le_bytes());
        v.extend_from_slice(&(48_000u32 * 24).to_le_bytes());
        v.extend_from_slice(&24u16.to_le_bytes());
        v.extend_from_slice(&32u16.to_le_bytes());
        v.extend_from_slice(&22u16.to_le_bytes());
        v.extend_from_slice(&32u16.to_le_bytes());
        v.extend_from_slice(&0x3fu32.to_le_bytes());
        v.extend_from_slice(&SUBTYPE_IEEE_FLOAT);
        let fmt = parse(&v, 40).unwrap();
        assert_eq!(fmt.stream_format.encoding, Encoding::Float);
        assert_eq!(fmt.channel_mask.unwrap().bits(), 0x3f);
    }

    #[test]
    fn rejects_adpcm_tag() {
        let mut v = Vec::new();
        v.extend_from_slice(&0x0002u16.to_le_bytes());
        v.extend_from_slice(&[0u8; 14]);
        assert!(parse(&v, 16).is_err());
    }
}

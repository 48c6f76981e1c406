// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `AudioSpecificConfig` parse and ADTS header emission (spec.md §4.13).

use sndpipe_core::error::malformed;
use sndpipe_core::io::bit::{BitReader, BitWriter};
use sndpipe_core::Result;

pub const AAC_SAMPLE_RATES: [u32; 16] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350, 0, 0, 0,
];

/// A parsed `AudioSpecificConfig` (ISO/IEC 14496-3 §1.6.2.1). `raw` is the config exactly
/// as given, reused verbatim when building the `esds` descriptor tree.
#[derive(Clone, Debug)]
pub struct AudioSpecificConfig {
    pub object_type: u8,
    pub sampling_rate_index: u8,
    pub sampling_rate: u32,
    pub channel_config: u8,
    /// Raw bytes of an embedded program-config element, present only when
    /// `channel_config == 0`. Copied verbatim into every ADTS frame header per spec.md §4.13.
    pub pce: Vec<u8>,
    pub raw: Vec<u8>,
}

impl AudioSpecificConfig {
    pub fn parse(raw: &[u8]) -> Result<AudioSpecificConfig> {
        if raw.len() < 2 {
            return malformed("aac: AudioSpecificConfig is too short");
        }
        let mut bits = BitReader::new(raw);
        let object_type = bits.get(5)? as u8;
        let sampling_rate_index = bits.get(4)? as u8;
        let sampling_rate = if sampling_rate_index == 0xf {
            bits.get(24)?
        } else {
            AAC_SAMPLE_RATES[sampling_rate_index as usize]
        };
        let channel_config = bits.get(4)? as u8;

        let pce = if channel_config == 0 {
            // The PCE starts at the current (non-byte-aligned) bit position and runs to the
            // end of the buffer; it is opaque to this muxer, so it is copied bit-for-bit.
            let mut writer = BitWriter::new();
            writer.copy(&mut bits, bits.bits_left() as u32)?;
            writer.into_bytes()
        } else {
            Vec::new()
        };

        Ok(AudioSpecificConfig {
            object_type,
            sampling_rate_index,
            sampling_rate,
            channel_config,
            pce,
            raw: raw.to_vec(),
        })
    }
}

/// Emit a 7-byte ADTS header for one AAC raw-data-block, followed by `pce` bytes if the
/// config carries an embedded program-config element (spec.md §4.13).
pub fn write_adts_header(asc: &AudioSpecificConfig, payload_len: usize) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.put(0xfff, 12); // syncword
    w.put(0, 1); // MPEG-4
    w.put(0, 2); // layer
    w.put(1, 1); // no CRC
    w.put((asc.object_type.saturating_sub(1)) as u32, 2); // profile
    w.put(asc.sampling_rate_index as u32, 4);
    w.put(0, 1); // private bit
    w.put(asc.channel_config as u32, 3);
    w.put(0, 4); // originality/home/copyright id/copyright start
    let frame_length = 7 + asc.pce.len() + payload_len;
    w.put(frame_length as u32, 13);
    w.put(0x7ff, 11); // buffer fullness (VBR)
    w.put(0, 2); // number of raw data blocks in frame, minus one
    let mut header = w.into_bytes();
    header.extend_from_slice(&asc.pce);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_asc(object_type: u8, rate_index: u8, channels: u8) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.put(object_type as u32, 5);
        w.put(rate_index as u32, 4);
        w.put(channels as u32, 4);
        w.into_bytes()
    }

    #[test]
    fn parses_lc_stereo_config() {
        let raw = build_asc(2, 4, 2); // LC, 44100, stereo
        let asc = AudioSpecificConfig::parse(&raw).unwrap();
        assert_eq!(asc.object_type, 2);
        assert_eq!(asc.sampling_rate, 44_100);
        assert_eq!(asc.channel_config, 2);
        assert!(asc.pce.is_empty());
    }

    #[test]
    fn adts_header_has_syncword_and_frame_length() {
        let raw = build_asc(2, 3, 2); // 48000
        let asc = AudioSpecificConfig::parse(&raw).unwrap();
        let header = write_adts_header(&asc, 100);
        assert_eq!(header.len(), 7);
        assert_eq!(header[0], 0xff);
        assert_eq!(header[1] & 0xf0, 0xf0);
        let frame_length = (((header[3] as u32) & 0x3) << 11)
            | ((header[4] as u32) << 3)
            | ((header[5] as u32) >> 5);
        assert_eq!(frame_length, 107);
    }
}

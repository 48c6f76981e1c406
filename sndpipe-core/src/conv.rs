// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Universal float staging (spec.md §4.2, C2). Every DSP stage that needs arithmetic
//! reads through [`read_as_float`] rather than handling the cross product of container
//! widths, byte orders, and signedness itself.

use crate::format::{ByteOrder, Encoding, StreamFormat};

/// Anti-denormal epsilon used when narrowing `f64` to `f32` (spec.md §4.2).
const ANTI_DENORMAL_EPS: f64 = 1e-30;

/// Load one sample's raw bytes (1-4 of them) as a 32-bit word left-justified to bit 31,
/// i.e. the sample's most-significant bit lands in bit 31 regardless of container width.
/// Sign-extending by arithmetic right shift after this step extends from the *top* byte,
/// which is what spec.md §4.2 requires for containers narrower than 32 bits.
fn load_left_justified(bytes: &[u8], order: ByteOrder) -> u32 {
    let native: u32 = match order {
        ByteOrder::LittleEndian => {
            let mut v: u32 = 0;
            for (i, b) in bytes.iter().enumerate() {
                v |= (*b as u32) << (8 * i);
            }
            v
        }
        ByteOrder::BigEndian => {
            let mut buf = [0u8; 4];
            buf[..bytes.len()].copy_from_slice(bytes);
            u32::from_be_bytes(buf) >> (8 * (4 - bytes.len()))
        }
    };
    native << (8 * (4 - bytes.len()))
}

/// Convert one interleaved frame's worth of raw container bytes into `out_channels`
/// `f32` samples in `[-1.0, 1.0)`, applying the rules of spec.md §4.2.
pub fn read_as_float(fmt: &StreamFormat, raw: &[u8], out: &mut [f32]) {
    let container_bytes = fmt.container_bytes_per_sample();
    debug_assert_eq!(out.len(), fmt.channels as usize);
    debug_assert!(raw.len() >= out.len() * container_bytes);

    let scale = (1u64 << (fmt.container_bits_per_sample - 1)) as f32;

    for (ch, sample_out) in out.iter_mut().enumerate() {
        let start = ch * container_bytes;
        let bytes = &raw[start..start + container_bytes];

        *sample_out = match fmt.encoding {
            Encoding::SignedInt => {
                let word = load_left_justified(bytes, fmt.byte_order);
                let signed = (word as i32) >> (32 - fmt.container_bits_per_sample);
                signed as f32 / scale
            }
            Encoding::UnsignedInt => {
                let word = load_left_justified(bytes, fmt.byte_order) ^ 0x8000_0000;
                let signed = (word as i32) >> (32 - fmt.container_bits_per_sample);
                signed as f32 / scale
            }
            Encoding::Float => match container_bytes {
                4 => {
                    let word = match fmt.byte_order {
                        ByteOrder::LittleEndian => {
                            u32::from_le_bytes(bytes.try_into().unwrap())
                        }
                        ByteOrder::BigEndian => u32::from_be_bytes(bytes.try_into().unwrap()),
                    };
                    f32::from_bits(word)
                }
                8 => {
                    let word = match fmt.byte_order {
                        ByteOrder::LittleEndian => {
                            u64::from_le_bytes(bytes.try_into().unwrap())
                        }
                        ByteOrder::BigEndian => u64::from_be_bytes(bytes.try_into().unwrap()),
                    };
                    let mut x = f64::from_bits(word);
                    // Anti-denormal conditioning before narrowing to f32 (spec.md §4.2).
                    x += ANTI_DENORMAL_EPS;
                    x -= ANTI_DENORMAL_EPS;
                    x as f32
                }
                _ => 0.0,
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(encoding: Encoding, bits: u32, container: u32, order: ByteOrder) -> StreamFormat {
        StreamFormat::new(44_100, 1, encoding, bits, container, order).unwrap()
    }

    #[test]
    fn s16_full_scale_round_trips_within_one_lsb() {
        let f = fmt(Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian);
        let raw = (i16::MAX).to_le_bytes();
        let mut out = [0.0f32];
        read_as_float(&f, &raw, &mut out);
        assert!((out[0] - 0.99997).abs() < 1e-4);
    }

    #[test]
    fn s16_negative_full_scale() {
        let f = fmt(Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian);
        let raw = (i16::MIN).to_le_bytes();
        let mut out = [0.0f32];
        read_as_float(&f, &raw, &mut out);
        assert!((out[0] - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn u8_midpoint_is_silence() {
        let f = fmt(Encoding::UnsignedInt, 8, 8, ByteOrder::LittleEndian);
        let raw = [128u8];
        let mut out = [0.0f32];
        read_as_float(&f, &raw, &mut out);
        assert!(out[0].abs() < 1e-6);
    }

    #[test]
    fn big_endian_s16_matches_little_endian_after_swap() {
        let le = fmt(Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian);
        let be = fmt(Encoding::SignedInt, 16, 16, ByteOrder::BigEndian);
        let value: i16 = -12345;
        let mut out_le = [0.0f32];
        let mut out_be = [0.0f32];
        read_as_float(&le, &value.to_le_bytes(), &mut out_le);
        read_as_float(&be, &value.to_be_bytes(), &mut out_be);
        assert_eq!(out_le[0], out_be[0]);
    }

    #[test]
    fn s24_natural_width_near_silence_for_integer_minus_one() {
        // 0xFFFFFF is integer -1 in 24-bit two's complement, i.e. barely below silence,
        // not full negative scale.
        let f = fmt(Encoding::SignedInt, 24, 24, ByteOrder::LittleEndian);
        let raw: [u8; 3] = [0xFF, 0xFF, 0xFF];
        let mut out = [0.0f32];
        read_as_float(&f, &raw, &mut out);
        assert!(out[0].abs() < 1e-6);
    }

    #[test]
    fn s24_high_aligned_in_32bit_container_full_negative_scale() {
        // Most-negative 24-bit sample (0x800000) shifted so its sign bit occupies the
        // container's MSB, as WavPack's high-aligned fields do (spec.md §4.3).
        let f = fmt(Encoding::SignedInt, 24, 32, ByteOrder::LittleEndian);
        let raw: [u8; 4] = [0x00, 0x00, 0x00, 0x80];
        let mut out = [0.0f32];
        read_as_float(&f, &raw, &mut out);
        assert!((out[0] - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn f64_anti_denormal_conditioning_keeps_zero_zero() {
        let f = fmt(Encoding::Float, 64, 64, ByteOrder::LittleEndian);
        let raw = 0.0f64.to_le_bytes();
        let mut out = [1.0f32];
        read_as_float(&f, &raw, &mut out);
        assert_eq!(out[0], 0.0);
    }
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subframe, residual, and predictor decoding (spec.md §4.3 "FLAC... decoding the
//! algorithm doesn't change under this spec"): constant/verbatim/fixed-predictor/LPC
//! subframe types, Rice-coded residuals, and the stereo decorrelation transforms.

use std::num::Wrapping;

use sndpipe_core::error::{malformed, unsupported};
use sndpipe_core::io::BitReader;
use sndpipe_core::Result;

use crate::bitutil::{read_unary, sign_extend};

/// Decode one subframe of `n_samples` at the given nominal bit depth into `out`.
pub fn decode_subframe(bits: &mut BitReader<'_>, bps: u32, n_samples: usize, out: &mut [i32]) -> Result<()> {
    if bits.get(1)? != 0 {
        return malformed("flac: subframe padding bit is set");
    }
    let type_code = bits.get(6)?;

    let has_wasted = bits.get(1)? != 0;
    let wasted_bits = if has_wasted { read_unary(bits)? + 1 } else { 0 };
    if wasted_bits >= bps {
        return malformed("flac: wasted bits consume the entire sample width");
    }
    let eff_bps = bps - wasted_bits;

    match type_code {
        0x00 => decode_constant(bits, eff_bps, out)?,
        0x01 => decode_verbatim(bits, eff_bps, out)?,
        0x08..=0x0F => {
            let order = (type_code - 0x08) as usize;
            if order > 4 {
                return unsupported("flac: reserved fixed predictor order");
            }
            decode_fixed_linear(bits, eff_bps, order, out)?;
        }
        0x20..=0x3F => {
            let order = (type_code - 0x20) as usize + 1;
            decode_linear(bits, eff_bps, order, out)?;
        }
        _ => return unsupported("flac: reserved subframe type"),
    }

    if wasted_bits > 0 {
        for sample in out.iter_mut().take(n_samples) {
            *sample <<= wasted_bits;
        }
    }
    Ok(())
}

fn decode_constant(bits: &mut BitReader<'_>, bps: u32, out: &mut [i32]) -> Result<()> {
    let value = sign_extend(bits.get(bps)?, bps);
    out.fill(value);
    Ok(())
}

fn decode_verbatim(bits: &mut BitReader<'_>, bps: u32, out: &mut [i32]) -> Result<()> {
    for sample in out.iter_mut() {
        *sample = sign_extend(bits.get(bps)?, bps);
    }
    Ok(())
}

fn decode_fixed_linear(bits: &mut BitReader<'_>, bps: u32, order: usize, out: &mut [i32]) -> Result<()> {
    for sample in out.iter_mut().take(order) {
        *sample = sign_extend(bits.get(bps)?, bps);
    }
    decode_residual(bits, order, out)?;
    fixed_predict(order, out);
    Ok(())
}

fn fixed_predict(order: usize, buf: &mut [i32]) {
    let w = |i: usize| Wrapping(buf[i] as i64);
    match order {
        0 => {}
        1 => {
            for i in 1..buf.len() {
                buf[i] = (w(i) + w(i - 1)).0 as i32;
            }
        }
        2 => {
            for i in 2..buf.len() {
                buf[i] = (w(i) + Wrapping(2) * w(i - 1) - w(i - 2)).0 as i32;
            }
        }
        3 => {
            for i in 3..buf.len() {
                buf[i] = (w(i) + Wrapping(3) * w(i - 1) - Wrapping(3) * w(i - 2) + w(i - 3)).0 as i32;
            }
        }
        4 => {
            for i in 4..buf.len() {
                buf[i] = (w(i) + Wrapping(4) * w(i - 1) - Wrapping(6) * w(i - 2) + Wrapping(4) * w(i - 3)
                    - w(i - 4))
                .0 as i32;
            }
        }
        _ => unreachable!("fixed predictor order is validated to be 0..=4"),
    }
}

fn decode_linear(bits: &mut BitReader<'_>, bps: u32, order: usize, out: &mut [i32]) -> Result<()> {
    for sample in out.iter_mut().take(order) {
        *sample = sign_extend(bits.get(bps)?, bps);
    }

    let qlp_precision = bits.get(4)? + 1;
    if qlp_precision > 15 {
        return unsupported("flac: reserved QLP precision");
    }
    let shift = sign_extend(bits.get(5)?, 5);
    if shift < 0 {
        return unsupported("flac: negative QLP shift is not supported");
    }

    let mut coeffs = vec![0i32; order];
    for coeff in coeffs.iter_mut() {
        *coeff = sign_extend(bits.get(qlp_precision)?, qlp_precision);
    }

    decode_residual(bits, order, out)?;
    lpc_predict(&coeffs, shift as u32, order, out);
    Ok(())
}

fn lpc_predict(coeffs: &[i32], shift: u32, order: usize, buf: &mut [i32]) {
    for i in order..buf.len() {
        let mut predicted: i64 = 0;
        for (j, coeff) in coeffs.iter().enumerate() {
            predicted += *coeff as i64 * buf[i - order + j] as i64;
        }
        buf[i] = buf[i].wrapping_add((predicted >> shift) as i32);
    }
}

/// Decode the residual for a subframe of `buf.len()` total samples, `n_warmup` of which
/// (the predictor's warm-up samples) already sit at the front of `buf` and are skipped.
fn decode_residual(bits: &mut BitReader<'_>, n_warmup: usize, buf: &mut [i32]) -> Result<()> {
    let method = bits.get(2)?;
    let param_bits = match method {
        0 => 4,
        1 => 5,
        _ => return unsupported("flac: reserved residual coding method"),
    };
    let partition_order = bits.get(4)?;
    let n_partitions = 1usize << partition_order;
    if buf.len() % n_partitions != 0 {
        return malformed("flac: partition count does not evenly divide the block");
    }
    let n_partition_samples = buf.len() / n_partitions;
    if n_partition_samples < n_warmup {
        return malformed("flac: first residual partition is smaller than the warm-up");
    }

    let mut offset = n_warmup;
    for p in 0..n_partitions {
        let count = if p == 0 { n_partition_samples - n_warmup } else { n_partition_samples };
        decode_rice_partition(bits, param_bits, count, &mut buf[offset..offset + count])?;
        offset += count;
    }
    Ok(())
}

fn decode_rice_partition(bits: &mut BitReader<'_>, param_bits: u32, count: usize, dest: &mut [i32]) -> Result<()> {
    let param = bits.get(param_bits)?;
    let escape = (1u32 << param_bits) - 1;
    if param == escape {
        let residual_bits = bits.get(5)?;
        for sample in dest.iter_mut() {
            *sample = if residual_bits == 0 { 0 } else { sign_extend(bits.get(residual_bits)?, residual_bits) };
        }
    } else {
        for sample in dest.iter_mut() {
            let quotient = read_unary(bits)?;
            let remainder = bits.get(param)?;
            let word = (quotient << param) | remainder;
            *sample = rice_signed_to_i32(word);
        }
    }
    Ok(())
}

fn rice_signed_to_i32(word: u32) -> i32 {
    let div2 = (word >> 1) as i32;
    let sign = -((word & 1) as i32);
    div2 ^ sign
}

pub fn decorrelate_left_side(left: &[i32], side: &mut [i32]) {
    for (l, s) in left.iter().zip(side.iter_mut()) {
        *s = l - *s;
    }
}

pub fn decorrelate_right_side(side: &mut [i32], right: &[i32]) {
    for (s, r) in side.iter_mut().zip(right.iter()) {
        *s += *r;
    }
}

pub fn decorrelate_mid_side(mid: &mut [i32], side: &mut [i32]) {
    for (m, s) in mid.iter_mut().zip(side.iter_mut()) {
        let mid_doubled = (*m << 1) | (*s & 1);
        let new_m = (mid_doubled + *s) >> 1;
        let new_s = (mid_doubled - *s) >> 1;
        *m = new_m;
        *s = new_s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sndpipe_core::io::BitWriter;

    #[test]
    fn rice_signed_round_trips_small_values() {
        assert_eq!(rice_signed_to_i32(0), 0);
        assert_eq!(rice_signed_to_i32(1), -1);
        assert_eq!(rice_signed_to_i32(2), 1);
        assert_eq!(rice_signed_to_i32(3), -2);
    }

    #[test]
    fn decodes_a_constant_subframe() {
        let mut w = BitWriter::new();
        w.put(0, 1); // padding
        w.put(0x00, 6); // constant
        w.put(0, 1); // no wasted bits
        w.put((-100i32 as u32) & 0xFFFF, 16);
        let bytes = w.into_bytes();
        let mut bits = BitReader::new(&bytes);
        let mut out = [0i32; 4];
        decode_subframe(&mut bits, 16, 4, &mut out).unwrap();
        assert_eq!(out, [-100, -100, -100, -100]);
    }

    #[test]
    fn decodes_a_verbatim_subframe() {
        let mut w = BitWriter::new();
        w.put(0, 1);
        w.put(0x01, 6); // verbatim
        w.put(0, 1);
        for v in [1i32, -2, 3] {
            w.put((v as u32) & 0xFFFF, 16);
        }
        let bytes = w.into_bytes();
        let mut bits = BitReader::new(&bytes);
        let mut out = [0i32; 3];
        decode_subframe(&mut bits, 16, 3, &mut out).unwrap();
        assert_eq!(out, [1, -2, 3]);
    }

    #[test]
    fn fixed_order_one_predicts_a_ramp() {
        // warm-up = 10, then all-zero residuals with order-1 prediction holds the value.
        let mut buf = [10, 0, 0, 0];
        fixed_predict(1, &mut buf);
        assert_eq!(buf, [10, 10, 10, 10]);
    }

    #[test]
    fn mid_side_decorrelation_reconstructs_left_right() {
        let left = [100i32, -50, 0];
        let right = [98i32, -40, 4];
        let mut mid: Vec<i32> = left.iter().zip(right.iter()).map(|(l, r)| (l + r) >> 1).collect();
        let mut side: Vec<i32> = left.iter().zip(right.iter()).map(|(l, r)| l - r).collect();
        decorrelate_mid_side(&mut mid, &mut side);
        assert_eq!(mid, left.to_vec());
        assert_eq!(side, right.to_vec());
    }

    #[test]
    fn left_side_then_right_side_are_inverse_views_of_the_same_data() {
        let left = [10i32, 20, 30];
        let mut side = [3i32, -5, 7]; // side = left - right
        let right: Vec<i32> = left.iter().zip(side.iter()).map(|(l, s)| l - s).collect();
        decorrelate_right_side(&mut side, &right);
        assert_eq!(side.to_vec(), left.to_vec());
    }
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WavPack decompression kernel boundary (spec.md §4.13A). Decoding a WavPack block's
//! entropy-coded bitstream is out of scope for this crate (spec.md §1): this trait is the
//! seam between the block-framing logic in [`crate::source`] and whatever decompressor the
//! caller wires in.

use sndpipe_core::Result;

/// Decodes the audio payload of one or more consecutive WavPack blocks.
pub trait WavPackDecoderKernel {
    /// Decode `block` (the complete raw bytes of a single WavPack block, header included)
    /// into `out`, an interleaved `i32` buffer sized for the block's frame count times its
    /// channel count. Returns the number of interleaved samples written (frames times
    /// channel count), not the frame count alone.
    fn decode_block(&mut self, block: &[u8], out: &mut [i32]) -> Result<usize>;
}

impl WavPackDecoderKernel for Box<dyn WavPackDecoderKernel> {
    fn decode_block(&mut self, block: &[u8], out: &mut [i32]) -> Result<usize> {
        (**self).decode_block(block, out)
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    /// A trivial kernel used by tests: treats the block body immediately following the
    /// 32-byte header as already being little-endian `i32` PCM, so the source adapter's
    /// framing and format logic can be exercised without a real WavPack decompressor.
    #[derive(Default)]
    pub struct FakePassthroughKernel;

    impl WavPackDecoderKernel for FakePassthroughKernel {
        fn decode_block(&mut self, block: &[u8], out: &mut [i32]) -> Result<usize> {
            let payload = &block[crate::header::Header::SIZE..];
            let mut n = 0;
            for (chunk, slot) in payload.chunks_exact(4).zip(out.iter_mut()) {
                *slot = i32::from_le_bytes(chunk.try_into().unwrap());
                n += 1;
            }
            Ok(n)
        }
    }
}

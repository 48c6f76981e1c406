// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The TAK decompression kernel boundary (spec.md §4.13A). Grounded on
//! `original_source/taksrc.h`, which treats the real decoder as a dynamically-loaded
//! library (`tak_deco_lib`) accessed only through `SSD_ReadAudio`/`SSD_GetStreamInfo`-style
//! calls that hold their own internal read cursor over the compressed stream. This trait
//! models that same shape: the kernel owns its position within the compressed audio
//! payload and [`crate::source::TakSource`] only ever hands it the undecoded remainder.

use sndpipe_core::Result;

/// Decodes TAK audio frames from a compressed byte stream the kernel tracks its own
/// position within.
pub trait TakDecoderKernel {
    /// Decode the next available frame(s) out of `remaining` (the entire undecoded
    /// compressed payload) into `out`, an interleaved `i32` buffer. Returns the number of
    /// interleaved samples written; `0` means the compressed stream is exhausted.
    fn decode_frame(&mut self, remaining: &[u8], out: &mut [i32]) -> Result<usize>;
}

impl TakDecoderKernel for Box<dyn TakDecoderKernel> {
    fn decode_frame(&mut self, remaining: &[u8], out: &mut [i32]) -> Result<usize> {
        (**self).decode_frame(remaining, out)
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    /// A trivial kernel used by tests: treats the entire compressed payload as already
    /// being little-endian `i32` PCM and decodes it in fixed-size chunks, advancing its own
    /// cursor, so the source adapter's framing and format logic can be exercised without a
    /// real TAK decompressor.
    #[derive(Default)]
    pub struct FakePassthroughKernel {
        cursor: usize,
    }

    impl TakDecoderKernel for FakePassthroughKernel {
        fn decode_frame(&mut self, remaining: &[u8], out: &mut [i32]) -> Result<usize> {
            let payload = &remaining[self.cursor..];
            let mut n = 0;
            for (chunk, slot) in payload.chunks_exact(4).zip(out.iter_mut()) {
                *slot = i32::from_le_bytes(chunk.try_into().unwrap());
                n += 1;
                self.cursor += 4;
            }
            Ok(n)
        }
    }
}

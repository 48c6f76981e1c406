// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! External encoder kernels (spec.md §1, SPEC_FULL.md §4.13A, A5). Encoding AAC or ALAC
//! bitstreams is out of scope for this workspace — both traits describe the boundary the
//! muxer calls through, mirroring how `aacencoder.h`/`alacsink.h` wrap a third-party
//! encoder in the original implementation this spec was distilled from.

use sndpipe_core::Result;

/// Produces one AAC raw-data-block per call. `asc` must return a stable
/// `AudioSpecificConfig` once the encoder has seen its first frame.
pub trait AacEncoderKernel {
    fn encode(&mut self, pcm: &[f32], channels: u8) -> Result<Vec<u8>>;
    fn asc(&self) -> &[u8];
}

/// Produces one ALAC access unit per call. `magic_cookie` must return a stable
/// `ALACSpecificConfig` (optionally followed by an `ALACChannelLayout`) once primed.
pub trait AlacEncoderKernel {
    fn encode(&mut self, pcm: &[i32], channels: u8) -> Result<Vec<u8>>;
    fn magic_cookie(&self) -> &[u8];
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    /// Encodes nothing: returns `pcm.len()` bytes of zero per call, enough to exercise
    /// container-level behavior (framing, sample tables, tag propagation) without real
    /// codec math.
    pub struct FakeAacKernel {
        pub asc: Vec<u8>,
    }

    impl AacEncoderKernel for FakeAacKernel {
        fn encode(&mut self, pcm: &[f32], _channels: u8) -> Result<Vec<u8>> {
            Ok(vec![0u8; pcm.len().max(1)])
        }

        fn asc(&self) -> &[u8] {
            &self.asc
        }
    }

    pub struct FakeAlacKernel {
        pub cookie: Vec<u8>,
    }

    impl AlacEncoderKernel for FakeAlacKernel {
        fn encode(&mut self, pcm: &[i32], _channels: u8) -> Result<Vec<u8>> {
            Ok(vec![0u8; pcm.len().max(1)])
        }

        fn magic_cookie(&self) -> &[u8] {
            &self.cookie
        }
    }
}

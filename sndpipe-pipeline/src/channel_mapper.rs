// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The [`ChannelMapper`] structural source (spec.md §4.4), grounded on
//! `original_source/chanmap.cpp`'s channel-position bookkeeping: permutes interleaved
//! samples by a caller-supplied permutation vector rather than changing sample count or
//! rate.

use sndpipe_core::error::unsupported;
use sndpipe_core::{Metadata, Result, Source, StreamFormat};

/// Reorders channels within each frame according to a fixed permutation.
pub struct ChannelMapper<S: Source> {
    inner: S,
    /// `map[i] - 1` is the input channel that becomes output channel `i`.
    map: Vec<usize>,
}

impl<S: Source> ChannelMapper<S> {
    /// `map` holds one 1-based input channel index per output channel; every index in
    /// `1..=channels` must appear exactly once (spec.md §4.4).
    pub fn new(inner: S, map: Vec<u8>) -> Result<ChannelMapper<S>> {
        let channels = inner.format().channels as usize;
        if map.len() != channels {
            return unsupported("channel map length must equal the input channel count");
        }
        let mut seen = vec![false; channels];
        let mut zero_based = Vec::with_capacity(channels);
        for &index in &map {
            let idx = index as usize;
            if idx == 0 || idx > channels || seen[idx - 1] {
                return unsupported("channel map must be a permutation of 1..=channels");
            }
            seen[idx - 1] = true;
            zero_based.push(idx - 1);
        }
        Ok(ChannelMapper { inner, map: zero_based })
    }
}

impl<S: Source> Source for ChannelMapper<S> {
    fn format(&self) -> StreamFormat {
        self.inner.format()
    }

    fn length(&self) -> Option<u64> {
        self.inner.length()
    }

    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let format = self.inner.format();
        let sample_bytes = format.container_bytes_per_sample();
        let frame_bytes = format.frame_bytes();

        let got = self.inner.read_frames(buf)?;
        if got == 0 {
            return Ok(0);
        }

        let mut scratch = vec![0u8; frame_bytes];
        for f in 0..got {
            let frame = &mut buf[f * frame_bytes..(f + 1) * frame_bytes];
            scratch.copy_from_slice(frame);
            for (out_channel, &in_channel) in self.map.iter().enumerate() {
                let src = &scratch[in_channel * sample_bytes..(in_channel + 1) * sample_bytes];
                frame[out_channel * sample_bytes..(out_channel + 1) * sample_bytes].copy_from_slice(src);
            }
        }
        Ok(got)
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        self.inner.seek(frame_pos)
    }

    fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sndpipe_core::{ByteOrder, Encoding};

    struct VecSource {
        format: StreamFormat,
        samples: Vec<u8>,
        pos: usize,
        metadata: Metadata,
    }

    impl Source for VecSource {
        fn format(&self) -> StreamFormat {
            self.format
        }
        fn length(&self) -> Option<u64> {
            Some((self.samples.len() / self.format.frame_bytes()) as u64)
        }
        fn is_seekable(&self) -> bool {
            true
        }
        fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
            let frame_bytes = self.format.frame_bytes();
            let available = (self.samples.len() - self.pos) / frame_bytes;
            let want = (buf.len() / frame_bytes).min(available);
            buf[..want * frame_bytes].copy_from_slice(&self.samples[self.pos..self.pos + want * frame_bytes]);
            self.pos += want * frame_bytes;
            Ok(want)
        }
        fn seek(&mut self, frame_pos: u64) -> Result<()> {
            self.pos = frame_pos as usize * self.format.frame_bytes();
            Ok(())
        }
        fn metadata(&self) -> &Metadata {
            &self.metadata
        }
    }

    fn stereo_source() -> VecSource {
        let format = StreamFormat::new(44_100, 2, Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian).unwrap();
        // one frame: left=1, right=2 (as i16 little endian)
        let samples = vec![1, 0, 2, 0];
        VecSource { format, samples, pos: 0, metadata: Metadata::default() }
    }

    #[test]
    fn swaps_left_and_right() {
        let mut mapper = ChannelMapper::new(stereo_source(), vec![2, 1]).unwrap();
        let mut buf = [0u8; 4];
        let n = mapper.read_frames(&mut buf).unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf, [2, 0, 1, 0]);
    }

    #[test]
    fn rejects_non_permutation_maps() {
        assert!(ChannelMapper::new(stereo_source(), vec![1, 1]).is_err());
        assert!(ChannelMapper::new(stereo_source(), vec![1, 3]).is_err());
        assert!(ChannelMapper::new(stereo_source(), vec![1]).is_err());
    }
}

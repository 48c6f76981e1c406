// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The [`NullSource`] structural source (spec.md §4.4), grounded on
//! `original_source/nullsource.h`: emits silence at a given [`StreamFormat`], used by the
//! cue-sheet arranger (C11) to materialize `PREGAP`/`POSTGAP` segments.

use sndpipe_core::{Metadata, Result, Source, StreamFormat};

/// A source of silence, optionally bounded to a fixed number of frames.
pub struct NullSource {
    format: StreamFormat,
    length: Option<u64>,
    position: u64,
    metadata: Metadata,
}

impl NullSource {
    pub fn new(format: StreamFormat, length: Option<u64>) -> NullSource {
        NullSource { format, length, position: 0, metadata: Metadata::default() }
    }
}

impl Source for NullSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        self.length
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_bytes = self.format.frame_bytes();
        let mut want_frames = buf.len() / frame_bytes;
        if let Some(len) = self.length {
            want_frames = want_frames.min(len.saturating_sub(self.position) as usize);
        }
        if want_frames == 0 {
            return Ok(0);
        }
        buf[..want_frames * frame_bytes].fill(0);
        self.position += want_frames as u64;
        Ok(want_frames)
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        self.position = frame_pos;
        Ok(())
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sndpipe_core::{ByteOrder, Encoding};

    fn fmt() -> StreamFormat {
        StreamFormat::new(44_100, 2, Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian).unwrap()
    }

    #[test]
    fn emits_bounded_silence_then_eof() {
        let mut src = NullSource::new(fmt(), Some(2));
        let mut buf = [0xffu8; 32];
        let n = src.read_frames(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert!(buf[..8].iter().all(|&b| b == 0));
        assert_eq!(src.read_frames(&mut buf).unwrap(), 0);
    }

    #[test]
    fn unbounded_length_never_exhausts() {
        let mut src = NullSource::new(fmt(), None);
        assert_eq!(src.length(), None);
        let mut buf = [0xffu8; 16];
        assert_eq!(src.read_frames(&mut buf).unwrap(), 4);
    }
}

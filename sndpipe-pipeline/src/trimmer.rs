// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The [`Trimmer`] structural source (spec.md §4.4), grounded on
//! `original_source/TrimmedSource.h`: a fixed `(start, duration)` window over an inner
//! seekable source, translating absolute positions to the inner source's own frame
//! numbering.

use sndpipe_core::error::range_error;
use sndpipe_core::{Metadata, Result, Source, StreamFormat};

/// Restricts an inner [`Source`] to the frame range `[start, start + duration)`.
/// `duration == None` means "until the inner source's own end of stream".
pub struct Trimmer<S: Source> {
    inner: S,
    start: u64,
    duration: Option<u64>,
    position: u64,
}

impl<S: Source> Trimmer<S> {
    /// Construct a trimmed view. Fails if `start` exceeds the inner source's known length,
    /// or if `start + duration` does (`original_source/TrimmedSource.h`'s `setRange`).
    pub fn new(mut inner: S, start: u64, duration: Option<u64>) -> Result<Trimmer<S>> {
        if let Some(len) = inner.length() {
            if start > len {
                return range_error("trim start exceeds source length");
            }
            if let Some(dur) = duration {
                if start + dur > len {
                    return range_error("trim end exceeds source length");
                }
            }
        }
        if start > 0 {
            inner.seek(start)?;
        }
        Ok(Trimmer { inner, start, duration, position: 0 })
    }

    fn remaining(&self) -> Option<u64> {
        self.duration.map(|dur| dur.saturating_sub(self.position))
    }
}

impl<S: Source> Source for Trimmer<S> {
    fn format(&self) -> StreamFormat {
        self.inner.format()
    }

    fn length(&self) -> Option<u64> {
        match self.duration {
            Some(dur) => Some(dur),
            None => self.inner.length().map(|len| len.saturating_sub(self.start)),
        }
    }

    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_bytes = self.inner.format().frame_bytes();
        let mut want_frames = buf.len() / frame_bytes;
        if let Some(remaining) = self.remaining() {
            want_frames = want_frames.min(remaining as usize);
        }
        if want_frames == 0 {
            return Ok(0);
        }
        let got = self.inner.read_frames(&mut buf[..want_frames * frame_bytes])?;
        self.position += got as u64;
        Ok(got)
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        self.inner.seek(self.start + frame_pos)?;
        self.position = frame_pos;
        Ok(())
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

    fn mono_source(frames: u8) -> VecSource {
        let format = StreamFormat::new(44_100, 1, Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian).unwrap();
        let samples: Vec<u8> = (0..frames).flat_map(|i| [i, 0]).collect();
        VecSource { format, samples, pos: 0, metadata: Metadata::default() }
    }

    #[test]
    fn reads_only_the_requested_window() {
        let mut trim = Trimmer::new(mono_source(10), 2, Some(3)).unwrap();
        assert_eq!(trim.length(), Some(3));
        let mut buf = [0u8; 20];
        let n = trim.read_frames(&mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..6], &[2, 0, 3, 0, 4, 0]);
        assert_eq!(trim.read_frames(&mut buf).unwrap(), 0);
    }

    #[test]
    fn rejects_start_past_source_end() {
        assert!(Trimmer::new(mono_source(4), 10, None).is_err());
    }

    #[test]
    fn unbounded_duration_runs_to_inner_eof() {
        let mut trim = Trimmer::new(mono_source(4), 1, None).unwrap();
        let mut buf = [0u8; 20];
        let n = trim.read_frames(&mut buf).unwrap();
        assert_eq!(n, 3);
    }
}

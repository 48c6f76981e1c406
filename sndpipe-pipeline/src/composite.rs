// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The [`Composite`] structural source (spec.md §4.4), grounded on
//! `original_source/composite.{h,cpp}`: an ordered chain of sources sharing one
//! `StreamFormat`, read in sequence with each predecessor seeked back to its start when
//! the chain is itself sought. This is how the cue-sheet arranger (C11) builds one
//! continuous track out of several file segments and gap sources.

use sndpipe_core::error::unsupported;
use sndpipe_core::{ChapterEntry, Error, Metadata, Result, SeekErrorKind, Source, StreamFormat};

/// A chain of heterogeneous [`Source`] implementations presented as one.
pub struct Composite {
    sources: Vec<Box<dyn Source>>,
    format: StreamFormat,
    current: usize,
    cumulative_frames: u64,
    metadata: Metadata,
}

impl Composite {
    /// Start a composite from its first sub-source; the composite's `StreamFormat` is
    /// fixed to that source's format, and every later `add_source` must match it
    /// (`original_source/composite.h`'s `addSource` format check).
    pub fn new(first: Box<dyn Source>) -> Composite {
        let format = first.format();
        let mut composite =
            Composite { sources: Vec::new(), format, current: 0, cumulative_frames: 0, metadata: Metadata::default() };
        composite.push(first);
        composite
    }

    /// Append another sub-source. Fails if its `StreamFormat` differs from the
    /// composite's (`original_source/composite.h`: "can't compose different sample
    /// format").
    pub fn add_source(&mut self, source: Box<dyn Source>) -> Result<()> {
        if source.format() != self.format {
            return unsupported("composite: cannot combine sources with different stream formats");
        }
        self.push(source);
        Ok(())
    }

    fn push(&mut self, source: Box<dyn Source>) {
        let meta = source.metadata().clone();
        let start_seconds = self.cumulative_frames as f64 / self.format.sample_rate as f64;

        for (key, value) in &meta.tags {
            self.metadata.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }

        if !meta.chapters.is_empty() {
            for chapter in &meta.chapters {
                self.metadata
                    .chapters
                    .push(ChapterEntry { title: chapter.title.clone(), start_seconds: start_seconds + chapter.start_seconds });
            }
        } else {
            let title = meta.tags.get("title").cloned().unwrap_or_default();
            self.metadata.chapters.push(ChapterEntry { title, start_seconds });
        }

        if let Some(len) = source.length() {
            self.cumulative_frames += len;
        }
        self.sources.push(source);
    }
}

impl Source for Composite {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        let mut total = 0u64;
        for source in &self.sources {
            total += source.length()?;
        }
        Some(total)
    }

    fn is_seekable(&self) -> bool {
        self.sources.iter().all(|s| s.is_seekable())
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if self.current >= self.sources.len() {
                return Ok(0);
            }
            let got = self.sources[self.current].read_frames(buf)?;
            if got > 0 {
                return Ok(got);
            }
            self.current += 1;
            if let Some(next) = self.sources.get_mut(self.current) {
                next.seek(0)?;
            }
        }
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        let mut acc = 0u64;
        let mut target = None;
        for (i, source) in self.sources.iter().enumerate() {
            match source.length() {
                Some(len) => {
                    if frame_pos < acc + len {
                        target = Some(i);
                        break;
                    }
                    acc += len;
                }
                None => {
                    target = Some(i);
                    break;
                }
            }
        }
        let idx = match target {
            Some(i) => i,
            None => return Err(Error::SeekUnsupported(SeekErrorKind::OutOfRange)),
        };
        for source in self.sources[idx + 1..].iter_mut() {
            source.seek(0)?;
        }
        self.sources[idx].seek(frame_pos - acc)?;
        self.current = idx;
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

    fn mono_source(byte: u8, frames: u8) -> VecSource {
        let format = StreamFormat::new(44_100, 1, Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian).unwrap();
        let samples: Vec<u8> = (0..frames).flat_map(|_| [byte, 0]).collect();
        VecSource { format, samples, pos: 0, metadata: Metadata::default() }
    }

    #[test]
    fn drains_each_source_in_order() {
        let mut composite = Composite::new(Box::new(mono_source(1, 2)));
        composite.add_source(Box::new(mono_source(2, 2))).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(composite.read_frames(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 0, 1, 0]);
        assert_eq!(composite.read_frames(&mut buf).unwrap(), 2);
        assert_eq!(buf, [2, 0, 2, 0]);
        assert_eq!(composite.read_frames(&mut buf).unwrap(), 0);
    }

    #[test]
    fn length_is_the_sum_of_sub_source_lengths() {
        let mut composite = Composite::new(Box::new(mono_source(1, 3)));
        composite.add_source(Box::new(mono_source(2, 5))).unwrap();
        assert_eq!(composite.length(), Some(8));
    }

    #[test]
    fn rejects_sub_sources_with_mismatched_format() {
        let mut composite = Composite::new(Box::new(mono_source(1, 2)));
        let stereo = StreamFormat::new(44_100, 2, Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian).unwrap();
        let mismatched = VecSource { format: stereo, samples: vec![0; 8], pos: 0, metadata: Metadata::default() };
        assert!(composite.add_source(Box::new(mismatched)).is_err());
    }

    #[test]
    fn seek_lands_in_the_right_sub_source() {
        let mut composite = Composite::new(Box::new(mono_source(1, 2)));
        composite.add_source(Box::new(mono_source(2, 2))).unwrap();
        composite.seek(3).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(composite.read_frames(&mut buf).unwrap(), 1);
        assert_eq!(buf, [2, 0]);
    }
}

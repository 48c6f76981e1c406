// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The raw PCM [`Source`] adapter (spec.md §4.3, §6: "raw PCM (only when the caller
//! pre-declares `StreamFormat`)"). There is no header to sniff: the caller supplies the
//! [`StreamFormat`] up front and every byte of the underlying reader is treated as sample
//! data.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::io::SeekFrom;

use sndpipe_core::io::MediaSource;
use sndpipe_core::{Error, Metadata, Result, SeekErrorKind, Source, StreamFormat};

pub struct PcmSource<M: MediaSource> {
    media: M,
    format: StreamFormat,
    length_frames: Option<u64>,
    position: u64,
    metadata: Metadata,
}

impl<M: MediaSource> PcmSource<M> {
    /// Wrap `media` as a raw PCM source under the pre-declared `format`. If `media` is
    /// seekable its total byte length is used to report [`Source::length`]; a trailing
    /// partial frame is truncated rather than treated as an error.
    pub fn new(media: M, format: StreamFormat) -> Result<PcmSource<M>> {
        let length_frames = media.byte_len().map(|len| len / format.frame_bytes() as u64);
        Ok(PcmSource { media, format, length_frames, position: 0, metadata: Metadata::default() })
    }
}

impl<M: MediaSource> Source for PcmSource<M> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn length(&self) -> Option<u64> {
        self.length_frames
    }

    fn is_seekable(&self) -> bool {
        self.media.is_seekable()
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_bytes = self.format.frame_bytes();
        let mut want_frames = buf.len() / frame_bytes;
        if let Some(len) = self.length_frames {
            let remaining = len.saturating_sub(self.position);
            want_frames = want_frames.min(remaining as usize);
        }
        if want_frames == 0 {
            return Ok(0);
        }

        let want_bytes = want_frames * frame_bytes;
        let mut read = 0usize;
        while read < want_bytes {
            let n = std::io::Read::read(&mut self.media, &mut buf[read..want_bytes])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        let frames = read / frame_bytes;
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        if self.media.is_seekable() {
            let byte_pos = frame_pos * self.format.frame_bytes() as u64;
            self.media.seek(SeekFrom::Start(byte_pos))?;
            self.position = frame_pos;
            Ok(())
        } else if frame_pos >= self.position {
            let frame_bytes = self.format.frame_bytes() as u64;
            let skip = (frame_pos - self.position) * frame_bytes;
            sndpipe_core::io::ReadBytes::ignore_bytes(&mut self.media, skip)?;
            self.position = frame_pos;
            Ok(())
        } else {
            Err(Error::SeekUnsupported(SeekErrorKind::Unseekable))
        }
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sndpipe_core::{ByteOrder, Encoding};
    use std::io::Cursor;

    fn fmt() -> StreamFormat {
        StreamFormat::new(44_100, 2, Encoding::SignedInt, 16, 16, ByteOrder::LittleEndian).unwrap()
    }

    #[test]
    fn reports_length_from_byte_length() {
        let bytes = vec![0u8; 4 * 10]; // 10 stereo 16-bit frames
        let src = PcmSource::new(Cursor::new(bytes), fmt()).unwrap();
        assert_eq!(src.length(), Some(10));
    }

    #[test]
    fn reads_all_frames_then_reports_eof() {
        let bytes: Vec<u8> = (0..40u8).collect();
        let mut src = PcmSource::new(Cursor::new(bytes), fmt()).unwrap();
        let mut buf = [0u8; 40];
        assert_eq!(src.read_frames(&mut buf).unwrap(), 10);
        assert_eq!(src.read_frames(&mut buf).unwrap(), 0);
    }

    #[test]
    fn seek_lands_on_requested_frame() {
        let bytes: Vec<u8> = (0..40u8).collect();
        let mut src = PcmSource::new(Cursor::new(bytes), fmt()).unwrap();
        src.seek(5).unwrap();
        let mut buf = [0u8; 4];
        src.read_frames(&mut buf).unwrap();
        assert_eq!(buf, [20, 21, 22, 23]);
    }
}

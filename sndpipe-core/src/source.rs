// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The pull-model [`Source`]/[`Sink`] contract (spec.md §3, §9). A sink repeatedly asks
//! its upstream for frames; every stage in between is a `Source` that either produces
//! frames directly or recursively pulls its own upstream.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::format::StreamFormat;

/// One chapter marker. `start` is the absolute offset from the start of the source in
/// seconds; the first entry's `start` is always `0.0` and entries are strictly
/// increasing (spec.md §3 "Chapter entry").
#[derive(Clone, Debug, PartialEq)]
pub struct ChapterEntry {
    pub title: String,
    pub start_seconds: f64,
}

/// Free-form key/value tags, keyed by the iTunes four-character code or a namespaced
/// "long tag" name (spec.md §3 "Tag key set").
pub type Tags = BTreeMap<String, String>;

/// Metadata a [`Source`] may expose alongside its audio: tags and chapter markers.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    pub tags: Tags,
    pub chapters: Vec<ChapterEntry>,
}

/// A producer of interleaved PCM frames with a stable [`StreamFormat`].
///
/// `read_frames` returning `0` means end-of-stream; a short read (fewer frames than
/// requested) does **not** imply EOF unless followed by another `0`-frame read
/// (spec.md §3).
pub trait Source {
    fn format(&self) -> StreamFormat;

    /// Total length in frames, if known ahead of time.
    fn length(&self) -> Option<u64>;

    /// Whether [`Self::seek`] can succeed.
    fn is_seekable(&self) -> bool;

    /// Read up to `buf.len() / format().frame_bytes()` frames into `buf`, returning the
    /// number of frames actually written.
    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Seek to an absolute frame position.
    fn seek(&mut self, frame_pos: u64) -> Result<()>;

    fn metadata(&self) -> &Metadata;
}

impl<T: Source + ?Sized> Source for Box<T> {
    fn format(&self) -> StreamFormat {
        (**self).format()
    }

    fn length(&self) -> Option<u64> {
        (**self).length()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_frames(buf)
    }

    fn seek(&mut self, frame_pos: u64) -> Result<()> {
        (**self).seek(frame_pos)
    }

    fn metadata(&self) -> &Metadata {
        (**self).metadata()
    }
}

/// A consumer of interleaved PCM frames matching an input [`StreamFormat`].
pub trait Sink {
    fn format(&self) -> StreamFormat;

    /// Write `n_frames` frames (`n_frames * format().frame_bytes()` bytes) from `buf`.
    fn write_frames(&mut self, buf: &[u8], n_frames: usize) -> Result<()>;

    /// Commit headers/trailers. After `finalize` returns `Ok`, the output is complete; on
    /// any earlier error the output must be considered corrupt (spec.md §7).
    fn finalize(&mut self) -> Result<()>;
}

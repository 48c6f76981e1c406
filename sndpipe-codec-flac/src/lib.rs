// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FLAC container parsing and decoding (spec.md §4.3, §6 "FLAC (native + Ogg)"): the
//! `STREAMINFO`/`VORBIS_COMMENT` metadata blocks, sequential frame-header sync and
//! parsing, and the constant/verbatim/fixed/LPC subframe decode core with Rice residuals
//! and stereo decorrelation, wired together behind a single [`source::FlacSource`].
//!
//! Ogg-encapsulated FLAC is out of scope for this adapter: it expects a raw `fLaC` stream
//! starting at byte 0 (spec.md §1, non-goal: container demultiplexing beyond FLAC/WavPack/
//! TAK/WAV/RIFF's own framing).

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod bitutil;
mod frame;
mod source;
mod stream_info;
mod subframe;

pub use source::FlacSource;
pub use stream_info::StreamInfo;

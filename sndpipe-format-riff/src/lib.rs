// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The IFF/RIFF/RF64 chunk cursor (spec.md §4.1) and the WAV/RF64 [`Source`](sndpipe_core::Source)
//! and [`Sink`](sndpipe_core::Sink) adapters (spec.md §4.3, §4.12).

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod chunk;
pub mod wave;

pub use wave::{WavSink, WavSource};

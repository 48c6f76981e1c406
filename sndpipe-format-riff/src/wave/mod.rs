// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WAV and RF64: the `fmt ` chunk model, the [`Source`](sndpipe_core::Source) adapter, and
//! the [`Sink`](sndpipe_core::Sink) writer (spec.md §4.1, §4.3, §4.12).

mod format;
mod sink;
mod source;

pub use sink::WavSink;
pub use source::WavSource;

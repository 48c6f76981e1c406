// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WavPack [`source::WavPackSource`] adapter (spec.md §4.3, §6 "WavPack"): block
//! framing and header parsing live here, while the entropy-coded bitstream itself is
//! decoded by a caller-supplied [`kernel::WavPackDecoderKernel`] (spec.md §4.13A).

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod header;
mod kernel;
mod source;

pub use header::{Header, SampleEncoding};
pub use kernel::WavPackDecoderKernel;
pub use source::WavPackSource;

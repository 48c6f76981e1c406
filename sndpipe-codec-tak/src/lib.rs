// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TAK container parsing and source adapter (spec.md §4.3, §6 "TAK"). Stream info
//! extraction, APEv2 tag reading, and frame-chunk decode all delegate their entropy
//! decoding to an external [`kernel::TakDecoderKernel`] (spec.md §4.13A); this crate only
//! owns the metadata block chain and the `Source` framing around it.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod kernel;
mod source;
mod stream_info;

pub use kernel::TakDecoderKernel;
pub use source::TakSource;
pub use stream_info::StreamInfo;

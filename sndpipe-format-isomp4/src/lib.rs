// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MP4/ADTS sink (spec.md §4.13, C13): AAC and ALAC track muxing into an ISO-BMFF
//! `.m4a`, raw ADTS `.aac` framing, gapless tagging via `edts`/`iTunSMPB`, and running
//! bitrate accounting. Encoding itself is out of scope (spec.md §1) — this crate drives
//! the container around whatever [`kernel::AacEncoderKernel`]/[`kernel::AlacEncoderKernel`]
//! it is handed.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod adts;
mod alac_cookie;
mod asc;
mod atom;
mod boxes;
mod kernel;
mod mp4;
mod tags;

pub use adts::AdtsSink;
pub use alac_cookie::AlacCookie;
pub use asc::AudioSpecificConfig;
pub use kernel::{AacEncoderKernel, AlacEncoderKernel};
pub use mp4::{Mp4AacSink, Mp4AlacSink};
pub use tags::GaplessInfo;

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `sndpipe-core` provides the data model and traits shared by every crate in the
//! workspace: the [`format::StreamFormat`] descriptor, the [`source::Source`]/
//! [`source::Sink`] pull-model contract, the float-staging conversion used between DSP
//! stages, channel layout resolution, the error taxonomy, and byte/bit-level I/O.

pub mod conv;
pub mod error;
pub mod format;
pub mod io;
pub mod source;
pub mod units;

pub use error::{Error, Result, SeekErrorKind};
pub use format::{ByteOrder, ChannelLayout, ChannelMask, Encoding, StreamFormat};
pub use source::{ChapterEntry, Metadata, Sink, Source, Tags};

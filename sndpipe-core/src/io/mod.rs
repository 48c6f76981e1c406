// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composable byte- and bit-level I/O (C1, C10).

mod bit;
mod byte;

pub use bit::{BitReader, BitWriter};
pub use byte::{MediaSource, ReadBytes, ReadOnlySource};

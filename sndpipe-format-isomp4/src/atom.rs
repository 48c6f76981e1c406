// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bottom-up ISO-BMFF atom ("box") construction. Every atom is assembled in memory as a
//! fully-formed `(size, fourcc, body)` buffer before being written out, which keeps the
//! muxer (C13) free of the seek-and-patch bookkeeping the WAV sink needs: the only atoms
//! whose size isn't known in full ahead of time are `mdat`, handled separately by
//! [`crate::mp4::Mp4Sink`].

/// Wrap `body` in a standard 8-byte-header atom. Panics if the total size would require a
/// 64-bit extended size; `mdat` is the only atom in this muxer large enough to need one,
/// and it is sized explicitly by the sink rather than through this helper.
pub fn atom(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let total = 8 + body.len();
    assert!(total <= u32::MAX as usize, "isomp4: atom exceeds 32-bit size without mdat's path");
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(body);
    out
}

/// Concatenate child atoms into one, e.g. `atom(b"trak", &concat(&[tkhd, mdia]))`.
pub fn concat(children: &[Vec<u8>]) -> Vec<u8> {
    children.concat()
}

/// A "full box" atom body: a one-byte version and three-byte flags field prefixed to
/// `body`, used by `mvhd`/`tkhd`/`mdhd`/`hdlr`/`stsd`/`esds`'s descriptor wrapper/etc.
pub fn full_box_body(version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(version);
    out.extend_from_slice(&flags.to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

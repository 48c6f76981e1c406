// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The generic IFF/RIFF/RF64 chunk cursor (spec.md §4.1): iterate `(four_cc, size)` pairs
//! over a byte stream, padding odd-sized chunks to an even boundary on skip, and expanding
//! 32-bit chunk sizes to 64-bit via an RF64 `ds64` size table when one is present.

use std::io::Read;

use sndpipe_core::io::ReadBytes;
use sndpipe_core::error::malformed;
use sndpipe_core::Result;

/// One chunk header as read from the stream: its four-character id and declared size in
/// bytes, not including the 8-byte header itself.
#[derive(Clone, Copy, Debug)]
pub struct ChunkHeader {
    pub id: [u8; 4],
    pub len: u32,
}

/// Read a chunk header (`id`, `len`) from `src`.
pub fn read_header<R: Read>(src: &mut R) -> Result<ChunkHeader> {
    let id = src.read_quad_bytes()?;
    let len = src.read_u32le()?;
    Ok(ChunkHeader { id, len })
}

/// Skip `len` content bytes plus the single pad byte RIFF requires for odd-sized chunks.
pub fn skip_padded<R: Read>(src: &mut R, len: u32) -> Result<()> {
    let padded = u64::from(len) + (len & 1) as u64;
    src.ignore_bytes(padded)
}

/// The `ds64` chunk body (EBU Tech 3306): 64-bit overrides for the RIFF size, the `data`
/// chunk size, and the sample count, plus a table of per-chunk `(four_cc, size64)`
/// overrides this pipeline never needs (only the `data` chunk can plausibly exceed 4 GiB
/// in the formats this crate handles).
#[derive(Clone, Copy, Debug, Default)]
pub struct Ds64 {
    pub riff_size: u64,
    pub data_size: u64,
    pub sample_count: u64,
}

impl Ds64 {
    /// Parse a `ds64` chunk body of `len` bytes (the chunk's declared size, not counting
    /// its own header). Per spec.md §4.1, a well-formed `ds64` has `len == 28 + 12*N` for
    /// `N` table entries; anything else is malformed.
    pub fn parse<R: Read>(src: &mut R, len: u32) -> Result<Ds64> {
        if len < 28 || (len - 28) % 12 != 0 {
            return malformed("ds64: chunk size is not 28 + 12*N");
        }
        let riff_size = src.read_u64le()?;
        let data_size = src.read_u64le()?;
        let sample_count = src.read_u64le()?;
        let table_len = src.read_u32le()?;
        // The per-chunk size-override table; nothing downstream of `data`/`fmt `/`fact`
        // needs 64-bit sizes, so the entries are consumed and discarded.
        src.ignore_bytes(u64::from(table_len) * 12)?;
        let consumed = 28 + u64::from(table_len) * 12;
        if consumed != u64::from(len) {
            return malformed("ds64: table length does not match chunk size");
        }
        Ok(Ds64 { riff_size, data_size, sample_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_header() {
        let mut c = Cursor::new(vec![b'f', b'm', b't', b' ', 0x10, 0x00, 0x00, 0x00]);
        let h = read_header(&mut c).unwrap();
        assert_eq!(&h.id, b"fmt ");
        assert_eq!(h.len, 16);
    }

    #[test]
    fn ds64_rejects_bad_size() {
        let mut c = Cursor::new(vec![0u8; 16]);
        assert!(Ds64::parse(&mut c, 16).is_err());
    }

    #[test]
    fn ds64_parses_minimal_body() {
        let mut body = Vec::new();
        body.extend_from_slice(&6_000_000_000u64.to_le_bytes());
        body.extend_from_slice(&5_999_999_960u64.to_le_bytes());
        body.extend_from_slice(&1_499_999_990u64.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        let mut c = Cursor::new(body);
        let ds64 = Ds64::parse(&mut c, 28).unwrap();
        assert_eq!(ds64.data_size, 5_999_999_960);
        assert_eq!(ds64.sample_count, 1_499_999_990);
    }
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An APEv1/APEv2 tag reader (spec.md §4.3: "TAK via APEv2"), used by the WavPack and TAK
//! source adapters to pick up embedded tags. APEv2 tags live in a footer (and, optionally,
//! a mirrored header) appended after the audio payload, so the reader seeks from the end
//! of the stream inward.

use std::io::{Read, Seek, SeekFrom};

use sndpipe_core::io::ReadBytes;
use sndpipe_core::{Error, Result, Tags};

use crate::base64;
use crate::tags::{self, TagKey};

const PREAMBLE: &[u8; 8] = b"APETAGEX";
const FOOTER_SIZE: u64 = 32;

#[derive(Clone, Copy, PartialEq, Eq)]
enum ApeVersion {
    V1,
    V2,
}

struct ApeHeader {
    version: ApeVersion,
    num_items: u32,
    /// Size of the tag body plus footer (and header, if present), excluding the audio data.
    size: u32,
    has_header: bool,
}

impl ApeHeader {
    fn read<R: Read>(r: &mut R) -> Result<ApeHeader> {
        let mut preamble = [0u8; 8];
        r.read_exact(&mut preamble)?;
        if &preamble != PREAMBLE {
            return Err(Error::MalformedContainer("ape: invalid preamble"));
        }

        let version = match r.read_u32le()? {
            1000 => ApeVersion::V1,
            2000 => ApeVersion::V2,
            _ => return Err(Error::UnsupportedFormat("ape: unsupported tag version")),
        };
        let size = r.read_u32le()?;
        let num_items = r.read_u32le()?;
        let flags = r.read_u32le()?;
        let _reserved = r.read_u64le()?;

        let has_header = version == ApeVersion::V2 && flags & 0x8000_0000 != 0;

        Ok(ApeHeader { version, num_items, size, has_header })
    }
}

fn read_key<R: Read>(r: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    loop {
        let byte = r.read_byte()?;
        if byte == 0 {
            break;
        }
        if !(0x20..=0x7e).contains(&byte) {
            return Err(Error::MalformedContainer("ape: invalid character in item key"));
        }
        buf.push(byte);
    }
    String::from_utf8(buf).map_err(|_| Error::MalformedContainer("ape: item key is not utf-8"))
}

fn tag_key_for_ape_name(name: &str) -> TagKey {
    match name.to_ascii_lowercase().as_str() {
        "title" => TagKey::Title,
        "artist" => TagKey::Artist,
        "album" => TagKey::Album,
        "album artist" => TagKey::AlbumArtist,
        "track" => TagKey::TrackNumber,
        "disc" => TagKey::DiscNumber,
        "genre" => TagKey::GenreName,
        "year" => TagKey::Date,
        "comment" => TagKey::Comment,
        "lyrics" => TagKey::Lyrics,
        "compilation" => TagKey::Compilation,
        "cover art (front)" => TagKey::Cover,
        other => TagKey::Long("apev2".to_string(), other.to_string()),
    }
}

/// Read all APEv2 (or APEv1) tag items from `src`, seeking from the current stream end.
/// `src` must currently be positioned so that `stream_end` bytes from the start marks the
/// end of the APE tag block (typically the true end of the file).
pub fn read_tags<R: Read + Seek>(src: &mut R, stream_end: u64) -> Result<Tags> {
    let mut tags = Tags::new();

    src.seek(SeekFrom::Start(stream_end - FOOTER_SIZE))?;
    let footer = ApeHeader::read(src)?;

    let tag_start = stream_end - footer.size as u64;
    src.seek(SeekFrom::Start(tag_start))?;
    if footer.has_header {
        let _header = ApeHeader::read(src)?;
    }

    for _ in 0..footer.num_items {
        let len = src.read_u32le()? as usize;
        let flags = match footer.version {
            ApeVersion::V1 => {
                let _ignored = src.read_u32le()?;
                0
            }
            ApeVersion::V2 => src.read_u32le()?,
        };
        let key = read_key(src)?;

        match (flags >> 1) & 0x3 {
            // UTF-8 text.
            0 => {
                let value = String::from_utf8(src.read_boxed_slice(len)?.into_vec())
                    .map_err(|_| Error::MalformedContainer("ape: item value is not utf-8"))?;
                if !value.is_empty() {
                    tags::insert(&mut tags, tag_key_for_ape_name(&key), value);
                }
            }
            // Binary (e.g. cover art): fold into the map as base64.
            1 => {
                let value = src.read_boxed_slice(len)?;
                tags::insert(&mut tags, tag_key_for_ape_name(&key), base64::encode(&value));
            }
            // Locator: another UTF-8 string, naming an external resource.
            2 => {
                let value = String::from_utf8(src.read_boxed_slice(len)?.into_vec())
                    .map_err(|_| Error::MalformedContainer("ape: item value is not utf-8"))?;
                tags::insert(&mut tags, tag_key_for_ape_name(&key), value);
            }
            _ => return Err(Error::MalformedContainer("ape: reserved item value type")),
        }
    }

    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_tag(items: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (key, value) in items {
            body.extend_from_slice(&(value.len() as u32).to_le_bytes());
            body.extend_from_slice(&0u32.to_le_bytes()); // flags: UTF-8 text
            body.extend_from_slice(key.as_bytes());
            body.push(0);
            body.extend_from_slice(value.as_bytes());
        }

        let tag_size = body.len() as u32 + FOOTER_SIZE as u32;
        let mut footer = Vec::new();
        footer.extend_from_slice(PREAMBLE);
        footer.extend_from_slice(&2000u32.to_le_bytes());
        footer.extend_from_slice(&tag_size.to_le_bytes());
        footer.extend_from_slice(&(items.len() as u32).to_le_bytes());
        footer.extend_from_slice(&0x4000_0000u32.to_le_bytes()); // has_footer, no header
        footer.extend_from_slice(&0u64.to_le_bytes());

        let mut out = body;
        out.extend_from_slice(&footer);
        out
    }

    #[test]
    fn reads_title_and_artist() {
        let bytes = build_tag(&[("Title", "Song"), ("Artist", "Band")]);
        let mut cur = Cursor::new(bytes.clone());
        let tags = read_tags(&mut cur, bytes.len() as u64).unwrap();
        assert_eq!(tags.get("title").map(String::as_str), Some("Song"));
        assert_eq!(tags.get("artist").map(String::as_str), Some("Band"));
    }

    #[test]
    fn unrecognized_preamble_is_rejected() {
        let bytes = vec![0u8; 32];
        let mut cur = Cursor::new(bytes.clone());
        assert!(read_tags(&mut cur, bytes.len() as u64).is_err());
    }
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A RIFF `LIST/INFO` chunk reader, used by the WAV/RF64 source adapter (spec.md §4.3)
//! to surface embedded tags.

use crate::tags::{self, TagKey};
use sndpipe_core::Tags;

/// Map a RIFF INFO sub-chunk id to the tag key it corresponds to. Ids not recognized here
/// are still preserved, as a `Long` tag under the `riff-info` namespace.
fn tag_key_for_info_id(id: &str) -> TagKey {
    match id.to_ascii_lowercase().as_str() {
        "inam" | "titl" => TagKey::Title,
        "iart" => TagKey::Artist,
        "iprd" => TagKey::Album,
        "iprt" | "trck" => TagKey::TrackNumber,
        "ignr" | "isgn" | "genr" => TagKey::GenreName,
        "icrd" | "year" => TagKey::Date,
        "imus" => TagKey::Composer,
        "icmt" | "cmnt" | "comm" => TagKey::Comment,
        "isft" => TagKey::Tool,
        other => TagKey::Long("riff-info".to_string(), other.to_string()),
    }
}

/// Parse one RIFF INFO sub-chunk (`id`, the four-character chunk id already lower-cased
/// by the caller, and `buf`, its contents excluding any padding) and fold it into `tags`.
pub fn parse_into(id: [u8; 4], buf: &[u8], tags: &mut Tags) {
    let id_str = String::from_utf8_lossy(&id);
    let value = String::from_utf8_lossy(buf).trim_end_matches('\0').to_string();
    if value.is_empty() {
        return;
    }
    tags::insert(tags, tag_key_for_info_id(&id_str), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inam_maps_to_title() {
        let mut tags = Tags::new();
        parse_into(*b"INAM", b"Sample Track\0", &mut tags);
        assert_eq!(tags.get("title").map(String::as_str), Some("Sample Track"));
    }

    #[test]
    fn unknown_id_becomes_a_long_tag() {
        let mut tags = Tags::new();
        parse_into(*b"ISRF", b"Digital\0", &mut tags);
        assert_eq!(tags.get("long:riff-info:isrf").map(String::as_str), Some("Digital"));
    }

    #[test]
    fn empty_value_is_dropped() {
        let mut tags = Tags::new();
        parse_into(*b"INAM", b"", &mut tags);
        assert!(tags.is_empty());
    }
}

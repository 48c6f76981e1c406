// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A Vorbis `COMMENT` metadata block reader, used by the FLAC source adapter (spec.md
//! §4.3) to surface embedded tags.

use crate::tags::{self, TagKey};
use sndpipe_core::Tags;

fn tag_key_for_comment_name(name: &str) -> TagKey {
    match name.to_ascii_lowercase().as_str() {
        "title" => TagKey::Title,
        "artist" => TagKey::Artist,
        "album" => TagKey::Album,
        "albumartist" | "album artist" => TagKey::AlbumArtist,
        "tracknumber" => TagKey::TrackNumber,
        "tracktotal" => TagKey::TrackTotal,
        "discnumber" | "disc" => TagKey::DiscNumber,
        "disctotal" => TagKey::DiscTotal,
        "genre" => TagKey::GenreName,
        "date" => TagKey::Date,
        "grouping" => TagKey::Grouping,
        "composer" => TagKey::Composer,
        "comment" | "description" => TagKey::Comment,
        "lyrics" => TagKey::Lyrics,
        "compilation" => TagKey::Compilation,
        "encoder" => TagKey::Tool,
        other => TagKey::Long("vorbis-comment".to_string(), other.to_string()),
    }
}

/// Parse one `"NAME=VALUE"` Vorbis comment entry and fold it into `tags`. Entries
/// without a `=` separator, or with an empty name, are ignored (matches the original
/// Vorbis comment spec, which treats them as malformed rather than fatal).
pub fn parse_comment_into(entry: &str, tags: &mut Tags) {
    let Some(eq) = entry.find('=') else { return };
    let (name, value) = entry.split_at(eq);
    let value = &value[1..];
    if name.is_empty() || value.is_empty() {
        return;
    }
    tags::insert(tags, tag_key_for_comment_name(name), value.to_string());
}

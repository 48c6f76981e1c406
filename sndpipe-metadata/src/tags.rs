// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tag key model (spec.md §3 "Tag key set"): iTunes four-character atom codes, used
//! as the canonical vocabulary every source/sink tag format is mapped onto.

use sndpipe_core::Tags;

/// A canonical tag identity. Every standalone or embedded tag format (RIFF INFO, Vorbis
/// comment, APEv2) maps its own key spelling onto one of these; the MP4 sink maps them
/// back onto the iTunes four-character atom code that names it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TagKey {
    Title,
    Artist,
    Album,
    AlbumArtist,
    TrackNumber,
    TrackTotal,
    DiscNumber,
    DiscTotal,
    GenreName,
    GenreId,
    Date,
    Grouping,
    Composer,
    Comment,
    Lyrics,
    Cover,
    Compilation,
    Tool,
    Description,
    /// A namespaced "long tag": a custom `mean`/`name` pair not covered by a core iTunes
    /// atom (spec.md §3: "arbitrary long tags (namespaced custom pairs)").
    Long(String, String),
}

impl TagKey {
    /// The iTunes four-character atom code this key is written under in an MP4 `ilst`
    /// (spec.md §6 "tag box hierarchy"), or `None` for `Long`, which is written as a
    /// `----` freeform atom carrying its own `mean`/`name`.
    pub fn itunes_fourcc(&self) -> Option<&'static str> {
        match self {
            TagKey::Title => Some("\u{a9}nam"),
            TagKey::Artist => Some("\u{a9}ART"),
            TagKey::Album => Some("\u{a9}alb"),
            TagKey::AlbumArtist => Some("aART"),
            TagKey::TrackNumber => Some("trkn"),
            TagKey::TrackTotal => Some("trkn"),
            TagKey::DiscNumber => Some("disk"),
            TagKey::DiscTotal => Some("disk"),
            TagKey::GenreName => Some("\u{a9}gen"),
            TagKey::GenreId => Some("gnre"),
            TagKey::Date => Some("\u{a9}day"),
            TagKey::Grouping => Some("\u{a9}grp"),
            TagKey::Composer => Some("\u{a9}wrt"),
            TagKey::Comment => Some("\u{a9}cmt"),
            TagKey::Lyrics => Some("\u{a9}lyr"),
            TagKey::Cover => Some("covr"),
            TagKey::Compilation => Some("cpil"),
            TagKey::Tool => Some("\u{a9}too"),
            TagKey::Description => Some("desc"),
            TagKey::Long(..) => None,
        }
    }

    /// The string key this tag is stored under in a [`sndpipe_core::Tags`] map.
    pub fn as_map_key(&self) -> String {
        match self {
            TagKey::Title => "title".to_string(),
            TagKey::Artist => "artist".to_string(),
            TagKey::Album => "album".to_string(),
            TagKey::AlbumArtist => "album_artist".to_string(),
            TagKey::TrackNumber => "track".to_string(),
            TagKey::TrackTotal => "track_total".to_string(),
            TagKey::DiscNumber => "disk".to_string(),
            TagKey::DiscTotal => "disk_total".to_string(),
            TagKey::GenreName => "genre".to_string(),
            TagKey::GenreId => "genre_id".to_string(),
            TagKey::Date => "date".to_string(),
            TagKey::Grouping => "grouping".to_string(),
            TagKey::Composer => "composer".to_string(),
            TagKey::Comment => "comment".to_string(),
            TagKey::Lyrics => "lyrics".to_string(),
            TagKey::Cover => "cover".to_string(),
            TagKey::Compilation => "compilation".to_string(),
            TagKey::Tool => "tool".to_string(),
            TagKey::Description => "description".to_string(),
            TagKey::Long(mean, name) => format!("long:{mean}:{name}"),
        }
    }

    /// Recover a `TagKey` from a `Tags` map key produced by [`Self::as_map_key`].
    pub fn from_map_key(key: &str) -> Option<TagKey> {
        Some(match key {
            "title" => TagKey::Title,
            "artist" => TagKey::Artist,
            "album" => TagKey::Album,
            "album_artist" => TagKey::AlbumArtist,
            "track" => TagKey::TrackNumber,
            "track_total" => TagKey::TrackTotal,
            "disk" => TagKey::DiscNumber,
            "disk_total" => TagKey::DiscTotal,
            "genre" => TagKey::GenreName,
            "genre_id" => TagKey::GenreId,
            "date" => TagKey::Date,
            "grouping" => TagKey::Grouping,
            "composer" => TagKey::Composer,
            "comment" => TagKey::Comment,
            "lyrics" => TagKey::Lyrics,
            "cover" => TagKey::Cover,
            "compilation" => TagKey::Compilation,
            "tool" => TagKey::Tool,
            "description" => TagKey::Description,
            other => {
                let mut parts = other.splitn(3, ':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("long"), Some(mean), Some(name)) => {
                        TagKey::Long(mean.to_string(), name.to_string())
                    }
                    _ => return None,
                }
            }
        })
    }
}

/// Insert `value` under `key`'s canonical map key, overwriting any prior value — later
/// sources win when merging per spec.md §4.4's Composite overlay order.
pub fn insert(tags: &mut Tags, key: TagKey, value: String) {
    tags.insert(key.as_map_key(), value);
}

/// Insert `value` under `key` only if the key is absent, implementing the "first-source-
/// wins" album-tag aggregation Composite sources use (spec.md §4.4).
pub fn insert_if_absent(tags: &mut Tags, key: TagKey, value: String) {
    tags.entry(key.as_map_key()).or_insert(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_key_round_trips() {
        for key in [
            TagKey::Title,
            TagKey::AlbumArtist,
            TagKey::TrackTotal,
            TagKey::Cover,
            TagKey::Long("com.apple.itunes".to_string(), "CUSTOM_FIELD".to_string()),
        ] {
            let map_key = key.as_map_key();
            assert_eq!(TagKey::from_map_key(&map_key), Some(key));
        }
    }

    #[test]
    fn track_and_track_total_share_the_trkn_atom() {
        assert_eq!(TagKey::TrackNumber.itunes_fourcc(), Some("trkn"));
        assert_eq!(TagKey::TrackTotal.itunes_fourcc(), Some("trkn"));
    }

    #[test]
    fn insert_if_absent_keeps_first_value() {
        let mut tags = Tags::new();
        insert_if_absent(&mut tags, TagKey::Album, "First".to_string());
        insert_if_absent(&mut tags, TagKey::Album, "Second".to_string());
        assert_eq!(tags.get("album").map(String::as_str), Some("First"));
    }
}

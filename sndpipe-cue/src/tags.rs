// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Maps a cue sheet's free-form `REM`/`PERFORMER`/`SONGWRITER`/`TITLE` key-value pairs onto
//! the canonical tag vocabulary (spec.md §4.11), grounded on
//! `original_source/cuesheet.cpp`'s `Cue::ConvertToItunesTags`.

use std::collections::BTreeMap;

use sndpipe_core::Tags;
use sndpipe_metadata::tags::{insert, TagKey};

/// Converts a cue sheet's (or one track's) raw meta map into canonical tags. `album`
/// selects disc-level field names (`TITLE` -> album, `PERFORMER` -> album artist) over
/// track-level ones (`TITLE` -> title, `PERFORMER` -> artist), matching the original's
/// `album` parameter.
pub fn convert_to_tags(meta: &BTreeMap<String, String>, album: bool) -> Tags {
    let mut tags = Tags::new();
    let mut discnumber = None;
    let mut totaldiscs = None;

    for (key, value) in meta {
        match key.to_ascii_lowercase().as_str() {
            "title" => insert(&mut tags, if album { TagKey::Album } else { TagKey::Title }, value.clone()),
            "performer" => {
                if album {
                    insert(&mut tags, TagKey::AlbumArtist, value.clone());
                    insert(&mut tags, TagKey::Artist, value.clone());
                } else {
                    insert(&mut tags, TagKey::Artist, value.clone());
                }
            }
            "genre" => insert(&mut tags, TagKey::GenreName, value.clone()),
            "date" => insert(&mut tags, TagKey::Date, value.clone()),
            "songwriter" => insert(&mut tags, TagKey::Composer, value.clone()),
            "discnumber" => discnumber = value.parse::<u32>().ok(),
            "totaldiscs" => totaldiscs = value.parse::<u32>().ok(),
            _ => {}
        }
    }

    if let Some(disc) = discnumber {
        let value = match totaldiscs {
            Some(total) => format!("{disc}/{total}"),
            None => disc.to_string(),
        };
        insert(&mut tags, TagKey::DiscNumber, value);
    }

    tags
}

/// Overlays `track` tags on top of `album` tags, track tags winning (the original's
/// `track_tags.insert(album_tags.begin(), album_tags.end())`, which is a no-overwrite
/// `std::map::insert`).
pub fn overlay_album_tags(track: &mut Tags, album: &Tags) {
    for (key, value) in album {
        track.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn album_performer_also_fills_artist() {
        let mut meta = BTreeMap::new();
        meta.insert("PERFORMER".to_string(), "Band".to_string());
        let tags = convert_to_tags(&meta, true);
        assert_eq!(tags.get("album_artist").map(String::as_str), Some("Band"));
        assert_eq!(tags.get("artist").map(String::as_str), Some("Band"));
    }

    #[test]
    fn disc_number_combines_with_total_discs() {
        let mut meta = BTreeMap::new();
        meta.insert("DISCNUMBER".to_string(), "2".to_string());
        meta.insert("TOTALDISCS".to_string(), "3".to_string());
        let tags = convert_to_tags(&meta, false);
        assert_eq!(tags.get("disk").map(String::as_str), Some("2/3"));
    }

    #[test]
    fn track_tags_are_not_overwritten_by_album_tags() {
        let mut track = Tags::new();
        track.insert("title".to_string(), "Track Title".to_string());
        let mut album = Tags::new();
        album.insert("title".to_string(), "Album Title".to_string());
        album.insert("genre".to_string(), "Rock".to_string());
        overlay_album_tags(&mut track, &album);
        assert_eq!(track.get("title").map(String::as_str), Some("Track Title"));
        assert_eq!(track.get("genre").map(String::as_str), Some("Rock"));
    }
}

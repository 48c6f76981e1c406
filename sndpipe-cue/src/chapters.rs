// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chapter lists, from a simple text file (spec.md §6) or from an embedded cue sheet
//! (spec.md §4.11A), grounded on `original_source/chapters.cpp`'s `add_entry`/
//! `load_from_file` and `original_source/cuesheet.cpp`'s `Cue::CueSheetToChapters`.

use sndpipe_core::error::malformed;
use sndpipe_core::{ChapterEntry, Result, Tags};

use crate::sheet::CueSheet;
use crate::tags::convert_to_tags;

/// Parses the simple chapter file format: one `HH:MM:SS.sss <title>` line per chapter.
/// The first timestamp must be exactly zero and every later one strictly greater than
/// the one before it, matching [`ChapterEntry`]'s own invariants directly
/// (`original_source/chapters.cpp`'s `add_entry`).
pub fn parse_simple_chapters(text: &str) -> Result<Vec<ChapterEntry>> {
    let mut entries = Vec::new();
    let mut last = None;

    for (i, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = i + 1;
        let Some((stamp, title)) = line.split_once(' ') else {
            return malformed("chapter line missing title");
        };
        let start_seconds = parse_timestamp(stamp)?;

        if entries.is_empty() {
            if start_seconds != 0.0 {
                log::error!("chapters: first chapter at line {line_no} must start at 00:00:00.000");
                return malformed("first chapter must start at zero");
            }
        } else if Some(start_seconds) <= last {
            log::error!("chapters: timestamps must be strictly increasing at line {line_no}");
            return malformed("chapter timestamps must be strictly increasing");
        }
        last = Some(start_seconds);
        entries.push(ChapterEntry { title: title.trim().to_string(), start_seconds });
    }

    Ok(entries)
}

fn parse_timestamp(stamp: &str) -> Result<f64> {
    let parts: Vec<&str> = stamp.split(':').collect();
    if parts.len() != 3 {
        return malformed("invalid chapter timestamp format");
    }
    let (Ok(hh), Ok(mm), Ok(ss)) = (parts[0].parse::<f64>(), parts[1].parse::<f64>(), parts[2].parse::<f64>()) else {
        return malformed("invalid chapter timestamp format");
    };
    Ok(hh * 3600.0 + mm * 60.0 + ss)
}

/// Builds a chapter list directly from an embedded, single-`FILE` cue sheet. Unlike the
/// original's `Cue::CueSheetToChapters`, which stores duration pairs and later converts
/// them with `frame2sample`, chapter starts here are computed directly in CD-frame
/// seconds (`begin / 75.0`); [`ChapterEntry`] is already absolute-seconds based, so no
/// sample-rate-dependent conversion or duration/absolute round trip is needed.
pub fn embedded_cue_to_chapters(cue_text: &str) -> Result<(Vec<ChapterEntry>, Tags)> {
    let sheet = CueSheet::parse(cue_text)?;
    if sheet.has_multiple_files {
        return malformed("embedded cue sheet must reference a single file");
    }

    let mut entries = Vec::with_capacity(sheet.tracks.len());
    for track in &sheet.tracks {
        let start_seconds = track.audio_start_frame() as f64 / 75.0;
        entries.push(ChapterEntry { title: track.title(), start_seconds });
    }

    let album_tags = convert_to_tags(&sheet.meta, true);
    Ok((entries, album_tags))
}

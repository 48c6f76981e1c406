// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turns a parsed [`CueSheet`] into one [`Composite`] source per track (spec.md §4.11, C11),
//! grounded on `original_source/cuesheet.cpp`'s `CueSheet::loadTracks`.

use sndpipe_core::{Result, Source, Tags};
use sndpipe_pipeline::{Composite, NullSource, Trimmer};

use crate::sheet::{CueSheet, Track, GAP_FILENAME};
use crate::tags::{convert_to_tags, overlay_album_tags};

/// One track materialized as a playable source, its tags, and its suggested output
/// filename (the original's `chapters::Track`).
pub struct LoadedTrack {
    pub title: String,
    pub tags: Tags,
    pub source: Composite,
    pub output_filename: String,
}

/// CD frames (1/75 s) to sample count at `rate`, grounded on `original_source/cuesheet.cpp`'s
/// `frame2sample`.
fn frame_to_sample(rate: u32, nframe: u32) -> u64 {
    (nframe as f64 / 75.0 * rate as f64).round() as u64
}

/// Opens every track of `sheet` into a playable [`Composite`] source, filenames resolved
/// relative to the cue sheet's own directory by the caller-supplied `open`. `open` is
/// handed the segment's `FILE` filename verbatim (path joining is the caller's job, since
/// this crate does not depend on any particular filesystem or codec crate).
///
/// `filename_format` is a template string; `{key}` placeholders are replaced with the
/// matching tag (see [`crate::tags::convert_to_tags`] for the key vocabulary), and
/// `{tracknumber}` with the track's zero-padded number. Characters forbidden in
/// filenames (`:/\?|<>*"`) are replaced with `_`.
pub fn load_tracks(
    sheet: &CueSheet,
    filename_format: &str,
    mut open: impl FnMut(&str) -> Result<Box<dyn Source>>,
) -> Result<Vec<LoadedTrack>> {
    let album_tags = convert_to_tags(&sheet.meta, true);
    let total = sheet.tracks.len();
    let mut loaded = Vec::with_capacity(total);

    for track in &sheet.tracks {
        let mut track_tags = convert_to_tags(&track.meta, false);
        overlay_album_tags(&mut track_tags, &album_tags);
        track_tags.insert("track".to_string(), format!("{}/{total}", track.number));

        let mut composite: Option<Composite> = None;
        let mut last_format = None;

        for segment in &track.segments {
            let src: Box<dyn Source> = if segment.filename == GAP_FILENAME {
                let Some(fmt) = last_format else { continue };
                Box::new(NullSource::new(fmt, None))
            } else {
                let opened = open(&segment.filename)?;
                last_format = Some(opened.format());
                opened
            };

            let rate = src.format().sample_rate;
            let begin = frame_to_sample(rate, segment.begin);
            let duration = segment.end.map(|end| frame_to_sample(rate, end) - begin);
            let trimmed: Box<dyn Source> = Box::new(Trimmer::new(src, begin, duration)?);

            match &mut composite {
                Some(c) => c.add_source(trimmed)?,
                None => composite = Some(Composite::new(trimmed)),
            }
        }

        let Some(source) = composite else { continue };
        let output_filename = sanitize_filename(&render_template(filename_format, track, &track_tags));

        loaded.push(LoadedTrack { title: track.title(), tags: track_tags, source, output_filename });
    }

    Ok(loaded)
}

fn render_template(format: &str, track: &Track, tags: &Tags) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut key = String::new();
        let mut closed = false;
        for next in chars.by_ref() {
            if next == '}' {
                closed = true;
                break;
            }
            key.push(next);
        }
        if !closed {
            out.push('{');
            out.push_str(&key);
            continue;
        }
        let key_lower = key.to_ascii_lowercase();
        if key_lower == "tracknumber" {
            out.push_str(&format!("{:02}", track.number));
        } else {
            out.push_str(tags.get(&key_lower).map(String::as_str).unwrap_or(""));
        }
    }
    out
}

fn sanitize_filename(name: &str) -> String {
    name.chars().map(|c| if ":/\\?|<>*\"".contains(c) { '_' } else { c }).collect()
}

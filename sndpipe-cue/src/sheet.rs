// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cue-sheet parsing and arrangement (spec.md §4.11, C11), grounded on
//! `original_source/cuesheet.cpp`'s `CueSheet::parse`/`arrange` and their `parseFile`/
//! `parseTrack`/`parseIndex`/`parsePregap`/`parsePostgap`/`parseMeta` command handlers.

use std::collections::BTreeMap;

use sndpipe_core::error::malformed;
use sndpipe_core::Result;

use crate::tokenizer::tokenize_line;

/// The synthetic filename `PREGAP`/`POSTGAP` segments carry; [`crate::tracks::load_tracks`]
/// turns these into [`sndpipe_pipeline::NullSource`] instead of opening a file.
pub const GAP_FILENAME: &str = "__GAP__";

#[derive(Clone, Debug)]
pub(crate) struct Segment {
    pub filename: String,
    pub index: i64,
    pub begin: u32,
    /// `None` means "extends to the end of `filename`", only ever true of the very last
    /// segment in the whole sheet before arrangement closes it.
    pub end: Option<u32>,
}

/// One `TRACK ... AUDIO` entry and its `INDEX`/`PREGAP`/`POSTGAP` segments.
#[derive(Clone, Debug, Default)]
pub struct Track {
    pub number: u32,
    /// Raw `REM`/`PERFORMER`/`SONGWRITER`/`TITLE` key-value pairs, keys as written in the
    /// sheet (case preserved; looked up case-insensitively).
    pub meta: BTreeMap<String, String>,
    pub(crate) segments: Vec<Segment>,
}

impl Track {
    /// The track's `TITLE`, or an empty string if none was set.
    pub fn title(&self) -> String {
        self.meta_get("title").unwrap_or_default()
    }

    pub fn meta_get(&self, key: &str) -> Option<String> {
        self.meta.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.clone())
    }

    /// The CD-frame offset (1/75 s) the track's audio actually starts at, i.e. its
    /// `INDEX 01` position after arrangement has moved any `INDEX 00`/`PREGAP` segment
    /// onto the previous track.
    pub(crate) fn audio_start_frame(&self) -> u32 {
        self.segments.first().map(|s| s.begin).unwrap_or(0)
    }
}

/// A fully parsed and arranged cue sheet.
#[derive(Clone, Debug, Default)]
pub struct CueSheet {
    pub tracks: Vec<Track>,
    pub meta: BTreeMap<String, String>,
    /// Whether more than one distinct `FILE` command was seen (spec.md §4.11A: embedded
    /// cue sheets reject this).
    pub has_multiple_files: bool,
}

impl CueSheet {
    /// Parses `text` and arranges its tracks (spec.md §4.11).
    pub fn parse(text: &str) -> Result<CueSheet> {
        let mut sheet = CueSheet::default();
        let mut cur_file: Option<String> = None;

        for (i, raw_line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw_line.trim_end_matches('\r');
            let fields = tokenize_line(line, line_no)?;
            if fields.is_empty() {
                continue;
            }
            let cmd = fields[0].to_ascii_uppercase();
            match cmd.as_str() {
                "FILE" => {
                    if fields.len() != 3 {
                        return malformed("FILE command expects 2 arguments");
                    }
                    let name = fields[1].clone();
                    if let Some(prev) = &cur_file {
                        if *prev != name {
                            sheet.has_multiple_files = true;
                        }
                    }
                    cur_file = Some(name);
                }
                "TRACK" => {
                    if fields.len() != 3 {
                        return malformed("TRACK command expects 2 arguments");
                    }
                    if fields[2].eq_ignore_ascii_case("AUDIO") {
                        let number = match fields[1].parse() {
                            Ok(n) => n,
                            Err(_) => return malformed("invalid TRACK number"),
                        };
                        sheet.tracks.push(Track { number, meta: BTreeMap::new(), segments: Vec::new() });
                    }
                }
                "INDEX" => {
                    if fields.len() != 3 {
                        return malformed("INDEX command expects 2 arguments");
                    }
                    if sheet.tracks.is_empty() {
                        return malformed("INDEX command before TRACK");
                    }
                    let Some(file) = cur_file.clone() else {
                        return malformed("INDEX command before FILE");
                    };
                    let index: i64 = match fields[1].parse() {
                        Ok(n) => n,
                        Err(_) => return malformed("invalid INDEX number"),
                    };
                    let (mm, ss, ff) = parse_msf(&fields[2])?;
                    if ss > 59 || ff > 74 {
                        return malformed("invalid INDEX time format");
                    }
                    let nframes = msf_to_frames(mm, ss, ff);

                    if let Some(last) = last_segment_mut(&mut sheet.tracks) {
                        if last.filename == file {
                            if last.begin >= nframes {
                                log::error!("cuesheet: INDEX time must be ascending at line {line_no}");
                                return malformed("INDEX time must be in ascending order");
                            }
                            last.end = Some(nframes);
                        }
                    }
                    sheet.tracks.last_mut().unwrap().segments.push(Segment { filename: file, index, begin: nframes, end: None });
                }
                "PREGAP" | "POSTGAP" => {
                    if fields.len() != 2 {
                        return malformed("PREGAP/POSTGAP command expects 1 argument");
                    }
                    if sheet.tracks.is_empty() {
                        return malformed("PREGAP/POSTGAP command before TRACK");
                    }
                    let (mm, ss, ff) = parse_msf(&fields[1])?;
                    let nframes = msf_to_frames(mm, ss, ff);
                    let index = if cmd == "PREGAP" { 0 } else { i64::MAX };
                    sheet.tracks.last_mut().unwrap().segments.push(Segment {
                        filename: GAP_FILENAME.to_string(),
                        index,
                        begin: 0,
                        end: Some(nframes),
                    });
                }
                "REM" => {
                    if fields.len() == 3 {
                        insert_meta(&mut sheet, fields[1].clone(), fields[2].clone());
                    }
                }
                "CATALOG" | "ISRC" | "PERFORMER" | "SONGWRITER" | "TITLE" => {
                    if fields.len() != 2 {
                        return malformed("metadata command expects 1 argument");
                    }
                    insert_meta(&mut sheet, fields[0].clone(), fields[1].clone());
                }
                _ => {}
            }
        }

        sheet.arrange()?;
        Ok(sheet)
    }

    fn arrange(&mut self) -> Result<()> {
        for track in &self.tracks {
            let mut last_index = -1i64;
            let mut has_index1 = false;
            for seg in &track.segments {
                if last_index >= seg.index {
                    return malformed("INDEX must be in strictly ascending order within a track");
                }
                last_index = seg.index;
                if seg.index == 1 {
                    has_index1 = true;
                }
            }
            if !has_index1 {
                return malformed("track is missing INDEX 01");
            }
        }

        // An INDEX 00 or PREGAP segment always leads a track; it belongs to the *previous*
        // track's tail (original_source/cuesheet.cpp's `arrange`).
        for i in 0..self.tracks.len() {
            if self.tracks[i].segments.first().map(|s| s.index) == Some(0) {
                let moved = self.tracks[i].segments.remove(0);
                if i > 0 {
                    self.tracks[i - 1].segments.push(moved);
                }
            }
        }

        for track in &mut self.tracks {
            let mut merged: Vec<Segment> = Vec::with_capacity(track.segments.len());
            for seg in track.segments.drain(..) {
                match merged.last_mut() {
                    Some(last) if last.filename == seg.filename && last.end == Some(seg.begin) => {
                        last.end = seg.end;
                    }
                    _ => merged.push(seg),
                }
            }
            track.segments = merged;
        }
        Ok(())
    }
}

fn insert_meta(sheet: &mut CueSheet, key: String, value: String) {
    if let Some(track) = sheet.tracks.last_mut() {
        track.meta.insert(key, value);
    } else {
        sheet.meta.insert(key, value);
    }
}

fn last_segment_mut(tracks: &mut [Track]) -> Option<&mut Segment> {
    tracks.iter_mut().rev().find(|t| !t.segments.is_empty()).and_then(|t| t.segments.last_mut())
}

fn parse_msf(s: &str) -> Result<(u32, u32, u32)> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return malformed("invalid MM:SS:FF time format");
    }
    match (parts[0].parse(), parts[1].parse(), parts[2].parse()) {
        (Ok(mm), Ok(ss), Ok(ff)) => Ok((mm, ss, ff)),
        _ => malformed("invalid MM:SS:FF time format"),
    }
}

fn msf_to_frames(mm: u32, ss: u32, ff: u32) -> u32 {
    (mm * 60 + ss) * 75 + ff
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `moov.udta.meta.ilst` tag box tree and the `iTunSMPB` gapless free-form tag
//! (spec.md §4.13, §6).

use sndpipe_core::Tags;
use sndpipe_metadata::TagKey;

use crate::atom::{atom, concat, full_box_body};

/// Gapless playback parameters carried in `iTunSMPB` and the `edts` edit list
/// (spec.md §4.13).
#[derive(Clone, Copy, Debug)]
pub struct GaplessInfo {
    pub edit_start: u64,
    pub edit_duration: u64,
    pub total_duration: u64,
}

/// Format the `iTunSMPB` value: twelve space-separated hex fields, four meaningful.
pub fn itunsmpb_value(info: GaplessInfo) -> String {
    let padding = info.total_duration.saturating_sub(info.edit_start + info.edit_duration);
    let samples_hi = (info.edit_duration >> 32) as u32;
    let samples_lo = (info.edit_duration & 0xffff_ffff) as u32;
    format!(
        " 00000000 {:08X} {:08X} {:08X}{:08X} 00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000",
        info.edit_start as u32, padding as u32, samples_hi, samples_lo
    )
}

fn data_atom(type_code: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&type_code.to_be_bytes());
    body.extend_from_slice(&0u32.to_be_bytes()); // locale
    body.extend_from_slice(payload);
    atom(b"data", &body)
}

fn text_item(fourcc: &str, value: &str) -> Vec<u8> {
    // `fourcc` may hold a non-ASCII char (the iTunes "copyright-a" lead byte `\u{a9}`);
    // it always maps onto a single byte, so each `char` is truncated to its low byte
    // rather than read as ASCII.
    let mut tag = [0u8; 4];
    for (i, c) in fourcc.chars().take(4).enumerate() {
        tag[i] = c as u8;
    }
    atom(&tag, &data_atom(1, value.as_bytes()))
}

fn freeform_item(mean: &str, name: &str, value: &str) -> Vec<u8> {
    let mean_atom = atom(b"mean", &{
        let mut b = vec![0u8; 4];
        b.extend_from_slice(mean.as_bytes());
        b
    });
    let name_atom = atom(b"name", &{
        let mut b = vec![0u8; 4];
        b.extend_from_slice(name.as_bytes());
        b
    });
    let data = data_atom(1, value.as_bytes());
    atom(b"----", &concat(&[mean_atom, name_atom, data]))
}

/// Build `moov.udta.meta.ilst` from the flat tag map plus an optional gapless field.
pub fn udta(tags: &Tags, gapless: Option<GaplessInfo>) -> Vec<u8> {
    let mut items = Vec::new();
    for (key, value) in tags {
        let Some(tag_key) = TagKey::from_map_key(key) else { continue };
        match &tag_key {
            TagKey::Long(mean, name) => items.push(freeform_item(mean, name, value)),
            _ => {
                if let Some(fourcc) = tag_key.itunes_fourcc() {
                    items.push(text_item(fourcc, value));
                }
            }
        }
    }
    if let Some(info) = gapless {
        items.push(freeform_item("com.apple.iTunes", "iTunSMPB", &itunsmpb_value(info)));
    }

    let ilst = atom(b"ilst", &concat(&items));
    let hdlr = {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(b"mdir");
        body.extend_from_slice(b"appl");
        body.extend_from_slice(&[0u8; 8]);
        body.push(0);
        atom(b"hdlr", &full_box_body(0, 0, &body))
    };
    let meta = atom(b"meta", &full_box_body(0, 0, &concat(&[hdlr, ilst])));
    atom(b"udta", &concat(&[meta]))
}

// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ALAC magic cookie parse (spec.md §4.13): accepts either a bare 24-byte
//! `ALACSpecificConfig`, or one wrapped in `frmaalac`/`alac`/`chan` atoms as produced by
//! Apple's `ALACMagicCookieDescription`. Grounded on the cookie field layout in
//! `symphonia-common/src/apple/audio/alac.rs`'s `MagicCookie`, adapted to carry the
//! bytes through to an MP4 `alac` sample entry rather than feeding a decoder.

use sndpipe_core::error::malformed;
use sndpipe_core::Result;

pub const ALAC_SPECIFIC_CONFIG_LEN: usize = 24;
pub const ALAC_CHANNEL_LAYOUT_LEN: usize = 12;

/// The bytes an `alac` sample entry carries: the mandatory `ALACSpecificConfig`, plus an
/// optional `ALACChannelLayout` (present only when channels exceed stereo).
#[derive(Clone, Debug)]
pub struct AlacCookie {
    pub specific_config: [u8; ALAC_SPECIFIC_CONFIG_LEN],
    pub channel_layout: Option<[u8; ALAC_CHANNEL_LAYOUT_LEN]>,
}

impl AlacCookie {
    pub fn parse(raw: &[u8]) -> Result<AlacCookie> {
        // Strip a `frmaalac` wrapper if present: 4-byte size + "frma" + 4-byte "alac" +
        // 4-byte size + "alac" preceding the actual config, as produced by QuickTime's
        // `SoundDescriptionV2` wrapping convention.
        let body = strip_wrapper(raw)?;

        if body.len() == ALAC_SPECIFIC_CONFIG_LEN {
            let mut specific_config = [0u8; ALAC_SPECIFIC_CONFIG_LEN];
            specific_config.copy_from_slice(body);
            return Ok(AlacCookie { specific_config, channel_layout: None });
        }

        if body.len() == ALAC_SPECIFIC_CONFIG_LEN + ALAC_CHANNEL_LAYOUT_LEN {
            let mut specific_config = [0u8; ALAC_SPECIFIC_CONFIG_LEN];
            specific_config.copy_from_slice(&body[..ALAC_SPECIFIC_CONFIG_LEN]);
            let mut channel_layout = [0u8; ALAC_CHANNEL_LAYOUT_LEN];
            channel_layout.copy_from_slice(&body[ALAC_SPECIFIC_CONFIG_LEN..]);
            return Ok(AlacCookie { specific_config, channel_layout: Some(channel_layout) });
        }

        malformed("alac: magic cookie is not 24 or 36 bytes")
    }
}

fn strip_wrapper(raw: &[u8]) -> Result<&[u8]> {
    if raw.len() < 12 || &raw[4..8] != b"frma" {
        return Ok(raw);
    }
    // "frma" atom (size+fourcc+"alac") followed by an "alac" atom whose body is the
    // actual specific config (and optional channel layout atom, ignored: this muxer
    // derives the layout from the stream format rather than re-reading the source's).
    let frma_len = u32::from_be_bytes(raw[0..4].try_into().unwrap()) as usize;
    if frma_len > raw.len() || frma_len < 8 {
        return malformed("alac: malformed frma wrapper");
    }
    let rest = &raw[frma_len..];
    if rest.len() < 8 || &rest[4..8] != b"alac" {
        return malformed("alac: frma wrapper missing alac atom");
    }
    let alac_len = u32::from_be_bytes(rest[0..4].try_into().unwrap()) as usize;
    if alac_len < 8 || alac_len > rest.len() {
        return malformed("alac: malformed alac wrapper");
    }
    Ok(&rest[8..alac_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_config() {
        let raw = vec![0u8; ALAC_SPECIFIC_CONFIG_LEN];
        let cookie = AlacCookie::parse(&raw).unwrap();
        assert!(cookie.channel_layout.is_none());
    }

    #[test]
    fn parses_config_with_channel_layout() {
        let raw = vec![0u8; ALAC_SPECIFIC_CONFIG_LEN + ALAC_CHANNEL_LAYOUT_LEN];
        let cookie = AlacCookie::parse(&raw).unwrap();
        assert!(cookie.channel_layout.is_some());
    }

    #[test]
    fn strips_frma_alac_wrapper() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&12u32.to_be_bytes());
        raw.extend_from_slice(b"frma");
        raw.extend_from_slice(b"alac");
        let config = vec![0xaau8; ALAC_SPECIFIC_CONFIG_LEN];
        raw.extend_from_slice(&(8 + config.len() as u32).to_be_bytes());
        raw.extend_from_slice(b"alac");
        raw.extend_from_slice(&config);

        let cookie = AlacCookie::parse(&raw).unwrap();
        assert_eq!(&cookie.specific_config[..], config.as_slice());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(AlacCookie::parse(&[0u8; 10]).is_err());
    }
}

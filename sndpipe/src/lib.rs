// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # sndpipe
//!
//! `sndpipe` is an audio transcoding pipeline: it reads one of a handful of lossless
//! container formats, runs the decoded audio through a configurable chain of DSP stages,
//! and writes it back out through a sink. This crate is the facade over the workspace's
//! component crates; most applications only need to depend on `sndpipe` and select the
//! format features they need.
//!
//! ## Formats
//!
//! | Format   | Feature Flag | Default | Role |
//! |----------|--------------|---------|------|
//! | WAV/RF64 | `wav`        | Yes     | source + sink |
//! | FLAC     | `flac`       | Yes     | source |
//! | Raw PCM  | `pcm`        | Yes     | source (caller pre-declares `StreamFormat`) |
//! | WavPack  | `wavpack`    | No      | source (requires an external decode kernel) |
//! | TAK      | `tak`        | No      | source (requires an external decode kernel) |
//! | MP4/ADTS | `isomp4`     | No      | sink (requires an external encode kernel) |
//!
//! `cue` (on by default) pulls in [`cue`] for cue-sheet parsing and per-track source
//! construction.
//!
//! ## Usage
//!
//! 1. Obtain a [`sndpipe_core::io::MediaSource`] (`std::fs::File` and `std::io::Cursor`
//!    both implement it already).
//! 2. Call [`probe::open_source`] to detect the container and construct a
//!    [`sndpipe_core::Source`], or construct a specific adapter directly (e.g.
//!    [`sources::FlacSource::try_new`]) if the format is already known.
//! 3. Build a [`sndpipe_pipeline::config::PipelineConfig`] describing the desired trim,
//!    channel remap, mix matrix, resample rate, gain, and dynamics stages, and pass it to
//!    [`sndpipe_pipeline::config::assemble`] along with the source.
//! 4. Read frames from the assembled source and hand them to a sink (e.g.
//!    [`sinks::WavSink`]).

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use sndpipe_core as core;
pub use sndpipe_dsp as dsp;
pub use sndpipe_metadata as metadata;
pub use sndpipe_pipeline as pipeline;

#[cfg(feature = "cue")]
pub use sndpipe_cue as cue;

pub mod sources {
    //! Re-exports of every enabled source adapter.

    #[cfg(feature = "flac")]
    pub use sndpipe_codec_flac::FlacSource;
    #[cfg(feature = "pcm")]
    pub use sndpipe_codec_pcm::PcmSource;
    #[cfg(feature = "tak")]
    pub use sndpipe_codec_tak::{TakDecoderKernel, TakSource};
    #[cfg(feature = "wav")]
    pub use sndpipe_format_riff::WavSource;
    #[cfg(feature = "wavpack")]
    pub use sndpipe_codec_wavpack::{WavPackDecoderKernel, WavPackSource};
}

pub mod sinks {
    //! Re-exports of every enabled sink adapter.

    #[cfg(feature = "wav")]
    pub use sndpipe_format_riff::WavSink;

    #[cfg(feature = "isomp4")]
    pub use sndpipe_format_isomp4::{
        AacEncoderKernel, AdtsSink, AlacCookie, AlacEncoderKernel, AudioSpecificConfig, Mp4AacSink, Mp4AlacSink,
    };
}

pub mod probe {
    //! Magic-prefix format detection (spec.md §4.3, §6's "magic-detected in this probe
    //! order: RIFF/RF64 WAV, FLAC..., WavPack..., TAK, raw PCM"). Unlike a trial-and-
    //! fallback registry, the four supported containers are distinguished by their first
    //! four bytes alone, so [`open_source`] peeks that one magic value, rewinds, and
    //! constructs exactly the one matching adapter. Raw PCM is never auto-probed: it has
    //! no magic of its own and is only usable when the caller already knows the stream's
    //! `StreamFormat` (spec.md §6).
    //!
    //! WavPack and TAK decode their entropy-coded payload through an external kernel
    //! (spec.md §4.13A); `open_source` takes an optional kernel for each so a caller who
    //! has not wired one in yet still gets every other format probed normally and a clear
    //! [`sndpipe_core::Error::UnsupportedFormat`] if the stream turns out to need the
    //! missing kernel.

    use std::io::{Read, Seek, SeekFrom};

    use sndpipe_core::error::malformed;
    use sndpipe_core::io::MediaSource;
    use sndpipe_core::{Error, Result, Source};

    /// Detects the container format of `media` from its leading magic bytes and
    /// constructs the matching [`Source`].
    pub fn open_source<M>(
        mut media: M,
        #[cfg(feature = "wavpack")] wavpack_kernel: Option<Box<dyn sndpipe_codec_wavpack::WavPackDecoderKernel>>,
        #[cfg(feature = "tak")] tak_kernel: Option<Box<dyn sndpipe_codec_tak::TakDecoderKernel>>,
    ) -> Result<Box<dyn Source>>
    where
        M: MediaSource + 'static,
    {
        let mut magic = [0u8; 4];
        if media.read_exact(&mut magic).is_err() {
            return Err(Error::ShortRead);
        }
        media.seek(SeekFrom::Start(0))?;

        match &magic {
            #[cfg(feature = "wav")]
            b"RIFF" | b"RF64" => Ok(Box::new(sndpipe_format_riff::WavSource::try_new(media, false)?)),

            #[cfg(feature = "flac")]
            b"fLaC" => Ok(Box::new(sndpipe_codec_flac::FlacSource::try_new(media)?)),

            #[cfg(feature = "wavpack")]
            b"wvpk" => {
                let kernel = wavpack_kernel.ok_or_else(|| {
                    log::error!("probe: stream is WavPack but no decode kernel was supplied");
                    Error::UnsupportedFormat("wavpack: no decode kernel supplied")
                })?;
                Ok(Box::new(sndpipe_codec_wavpack::WavPackSource::try_new(media, kernel)?))
            }

            #[cfg(feature = "tak")]
            b"tBaK" => {
                let kernel = tak_kernel.ok_or_else(|| {
                    log::error!("probe: stream is TAK but no decode kernel was supplied");
                    Error::UnsupportedFormat("tak: no decode kernel supplied")
                })?;
                Ok(Box::new(sndpipe_codec_tak::TakSource::try_new(media, kernel)?))
            }

            _ => malformed("probe: no enabled adapter recognized this stream's magic bytes"),
        }
    }
}

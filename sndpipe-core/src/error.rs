// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the closed error taxonomy shared by every stage of the
//! pipeline (sources, filters, sinks).

use std::fmt;
use std::io;
use std::ops::Deref;

/// Why a seek failed.
#[derive(Debug)]
pub enum SeekErrorKind {
    /// The underlying stream cannot be seeked at all.
    Unseekable,
    /// The requested position lies before the start or past the known end of the source.
    OutOfRange,
}

impl SeekErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SeekErrorKind::Unseekable => "stream is not seekable",
            SeekErrorKind::OutOfRange => "seek position out of range",
        }
    }
}

/// `Error` enumerates every way a stage of the pipeline can fail. See spec.md §7 for the
/// taxonomy this mirrors.
#[derive(Debug)]
pub enum Error {
    /// The byte stream ended before a chunk, block, or frame could be fully read.
    ShortRead,
    /// A container's magic, chunk size, or mandatory structure was invalid.
    MalformedContainer(&'static str),
    /// The stream describes a format this pipeline cannot represent (bit depth, channel
    /// count, sample rate).
    UnsupportedFormat(&'static str),
    /// A seek was requested that the source cannot satisfy.
    SeekUnsupported(SeekErrorKind),
    /// A trim or cue-sheet range falls outside the bounds of its source.
    RangeError(&'static str),
    /// A matrix mixer coefficient table failed validation.
    InvalidMatrix(&'static str),
    /// An external encoder/decoder kernel reported failure.
    CodecFailure(&'static str),
    /// The underlying byte stream raised an I/O error.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShortRead => write!(f, "premature end of stream"),
            Error::MalformedContainer(msg) => write!(f, "malformed container: {msg}"),
            Error::UnsupportedFormat(msg) => write!(f, "unsupported format: {msg}"),
            Error::SeekUnsupported(kind) => write!(f, "seek failed: {}", kind.as_str()),
            Error::RangeError(msg) => write!(f, "range error: {msg}"),
            Error::InvalidMatrix(msg) => write!(f, "invalid matrix: {msg}"),
            Error::CodecFailure(msg) => write!(f, "codec failure: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err.deref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::ShortRead,
            _ => Error::Io(err),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Convenience function to create a malformed-container error.
pub fn malformed<T>(desc: &'static str) -> Result<T> {
    Err(Error::MalformedContainer(desc))
}

/// Convenience function to create an unsupported-format error.
pub fn unsupported<T>(desc: &'static str) -> Result<T> {
    Err(Error::UnsupportedFormat(desc))
}

/// Convenience function to create a range error.
pub fn range_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::RangeError(desc))
}

/// Convenience function to create an invalid-matrix error.
pub fn invalid_matrix<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidMatrix(desc))
}

/// Convenience function to create a codec-failure error.
pub fn codec_failure<T>(desc: &'static str) -> Result<T> {
    Err(Error::CodecFailure(desc))
}

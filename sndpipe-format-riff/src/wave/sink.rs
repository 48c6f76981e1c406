// sndpipe
// Copyright (c) 2019-2024 The sndpipe Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WAV/RF64 [`Sink`] (spec.md §4.12). On open, a placeholder RIFF/RF64 header is
//! written along with a reserved 36-byte `JUNK` chunk that is rewritten in place as `ds64`
//! only if `finalize` discovers the payload exceeded 4 GiB. This placeholder-then-patch
//! strategy, including the exact reserved layout, follows the original WAV encoder this
//! component is modeled on rather than anything in the teacher crate, which only reads WAV.

use std::io::{Seek, SeekFrom, Write};

use sndpipe_core::{ByteOrder, ChannelMask, Encoding, Result, Sink, StreamFormat};

const SUBTYPE_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];
const SUBTYPE_IEEE_FLOAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// `u32::MAX` is reserved as the RF64 "look in `ds64`" sentinel, so the largest size a
/// 32-bit field may actually carry is one less.
const MAX_32: u64 = 0xffff_fffe;

pub struct WavSink<W: Write + Seek> {
    out: W,
    format: StreamFormat,
    #[allow(dead_code)] // kept for callers introspecting the sink's declared layout.
    channel_mask: Option<ChannelMask>,
    seekable: bool,
    /// Byte offset of the `data` chunk's first payload byte.
    data_pos: u64,
    /// Byte offset of the reserved `JUNK`/`ds64` chunk's four-character tag, if one was
    /// reserved (only when the output is seekable).
    ds64_tag_pos: Option<u64>,
    bytes_written: u64,
}

impl<W: Write + Seek> WavSink<W> {
    /// Open a new WAV/RF64 sink. `seekable` tells the sink whether it may patch the header
    /// on [`Self::finalize`]; a non-seekable output commits to an RF64-shaped header up
    /// front and can never be corrected back down to a plain 32-bit RIFF file.
    pub fn create(
        mut out: W,
        format: StreamFormat,
        channel_mask: Option<ChannelMask>,
        seekable: bool,
    ) -> Result<WavSink<W>> {
        let use_extensible = format.channels > 2
            || format.bits_per_sample > 16
            || matches!(format.encoding, Encoding::Float);

        out.write_all(b"RIFF")?;
        out.write_all(&0xffff_ffffu32.to_le_bytes())?;
        out.write_all(b"WAVE")?;

        let ds64_tag_pos = if seekable {
            let pos = out.stream_position()?;
            out.write_all(b"JUNK")?;
            out.write_all(&28u32.to_le_bytes())?;
            out.write_all(&[0u8; 28])?;
            Some(pos)
        } else {
            None
        };

        let fmt_tag = if use_extensible {
            WAVE_FORMAT_EXTENSIBLE
        } else if matches!(format.encoding, Encoding::Float) {
            WAVE_FORMAT_IEEE_FLOAT
        } else {
            WAVE_FORMAT_PCM
        };
        let frame_bytes = format.frame_bytes() as u32;

        out.write_all(b"fmt ")?;
        out.write_all(&(if use_extensible { 40u32 } else { 16u32 }).to_le_bytes())?;
        out.write_all(&fmt_tag.to_le_bytes())?;
        out.write_all(&(format.channels as u16).to_le_bytes())?;
        out.write_all(&format.sample_rate.to_le_bytes())?;
        out.write_all(&(format.sample_rate * frame_bytes).to_le_bytes())?;
        out.write_all(&(frame_bytes as u16).to_le_bytes())?;
        out.write_all(&(format.container_bits_per_sample as u16).to_le_bytes())?;
        if use_extensible {
            out.write_all(&22u16.to_le_bytes())?;
            out.write_all(&(format.bits_per_sample as u16).to_le_bytes())?;
            out.write_all(&channel_mask.map(|m| m.bits()).unwrap_or(0).to_le_bytes())?;
            let guid =
                if matches!(format.encoding, Encoding::Float) { SUBTYPE_IEEE_FLOAT } else { SUBTYPE_PCM };
            out.write_all(&guid)?;
        }

        out.write_all(b"data")?;
        out.write_all(&0xffff_ffffu32.to_le_bytes())?;
        let data_pos = out.stream_position()?;

        Ok(WavSink {
            out,
            format,
            channel_mask,
            seekable,
            data_pos,
            ds64_tag_pos,
            bytes_written: 0,
        })
    }

    fn frame_bytes(&self) -> usize {
        self.format.frame_bytes()
    }
}

impl<W: Write + Seek> Sink for WavSink<W> {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn write_frames(&mut self, buf: &[u8], n_frames: usize) -> Result<()> {
        let frame_bytes = self.frame_bytes();
        let n_bytes = n_frames * frame_bytes;
        let payload = &buf[..n_bytes];

        let needs_swap = matches!(self.format.byte_order, ByteOrder::BigEndian);
        let flip_unsigned = self.format.bits_per_sample == 8
            && matches!(self.format.encoding, Encoding::SignedInt);

        if !needs_swap && !flip_unsigned {
            self.out.write_all(payload)?;
        } else {
            let sample_bytes = self.format.container_bytes_per_sample();
            let mut scratch = payload.to_vec();
            if flip_unsigned {
                for b in scratch.iter_mut() {
                    *b ^= 0x80;
                }
            }
            if needs_swap {
                for sample in scratch.chunks_mut(sample_bytes) {
                    sample.reverse();
                }
            }
            self.out.write_all(&scratch)?;
        }

        self.bytes_written += n_bytes as u64;
        if !self.seekable {
            self.out.flush()?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.bytes_written & 1 != 0 {
            self.out.write_all(&[0u8])?;
        }

        if !self.seekable {
            self.out.flush()?;
            return Ok(());
        }

        let data_size = self.bytes_written;
        let riff_size = self.data_pos + data_size - 8;

        if data_size <= MAX_32 && riff_size <= MAX_32 {
            self.out.seek(SeekFrom::Start(self.data_pos - 4))?;
            self.out.write_all(&(data_size as u32).to_le_bytes())?;
            self.out.seek(SeekFrom::Start(4))?;
            self.out.write_all(&(riff_size as u32).to_le_bytes())?;
        } else {
            self.out.seek(SeekFrom::Start(0))?;
            self.out.write_all(b"RF64")?;

            self.out.seek(SeekFrom::Start(self.data_pos - 4))?;
            self.out.write_all(&0xffff_ffffu32.to_le_bytes())?;

            let ds64_tag_pos =
                self.ds64_tag_pos.expect("ds64 placeholder must exist on a seekable sink");
            self.out.seek(SeekFrom::Start(ds64_tag_pos))?;
            self.out.write_all(b"ds64")?;
            self.out.seek(SeekFrom::Start(ds64_tag_pos + 8))?;
            let sample_count = data_size / self.frame_bytes() as u64;
            self.out.write_all(&riff_size.to_le_bytes())?;
            self.out.write_all(&data_size.to_le_bytes())?;
            self.out.write_all(&sample_count.to_le_bytes())?;
            self.out.write_all(&0u32.to_le_bytes())?;
        }

        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pcm_format(channels: u8, bits: u32) -> StreamFormat {
        StreamFormat::new(44_100, channels, Encoding::SignedInt, bits, bits, ByteOrder::LittleEndian)
            .unwrap()
    }

    #[test]
    fn small_stereo_file_patches_32_bit_sizes() {
        let format = pcm_format(2, 16);
        let mut sink = WavSink::create(Cursor::new(Vec::new()), format, None, true).unwrap();
        let frame = [1i16, 2i16];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&frame[0].to_le_bytes());
        bytes.extend_from_slice(&frame[1].to_le_bytes());
        sink.write_frames(&bytes, 1).unwrap();
        sink.finalize().unwrap();

        let out = sink.out.into_inner();
        assert_eq!(&out[0..4], b"RIFF");
        let riff_size = u32::from_le_bytes(out[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, out.len() - 8);
        assert_eq!(&out[8..12], b"WAVE");
    }

    #[test]
    fn extensible_used_for_multichannel() {
        let format = pcm_format(6, 24);
        let sink = WavSink::create(Cursor::new(Vec::new()), format, None, true).unwrap();
        let out = &sink.out.get_ref()[..];
        // "JUNK" reservation (8 + 28) sits between "WAVE" and "fmt ".
        let fmt_tag_offset = 12 + 36;
        assert_eq!(&out[fmt_tag_offset..fmt_tag_offset + 4], b"fmt ");
        let format_tag = u16::from_le_bytes(out[fmt_tag_offset + 8..fmt_tag_offset + 10].try_into().unwrap());
        assert_eq!(format_tag, WAVE_FORMAT_EXTENSIBLE);
    }

    #[test]
    fn non_seekable_sink_skips_patching() {
        struct WriteOnly(Vec<u8>);
        impl Write for WriteOnly {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        impl Seek for WriteOnly {
            fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
                Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "not seekable"))
            }
        }

        let format = pcm_format(1, 16);
        let mut sink = WavSink::create(WriteOnly(Vec::new()), format, None, false).unwrap();
        sink.write_frames(&[0, 0], 1).unwrap();
        sink.finalize().unwrap();
    }
}

#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::core::Result;
use sndpipe::sources::{TakDecoderKernel, TakSource};
use sndpipe_fuzz::drain_source;

/// Exercises metadata block chain and APEv2 tag parsing without a real entropy decoder:
/// the compressed payload is never actually decompressed.
#[derive(Default)]
struct NullKernel;

impl TakDecoderKernel for NullKernel {
    fn decode_frame(&mut self, _remaining: &[u8], _out: &mut [i32]) -> Result<usize> {
        Ok(0)
    }
}

fuzz_target!(|data: Vec<u8>| {
    if let Ok(mut src) = TakSource::try_new(std::io::Cursor::new(data), NullKernel) {
        drain_source(&mut src);
    }
});

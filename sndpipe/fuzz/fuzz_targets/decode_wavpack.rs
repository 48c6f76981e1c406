#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::sources::{WavPackDecoderKernel, WavPackSource};
use sndpipe::core::Result;
use sndpipe_fuzz::drain_source;

/// Exercises block framing and header parsing without a real entropy decoder: the
/// compressed payload is never actually decompressed.
#[derive(Default)]
struct NullKernel;

impl WavPackDecoderKernel for NullKernel {
    fn decode_block(&mut self, _block: &[u8], _out: &mut [i32]) -> Result<usize> {
        Ok(0)
    }
}

fuzz_target!(|data: Vec<u8>| {
    if let Ok(mut src) = WavPackSource::try_new(std::io::Cursor::new(data), NullKernel) {
        drain_source(&mut src);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::sinks::{AlacCookie, AudioSpecificConfig};

fuzz_target!(|data: &[u8]| {
    let _ = AlacCookie::parse(data);
    let _ = AudioSpecificConfig::parse(data);
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::sources::WavSource;
use sndpipe_fuzz::drain_source;

fuzz_target!(|data: Vec<u8>| {
    if let Ok(mut src) = WavSource::try_new(std::io::Cursor::new(data), false) {
        drain_source(&mut src);
    }
});

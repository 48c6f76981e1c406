#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::probe::open_source;
use sndpipe_fuzz::drain_source;

fuzz_target!(|data: Vec<u8>| {
    if let Ok(mut src) = open_source(std::io::Cursor::new(data), None, None) {
        drain_source(src.as_mut());
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::sources::FlacSource;
use sndpipe_fuzz::drain_source;

fuzz_target!(|data: Vec<u8>| {
    if let Ok(mut src) = FlacSource::try_new(std::io::Cursor::new(data)) {
        drain_source(&mut src);
    }
});

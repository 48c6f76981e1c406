#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::cue::CueSheet;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let _ = CueSheet::parse(&text);
});

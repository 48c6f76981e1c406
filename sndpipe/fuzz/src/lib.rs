use sndpipe::core::Source;

/// Reads `src` to exhaustion, discarding the decoded frames. Shared by every fuzz target
/// that only needs to exercise a source's parsing and framing logic, not the frames
/// themselves.
pub fn drain_source(src: &mut dyn Source) {
    let mut buf = vec![0u8; 4096];
    loop {
        match src.read_frames(&mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

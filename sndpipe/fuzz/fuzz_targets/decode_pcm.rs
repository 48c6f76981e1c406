#![no_main]
use libfuzzer_sys::fuzz_target;
use sndpipe::core::{ByteOrder, Encoding, StreamFormat};
use sndpipe::sources::PcmSource;
use sndpipe_fuzz::drain_source;

fuzz_target!(|data: Vec<u8>| {
    if data.is_empty() {
        return;
    }

    // Use the first byte to select an encoding/bit depth/byte order combination, and the
    // rest of the data as raw sample bytes.
    let selector = data[0];
    let payload = data[1..].to_vec();

    let (encoding, bits) = match selector % 4 {
        0 => (Encoding::SignedInt, 16),
        1 => (Encoding::UnsignedInt, 8),
        2 => (Encoding::SignedInt, 24),
        _ => (Encoding::Float, 32),
    };
    let byte_order = if selector & 0x80 != 0 { ByteOrder::BigEndian } else { ByteOrder::LittleEndian };

    let Ok(format) = StreamFormat::new(44_100, 2, encoding, bits, bits, byte_order) else {
        return;
    };
    if let Ok(mut src) = PcmSource::new(std::io::Cursor::new(payload), format) {
        drain_source(&mut src);
    }
});

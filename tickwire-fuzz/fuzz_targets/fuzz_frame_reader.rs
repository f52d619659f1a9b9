#![no_main]

use libfuzzer_sys::fuzz_target;
use tickwire_core::codec::{FrameReader, Phase};
use tickwire_core::testing::MemoryStream;

const MAX_MESSAGE_SIZE: usize = 1024;
const PER_TICK: usize = 4;

fuzz_target!(|data: &[u8]| {
    // first byte picks how the input is split across ticks
    let Some((&chunk, body)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk).max(1);

    let (mut stream, peer) = MemoryStream::pair();
    let mut reader = FrameReader::new(MAX_MESSAGE_SIZE, PER_TICK);

    for piece in body.chunks(chunk) {
        peer.push(piece);
        let mut delivered = 0;
        match reader.read_batch(&mut stream, |payload| {
            assert!(payload.len() <= MAX_MESSAGE_SIZE);
            delivered += 1;
        }) {
            Ok(n) => {
                assert_eq!(n, delivered);
                assert!(n <= PER_TICK);
            }
            Err(e) => {
                assert!(e.is_protocol_violation());
                return;
            }
        }
        if let Phase::AwaitingContent(size) = reader.phase() {
            assert!(size <= MAX_MESSAGE_SIZE);
        }
    }
});

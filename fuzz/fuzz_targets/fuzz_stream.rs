#![no_main]

use libfuzzer_sys::fuzz_target;
use lz4window::{EncoderOptions, StreamingEncoder, WINDOW_SIZE};

fuzz_target!(|data: &[u8]| {
    // Skip very large inputs
    if data.len() < 3 || data.len() > 1_000_000 {
        return;
    }

    // First bytes pick the configuration, the rest is the stream
    let block_size = 16 + (data[0] as usize) * 64;
    let extra_blocks = (data[1] % 4) as usize;
    let level = (data[2] % 13) as u32;
    let payload = &data[3..];

    let options = EncoderOptions::new()
        .block_size(block_size)
        .extra_blocks(extra_blocks)
        .level(level);
    let mut encoder = StreamingEncoder::with_options(&options).expect("valid options");

    let mut records = Vec::new();
    for chunk in payload.chunks(block_size / 2 + 1) {
        records.extend(encoder.push(chunk).expect("push failed"));
    }
    records.extend(encoder.flush().expect("flush failed"));
    encoder.dispose();

    let mut history: Vec<u8> = Vec::new();
    for record in &records {
        let dict = &history[history.len().saturating_sub(WINDOW_SIZE)..];
        let block = if record.is_compressed {
            lz4_flex::block::decompress_with_dict(&record.payload, block_size, dict)
                .expect("invalid block")
        } else {
            record.payload.clone()
        };
        history.extend_from_slice(&block);
    }
    assert_eq!(history, payload);
});

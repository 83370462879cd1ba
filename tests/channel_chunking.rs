// tests/channel_chunking.rs
//
// Whatever way a byte stream is split into chunks, the channel buffer must
// deliver the same lines and keep the same raw bytes.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use procctl::channel::{ChannelBuffer, normalize_newlines};

fn feed(bytes: &[u8], cuts: &[usize], lines_mode: bool) -> (Vec<String>, Vec<u8>) {
    let out = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&out);
    let mut buffer = ChannelBuffer::default();
    let callback = Box::new(move |text: &str| sink.lock().unwrap().push(text.to_string()));
    if lines_mode {
        buffer.set_line_callback(callback);
        buffer.set_keep_raw_data(true);
    } else {
        buffer.set_block_callback(callback);
    }

    let mut positions: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    positions.sort_unstable();
    let mut start = 0;
    for pos in positions {
        buffer.append(&bytes[start..pos]);
        start = pos;
    }
    buffer.append(&bytes[start..]);
    buffer.handle_rest();

    let delivered = out.lock().unwrap().clone();
    (delivered, buffer.raw_data().to_vec())
}

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just("a".to_string()),
            Just("é".to_string()),
            Just("€".to_string()),
            Just("\n".to_string()),
            Just("\r\n".to_string()),
            Just("\r".to_string()),
            Just(" ".to_string()),
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn lines_do_not_depend_on_chunking(
        text in text_strategy(),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let bytes = text.as_bytes();
        let (whole, whole_raw) = feed(bytes, &[], true);
        let (chunked, chunked_raw) = feed(bytes, &cuts, true);
        prop_assert_eq!(&whole, &chunked);
        prop_assert_eq!(whole_raw, chunked_raw);
        prop_assert_eq!(chunked.concat(), normalize_newlines(&text));
    }

    #[test]
    fn blocks_concatenate_to_normalised_text(
        text in text_strategy(),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let (blocks, raw) = feed(text.as_bytes(), &cuts, false);
        prop_assert_eq!(blocks.concat(), normalize_newlines(&text));
        prop_assert_eq!(raw, text.as_bytes().to_vec());
    }
}

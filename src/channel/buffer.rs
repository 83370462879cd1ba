// src/channel/buffer.rs

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

use crate::channel::newlines::{first_line_break, normalize_newlines};

pub type OutputCallback = Box<dyn FnMut(&str) + Send>;

/// Per-stream output accumulator.
///
/// Keeps the raw bytes of one run (unless retention is disabled) and, when a
/// callback is installed, incrementally decodes the bytes and hands out
/// complete lines or blocks. Multi-byte characters and `\r\n` pairs split
/// across chunks are reassembled before anything is emitted.
pub struct ChannelBuffer {
    raw_data: Vec<u8>,
    incomplete_line: String,
    encoding: &'static Encoding,
    decoder: Decoder,
    callback: Option<OutputCallback>,
    emit_single_lines: bool,
    keep_raw_data: bool,
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self::new(UTF_8)
    }
}

impl std::fmt::Debug for ChannelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBuffer")
            .field("raw_len", &self.raw_data.len())
            .field("incomplete_line", &self.incomplete_line)
            .field("encoding", &self.encoding.name())
            .field("has_callback", &self.callback.is_some())
            .field("emit_single_lines", &self.emit_single_lines)
            .field("keep_raw_data", &self.keep_raw_data)
            .finish()
    }
}

impl ChannelBuffer {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            raw_data: Vec::new(),
            incomplete_line: String::new(),
            encoding,
            decoder: encoding.new_decoder(),
            callback: None,
            emit_single_lines: true,
            keep_raw_data: true,
        }
    }

    /// Reset per-run state. Callbacks and settings are kept.
    pub fn clear_for_run(&mut self) {
        self.raw_data.clear();
        self.incomplete_line.clear();
        self.decoder = self.encoding.new_decoder();
    }

    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
        self.decoder = encoding.new_decoder();
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Deliver decoded output in blocks that end at the last complete line
    /// terminator seen so far. Raw retention is unaffected.
    pub fn set_block_callback(&mut self, callback: OutputCallback) {
        self.callback = Some(callback);
        self.emit_single_lines = false;
    }

    /// Deliver decoded output one `\n`-terminated line at a time. Raw data is
    /// no longer retained.
    pub fn set_line_callback(&mut self, callback: OutputCallback) {
        self.callback = Some(callback);
        self.emit_single_lines = true;
        self.keep_raw_data = false;
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    pub fn set_keep_raw_data(&mut self, keep: bool) {
        self.keep_raw_data = keep;
    }

    pub fn keeps_raw_data(&self) -> bool {
        self.keep_raw_data
    }

    pub fn append(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        if self.keep_raw_data {
            self.raw_data.extend_from_slice(chunk);
        }
        if self.callback.is_none() {
            return;
        }

        let decoded = decode_chunk(&mut self.decoder, chunk, false);
        self.incomplete_line.push_str(&decoded);
        self.emit_complete(false);
    }

    /// Flush whatever is left at end of stream. The final partial line is
    /// delivered without a terminator.
    pub fn handle_rest(&mut self) {
        if self.callback.is_none() {
            return;
        }
        let tail = decode_chunk(&mut self.decoder, &[], true);
        self.decoder = self.encoding.new_decoder();
        self.incomplete_line.push_str(&tail);
        self.emit_complete(true);

        if self.incomplete_line.is_empty() {
            return;
        }
        let rest = std::mem::take(&mut self.incomplete_line);
        let rest = if self.emit_single_lines {
            rest
        } else {
            normalize_newlines(&rest)
        };
        if let Some(cb) = self.callback.as_mut() {
            cb(&rest);
        }
    }

    fn emit_complete(&mut self, at_end: bool) {
        let Some(cb) = self.callback.as_mut() else {
            return;
        };

        if self.emit_single_lines {
            while let Some((len, consumed)) = first_line_break(&self.incomplete_line, at_end) {
                let mut line: String = self.incomplete_line.drain(..consumed).collect();
                line.truncate(len);
                line.push('\n');
                cb(&line);
            }
            return;
        }

        let mut block_end = 0;
        while let Some((_, consumed)) = first_line_break(&self.incomplete_line[block_end..], at_end) {
            block_end += consumed;
        }
        if block_end > 0 {
            let block: String = self.incomplete_line.drain(..block_end).collect();
            cb(&normalize_newlines(&block));
        }
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    pub fn take_raw_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.raw_data)
    }

    /// Retained bytes decoded in one go, with newlines normalised.
    pub fn text(&self) -> String {
        let (decoded, _, _) = self.encoding.decode(&self.raw_data);
        normalize_newlines(&decoded)
    }
}

fn decode_chunk(decoder: &mut Decoder, bytes: &[u8], last: bool) -> String {
    let mut out = String::new();
    let mut input = bytes;
    loop {
        let needed = decoder
            .max_utf8_buffer_length(input.len())
            .unwrap_or(input.len() * 3 + 16);
        out.reserve(needed);
        let (result, read, _) = decoder.decode_to_string(input, &mut out, last);
        input = &input[read..];
        match result {
            CoderResult::InputEmpty => break,
            CoderResult::OutputFull => continue,
        }
    }
    out
}

//! Streaming UTF-8 decoding of body chunks.

use std::borrow::Cow;

const REPLACEMENT: char = '\u{FFFD}';
const BOM: char = '\u{FEFF}';

/// Decodes a chunked byte stream as UTF-8.
///
/// A multi-byte sequence cut by a chunk boundary is held back until the
/// next chunk completes it. Invalid sequences become U+FFFD instead of
/// failing the stream. A leading byte order mark is dropped.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
    started: bool,
}

impl Utf8Decoder {
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            started: false,
        }
    }

    /// Decode the next chunk of bytes.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(bytes)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    if let Some(invalid) = err.error_len() {
                        out.push(REPLACEMENT);
                        rest = &tail[invalid..];
                    } else {
                        self.pending.extend_from_slice(tail);
                        break;
                    }
                }
            }
        }

        self.strip_bom(out)
    }

    /// End of input. An incomplete trailing sequence decodes to one U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            self.pending.clear();
            Some(self.strip_bom(REPLACEMENT.to_string()))
        }
    }

    fn strip_bom(&mut self, mut text: String) -> String {
        if !self.started && !text.is_empty() {
            self.started = true;
            if text.starts_with(BOM) {
                text.replace_range(..BOM.len_utf8(), "");
            }
        }
        text
    }
}

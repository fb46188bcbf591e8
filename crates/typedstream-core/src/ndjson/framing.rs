//! Line framing: arbitrarily chunked text in, complete lines out.

use crate::error::{Error, Result};

/// Splits a chunked text stream into `\n` delimited lines.
///
/// The framer owns the unterminated tail of the stream. Feeding a chunk
/// returns every line completed by it; [`flush`](Self::flush) hands out the
/// remainder once the input has ended.
///
/// With a line limit, an over-long line stops the framer for good. Lines
/// completed before it in the same chunk are still returned, and the error
/// is reported by [`check`](Self::check) and every later `feed`.
#[derive(Debug, Clone, Default)]
pub struct LineFramer {
    buffer: String,
    max_line_len: Option<usize>,
    overflowed: bool,
}

impl LineFramer {
    /// Create a framer without a line length limit.
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            max_line_len: None,
            overflowed: false,
        }
    }

    /// Create a framer that rejects lines longer than `limit` bytes.
    pub const fn with_max_line_len(limit: usize) -> Self {
        Self {
            buffer: String::new(),
            max_line_len: Some(limit),
            overflowed: false,
        }
    }

    /// Append `chunk` and return the lines it completed, in order.
    ///
    /// A single `\r` directly before a delimiter is dropped. Consecutive
    /// delimiters yield empty lines.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<String>> {
        self.check()?;

        // The buffer never holds a delimiter between calls, so only the
        // appended text needs scanning.
        let scan_from = self.buffer.len();
        self.buffer.push_str(chunk);

        let Some(last) = self.buffer[scan_from..]
            .rfind(super::DELIMITER)
            .map(|idx| idx + scan_from)
        else {
            return self.finish_chunk(Vec::new());
        };

        let mut lines = Vec::new();
        let mut overlong = false;
        for line in self.buffer[..last].split(super::DELIMITER) {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if self.exceeds(line.len()) {
                overlong = true;
                break;
            }
            lines.push(line.to_owned());
        }
        if overlong {
            return self.overflow(lines);
        }
        self.buffer.replace_range(..=last, "");
        self.finish_chunk(lines)
    }

    /// Fail if an over-long line has been seen.
    pub fn check(&self) -> Result<()> {
        match self.max_line_len {
            Some(limit) if self.overflowed => Err(Error::LineTooLong { limit }),
            _ => Ok(()),
        }
    }

    /// Take the unterminated remainder as the final line.
    ///
    /// Returns `None` when nothing is buffered, so input ending on a
    /// delimiter produces no trailing empty line.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Discard any buffered text and a recorded overflow.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Text received since the last delimiter.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn finish_chunk(&mut self, lines: Vec<String>) -> Result<Vec<String>> {
        let pending = self.buffer.strip_suffix('\r').unwrap_or(&self.buffer);
        if self.exceeds(pending.len()) {
            return self.overflow(lines);
        }
        Ok(lines)
    }

    fn overflow(&mut self, lines: Vec<String>) -> Result<Vec<String>> {
        self.buffer.clear();
        self.overflowed = true;
        if lines.is_empty() {
            self.check()?;
        }
        Ok(lines)
    }

    fn exceeds(&self, len: usize) -> bool {
        self.max_line_len.is_some_and(|limit| len > limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed every chunk, then flush, collecting all lines.
    fn frame(chunks: &[&str]) -> Vec<String> {
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(framer.feed(chunk).unwrap());
        }
        lines.extend(framer.flush());
        lines
    }

    #[test]
    fn joins_lines_split_across_chunks() {
        assert_eq!(
            frame(&["aa", "bb\ncc\ndd", "ee\naa\n"]),
            vec!["aabb", "cc", "ddee", "aa"]
        );
    }

    #[test]
    fn input_without_newline_is_one_line() {
        assert_eq!(frame(&["no", " delimiter", " here"]), vec!["no delimiter here"]);
    }

    #[test]
    fn trailing_newline_adds_no_empty_line() {
        assert_eq!(frame(&["a\nb\n"]), vec!["a", "b"]);
    }

    #[test]
    fn trailing_text_is_last_line() {
        assert_eq!(frame(&["a\nb"]), vec!["a", "b"]);
    }

    #[test]
    fn empty_lines_are_preserved() {
        assert_eq!(frame(&["a\n\nb\n"]), vec!["a", "", "b"]);
        assert_eq!(frame(&["\n", "\n"]), vec!["", ""]);
    }

    #[test]
    fn strips_single_carriage_return() {
        assert_eq!(frame(&["a\r\nb\r\r\n"]), vec!["a", "b\r"]);
    }

    #[test]
    fn carriage_return_split_from_newline() {
        assert_eq!(frame(&["one\r", "\ntwo"]), vec!["one", "two"]);
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(frame(&[]).is_empty());
        assert!(frame(&["", ""]).is_empty());
    }

    #[test]
    fn zero_length_chunk_emits_nothing() {
        let mut framer = LineFramer::new();
        assert!(framer.feed("partial").unwrap().is_empty());
        assert!(framer.feed("").unwrap().is_empty());
        assert_eq!(framer.buffered(), "partial");
    }

    #[test]
    fn same_lines_for_every_two_way_split() {
        let text = "{\"a\":1}\r\n\n{\"b\":\"é\"}\nlast";
        let expected = frame(&[text]);
        for (split, _) in text.char_indices() {
            let (head, tail) = text.split_at(split);
            assert_eq!(frame(&[head, tail]), expected, "split at {split}");
        }
    }

    #[test]
    fn same_lines_when_fed_char_by_char() {
        let text = "x\ny\r\n\nzz\n";
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let chunks: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(frame(&chunks), frame(&[text]));
    }

    #[test]
    fn joined_lines_reconstruct_input() {
        for text in ["a\nb\nc", "a\nb\nc\n", "\n\nx\n", "solo"] {
            let joined = frame(&[text]).join("\n");
            assert!(
                text == joined || text == format!("{joined}\n"),
                "{text:?} vs {joined:?}"
            );
        }
    }

    #[test]
    fn reset_discards_remainder() {
        let mut framer = LineFramer::new();
        framer.feed("dangling").unwrap();
        framer.reset();
        assert_eq!(framer.buffered(), "");
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn rejects_complete_line_over_limit() {
        let mut framer = LineFramer::with_max_line_len(4);
        assert_eq!(framer.feed("1234\n").unwrap(), vec!["1234"]);
        let err = framer.feed("12345\n").unwrap_err();
        assert!(matches!(err, Error::LineTooLong { limit: 4 }));
    }

    #[test]
    fn rejects_unterminated_tail_over_limit() {
        let mut framer = LineFramer::with_max_line_len(4);
        assert!(framer.feed("123").unwrap().is_empty());
        assert!(matches!(
            framer.feed("45"),
            Err(Error::LineTooLong { limit: 4 })
        ));
    }

    #[test]
    fn lines_before_overflow_are_kept() {
        let mut framer = LineFramer::with_max_line_len(4);
        assert_eq!(framer.feed("ab\n123456\ncd\n").unwrap(), vec!["ab"]);
        assert!(matches!(framer.check(), Err(Error::LineTooLong { limit: 4 })));
        assert!(matches!(
            framer.feed("ok\n"),
            Err(Error::LineTooLong { limit: 4 })
        ));
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn lines_before_overlong_tail_are_kept() {
        let mut framer = LineFramer::with_max_line_len(4);
        assert_eq!(framer.feed("ab\ncd\n12345").unwrap(), vec!["ab", "cd"]);
        assert!(framer.check().is_err());
    }

    #[test]
    fn reset_clears_overflow() {
        let mut framer = LineFramer::with_max_line_len(4);
        assert!(framer.feed("12345\n").is_err());
        framer.reset();
        assert!(framer.check().is_ok());
        assert_eq!(framer.feed("1234\n").unwrap(), vec!["1234"]);
    }

    #[test]
    fn limit_ignores_carriage_return() {
        let mut framer = LineFramer::with_max_line_len(4);
        assert!(framer.feed("1234\r").unwrap().is_empty());
        assert_eq!(framer.feed("\n").unwrap(), vec!["1234"]);
    }
}

//! Configurable emission of tokens, sentence breaks, and text-end markers
//! (§4.5). The five flags compose independently; `SimpleTokenWriter`
//! dispatches on them once at construction rather than re-checking in the
//! hot path for each event.

use std::io::Write;

use crate::error::Result;

/// Emit each token's surface, terminated by `\n`.
pub const TOKENS: u32 = 1 << 0;
/// Emit an extra blank line between sentences.
pub const SENTENCES: u32 = 1 << 1;
/// Accumulate start/end character offsets per token; emit them after
/// `text_end` on a single whitespace-separated line.
pub const TOKEN_POS: u32 = 1 << 2;
/// Same as `TOKEN_POS`, but for sentence spans (start of first token to end
/// of last token in the sentence).
pub const SENTENCE_POS: u32 = 1 << 3;
/// Treat a `\n` immediately following an EOT byte as position-zero (do not
/// count it in the offset accounting).
pub const NEWLINE_AFTER_EOT: u32 = 1 << 4;

pub const SIMPLE: u32 = TOKENS | SENTENCES;

/// A sink for the three transduction event kinds.
pub trait TokenWriter {
    /// `offset` is the buffer-local start of the token within `buf`; the
    /// text preceding it (`buf[..offset]`) is a dropped nontoken prefix.
    fn token(&mut self, offset: usize, buf: &[char]) -> Result<()>;
    fn sentence_end(&mut self, offset: usize) -> Result<()>;
    fn text_end(&mut self, offset: usize) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// The default `TokenWriter`, configured by a flag bitset (§4.5).
pub struct SimpleTokenWriter<W: Write> {
    writer: W,
    flags: u32,

    /// Cumulative character offset into the current text; reset at
    /// `text_end`.
    pos: usize,
    /// Whether `text_end` was just emitted, so the next consumed character
    /// may be eligible for the `NEWLINE_AFTER_EOT` exemption.
    after_eot: bool,

    token_positions: Vec<(usize, usize)>,
    sentence_positions: Vec<(usize, usize)>,
    sentence_start: Option<usize>,
}

impl<W: Write> SimpleTokenWriter<W> {
    pub fn new(writer: W, flags: u32) -> Self {
        SimpleTokenWriter {
            writer,
            flags,
            pos: 0,
            after_eot: false,
            token_positions: Vec::new(),
            sentence_positions: Vec::new(),
            sentence_start: None,
        }
    }

    fn flag(&self, bit: u32) -> bool {
        self.flags & bit != 0
    }

    /// Advance `pos` past `buf[..offset]` (the nontoken prefix) and
    /// `buf[offset..]` (the token itself), applying the `NEWLINE_AFTER_EOT`
    /// exemption to the very first character consumed after a `text_end`.
    fn advance(&mut self, offset: usize, len: usize) -> (usize, usize) {
        let mut prefix = offset;
        if self.after_eot
            && self.flag(NEWLINE_AFTER_EOT)
            && offset > 0
        {
            prefix = prefix.saturating_sub(1);
        }
        self.after_eot = false;

        let start = self.pos + prefix;
        let end = start + (len - offset);
        self.pos = end;
        (start, end)
    }

    fn flush_position_lines(&mut self) -> Result<()> {
        if self.flag(TOKEN_POS) && !self.token_positions.is_empty() {
            let line: Vec<String> = self
                .token_positions
                .iter()
                .flat_map(|&(s, e)| [s.to_string(), e.to_string()])
                .collect();
            writeln!(self.writer, "{}", line.join(" "))?;
            self.token_positions.clear();
        }
        if self.flag(SENTENCE_POS) && !self.sentence_positions.is_empty() {
            let line: Vec<String> = self
                .sentence_positions
                .iter()
                .flat_map(|&(s, e)| [s.to_string(), e.to_string()])
                .collect();
            writeln!(self.writer, "{}", line.join(" "))?;
            self.sentence_positions.clear();
        }
        Ok(())
    }
}

impl<W: Write> TokenWriter for SimpleTokenWriter<W> {
    fn token(&mut self, offset: usize, buf: &[char]) -> Result<()> {
        let (start, end) = self.advance(offset, buf.len());

        if self.flag(TOKENS) {
            let surface: String = buf[offset..].iter().collect();
            writeln!(self.writer, "{surface}")?;
        }
        if self.flag(TOKEN_POS) {
            self.token_positions.push((start, end));
        }
        if self.flag(SENTENCE_POS) {
            if self.sentence_start.is_none() {
                self.sentence_start = Some(start);
            }
        }

        Ok(())
    }

    fn sentence_end(&mut self, _offset: usize) -> Result<()> {
        if self.flag(SENTENCES) {
            writeln!(self.writer)?;
        }
        if self.flag(SENTENCE_POS) {
            if let Some(start) = self.sentence_start.take() {
                self.sentence_positions.push((start, self.pos));
            }
        }
        Ok(())
    }

    fn text_end(&mut self, _offset: usize) -> Result<()> {
        self.flush_position_lines()?;
        if self.flag(SENTENCES) || self.flag(TOKENS) {
            writeln!(self.writer)?;
        }
        self.writer.flush()?;

        self.pos = 0;
        self.after_eot = true;
        self.sentence_start = None;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn simple_flags_emit_tokens_and_blank_line_between_sentences() {
        let mut out = Vec::new();
        let mut w = SimpleTokenWriter::new(&mut out, SIMPLE);
        w.token(0, &chars("Hi")).unwrap();
        w.sentence_end(0).unwrap();
        w.token(0, &chars("there")).unwrap();
        w.sentence_end(0).unwrap();
        w.text_end(0).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hi\n\nthere\n\n\n");
    }

    #[test]
    fn token_pos_emits_offset_line_after_text_end() {
        let mut out = Vec::new();
        let mut w = SimpleTokenWriter::new(&mut out, TOKEN_POS);
        w.token(0, &chars("This")).unwrap();
        w.token(0, &chars(".")).unwrap();
        w.text_end(0).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0 4 4 5\n");
    }

    #[test]
    fn token_pos_resets_across_texts() {
        let mut out = Vec::new();
        let mut w = SimpleTokenWriter::new(&mut out, TOKEN_POS);
        w.token(0, &chars("This")).unwrap();
        w.token(0, &chars(".")).unwrap();
        w.text_end(0).unwrap();
        w.token(0, &chars("And")).unwrap();
        w.token(0, &chars(".")).unwrap();
        w.text_end(0).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0 4 4 5\n0 3 3 4\n");
    }

    #[test]
    fn newline_after_eot_does_not_count_leading_newline() {
        let mut out = Vec::new();
        let mut w = SimpleTokenWriter::new(&mut out, TOKEN_POS | NEWLINE_AFTER_EOT);
        w.token(0, &chars("This")).unwrap();
        w.text_end(0).unwrap();
        // Buffer holds a leading '\n' nontoken prefix before the next token.
        w.token(1, &chars("\nAnd")).unwrap();
        w.text_end(0).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0 4\n0 3\n");
    }

    #[test]
    fn sentence_pos_spans_first_token_to_last() {
        let mut out = Vec::new();
        let mut w = SimpleTokenWriter::new(&mut out, SENTENCE_POS);
        w.token(0, &chars("Hi")).unwrap();
        w.token(0, &chars("there")).unwrap();
        w.sentence_end(0).unwrap();
        w.text_end(0).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0 7\n");
    }

    #[test]
    fn flush_after_text_end_is_idempotent() {
        let mut out = Vec::new();
        let mut w = SimpleTokenWriter::new(&mut out, SIMPLE);
        w.token(0, &chars("Hi")).unwrap();
        w.text_end(0).unwrap();
        w.flush().unwrap();
        w.flush().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hi\n\n");
    }
}

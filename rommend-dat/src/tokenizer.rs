//! Lexing for listinfo text: whitespace-separated tokens with
//! double-quoted strings treated as single tokens, over newline-terminated
//! lines of bounded length.

use std::io::BufRead;

/// Longest accepted line. Longer lines are skipped by the reader.
pub const MAX_LINE: usize = 8 * 1024;

/// Pulls tokens off one line.
pub struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Self {
        Tokenizer { rest: line }
    }

    /// The next token, or `None` at end of line. A double quote starts a
    /// token that runs to the closing quote (or end of line) and may
    /// contain whitespace.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let rest = self.rest.trim_start_matches([' ', '\t']);
        match rest.chars().next() {
            None => {
                self.rest = rest;
                None
            }
            Some('"') => {
                let body = &rest[1..];
                match body.find('"') {
                    Some(end) => {
                        self.rest = &body[end + 1..];
                        Some(&body[..end])
                    }
                    None => {
                        self.rest = "";
                        Some(body)
                    }
                }
            }
            Some(_) => {
                let end = rest.find([' ', '\t']).unwrap_or(rest.len());
                self.rest = &rest[end..];
                Some(&rest[..end])
            }
        }
    }
}

/// One read line, or notice of a skipped over-long one. Carries its line
/// number so callers can warn without touching the reader again.
pub enum Line<'a> {
    Text { no: u64, text: &'a str },
    /// The line exceeded [`MAX_LINE`]; `first_word` is its leading token.
    Skipped { no: u64, first_word: String },
}

/// Reads lines, tracks line numbers, and enforces the length limit.
/// Input that is not valid UTF-8 is converted lossily rather than
/// aborting the whole ingest.
pub struct LineReader<R: BufRead> {
    input: R,
    line_no: u64,
    raw: Vec<u8>,
    buf: String,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(input: R) -> Self {
        LineReader {
            input,
            line_no: 0,
            raw: Vec::new(),
            buf: String::new(),
        }
    }

    pub fn next_line(&mut self) -> std::io::Result<Option<Line<'_>>> {
        self.raw.clear();
        let n = self.input.read_until(b'\n', &mut self.raw)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;

        self.buf.clear();
        self.buf.push_str(&String::from_utf8_lossy(&self.raw));
        while self.buf.ends_with('\n') || self.buf.ends_with('\r') {
            self.buf.pop();
        }

        if self.buf.len() > MAX_LINE {
            let first_word = Tokenizer::new(&self.buf)
                .next_token()
                .unwrap_or("")
                .to_string();
            return Ok(Some(Line::Skipped {
                no: self.line_no,
                first_word,
            }));
        }

        Ok(Some(Line::Text {
            no: self.line_no,
            text: &self.buf,
        }))
    }
}

#[cfg(test)]
#[path = "tests/tokenizer_tests.rs"]
mod tests;

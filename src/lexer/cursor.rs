// Heavily inspired by `rustc_lexer` and adapted to a line-oriented assembly syntax.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

/// Peekable iterator over a char sequence, tracking the byte offset into the source.
#[derive(Clone)]
pub struct Cursor<'a> {
    chars: Chars<'a>,
    /// Byte offset of the next character
    pos: usize,
    /// Byte offset where the current token started
    token_start: usize,
}

pub(crate) const EOF_CHAR: char = '\0';

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            chars: input.chars(),
            pos: 0,
            token_start: 0,
        }
    }

    /// Peek the next character without consuming it.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Source is fully consumed
    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Consume and return the next character.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume characters while `predicate` holds for the next one.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while !self.is_eof() && predicate(self.first()) {
            self.bump();
        }
    }

    /// Mark the current position as the start of a new token.
    pub fn start_token(&mut self) {
        self.token_start = self.pos;
    }

    /// Byte offset of the current token start.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Length in bytes of the token consumed since [`Cursor::start_token`].
    pub fn pos_in_token(&self) -> usize {
        self.pos - self.token_start
    }
}

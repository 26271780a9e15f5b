//! The block/tokeniser (spec.md §4.D): reads one [`Token`] at a time from an
//! [`InputFilter`], via a *key buffer* holding prefixes and simple tokens and
//! a *value buffer* holding string data.

use crate::buffer::ByteBuffer;
use crate::error::{Error, ErrorKind};
use crate::input::InputFilter;
use crate::source::{Byte, ByteSource};

/// Which bracketing a string token used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringKind {
    Quoted,
    Curly,
}

/// One lexical unit read by the tokeniser.
///
/// `Simple` and `Terminal` carry their text in the key buffer only; `String`
/// additionally carries data in the value buffer; `Embedded` leaves the
/// filter stack positioned at the first byte of the embedded payload for the
/// caller, since reading that payload is not this crate's concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Simple,
    Terminal,
    String(StringKind),
    Embedded,
}

fn is_visible_ascii(b: u8) -> bool {
    (0x21..=0x7E).contains(&b)
}

fn is_exclusive_stop(b: u8) -> bool {
    matches!(
        b,
        b'\t' | b' ' | b'\n' | b'(' | b')' | b'[' | b']' | b',' | b'%' | b';' | b'#' | b'}'
    )
}

fn is_inclusive_stop(b: u8) -> bool {
    matches!(b, b'"' | b'\'' | b'{' | b'`')
}

fn is_atomic(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'[' | b']' | b',' | b'%' | b';' | b'"' | b'\'' | b'{' | b'}' | b'`'
    )
}

/// Reads one [`Token`] per call into the shared key/value buffers.
pub struct Tokeniser<S> {
    input: InputFilter<S>,
}

impl<S: ByteSource> Tokeniser<S> {
    pub fn new(input: InputFilter<S>) -> Self {
        Tokeniser { input }
    }

    pub fn line(&self) -> u64 {
        self.input.line()
    }

    pub fn had_bom(&self) -> bool {
        self.input.had_bom()
    }

    /// Reads the next block into `key`/`val`, returning its kind and the
    /// line number of its first non-whitespace, non-comment byte.
    ///
    /// `key`/`val` are reset by this call before anything is appended.
    pub fn next_token(
        &mut self,
        key: &mut ByteBuffer,
        val: &mut ByteBuffer,
    ) -> Result<(Token, u64), Error> {
        key.reset(true);
        val.reset(true);

        self.skip_whitespace_and_comments()?;
        let start_line = self.input.line();

        let first = self.read_required_byte()?;
        if !is_visible_ascii(first) {
            return Err(self.fail(ErrorKind::BadChar));
        }

        if first == b'|' {
            let next = self.read_byte()?;
            match next {
                Byte::Byte(b';') => {
                    self.check_trailer()?;
                    return Ok((Token::Terminal, start_line));
                }
                Byte::Byte(_) => self.input.push_back(),
                Byte::Eof => {}
            }
            // Falls through to the general case with `first` (`|`) as the
            // first key byte; `next` has been pushed back if it was a byte.
        }

        if is_atomic(first) {
            self.append_key(key, first)?;
            return self.finish_token(key, val, start_line);
        }

        self.append_key(key, first)?;
        loop {
            match self.read_byte()? {
                Byte::Eof => break,
                Byte::Byte(b) if is_exclusive_stop(b) => {
                    self.input.push_back();
                    break;
                }
                Byte::Byte(b) if is_inclusive_stop(b) => {
                    self.append_key(key, b)?;
                    break;
                }
                Byte::Byte(b) if !is_visible_ascii(b) => {
                    return Err(self.fail(ErrorKind::BadChar));
                }
                Byte::Byte(b) => self.append_key(key, b)?,
            }
        }
        self.finish_token(key, val, start_line)
    }

    fn finish_token(
        &mut self,
        key: &mut ByteBuffer,
        val: &mut ByteBuffer,
        start_line: u64,
    ) -> Result<(Token, u64), Error> {
        match key.last() {
            Some(b'"') => {
                key.drop_last();
                self.read_quoted_string(val)?;
                Ok((Token::String(StringKind::Quoted), start_line))
            }
            Some(b'{') => {
                key.drop_last();
                self.read_curly_string(val)?;
                Ok((Token::String(StringKind::Curly), start_line))
            }
            Some(b'`') => {
                key.drop_last();
                Ok((Token::Embedded, start_line))
            }
            _ => Ok((Token::Simple, start_line)),
        }
    }

    /// §4.D.i: reads quoted-string data up to a non-escaped `"`.
    fn read_quoted_string(&mut self, val: &mut ByteBuffer) -> Result<(), Error> {
        let mut escape_armed = false;
        loop {
            let b = self.read_string_byte()?;
            if b == 0 {
                return Err(self.fail(ErrorKind::NullChar));
            }
            if !escape_armed && b == b'"' {
                return Ok(());
            }
            escape_armed = !escape_armed && b == b'\\';
            self.append_val(val, b)?;
        }
    }

    /// §4.D.ii: reads curly-string data up to balanced closing `}`.
    fn read_curly_string(&mut self, val: &mut ByteBuffer) -> Result<(), Error> {
        let mut depth: u64 = 1;
        let mut escape_armed = false;
        loop {
            let b = self.read_string_byte()?;
            if b == 0 {
                return Err(self.fail(ErrorKind::NullChar));
            }
            if !escape_armed {
                match b {
                    b'{' => {
                        depth = depth
                            .checked_add(1)
                            .ok_or_else(|| self.fail(ErrorKind::DeepCurly))?;
                    }
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(());
                        }
                    }
                    _ => {}
                }
            }
            escape_armed = !escape_armed && b == b'\\';
            self.append_val(val, b)?;
        }
    }

    /// After a bare `|;`, only whitespace/comments may follow before EOF.
    fn check_trailer(&mut self) -> Result<(), Error> {
        loop {
            match self.read_byte()? {
                Byte::Eof => return Ok(()),
                Byte::Byte(b) if matches!(b, b'\t' | b' ' | b'\n') => continue,
                Byte::Byte(b'#') => self.skip_comment()?,
                Byte::Byte(_) => return Err(self.fail(ErrorKind::Trailer)),
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), Error> {
        loop {
            match self.read_byte()? {
                Byte::Byte(b) if matches!(b, b'\t' | b' ' | b'\n') => continue,
                Byte::Byte(b'#') => self.skip_comment()?,
                Byte::Byte(_) => {
                    self.input.push_back();
                    return Ok(());
                }
                Byte::Eof => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self) -> Result<(), Error> {
        loop {
            match self.read_byte()? {
                Byte::Eof => return Ok(()),
                Byte::Byte(b'\n') => return Ok(()),
                Byte::Byte(_) => continue,
            }
        }
    }

    fn append_key(&mut self, key: &mut ByteBuffer, b: u8) -> Result<(), Error> {
        key.append(b).map_err(|()| self.fail(ErrorKind::LongToken))
    }

    fn append_val(&mut self, val: &mut ByteBuffer, b: u8) -> Result<(), Error> {
        val.append(b).map_err(|()| self.fail(ErrorKind::LongStr))
    }

    fn read_byte(&mut self) -> Result<Byte, Error> {
        self.input.read()
    }

    fn read_required_byte(&mut self) -> Result<u8, Error> {
        match self.read_byte()? {
            Byte::Byte(b) => Ok(b),
            Byte::Eof => Err(self.fail(ErrorKind::Eof)),
        }
    }

    /// Like [`Self::read_required_byte`], but EOF means an unterminated
    /// string (spec.md §4.D.i/§4.D.ii: "EOF before the terminator is
    /// `OpenStr`") rather than the generic EOF-class error.
    fn read_string_byte(&mut self) -> Result<u8, Error> {
        match self.read_byte()? {
            Byte::Byte(b) => Ok(b),
            Byte::Eof => Err(self.fail(ErrorKind::OpenStr)),
        }
    }

    fn fail(&self, kind: ErrorKind) -> Error {
        Error::new(kind, self.input.line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IoByteSource;

    fn tokeniser(bytes: &'static [u8]) -> Tokeniser<IoByteSource<&'static [u8]>> {
        Tokeniser::new(InputFilter::new(IoByteSource::new(bytes)))
    }

    #[test]
    fn reads_a_simple_token() {
        let mut t = tokeniser(b"add |;\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        let (tok, line) = t.next_token(&mut key, &mut val).unwrap();
        assert_eq!(tok, Token::Simple);
        assert_eq!(key.bytes(), b"add");
        assert_eq!(line, 1);
    }

    #[test]
    fn reads_the_terminal_token() {
        let mut t = tokeniser(b"|;\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        let (tok, _) = t.next_token(&mut key, &mut val).unwrap();
        assert_eq!(tok, Token::Terminal);
    }

    #[test]
    fn trailer_after_terminal_is_an_error() {
        let mut t = tokeniser(b"|; x\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        assert_eq!(
            t.next_token(&mut key, &mut val).unwrap_err().kind,
            ErrorKind::Trailer
        );
    }

    #[test]
    fn skips_comments_and_whitespace() {
        let mut t = tokeniser(b"  # a comment\n  foo\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        let (tok, line) = t.next_token(&mut key, &mut val).unwrap();
        assert_eq!(tok, Token::Simple);
        assert_eq!(key.bytes(), b"foo");
        assert_eq!(line, 2);
    }

    #[test]
    fn reads_a_bare_atomic_token() {
        let mut t = tokeniser(b"(a)\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        let (tok, _) = t.next_token(&mut key, &mut val).unwrap();
        assert_eq!(tok, Token::Simple);
        assert_eq!(key.bytes(), b"(");
    }

    #[test]
    fn reads_quoted_string_with_escape() {
        let mut t = tokeniser(b"pfx\"a\\\"b\"\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        let (tok, _) = t.next_token(&mut key, &mut val).unwrap();
        assert_eq!(tok, Token::String(StringKind::Quoted));
        assert_eq!(key.bytes(), b"pfx");
        assert_eq!(val.bytes(), b"a\\\"b");
    }

    #[test]
    fn reads_nested_curly_string() {
        let mut t = tokeniser(b"{a{b}c}\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        let (tok, _) = t.next_token(&mut key, &mut val).unwrap();
        assert_eq!(tok, Token::String(StringKind::Curly));
        assert_eq!(val.bytes(), b"a{b}c");
    }

    #[test]
    fn unterminated_quoted_string_is_open_str() {
        let mut t = tokeniser(b"\"abc");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        assert_eq!(
            t.next_token(&mut key, &mut val).unwrap_err().kind,
            ErrorKind::OpenStr
        );
    }

    #[test]
    fn null_byte_in_quoted_string_is_null_char() {
        let mut t = tokeniser(b"\"a\0b\"\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        assert_eq!(
            t.next_token(&mut key, &mut val).unwrap_err().kind,
            ErrorKind::NullChar
        );
    }

    #[test]
    fn unterminated_curly_string_is_open_str() {
        let mut t = tokeniser(b"{abc");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        assert_eq!(
            t.next_token(&mut key, &mut val).unwrap_err().kind,
            ErrorKind::OpenStr
        );
    }

    #[test]
    fn overlong_string_data_is_long_str() {
        let mut t = tokeniser(b"\"abcdef\"\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 4);
        assert_eq!(
            t.next_token(&mut key, &mut val).unwrap_err().kind,
            ErrorKind::LongStr
        );
    }

    #[test]
    fn embedded_token_leaves_filter_positioned_after_backtick() {
        let mut t = tokeniser(b"pfx`RAWDATA");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        let (tok, _) = t.next_token(&mut key, &mut val).unwrap();
        assert_eq!(tok, Token::Embedded);
        assert_eq!(key.bytes(), b"pfx");
        assert_eq!(t.input.read().unwrap(), Byte::Byte(b'R'));
    }

    #[test]
    fn illegal_byte_is_bad_char() {
        let mut t = tokeniser(b"\x01\n");
        let mut key = ByteBuffer::new(8, 64);
        let mut val = ByteBuffer::new(8, 64);
        assert_eq!(
            t.next_token(&mut key, &mut val).unwrap_err().kind,
            ErrorKind::BadChar
        );
    }
}

//! The raw byte source: the parser's one external collaborator.
//!
//! spec.md §1 treats the byte source as outside the core's scope, described
//! only through the interface the core consumes. spec.md §9 asks for a
//! capability abstraction in place of the original's function pointer plus
//! opaque user data; [`ByteSource`] is that abstraction.

use std::error::Error as StdError;
use std::io;

/// One item read from a [`ByteSource`]: a literal byte or end of stream.
///
/// Corresponds to the tagged union spec.md §9 calls for
/// (`Byte(u8) | Eof | IoError | BadSignature | Invalid`); `IoError` and
/// `Invalid` are represented by `ByteSource::read_byte`'s `Result` instead of
/// folded into this type, and `BadSignature` is synthesized by the BOM filter
/// in [`crate::input`], not by the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Byte {
    Byte(u8),
    Eof,
}

/// A raw byte producer external to the parser.
///
/// `read_byte` is called synchronously, at most once per unfiltered byte
/// (spec.md §5). Once it returns `Ok(Byte::Eof)` or an `Err`, the filter
/// stack never calls it again for that parser; implementors do not need to
/// be idempotent past that point.
pub trait ByteSource {
    /// The error type this source can fail with.
    type Error: StdError + 'static;

    /// Reads the next raw byte, or signals end of stream.
    fn read_byte(&mut self) -> Result<Byte, Self::Error>;
}

/// Adapts any [`std::io::Read`] into a [`ByteSource`], reading one byte at a
/// time and retrying on [`io::ErrorKind::Interrupted`].
pub struct IoByteSource<R> {
    inner: R,
    buf: [u8; 1],
}

impl<R: io::Read> IoByteSource<R> {
    pub fn new(inner: R) -> Self {
        IoByteSource { inner, buf: [0; 1] }
    }
}

impl<R: io::Read> ByteSource for IoByteSource<R> {
    type Error = io::Error;

    fn read_byte(&mut self) -> Result<Byte, Self::Error> {
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(Byte::Eof),
                Ok(_) => return Ok(Byte::Byte(self.buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_source_yields_bytes_then_eof() {
        let mut src = IoByteSource::new(&b"ab"[..]);
        assert_eq!(src.read_byte().unwrap(), Byte::Byte(b'a'));
        assert_eq!(src.read_byte().unwrap(), Byte::Byte(b'b'));
        assert_eq!(src.read_byte().unwrap(), Byte::Eof);
        assert_eq!(src.read_byte().unwrap(), Byte::Eof);
    }
}

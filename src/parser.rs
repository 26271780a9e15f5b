//! The public parser surface (spec.md §4.F, §6).

use static_assertions::assert_impl_all;

use crate::entity::{Entity, EntityReader};
use crate::error::{Error, ErrorKind};
use crate::input::InputFilter;
use crate::source::{ByteSource, IoByteSource};
use crate::token::Tokeniser;

/// The spec-mandated block-length cap on 32-bit-and-up targets (spec.md §3).
pub const DEFAULT_MAX_BLOCK: usize = 65_535;

/// The documented minimum cap on targets with narrower size arithmetic
/// (spec.md §6).
pub const MIN_MAX_BLOCK: usize = 32_767;

/// Construction-time parameters for a [`Parser`] (spec.md §9: "make \[block
/// limits\] parser-construction parameters with documented defaults").
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    max_block: usize,
}

impl ParserConfig {
    /// Starts from [`DEFAULT_MAX_BLOCK`].
    pub fn new() -> Self {
        ParserConfig {
            max_block: DEFAULT_MAX_BLOCK,
        }
    }

    /// Overrides the per-block byte cap. Clamped up to [`MIN_MAX_BLOCK`]: a
    /// narrower cap than the documented floor would make every realistic
    /// identifier unparseable.
    pub fn max_block(mut self, max_block: usize) -> Self {
        self.max_block = max_block.max(MIN_MAX_BLOCK);
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a byte source into a sequence of Shastina entities.
///
/// A `Parser` is forward-only and not reusable: after `read()` returns `Eof`
/// or an error, all subsequent calls return the same thing (spec.md §3:
/// "cannot be reused after reporting EOF or an error").
pub struct Parser<S> {
    reader: EntityReader<S>,
}

impl<S: ByteSource> Parser<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, ParserConfig::new())
    }

    pub fn with_config(source: S, config: ParserConfig) -> Self {
        let input = InputFilter::new(source);
        let tokeniser = Tokeniser::new(input);
        Parser {
            reader: EntityReader::new(tokeniser, config.max_block),
        }
    }

    /// Reads the next entity.
    pub fn read(&mut self) -> Result<Entity<'_>, Error> {
        self.reader.read()
    }

    /// The current 1-based line number.
    pub fn line(&self) -> u64 {
        self.reader.line()
    }

    /// Whether a leading UTF-8 BOM was stripped. Meaningful only after at
    /// least one successful `read()`.
    pub fn had_bom(&self) -> bool {
        self.reader.had_bom()
    }
}

// spec.md §5: a parser is a sequential state machine, not re-entrant, and
// must not be shared between threads without external mutual exclusion. It
// is still safe to hand one off to a single other thread (e.g. a worker
// pool), so `Send` (given a `Send` byte source) is a real guarantee worth
// pinning down with a compile-time check, the way the teacher's own buffer
// pool asserts its thread-safety properties.
assert_impl_all!(Parser<IoByteSource<std::io::Stdin>>: Send);

/// A static, human-readable message for an [`ErrorKind`] (spec.md §4.F).
///
/// This is the stable, allocation-free counterpart to `ErrorKind`'s
/// `Display` impl (which the two must agree with) for callers that want a
/// `&'static str` rather than a formatted `String`.
pub fn error_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Io => "I/O error from the byte source",
        ErrorKind::Eof => "unexpected end of input",
        ErrorKind::BadSig => "malformed byte order mark",
        ErrorKind::OpenStr => "unterminated string",
        ErrorKind::LongStr => "string data too long",
        ErrorKind::NullChar => "NUL byte in string data",
        ErrorKind::DeepCurly => "curly string nested too deeply",
        ErrorKind::BadChar => "illegal byte",
        ErrorKind::LongToken => "token too long",
        ErrorKind::Trailer => "data after terminal token",
        ErrorKind::DeepArray => "array nested too deeply",
        ErrorKind::MetaNest => "nested metacommand",
        ErrorKind::Semicolon => "';' outside a metacommand",
        ErrorKind::DeepGroup => "group nested too deeply",
        ErrorKind::RParen => "unmatched ')'",
        ErrorKind::RSqr => "unmatched ']'",
        ErrorKind::OpenGroup => "group still open",
        ErrorKind::LongArray => "array too long",
        ErrorKind::MetaEmbed => "embedded data in a metacommand",
        ErrorKind::OpenMeta => "metacommand still open",
        ErrorKind::OpenArray => "array still open",
        ErrorKind::Comma => "unexpected ','",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IoByteSource;

    fn parser(bytes: &'static [u8]) -> Parser<IoByteSource<&'static [u8]>> {
        Parser::new(IoByteSource::new(bytes))
    }

    #[test]
    fn end_to_end_numeric_and_operator() {
        let mut p = parser(b"12 34 add |;\n");
        assert_eq!(p.read().unwrap(), Entity::Numeric { text: b"12" });
        assert_eq!(p.read().unwrap(), Entity::Numeric { text: b"34" });
        assert_eq!(p.read().unwrap(), Entity::Operation { name: b"add" });
        assert_eq!(p.read().unwrap(), Entity::Eof);
    }

    #[test]
    fn bom_is_reported() {
        let mut p = parser(b"\xEF\xBB\xBF\"hi\" |;\n");
        assert_eq!(
            p.read().unwrap(),
            Entity::String {
                prefix: b"",
                kind: crate::token::StringKind::Quoted,
                data: b"hi",
            }
        );
        assert!(p.had_bom());
    }

    #[test]
    fn config_clamps_max_block_to_the_documented_floor() {
        let config = ParserConfig::new().max_block(10);
        let mut p = Parser::with_config(IoByteSource::new(&b"a |;\n"[..]), config);
        assert_eq!(p.read().unwrap(), Entity::Operation { name: b"a" });
    }

    #[test]
    fn error_message_agrees_with_display() {
        assert_eq!(
            error_message(ErrorKind::RParen),
            format!("{}", ErrorKind::RParen)
        );
    }
}

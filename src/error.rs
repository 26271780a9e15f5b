//! The parser's closed error enumeration (spec.md §4.F, §7).
//!
//! Every error is detected at the lowest layer that notices it, converted to
//! a sticky status, and reported from every subsequent [`crate::Parser::read`]
//! call afterward (spec.md §8: "`status != OK` is sticky").

use thiserror::Error as ThisError;

/// The kind of error that stopped the parse.
///
/// Grouped the way spec.md §7 groups them: source errors originate in the
/// input filter stack, lexical errors in the tokeniser, structural errors in
/// the entity reader. `Comma` has no reachable code path in this pipeline; it
/// is kept for the same forward-compatibility reason spec.md gives.
#[derive(Clone, Copy, Debug, ThisError, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The byte source reported a failure.
    #[error("I/O error from the byte source")]
    Io,
    /// The stream ended before a well-formed construct was closed.
    #[error("unexpected end of input")]
    Eof,
    /// A byte sequence starting with `EF` was not a complete UTF-8 BOM.
    #[error("malformed byte order mark")]
    BadSig,
    /// A quoted or curly string was never closed.
    #[error("unterminated string")]
    OpenStr,
    /// String data exceeded the maximum block length.
    #[error("string data too long")]
    LongStr,
    /// A literal NUL byte appeared in string data.
    #[error("NUL byte in string data")]
    NullChar,
    /// Curly-string nesting exceeded the maximum depth.
    #[error("curly string nested too deeply")]
    DeepCurly,
    /// A byte outside the legal token/whitespace/comment set appeared.
    #[error("illegal byte")]
    BadChar,
    /// A simple token or string prefix exceeded the maximum block length.
    #[error("token too long")]
    LongToken,
    /// Non-whitespace, non-comment data followed the terminal `|;` token.
    #[error("data after terminal token")]
    Trailer,
    /// Array nesting exceeded the maximum depth.
    #[error("array nested too deeply")]
    DeepArray,
    /// A `%` was seen while already inside a metacommand.
    #[error("nested metacommand")]
    MetaNest,
    /// A `;` was seen outside of a metacommand.
    #[error("';' outside a metacommand")]
    Semicolon,
    /// Parenthesis nesting exceeded the maximum depth.
    #[error("group nested too deeply")]
    DeepGroup,
    /// A `)` was seen with no matching open `(`.
    #[error("unmatched ')'")]
    RParen,
    /// A `]` was seen with no matching open `[`.
    #[error("unmatched ']'")]
    RSqr,
    /// A group was still open where the grammar requires it closed.
    #[error("group still open")]
    OpenGroup,
    /// An array's element count exceeded the maximum.
    #[error("array too long")]
    LongArray,
    /// Embedded data was introduced inside a metacommand.
    #[error("embedded data in a metacommand")]
    MetaEmbed,
    /// The terminal token appeared while a metacommand was still open.
    #[error("metacommand still open")]
    OpenMeta,
    /// The terminal token appeared while an array was still open.
    #[error("array still open")]
    OpenArray,
    /// An unexpected `,` was seen.
    ///
    /// No path in this pipeline produces this variant; it is retained in the
    /// enumeration for forward compatibility, per spec.md §9.
    #[error("unexpected ','")]
    Comma,
}

/// An error from parsing a Shastina stream, carrying the line at which it was
/// detected.
///
/// The line is saturated at [`u64::MAX`] the same way the line counter
/// itself saturates (spec.md §3, §7). When an error is replayed on a
/// subsequent sticky `read()`, its `source` is `None`: only the first report
/// carries the underlying byte source failure, since that failure cannot be
/// cloned. Callers reach it through the standard
/// [`std::error::Error::source`] method, the same way `fast-export`'s
/// `ParseError`/`StreamError` expose their own wrapped causes.
#[derive(Debug, ThisError)]
#[error("{kind} at line {line}")]
pub struct Error {
    pub kind: ErrorKind,
    pub line: u64,
    #[source]
    pub(crate) source: Option<Box<dyn std::error::Error + 'static>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, line: u64) -> Self {
        Error {
            kind,
            line,
            source: None,
        }
    }

    pub(crate) fn with_source(
        kind: ErrorKind,
        line: u64,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Error {
            kind,
            line,
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_replay_has_no_source() {
        let err = Error::new(ErrorKind::RParen, 4);
        assert_eq!(err.kind, ErrorKind::RParen);
        assert_eq!(err.line, 4);
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn wrapped_source_is_reachable_through_the_error_trait() {
        use std::io;
        let io_err = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let err = Error::with_source(ErrorKind::Io, 1, io_err);
        let source = std::error::Error::source(&err).expect("source was set");
        assert_eq!(source.to_string(), "disk on fire");
    }
}

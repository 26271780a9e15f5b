//! Core parser pipeline for the Shastina stack-oriented textual data
//! language: turns a raw byte stream into a forward-only sequence of
//! entities (numeric literals, strings, variables, operators, groups,
//! arrays, metacommands).
//!
//! The pipeline is layered bottom-up: [`source`] abstracts the raw byte
//! producer; [`input`] filters it (BOM stripping, line-break normalisation,
//! whitespace-ghost removal, line counting); [`token`] groups filtered bytes
//! into blocks; [`entity`] turns blocks into the public [`Entity`] stream.
//! [`buffer`] and [`stack`] are the two bounded data structures the pipeline
//! shares between layers.
//!
//! Reading embedded data past its prefix, interpreting the entity stream,
//! and decoding string escapes beyond the byte-accurate quoted/curly shape
//! are all outside this crate.

mod buffer;
mod entity;
mod error;
mod input;
mod parser;
mod source;
mod stack;
mod token;

pub use entity::Entity;
pub use error::{Error, ErrorKind};
pub use parser::{error_message, Parser, ParserConfig, DEFAULT_MAX_BLOCK, MIN_MAX_BLOCK};
pub use source::{Byte, ByteSource, IoByteSource};
pub use token::StringKind;

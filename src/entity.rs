//! The entity reader (spec.md §4.E): the top of the pipeline, turning tokens
//! from the [`Tokeniser`] into the public [`Entity`] stream, with a small
//! look-ahead queue so one token can expand into more than one entity.

use std::collections::VecDeque;
use std::fmt;

use bstr::ByteSlice;

use crate::buffer::ByteBuffer;
use crate::error::{Error, ErrorKind};
use crate::source::ByteSource;
use crate::stack::LongStack;
use crate::token::{StringKind, Token, Tokeniser};

/// Maximum number of entities a single token may enqueue in one `fill()`
/// step. The widest case is a `,` array separator: `EndGroup` + `BeginGroup`,
/// well under this bound; it is sized generously rather than tightly.
const MAX_QUEUE: usize = 8;

/// Maximum array/group nesting depth tracked by the two long stacks.
const MAX_NESTING: usize = 1024;

/// One semantically meaningful unit of the parse (spec.md §3).
///
/// `String`, `MetaToken`, `MetaString`, `Numeric`, `Variable`, `Constant`,
/// `Assign`, `Get`, `Operation`, and `Embedded` borrow from the entity
/// reader's key/value buffers: the borrow is invalidated by the next call to
/// [`crate::Parser::read`].
#[derive(PartialEq, Eq)]
pub enum Entity<'a> {
    Eof,
    String {
        prefix: &'a [u8],
        kind: StringKind,
        data: &'a [u8],
    },
    Embedded {
        prefix: &'a [u8],
    },
    BeginMeta,
    EndMeta,
    MetaToken {
        text: &'a [u8],
    },
    MetaString {
        prefix: &'a [u8],
        kind: StringKind,
        data: &'a [u8],
    },
    Numeric {
        text: &'a [u8],
    },
    Variable {
        name: &'a [u8],
    },
    Constant {
        name: &'a [u8],
    },
    Assign {
        name: &'a [u8],
    },
    Get {
        name: &'a [u8],
    },
    BeginGroup,
    EndGroup,
    Array {
        count: i64,
    },
    Operation {
        name: &'a [u8],
    },
}

/// Formats borrowed byte strings the way `bstr` renders them elsewhere in
/// this codebase's lineage (lossily, as a quoted string rather than a byte
/// array), so a trace of entities reads like text instead of `u8` arrays.
impl fmt::Debug for Entity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Eof => write!(f, "Eof"),
            Entity::String { prefix, kind, data } => f
                .debug_struct("String")
                .field("prefix", &prefix.as_bstr())
                .field("kind", kind)
                .field("data", &data.as_bstr())
                .finish(),
            Entity::Embedded { prefix } => f
                .debug_struct("Embedded")
                .field("prefix", &prefix.as_bstr())
                .finish(),
            Entity::BeginMeta => write!(f, "BeginMeta"),
            Entity::EndMeta => write!(f, "EndMeta"),
            Entity::MetaToken { text } => f
                .debug_struct("MetaToken")
                .field("text", &text.as_bstr())
                .finish(),
            Entity::MetaString { prefix, kind, data } => f
                .debug_struct("MetaString")
                .field("prefix", &prefix.as_bstr())
                .field("kind", kind)
                .field("data", &data.as_bstr())
                .finish(),
            Entity::Numeric { text } => f
                .debug_struct("Numeric")
                .field("text", &text.as_bstr())
                .finish(),
            Entity::Variable { name } => f
                .debug_struct("Variable")
                .field("name", &name.as_bstr())
                .finish(),
            Entity::Constant { name } => f
                .debug_struct("Constant")
                .field("name", &name.as_bstr())
                .finish(),
            Entity::Assign { name } => f
                .debug_struct("Assign")
                .field("name", &name.as_bstr())
                .finish(),
            Entity::Get { name } => f
                .debug_struct("Get")
                .field("name", &name.as_bstr())
                .finish(),
            Entity::BeginGroup => write!(f, "BeginGroup"),
            Entity::EndGroup => write!(f, "EndGroup"),
            Entity::Array { count } => f.debug_struct("Array").field("count", count).finish(),
            Entity::Operation { name } => f
                .debug_struct("Operation")
                .field("name", &name.as_bstr())
                .finish(),
        }
    }
}

/// An entity with no borrowed content, queued ahead of being returned.
///
/// Every variant that borrows in [`Entity`] is represented here by a tag plus
/// which buffer (key or value) and prefix/data split it draws from, since the
/// queue cannot itself hold a borrow of the buffers it will later slice.
#[derive(Debug, Clone, Copy)]
enum QueuedEntity {
    Eof,
    String { kind: StringKind },
    Embedded,
    BeginMeta,
    EndMeta,
    MetaToken,
    MetaString { kind: StringKind },
    Numeric,
    Variable,
    Constant,
    Assign,
    Get,
    BeginGroup,
    EndGroup,
    Array { count: i64 },
    Operation,
}

/// The entity reader. Owns the tokeniser and both shared buffers, and
/// exposes the public [`Entity`] stream.
pub struct EntityReader<S> {
    tokeniser: Tokeniser<S>,
    key_buf: ByteBuffer,
    val_buf: ByteBuffer,
    array_stack: LongStack,
    group_stack: LongStack,
    in_meta: bool,
    array_opening: bool,
    sticky: Option<(ErrorKind, u64)>,
    queue: VecDeque<QueuedEntity>,
    eof_queued: bool,
}

impl<S: ByteSource> EntityReader<S> {
    pub fn new(tokeniser: Tokeniser<S>, max_block: usize) -> Self {
        let mut group_stack = LongStack::new(8, MAX_NESTING);
        group_stack.push(0).expect("fresh group stack has room");
        EntityReader {
            tokeniser,
            key_buf: ByteBuffer::new(64, max_block),
            val_buf: ByteBuffer::new(64, max_block),
            array_stack: LongStack::new(8, MAX_NESTING),
            group_stack,
            in_meta: false,
            array_opening: false,
            sticky: None,
            queue: VecDeque::with_capacity(MAX_QUEUE),
            eof_queued: false,
        }
    }

    pub fn line(&self) -> u64 {
        self.tokeniser.line()
    }

    pub fn had_bom(&self) -> bool {
        self.tokeniser.had_bom()
    }

    /// Reads the next entity. Sticky on error or after `Eof`.
    pub fn read(&mut self) -> Result<Entity<'_>, Error> {
        if let Some((kind, line)) = self.sticky {
            return Err(Error::new(kind, line));
        }
        while self.queue.is_empty() {
            if let Err(e) = self.fill() {
                self.sticky = Some((e.kind, e.line));
                return Err(e);
            }
        }
        let queued = if self.eof_queued {
            *self.queue.front().expect("eof stays queued")
        } else {
            self.queue
                .pop_front()
                .expect("loop above only exits once the queue is non-empty")
        };
        Ok(self.materialize(queued))
    }

    fn materialize(&self, q: QueuedEntity) -> Entity<'_> {
        match q {
            QueuedEntity::Eof => Entity::Eof,
            QueuedEntity::String { kind } => Entity::String {
                prefix: self.key_buf.bytes(),
                kind,
                data: self.val_buf.bytes(),
            },
            QueuedEntity::Embedded => Entity::Embedded {
                prefix: self.key_buf.bytes(),
            },
            QueuedEntity::BeginMeta => Entity::BeginMeta,
            QueuedEntity::EndMeta => Entity::EndMeta,
            QueuedEntity::MetaToken => Entity::MetaToken {
                text: self.key_buf.bytes(),
            },
            QueuedEntity::MetaString { kind } => Entity::MetaString {
                prefix: self.key_buf.bytes(),
                kind,
                data: self.val_buf.bytes(),
            },
            QueuedEntity::Numeric => Entity::Numeric {
                text: self.key_buf.bytes(),
            },
            QueuedEntity::Variable => Entity::Variable {
                name: &self.key_buf.bytes()[1..],
            },
            QueuedEntity::Constant => Entity::Constant {
                name: &self.key_buf.bytes()[1..],
            },
            QueuedEntity::Assign => Entity::Assign {
                name: &self.key_buf.bytes()[1..],
            },
            QueuedEntity::Get => Entity::Get {
                name: &self.key_buf.bytes()[1..],
            },
            QueuedEntity::BeginGroup => Entity::BeginGroup,
            QueuedEntity::EndGroup => Entity::EndGroup,
            QueuedEntity::Array { count } => Entity::Array { count },
            QueuedEntity::Operation => Entity::Operation {
                name: self.key_buf.bytes(),
            },
        }
    }

    fn fail(&self, kind: ErrorKind) -> Error {
        Error::new(kind, self.tokeniser.line())
    }

    fn enqueue(&mut self, q: QueuedEntity) {
        debug_assert!(self.queue.len() < MAX_QUEUE, "entity queue overflow");
        self.queue.push_back(q);
    }

    /// Reads one token and turns it into ≥1 queued entities, or a sticky
    /// error.
    fn fill(&mut self) -> Result<(), Error> {
        let (token, _line) = self.tokeniser.next_token(&mut self.key_buf, &mut self.val_buf)?;

        let is_rsqr = matches!(token, Token::Simple) && self.key_buf.bytes() == b"]";
        if self.array_opening && !self.in_meta && !is_rsqr {
            self.array_opening = false;
            self.array_stack
                .push(1)
                .map_err(|()| self.fail(ErrorKind::DeepArray))?;
            self.group_stack
                .push(0)
                .map_err(|()| self.fail(ErrorKind::DeepArray))?;
            self.enqueue(QueuedEntity::BeginGroup);
        }

        match token {
            Token::Terminal => self.dispatch_terminal()?,
            Token::Simple => self.dispatch_simple()?,
            Token::String(kind) => {
                if self.in_meta {
                    self.enqueue(QueuedEntity::MetaString { kind });
                } else {
                    self.enqueue(QueuedEntity::String { kind });
                }
            }
            Token::Embedded => {
                if self.in_meta {
                    return Err(self.fail(ErrorKind::MetaEmbed));
                }
                self.enqueue(QueuedEntity::Embedded);
            }
        }
        Ok(())
    }

    fn dispatch_terminal(&mut self) -> Result<(), Error> {
        if self.in_meta {
            return Err(self.fail(ErrorKind::OpenMeta));
        }
        if self.array_opening || !self.array_stack.is_empty() {
            return Err(self.fail(ErrorKind::OpenArray));
        }
        if self.group_stack.peek() != 0 {
            return Err(self.fail(ErrorKind::OpenGroup));
        }
        self.enqueue(QueuedEntity::Eof);
        self.eof_queued = true;
        Ok(())
    }

    fn dispatch_simple(&mut self) -> Result<(), Error> {
        let first = self.key_buf.bytes()[0];

        if first == b'%' {
            if self.in_meta {
                return Err(self.fail(ErrorKind::MetaNest));
            }
            self.in_meta = true;
            self.enqueue(QueuedEntity::BeginMeta);
            return Ok(());
        }
        if first == b';' {
            if !self.in_meta {
                return Err(self.fail(ErrorKind::Semicolon));
            }
            self.in_meta = false;
            self.enqueue(QueuedEntity::EndMeta);
            return Ok(());
        }
        if self.in_meta {
            self.enqueue(QueuedEntity::MetaToken);
            return Ok(());
        }

        match first {
            b'+' | b'-' | b'0'..=b'9' => self.enqueue(QueuedEntity::Numeric),
            b'?' => self.enqueue(QueuedEntity::Variable),
            b'@' => self.enqueue(QueuedEntity::Constant),
            b':' => self.enqueue(QueuedEntity::Assign),
            b'=' => self.enqueue(QueuedEntity::Get),
            b'(' => {
                self.group_stack
                    .inc()
                    .map_err(|()| self.fail(ErrorKind::DeepGroup))?;
                self.enqueue(QueuedEntity::BeginGroup);
            }
            b')' => {
                self.group_stack
                    .dec()
                    .map_err(|()| self.fail(ErrorKind::RParen))?;
                self.enqueue(QueuedEntity::EndGroup);
            }
            b'[' => {
                self.array_opening = true;
            }
            b']' => self.dispatch_rsqr()?,
            b',' => self.dispatch_comma()?,
            _ => self.enqueue(QueuedEntity::Operation),
        }
        Ok(())
    }

    fn dispatch_rsqr(&mut self) -> Result<(), Error> {
        if self.array_opening {
            self.array_opening = false;
            self.enqueue(QueuedEntity::Array { count: 0 });
            return Ok(());
        }
        if self.array_stack.is_empty() {
            return Err(self.fail(ErrorKind::RSqr));
        }
        if self.group_stack.peek() != 0 {
            return Err(self.fail(ErrorKind::OpenGroup));
        }
        self.enqueue(QueuedEntity::EndGroup);
        let count = self.array_stack.pop();
        self.enqueue(QueuedEntity::Array { count });
        self.group_stack.pop();
        Ok(())
    }

    fn dispatch_comma(&mut self) -> Result<(), Error> {
        if self.array_stack.is_empty() {
            return Err(self.fail(ErrorKind::RSqr));
        }
        if self.group_stack.peek() != 0 {
            return Err(self.fail(ErrorKind::OpenGroup));
        }
        self.array_stack
            .inc()
            .map_err(|()| self.fail(ErrorKind::LongArray))?;
        self.enqueue(QueuedEntity::EndGroup);
        self.enqueue(QueuedEntity::BeginGroup);
        Ok(())
    }
}

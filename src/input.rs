//! The input filter stack (spec.md §4.C): BOM stripping, line-break
//! normalisation, the final-LF guarantee, tab- and line-unghosting, line
//! counting, and one-byte pushback, layered over a [`ByteSource`].
//!
//! Each numbered stage below corresponds to a filter named in spec.md §4.C.
//! They are fused into one struct rather than composed through trait
//! objects, which spec.md §9's design notes explicitly allow ("any
//! implementation may fuse filters, but the observable byte sequence must
//! match the specified composition"); each stage keeps its own method and
//! its own slice of state so the composition stays explicit in the code,
//! even though no dynamic dispatch happens between them.

use crate::error::{Error, ErrorKind};
use crate::source::{Byte, ByteSource};

/// The input filter stack. Pulls from a [`ByteSource`] and exposes filtered,
/// line-counted bytes with one-byte pushback.
pub struct InputFilter<S> {
    source: S,

    // Stage 1: raw read stickiness.
    source_done: Option<Result<(), ErrorKind>>,

    // Stage 2: BOM filter.
    bom_init: bool,
    bom_present: bool,

    // Stage 3: line-break normalisation.
    break_buf: Option<Byte>,

    // Stage 4: final-LF guarantee.
    prev_was_lf: bool,
    final_lf_inserted: bool,

    // Stage 5: tab-unghosting (`SP+ HT -> HT`).
    tab_run_pending: u64,
    tab_lookahead: Option<Byte>,

    // Stage 6: line-unghosting (`(HT|SP)+ LF -> LF`).
    lu_ht_pending: u64,
    lu_sp_pending: u64,
    lu_lookahead: Option<Byte>,

    // Stage 7: line counter.
    line: u64,

    // Stage 8: consumer-facing pushback.
    last_byte: Option<Byte>,
    pushback_armed: bool,

    // Any sticky error already reported, replayed without its original
    // cause on every subsequent read.
    sticky: Option<(ErrorKind, u64)>,
}

impl<S: ByteSource> InputFilter<S> {
    pub fn new(source: S) -> Self {
        InputFilter {
            source,
            source_done: None,
            bom_init: false,
            bom_present: false,
            break_buf: None,
            prev_was_lf: false,
            final_lf_inserted: false,
            tab_run_pending: 0,
            tab_lookahead: None,
            lu_ht_pending: 0,
            lu_sp_pending: 0,
            lu_lookahead: None,
            line: 1,
            last_byte: None,
            pushback_armed: false,
            sticky: None,
        }
    }

    /// Reads the next filtered byte, or signals end of stream.
    pub fn read(&mut self) -> Result<Byte, Error> {
        if self.pushback_armed {
            self.pushback_armed = false;
            return Ok(self.last_byte.expect("pushback armed with no last byte"));
        }
        if let Some((kind, line)) = self.sticky {
            return Err(Error::new(kind, line));
        }
        match self.stage7_line_count() {
            Ok(b) => {
                self.last_byte = Some(b);
                Ok(b)
            }
            Err(e) => {
                self.sticky = Some((e.kind, e.line));
                Err(e)
            }
        }
    }

    /// Arms pushback so the next `read()` returns the byte just read again.
    ///
    /// It is a fault (spec.md §4.C.8) to arm pushback twice in a row or
    /// before any byte has been read.
    pub fn push_back(&mut self) {
        assert!(!self.pushback_armed, "pushback armed twice in a row");
        assert!(
            self.last_byte.is_some(),
            "pushback armed before any byte was read"
        );
        self.pushback_armed = true;
    }

    /// The current 1-based line number, saturating at `u64::MAX`.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Whether a leading UTF-8 BOM was stripped. Meaningful only after at
    /// least one successful read.
    pub fn had_bom(&self) -> bool {
        self.bom_present
    }

    fn fail(&mut self, kind: ErrorKind) -> Error {
        Error::new(kind, self.line)
    }

    // Stage 1: raw read, with sticky terminal state.
    fn stage1_raw(&mut self) -> Result<Byte, Error> {
        if let Some(done) = self.source_done {
            return match done {
                Ok(()) => Ok(Byte::Eof),
                Err(kind) => Err(self.fail(kind)),
            };
        }
        match self.source.read_byte() {
            Ok(Byte::Eof) => {
                self.source_done = Some(Ok(()));
                Ok(Byte::Eof)
            }
            Ok(b) => Ok(b),
            Err(e) => {
                self.source_done = Some(Err(ErrorKind::Io));
                let line = self.line;
                Err(Error::with_source(ErrorKind::Io, line, e))
            }
        }
    }

    // Stage 2: UTF-8 BOM filter. A leading `EF BB BF` is consumed and
    // remembered; an `EF` not followed by a complete BOM is a `BadSig`.
    fn stage2_bom(&mut self) -> Result<Byte, Error> {
        if self.bom_init {
            return self.stage1_raw();
        }
        self.bom_init = true;
        let b0 = self.stage1_raw()?;
        if b0 != Byte::Byte(0xEF) {
            return Ok(b0);
        }
        let b1 = self.stage1_raw()?;
        if b1 != Byte::Byte(0xBB) {
            return Err(self.fail(ErrorKind::BadSig));
        }
        let b2 = self.stage1_raw()?;
        if b2 != Byte::Byte(0xBF) {
            return Err(self.fail(ErrorKind::BadSig));
        }
        self.bom_present = true;
        self.stage1_raw()
    }

    // Stage 3: normalises CR, LF, CR+LF, and LF+CR to a single LF.
    fn stage3_linebreak(&mut self) -> Result<Byte, Error> {
        let b = match self.break_buf.take() {
            Some(b) => b,
            None => self.stage2_bom()?,
        };
        match b {
            Byte::Byte(b'\r') => {
                let next = self.stage2_bom()?;
                if next != Byte::Byte(b'\n') {
                    self.break_buf = Some(next);
                }
                Ok(Byte::Byte(b'\n'))
            }
            Byte::Byte(b'\n') => {
                let next = self.stage2_bom()?;
                if next != Byte::Byte(b'\r') {
                    self.break_buf = Some(next);
                }
                Ok(Byte::Byte(b'\n'))
            }
            other => Ok(other),
        }
    }

    // Stage 4: guarantees the filtered stream ends in LF, inserting exactly
    // one synthetic LF if it wouldn't otherwise (including for empty input).
    fn stage4_final_lf(&mut self) -> Result<Byte, Error> {
        let b = self.stage3_linebreak()?;
        if b == Byte::Eof {
            if !self.final_lf_inserted && !self.prev_was_lf {
                self.final_lf_inserted = true;
                return Ok(Byte::Byte(b'\n'));
            }
            return Ok(Byte::Eof);
        }
        if let Byte::Byte(c) = b {
            self.prev_was_lf = c == b'\n';
        }
        Ok(b)
    }

    // Stage 5: `SP+ HT -> HT`.
    fn stage5_tab_unghost(&mut self) -> Result<Byte, Error> {
        if self.tab_run_pending > 0 {
            self.tab_run_pending -= 1;
            return Ok(Byte::Byte(b' '));
        }
        let b = match self.tab_lookahead.take() {
            Some(b) => b,
            None => self.stage4_final_lf()?,
        };
        if b != Byte::Byte(b' ') {
            return Ok(b);
        }
        let mut run: u64 = 1;
        loop {
            let next = self.stage4_final_lf()?;
            match next {
                Byte::Byte(b' ') => {
                    run = run.checked_add(1).ok_or_else(|| self.fail(ErrorKind::Io))?;
                }
                Byte::Byte(b'\t') => return Ok(Byte::Byte(b'\t')),
                _ => {
                    self.tab_run_pending = run - 1;
                    self.tab_lookahead = Some(next);
                    return Ok(Byte::Byte(b' '));
                }
            }
        }
    }

    // Stage 6: `(HT|SP)+ LF -> LF`. Relies on stage 5 already having removed
    // any SP immediately before an HT; a run reaching this stage is always
    // ordered `HT* SP*`.
    fn stage6_line_unghost(&mut self) -> Result<Byte, Error> {
        if self.lu_ht_pending > 0 {
            self.lu_ht_pending -= 1;
            return Ok(Byte::Byte(b'\t'));
        }
        if self.lu_sp_pending > 0 {
            self.lu_sp_pending -= 1;
            return Ok(Byte::Byte(b' '));
        }
        let b = match self.lu_lookahead.take() {
            Some(b) => b,
            None => self.stage5_tab_unghost()?,
        };
        if !matches!(b, Byte::Byte(b'\t') | Byte::Byte(b' ')) {
            return Ok(b);
        }
        let mut ht: u64 = 0;
        let mut sp: u64 = 0;
        let mut cur = b;
        loop {
            match cur {
                Byte::Byte(b'\t') => {
                    assert!(sp == 0, "tab-unghosting invariant violated: HT after SP");
                    ht += 1;
                }
                Byte::Byte(b' ') => sp += 1,
                _ => unreachable!(),
            }
            let next = self.stage5_tab_unghost()?;
            match next {
                Byte::Byte(b'\n') => return Ok(Byte::Byte(b'\n')),
                Byte::Byte(b'\t') | Byte::Byte(b' ') => {
                    cur = next;
                    continue;
                }
                other => {
                    self.lu_ht_pending = ht;
                    self.lu_sp_pending = sp;
                    self.lu_lookahead = Some(other);
                    break;
                }
            }
        }
        if self.lu_ht_pending > 0 {
            self.lu_ht_pending -= 1;
            Ok(Byte::Byte(b'\t'))
        } else {
            self.lu_sp_pending -= 1;
            Ok(Byte::Byte(b' '))
        }
    }

    // Stage 7: 1-based line counter, saturating, incremented per emitted LF.
    fn stage7_line_count(&mut self) -> Result<Byte, Error> {
        let b = self.stage6_line_unghost()?;
        if b == Byte::Byte(b'\n') {
            self.line = self.line.saturating_add(1);
        }
        Ok(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IoByteSource;

    fn filter(bytes: &[u8]) -> InputFilter<IoByteSource<&[u8]>> {
        InputFilter::new(IoByteSource::new(bytes))
    }

    fn collect(f: &mut InputFilter<IoByteSource<&[u8]>>) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match f.read().unwrap() {
                Byte::Byte(b) => out.push(b),
                Byte::Eof => return out,
            }
        }
    }

    #[test]
    fn strips_bom_and_reports_it() {
        let mut f = filter(b"\xEF\xBB\xBFhi\n");
        assert_eq!(collect(&mut f), b"hi\n");
        assert!(f.had_bom());
    }

    #[test]
    fn no_bom_present() {
        let mut f = filter(b"hi\n");
        assert_eq!(collect(&mut f), b"hi\n");
        assert!(!f.had_bom());
    }

    #[test]
    fn incomplete_bom_is_bad_signature() {
        let mut f = filter(b"\xEFxy");
        assert_eq!(f.read().unwrap_err().kind, ErrorKind::BadSig);
        // Sticky.
        assert_eq!(f.read().unwrap_err().kind, ErrorKind::BadSig);
    }

    #[test]
    fn normalises_all_line_break_styles() {
        for input in [&b"a\r\nb\n"[..], b"a\n\rb\n", b"a\rb\n", b"a\nb\n"] {
            let mut f = filter(input);
            assert_eq!(collect(&mut f), b"a\nb\n");
        }
    }

    #[test]
    fn final_lf_is_inserted_exactly_once() {
        let mut f = filter(b"abc");
        assert_eq!(collect(&mut f), b"abc\n");
    }

    #[test]
    fn empty_input_yields_a_single_lf() {
        let mut f = filter(b"");
        assert_eq!(collect(&mut f), b"\n");
    }

    #[test]
    fn no_extra_lf_when_input_already_ends_in_lf() {
        let mut f = filter(b"abc\n");
        assert_eq!(collect(&mut f), b"abc\n");
    }

    #[test]
    fn tab_unghosting_collapses_spaces_before_tab() {
        let mut f = filter(b"a   \tb\n");
        assert_eq!(collect(&mut f), b"a\tb\n");
    }

    #[test]
    fn tab_unghosting_leaves_non_tab_terminated_runs_alone() {
        let mut f = filter(b"a   b\n");
        assert_eq!(collect(&mut f), b"a   b\n");
    }

    #[test]
    fn line_unghosting_collapses_trailing_whitespace() {
        let mut f = filter(b"a \t \n");
        assert_eq!(collect(&mut f), b"a\n");
    }

    #[test]
    fn line_counter_increments_on_each_emitted_lf() {
        let mut f = filter(b"a\nb\nc\n");
        assert_eq!(f.line(), 1);
        while f.read().unwrap() != Byte::Eof {}
        assert_eq!(f.line(), 4);
    }

    #[test]
    fn pushback_returns_the_last_byte_and_does_not_retract_line_count() {
        let mut f = filter(b"a\nb\n");
        assert_eq!(f.read().unwrap(), Byte::Byte(b'a'));
        assert_eq!(f.read().unwrap(), Byte::Byte(b'\n'));
        assert_eq!(f.line(), 2);
        f.push_back();
        assert_eq!(f.read().unwrap(), Byte::Byte(b'\n'));
        assert_eq!(f.line(), 2);
    }

    #[test]
    #[should_panic(expected = "pushback armed twice in a row")]
    fn double_pushback_is_a_fault() {
        let mut f = filter(b"a\n");
        f.read().unwrap();
        f.push_back();
        f.push_back();
    }
}

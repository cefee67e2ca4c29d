//! Token stream: lookahead, pushback, checkpoints, and identifier
//! resolution.
//!
//! Words are classified when they are read, not when they are lexed: a
//! function parameter first, then a reserved word, then the innermost
//! declared symbol. Array subscripts and dictionary members are resolved
//! at the same time, so the rest of the parser only ever sees the entry a
//! name finally refers to.

use std::mem;
use std::ops::Range;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::Result;
use crate::keywords::Keyword;
use crate::symbols::{ArrayValue, SymbolEntry, SymbolKind, SymbolTable};
use crate::token::{Spanned, Token};

use super::Parser;

/// A token after classification.
#[derive(Debug, Clone)]
pub(crate) enum Tok {
    Raw(Token),
    Keyword(Keyword),
    Ident(Rc<SymbolEntry>),
    Undeclared(String),
    Eof,
}

impl Tok {
    pub(crate) fn describe(&self) -> String {
        match self {
            Tok::Raw(t) => t.describe().to_string(),
            Tok::Keyword(k) => format!("'{}'", k.as_str()),
            Tok::Ident(e) => format!("{} '{}'", e.kind().name(), e.name()),
            Tok::Undeclared(name) => format!("undeclared identifier '{name}'"),
            Tok::Eof => "end of file".to_string(),
        }
    }

    pub(crate) fn is(&self, token: &Token) -> bool {
        matches!(self, Tok::Raw(t) if t == token)
    }

    pub(crate) fn keyword(&self) -> Option<Keyword> {
        match self {
            Tok::Keyword(k) => Some(*k),
            _ => None,
        }
    }

    pub(crate) fn is_keyword(&self, k: Keyword) -> bool {
        self.keyword() == Some(k)
    }

    pub(crate) fn entry(&self) -> Option<&Rc<SymbolEntry>> {
        match self {
            Tok::Ident(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn ident_kind(&self) -> Option<SymbolKind> {
        self.entry().map(|e| e.kind())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Lookahead {
    pub tok: Tok,
    pub span: Range<usize>,
    pub file: Option<Rc<PathBuf>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Source,
    Include,
    Macro,
}

/// One token source on the input stack.
#[derive(Debug)]
pub(crate) struct Frame {
    pub tokens: Rc<[Spanned]>,
    pub pos: usize,
    pub file: Option<Rc<PathBuf>>,
    pub kind: FrameKind,
    /// Depth of the conditional stack when the frame was entered.
    pub cond_depth: usize,
}

impl Frame {
    pub fn new(tokens: Rc<[Spanned]>, file: Option<Rc<PathBuf>>, kind: FrameKind, cond_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            file,
            kind,
            cond_depth,
        }
    }

    /// Includes and macro bodies own a symbol table.
    pub fn scoped(&self) -> bool {
        self.kind != FrameKind::Source
    }
}

/// Open conditional or loop directive.
#[derive(Debug)]
pub(crate) enum Cond {
    If,
    While {
        frame: usize,
        /// Token index of the loop condition.
        pos: usize,
    },
    For {
        name: String,
        end: f64,
        step: f64,
        frame: usize,
        body: usize,
    },
}

impl Parser {
    // ── Reading ────────────────────────────────────────────────────────

    /// Next token. Directives and macro calls are executed here when
    /// declarations are allowed, and never reach the caller.
    pub(crate) fn get(&mut self) -> Result<Lookahead> {
        loop {
            let la = match self.pushback.pop() {
                Some(la) => la,
                None => self.read_token()?,
            };
            if self.ok_to_declare {
                if let Tok::Raw(Token::Directive(name)) = &la.tok {
                    let name = name.clone();
                    self.locate(&la);
                    self.suspended(|p| p.declaring(false, |p| p.directive(&name)))?;
                    continue;
                }
                if let Tok::Ident(entry) = &la.tok {
                    if entry.kind() == SymbolKind::Macro {
                        let entry = Rc::clone(entry);
                        self.locate(&la);
                        self.suspended(|p| p.declaring(false, |p| p.invoke_macro(&entry)))?;
                        continue;
                    }
                }
            }
            self.locate(&la);
            if let Some(record) = self.recording.last_mut() {
                record.push(la.clone());
            }
            return Ok(la);
        }
    }

    pub(crate) fn unget(&mut self, la: Lookahead) {
        if let Some(record) = self.recording.last_mut() {
            record.pop();
        }
        self.pushback.push(la);
    }

    pub(crate) fn peek(&mut self) -> Result<Lookahead> {
        let la = self.get()?;
        self.unget(la.clone());
        Ok(la)
    }

    pub(crate) fn expect(&mut self, token: &Token) -> Result<Lookahead> {
        let la = self.get()?;
        if la.tok.is(token) {
            Ok(la)
        } else {
            Err(self.unexpected(token.describe(), &la))
        }
    }

    pub(crate) fn expect_keyword(&mut self, k: Keyword) -> Result<Lookahead> {
        let la = self.get()?;
        if la.tok.is_keyword(k) {
            Ok(la)
        } else {
            Err(self.unexpected(&format!("'{}'", k.as_str()), &la))
        }
    }

    /// Consume `token` if it is next.
    pub(crate) fn accept(&mut self, token: &Token) -> Result<bool> {
        let la = self.get()?;
        if la.tok.is(token) {
            return Ok(true);
        }
        self.unget(la);
        Ok(false)
    }

    pub(crate) fn accept_keyword(&mut self, k: Keyword) -> Result<bool> {
        let la = self.get()?;
        if la.tok.is_keyword(k) {
            return Ok(true);
        }
        self.unget(la);
        Ok(false)
    }

    /// Commas between items are optional almost everywhere.
    pub(crate) fn parse_comma(&mut self) -> Result<()> {
        self.accept(&Token::Comma).map(|_| ())
    }

    fn locate(&mut self, la: &Lookahead) {
        self.last_span = la.span.clone();
        self.last_file = la.file.clone();
    }

    // ── Modes ──────────────────────────────────────────────────────────

    /// Run `f` with directive processing switched on or off.
    pub(crate) fn declaring<R>(&mut self, ok: bool, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved = mem::replace(&mut self.ok_to_declare, ok);
        let result = f(self);
        self.ok_to_declare = saved;
        result
    }

    /// Run `f` with checkpoint recording suspended.
    pub(crate) fn suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved = mem::take(&mut self.recording);
        let result = f(self);
        self.recording = saved;
        result
    }

    pub(crate) fn probing<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved = mem::replace(&mut self.probing, true);
        let result = f(self);
        self.probing = saved;
        result
    }

    // ── Checkpoints ────────────────────────────────────────────────────

    /// Start recording tokens so they can be replayed by `restore`.
    pub(crate) fn checkpoint(&mut self) {
        self.recording.push(Vec::new());
    }

    /// Keep everything read since the matching checkpoint.
    pub(crate) fn commit(&mut self) {
        if let Some(tokens) = self.recording.pop() {
            if let Some(outer) = self.recording.last_mut() {
                outer.extend(tokens);
            }
        }
    }

    /// Hand back everything read since the matching checkpoint.
    pub(crate) fn restore(&mut self) {
        if let Some(tokens) = self.recording.pop() {
            self.pushback.extend(tokens.into_iter().rev());
        }
    }

    // ── Frames ─────────────────────────────────────────────────────────

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        log::trace!("entering {:?} frame ({} tokens)", frame.kind, frame.tokens.len());
        self.frames.push(frame);
    }

    fn pop_frame(&mut self) -> Result<()> {
        let Some(frame) = self.frames.last() else {
            return Ok(());
        };
        if self.cond_stack.len() > frame.cond_depth {
            let msg = match self.cond_stack.last() {
                Some(Cond::While { .. }) => "#while loop did not end in file where it started.",
                Some(Cond::For { .. }) => "#for loop did not end in file where it started.",
                _ => "End of file reached but #end expected.",
            };
            return Err(self.error(msg));
        }
        if let Some(frame) = self.frames.pop() {
            if frame.scoped() {
                self.symbols.pop_table();
            }
            log::trace!("leaving {:?} frame", frame.kind);
        }
        Ok(())
    }

    pub(crate) fn include_depth(&self) -> usize {
        self.frames.iter().filter(|f| f.kind == FrameKind::Include).count()
    }

    /// Next raw token of the innermost frame, without crossing into the
    /// frame below it.
    pub(crate) fn next_in_frame(&mut self) -> Option<Spanned> {
        let frame = self.frames.last_mut()?;
        let token = frame.tokens.get(frame.pos)?.clone();
        frame.pos += 1;
        self.last_span = token.span.clone();
        self.last_file = frame.file.clone();
        Some(token)
    }

    /// Position of the innermost frame, for loops that jump back.
    pub(crate) fn frame_position(&self) -> Option<(usize, usize)> {
        let index = self.frames.len().checked_sub(1)?;
        Some((index, self.frames[index].pos))
    }

    pub(crate) fn jump(&mut self, frame: usize, pos: usize) {
        if let Some(f) = self.frames.get_mut(frame) {
            f.pos = pos;
        }
        self.pushback.clear();
    }

    fn raw_next(&mut self) -> Result<Option<(Spanned, Option<Rc<PathBuf>>)>> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(None);
            };
            if let Some(token) = frame.tokens.get(frame.pos) {
                frame.pos += 1;
                return Ok(Some((token.clone(), frame.file.clone())));
            }
            self.pop_frame()?;
        }
    }

    /// The next word as written, unclassified. Used where a name is being
    /// introduced rather than referenced.
    pub(crate) fn raw_word(&mut self, expected: &str) -> Result<String> {
        if let Some(la) = self.pushback.pop() {
            self.locate(&la);
            return match &la.tok {
                Tok::Undeclared(name) => Ok(name.clone()),
                Tok::Ident(entry) => Ok(entry.name().to_string()),
                Tok::Keyword(k) => Ok(k.as_str().to_string()),
                _ => Err(self.unexpected(expected, &la)),
            };
        }
        match self.raw_next()? {
            Some((Spanned { token: Token::Ident(word), span }, file)) => {
                self.last_span = span;
                self.last_file = file;
                Ok(word)
            }
            Some((Spanned { token, span }, file)) => {
                let la = Lookahead {
                    tok: Tok::Raw(token),
                    span,
                    file,
                };
                Err(self.unexpected(expected, &la))
            }
            None => Err(self.unexpected(expected, &self.eof())),
        }
    }

    fn eof(&self) -> Lookahead {
        Lookahead {
            tok: Tok::Eof,
            span: self.last_span.end..self.last_span.end,
            file: self.last_file.clone(),
        }
    }

    fn read_token(&mut self) -> Result<Lookahead> {
        let Some((Spanned { token, span }, file)) = self.raw_next()? else {
            return Ok(self.eof());
        };
        self.last_span = span.clone();
        self.last_file = file.clone();
        let tok = match token {
            Token::Ident(word) => self.classify(&word)?,
            other => Tok::Raw(other),
        };
        Ok(Lookahead { tok, span, file })
    }

    // ── Classification ─────────────────────────────────────────────────

    fn classify(&mut self, word: &str) -> Result<Tok> {
        let found = self.symbols.find(word);
        if let Some(entry) = &found {
            if entry.kind() == SymbolKind::Parameter {
                return Ok(Tok::Ident(Rc::clone(entry)));
            }
        }
        if let Some(k) = Keyword::lookup(word) {
            return Ok(Tok::Keyword(k));
        }
        match found {
            Some(entry) => self.suspended(|p| p.declaring(false, |p| p.resolve_members(entry))),
            None => Ok(Tok::Undeclared(word.to_string())),
        }
    }

    /// Follow `[i]...` into arrays and `.name` / `["name"]` into
    /// dictionaries.
    fn resolve_members(&mut self, mut entry: Rc<SymbolEntry>) -> Result<Tok> {
        loop {
            match entry.kind() {
                SymbolKind::Array => {
                    let next = self.get()?;
                    if !next.tok.is(&Token::LBracket) {
                        self.unget(next);
                        break;
                    }
                    let dims = entry.with(|a: &ArrayValue| a.dimensions()).unwrap_or(0);
                    let mut subscripts = Vec::with_capacity(dims);
                    for i in 0..dims {
                        if i > 0 {
                            self.expect(&Token::LBracket)?;
                        }
                        let index = self.parse_float()?;
                        self.expect(&Token::RBracket)?;
                        if index < 0.0 {
                            return Err(self.error("Negative subscript"));
                        }
                        subscripts.push(index as i64);
                    }
                    let lookup = entry.with(|a: &ArrayValue| -> Result<Option<Rc<SymbolEntry>>> {
                        let flat = a.flat_index(&subscripts)?;
                        if a.is_set(flat) {
                            a.get(flat).map(Some)
                        } else {
                            Ok(None)
                        }
                    });
                    match lookup {
                        Some(Ok(Some(element))) => entry = element,
                        Some(Ok(None)) if self.probing => return Ok(Tok::Undeclared(entry.name().to_string())),
                        Some(Ok(None)) => return Err(self.error("Attempt to access uninitialized array element.")),
                        Some(Err(e)) => return Err(self.located(e)),
                        None => return Err(self.error("Array identifier has no value.")),
                    }
                }
                SymbolKind::Dictionary => {
                    let next = self.get()?;
                    let key = if next.tok.is(&Token::Dot) {
                        self.raw_word("dictionary member name")?
                    } else if next.tok.is(&Token::LBracket) {
                        let key = self.parse_string()?;
                        self.expect(&Token::RBracket)?;
                        key
                    } else {
                        self.unget(next);
                        break;
                    };
                    match entry.with(|d: &SymbolTable| d.find(&key)).flatten() {
                        Some(member) => entry = member,
                        None if self.probing => return Ok(Tok::Undeclared(key)),
                        None => return Err(self.error("Attempt to access uninitialized dictionary element.")),
                    }
                }
                _ => break,
            }
        }
        Ok(Tok::Ident(entry))
    }
}

//! Recursive-descent parser and expression evaluator for scene files.
//!
//! The parser pulls tokens through a small stream layer (`stream.rs`) that
//! resolves identifiers against the symbol stack as they are read, runs
//! directives and macro calls transparently, and supports checkpointing
//! for the few places that need to backtrack. Everything above it is
//! split by concern:
//!
//! - `expr.rs`: generic expressions and arity promotion
//! - `typed.rs`: typed entry points (float, vector, colour, ...)
//! - `builtins.rs`: float and vector built-in functions
//! - `strings.rs`: string expressions
//! - `call.rs`: calls into user functions and splines
//! - `blend.rs`, `material.rs`, `spline.rs`, `function.rs`: value blocks
//! - `directive.rs`, `declare.rs`: the preprocessor and declarations

mod blend;
mod builtins;
mod call;
mod declare;
mod directive;
mod expr;
mod function;
mod material;
mod spline;
mod stream;
mod strings;
mod typed;

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use crate::error::{Result, SceneError};
use crate::function::FunctionContext;
use crate::keywords::Keyword;
use crate::lexer;
use crate::options::ParserOptions;
use crate::random::RandomGeneratorPool;
use crate::resolver;
use crate::symbols::SymbolStack;
use crate::token::Token;

pub use self::directive::Macro;
pub use self::function::ParamSlot;
use self::stream::{Cond, Frame, FrameKind, Lookahead, Tok};

/// Result of parsing a whole scene.
#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    /// The global symbol table, as `{ name: { kind, value } }`.
    pub globals: serde_json::Value,
    /// Recoverable diagnostics, in the order they were raised.
    pub warnings: Vec<String>,
    /// Output of `#debug`.
    pub messages: Vec<String>,
    /// Effective language version after all `#version` directives.
    pub version: f64,
}

pub struct Parser {
    frames: Vec<Frame>,
    /// Tokens handed back with `unget`, most recent last.
    pushback: Vec<Lookahead>,
    /// Open checkpoints; every token returned by `get` is appended to the
    /// innermost one.
    recording: Vec<Vec<Lookahead>>,
    last_span: Range<usize>,
    last_file: Option<Rc<PathBuf>>,
    /// Whether directives and macro calls run when they are read.
    ok_to_declare: bool,
    /// Set while `defined()` looks at an identifier; missing array elements
    /// and dictionary members read as undeclared instead of failing.
    probing: bool,
    cond_stack: Vec<Cond>,
    symbols: SymbolStack,
    options: ParserOptions,
    base_dir: PathBuf,
    random: RandomGeneratorPool,
    vm: FunctionContext,
    warnings: Vec<String>,
    messages: Vec<String>,
    version: f64,
    assumed_gamma: Option<f64>,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Self {
        let symbols = SymbolStack::new(options.max_symbol_tables);
        Self {
            frames: Vec::new(),
            pushback: Vec::new(),
            recording: Vec::new(),
            last_span: 0..0,
            last_file: None,
            ok_to_declare: true,
            probing: false,
            cond_stack: Vec::new(),
            symbols,
            base_dir: PathBuf::from("."),
            random: RandomGeneratorPool::new(),
            vm: FunctionContext::new(),
            warnings: Vec::new(),
            messages: Vec::new(),
            version: options.version,
            assumed_gamma: options.assumed_gamma,
            options,
        }
    }

    /// Queue source text to be read next.
    pub fn push_source(&mut self, source: &str) -> Result<()> {
        let tokens = lexer::lex(source)?;
        self.push_frame(Frame::new(tokens.into(), None, FrameKind::Source, self.cond_stack.len()));
        Ok(())
    }

    /// Queue a scene file to be read next. Includes resolve relative to its
    /// directory.
    pub fn push_file(&mut self, path: &Path) -> Result<()> {
        let tokens = resolver::load(path)?;
        if let Some(dir) = path.parent() {
            self.base_dir = dir.to_path_buf();
        }
        let file = Some(Rc::new(path.to_path_buf()));
        self.push_frame(Frame::new(tokens.into(), file, FrameKind::Source, self.cond_stack.len()));
        Ok(())
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn symbols(&self) -> &SymbolStack {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolStack {
        &mut self.symbols
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn assumed_gamma(&self) -> Option<f64> {
        self.assumed_gamma
    }

    /// Parse top-level items until the input runs out.
    pub fn parse_items(&mut self) -> Result<()> {
        let result = self.parse_items_inner();
        result.map_err(|e| self.located(e))
    }

    fn parse_items_inner(&mut self) -> Result<()> {
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Eof => return Ok(()),
                Tok::Keyword(Keyword::GlobalSettings) => self.parse_global_settings()?,
                Tok::Raw(Token::Semicolon) => {}
                _ => return Err(self.unexpected("object or directive", &la)),
            }
        }
    }

    /// Fail unless every queued token has been consumed.
    pub fn expect_eof(&mut self) -> Result<()> {
        let la = self.get()?;
        match la.tok {
            Tok::Eof => Ok(()),
            _ => Err(self.unexpected("end of input", &la)),
        }
    }

    /// Parse queued input as a whole scene.
    pub fn parse_scene(mut self) -> Result<Scene> {
        self.parse_items()?;
        Ok(self.finish())
    }

    pub fn finish(self) -> Scene {
        Scene {
            globals: self.symbols.global().to_json(),
            warnings: self.warnings,
            messages: self.messages,
            version: self.version,
        }
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    /// Fatal parse error at the current token.
    pub(crate) fn error(&self, msg: &str) -> SceneError {
        self.located(SceneError::parse(msg))
    }

    /// Attach the current location to an error raised without one.
    pub(crate) fn located(&self, e: SceneError) -> SceneError {
        e.with_span(self.last_span.clone())
            .in_file(self.last_file.as_ref().map(|f| f.to_path_buf()))
    }

    pub(crate) fn unexpected(&self, expected: &str, la: &Lookahead) -> SceneError {
        let e = match &la.tok {
            Tok::Eof => SceneError::unexpected_eof(expected),
            Tok::Undeclared(name) => SceneError::undeclared(name),
            other => SceneError::unexpected_token(expected, &other.describe(), la.span.clone()),
        };
        e.with_span(la.span.clone())
            .in_file(la.file.as_ref().map(|f| f.to_path_buf()))
    }

    /// Record a recoverable diagnostic. Fatal under `strict`.
    pub(crate) fn warning(&mut self, msg: impl Into<String>) -> Result<()> {
        let msg = msg.into();
        if self.options.strict {
            return Err(self.error(&msg));
        }
        log::warn!("{msg}");
        self.warnings.push(msg);
        Ok(())
    }

    // ── Scene-level blocks ─────────────────────────────────────────────

    fn parse_global_settings(&mut self) -> Result<()> {
        self.expect(&Token::LBrace)?;
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(Keyword::AssumedGamma) => {
                    let gamma = self.parse_float()?;
                    if gamma <= 0.0 {
                        return Err(self.error("assumed_gamma must be positive."));
                    }
                    log::debug!("assumed_gamma set to {gamma}");
                    self.assumed_gamma = Some(gamma);
                    self.accept(&Token::Semicolon)?;
                }
                Tok::Raw(Token::RBrace) => return Ok(()),
                _ => return Err(self.unexpected("global setting", &la)),
            }
        }
    }
}

//! Directives: macros, includes, conditionals, loops and messages.
//!
//! Directives run inside `get` with declarations switched off, so nothing
//! here sees a directive token it did not ask for. Skipped branches and
//! captured macro bodies are read as raw tokens from the current frame;
//! a block never spans two files.

use std::path::Path;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{ErrorKind, Result, SceneError};
use crate::express::Express;
use crate::keywords::Keyword;
use crate::resolver;
use crate::symbols::{Declarable, SymbolEntry, SymbolKind};
use crate::token::{Spanned, Token};

use super::stream::{Cond, Frame, FrameKind, Tok};
use super::Parser;

/// A `#macro` definition: parameter names and the raw body tokens.
#[derive(Debug, Clone, Serialize)]
pub struct Macro {
    pub params: Vec<String>,
    #[serde(skip)]
    body: Rc<[Spanned]>,
    #[serde(skip)]
    file: Option<Rc<std::path::PathBuf>>,
}

impl Declarable for Macro {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Macro
    }

    /// Macros are never copied; see `SymbolEntry::duplicate`.
    fn duplicate(&self) -> Option<Box<dyn Declarable>> {
        None
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Where skipping a branch stopped.
#[derive(Debug, PartialEq, Eq)]
enum Stop {
    Else,
    ElseIf,
    End,
}

/// A macro argument: an alias of the caller's entry or a fresh value.
enum MacroArg {
    Alias(Rc<SymbolEntry>),
    Value(Box<dyn Declarable>),
}

fn opens_block(directive: &str) -> bool {
    matches!(directive, "if" | "ifdef" | "ifndef" | "while" | "for" | "macro")
}

fn for_continues(value: f64, end: f64, step: f64) -> bool {
    if step > 0.0 {
        value <= end
    } else {
        value >= end
    }
}

impl Parser {
    pub(crate) fn directive(&mut self, name: &str) -> Result<()> {
        log::trace!("#{name}");
        match name {
            "declare" => self.parse_declare(false),
            "local" => self.parse_declare(true),
            "undef" => self.parse_undef(),
            "macro" => self.define_macro(),
            "include" => self.include_file(),
            "if" => {
                let condition = self.parse_condition()?;
                self.enter_if(condition)
            }
            "ifdef" | "ifndef" => {
                let defined = self.parse_defined_param()?;
                self.enter_if(defined == (name == "ifdef"))
            }
            "else" | "elseif" => match self.cond_stack.pop() {
                Some(Cond::If) => self.skip_branch(false).map(|_| ()),
                _ => Err(self.error(&format!("#{name} without matching #if."))),
            },
            "end" => self.end_block(),
            "while" => self.enter_while(),
            "for" => self.enter_for(),
            "debug" => {
                let text = self.parse_string()?;
                log::info!("{text}");
                self.messages.push(text);
                Ok(())
            }
            "warning" => {
                let text = self.parse_string()?;
                self.warning(text)
            }
            "error" => {
                let text = self.parse_string()?;
                Err(self.located(SceneError::from(ErrorKind::User(text))))
            }
            "version" => {
                let version = self.parse_float()?;
                self.accept(&Token::Semicolon)?;
                log::debug!("language version {version}");
                self.version = version;
                Ok(())
            }
            other => Err(self.error(&format!("Unknown directive '#{other}'."))),
        }
    }

    /// `( float )`, true when nonzero.
    fn parse_condition(&mut self) -> Result<bool> {
        let value = self.parse_float_param()?;
        Ok(Express::float(value).is_true())
    }

    // ── Conditionals ───────────────────────────────────────────────────

    fn enter_if(&mut self, condition: bool) -> Result<()> {
        if condition {
            self.cond_stack.push(Cond::If);
            return Ok(());
        }
        loop {
            match self.skip_branch(true)? {
                Stop::Else => {
                    self.cond_stack.push(Cond::If);
                    return Ok(());
                }
                Stop::ElseIf => {
                    if self.parse_condition()? {
                        self.cond_stack.push(Cond::If);
                        return Ok(());
                    }
                }
                Stop::End => return Ok(()),
            }
        }
    }

    /// Discard raw tokens up to the `#end` closing the current block, or
    /// up to an `#else` or `#elseif` at the same level if `at_else`.
    fn skip_branch(&mut self, at_else: bool) -> Result<Stop> {
        let mut depth = 0usize;
        loop {
            let Some(token) = self.next_in_frame() else {
                return Err(self.error("End of file reached but #end expected."));
            };
            let Token::Directive(d) = &token.token else {
                continue;
            };
            match d.as_str() {
                d if opens_block(d) => depth += 1,
                "end" if depth == 0 => return Ok(Stop::End),
                "end" => depth -= 1,
                "else" if depth == 0 && at_else => return Ok(Stop::Else),
                "elseif" if depth == 0 && at_else => return Ok(Stop::ElseIf),
                _ => {}
            }
        }
    }

    fn end_block(&mut self) -> Result<()> {
        match self.cond_stack.pop() {
            None => Err(self.error("#end without matching #if, #while, #for or #macro.")),
            Some(Cond::If) => Ok(()),
            Some(Cond::While { frame, pos }) => {
                self.jump(frame, pos);
                if self.parse_condition()? {
                    self.cond_stack.push(Cond::While { frame, pos });
                } else {
                    self.skip_branch(false)?;
                }
                Ok(())
            }
            Some(Cond::For {
                name,
                end,
                step,
                frame,
                body,
            }) => {
                let entry = self
                    .symbols
                    .find(&name)
                    .ok_or_else(|| SceneError::undeclared(&name))
                    .map_err(|e| self.located(e))?;
                let current = entry
                    .express()
                    .filter(|v| v.terms() == 1)
                    .ok_or_else(|| self.error(&format!("#for loop variable '{name}' is no longer a float.")))?;
                let next = current.first() + step;
                if for_continues(next, end, step) {
                    entry.set_data(Box::new(Express::float(next)));
                    self.jump(frame, body);
                    self.cond_stack.push(Cond::For {
                        name,
                        end,
                        step,
                        frame,
                        body,
                    });
                }
                Ok(())
            }
        }
    }

    // ── Loops ──────────────────────────────────────────────────────────

    /// `#while (c) ... #end`. The loop remembers where its condition
    /// starts and jumps back there from `#end`.
    fn enter_while(&mut self) -> Result<()> {
        let (frame, pos) = self
            .frame_position()
            .ok_or_else(|| self.error("#while outside of any input."))?;
        if self.parse_condition()? {
            self.cond_stack.push(Cond::While { frame, pos });
        } else {
            self.skip_branch(false)?;
        }
        Ok(())
    }

    /// `#for (Id, start, end [, step]) ... #end`. The loop variable is a
    /// local float.
    fn enter_for(&mut self) -> Result<()> {
        self.expect(&Token::LParen)?;
        let name = self.raw_word("loop variable")?;
        if Keyword::lookup(&name).is_some() {
            return Err(self.error(&format!("Cannot redeclare reserved word '{name}'.")));
        }
        self.expect(&Token::Comma)?;
        let start = self.parse_float()?;
        self.expect(&Token::Comma)?;
        let end = self.parse_float()?;
        let step = if self.accept(&Token::Comma)? {
            self.parse_float()?
        } else {
            1.0
        };
        self.expect(&Token::RParen)?;
        if step == 0.0 {
            return Err(self.error("#for loop step must not be zero."));
        }

        let index = self.symbols.local_index();
        self.symbols.declare(index, &name, Box::new(Express::float(start)));
        if !for_continues(start, end, step) {
            self.skip_branch(false)?;
            return Ok(());
        }
        let (frame, body) = self
            .frame_position()
            .ok_or_else(|| self.error("#for outside of any input."))?;
        self.cond_stack.push(Cond::For {
            name,
            end,
            step,
            frame,
            body,
        });
        Ok(())
    }

    // ── Macros ─────────────────────────────────────────────────────────

    /// `#macro Name(p, ...) body #end`. Macros live in the global table.
    fn define_macro(&mut self) -> Result<()> {
        let name = self.raw_word("macro name")?;
        if Keyword::lookup(&name).is_some() {
            return Err(self.error(&format!("Cannot redeclare reserved word '{name}'.")));
        }
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.accept(&Token::RParen)? {
            loop {
                params.push(self.raw_word("macro parameter")?);
                if self.accept(&Token::RParen)? {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }

        let file = self.frames.last().and_then(|f| f.file.clone());
        let mut body = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(token) = self.next_in_frame() else {
                return Err(self.error(&format!("End of file reached but #end expected for macro '{name}'.")));
            };
            if let Token::Directive(d) = &token.token {
                if opens_block(d) {
                    depth += 1;
                } else if d == "end" {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
            }
            body.push(token);
        }

        log::debug!("macro {name}({}) with {} tokens", params.join(", "), body.len());
        let definition = Macro {
            params,
            body: body.into(),
            file,
        };
        self.symbols.declare(0, &name, Box::new(definition));
        Ok(())
    }

    /// `Name(args)`: bind the arguments in a new table and read the body
    /// next. The table goes away when the body runs out.
    pub(crate) fn invoke_macro(&mut self, entry: &Rc<SymbolEntry>) -> Result<()> {
        let definition = entry
            .with(|m: &Macro| m.clone())
            .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())))?;

        self.expect(&Token::LParen)?;
        let mut args = Vec::with_capacity(definition.params.len());
        if !self.accept(&Token::RParen)? {
            loop {
                args.push(self.declaring(true, |p| p.parse_macro_arg())?);
                if self.accept(&Token::RParen)? {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        if args.len() != definition.params.len() {
            return Err(self.error(&format!(
                "Macro '{}' expects {} parameters, {} given.",
                entry.name(),
                definition.params.len(),
                args.len()
            )));
        }

        self.symbols.push_table().map_err(|e| self.located(e))?;
        for (name, arg) in definition.params.iter().zip(args) {
            match arg {
                MacroArg::Alias(target) => {
                    if let Err(e) = target.acquire() {
                        self.symbols.pop_table();
                        return Err(self.located(e));
                    }
                    self.symbols.local_mut().bind(name, target);
                }
                MacroArg::Value(value) => {
                    self.symbols.local_mut().add_symbol(name, value);
                }
            }
        }

        log::debug!("invoking macro {} ({} tokens)", entry.name(), definition.body.len());
        let cond_depth = self.cond_stack.len();
        self.push_frame(Frame::new(definition.body, definition.file, FrameKind::Macro, cond_depth));
        Ok(())
    }

    /// A bare identifier is passed by reference; anything else is
    /// evaluated like the right-hand side of `#declare`.
    fn parse_macro_arg(&mut self) -> Result<MacroArg> {
        let la = self.get()?;
        if let Tok::Ident(entry) = &la.tok {
            let entry = Rc::clone(entry);
            let next = self.peek()?;
            if next.tok.is(&Token::Comma) || next.tok.is(&Token::RParen) {
                return Ok(MacroArg::Alias(entry));
            }
        }
        self.unget(la);
        self.parse_rvalue().map(MacroArg::Value)
    }

    // ── Includes ───────────────────────────────────────────────────────

    fn include_file(&mut self) -> Result<()> {
        let name = self.parse_string()?;
        if self.include_depth() >= self.options.max_include_depth {
            return Err(self.error("Too many nested include files."));
        }
        let base = self
            .last_file
            .as_deref()
            .and_then(|f| f.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        let path = resolver::resolve_path(&name, &base, &self.options.lib_dirs).map_err(|e| self.located(e))?;
        let tokens = resolver::load(&path)?;
        log::debug!("including {} ({} tokens)", path.display(), tokens.len());

        self.symbols.push_table().map_err(|e| self.located(e))?;
        let cond_depth = self.cond_stack.len();
        self.push_frame(Frame::new(tokens.into(), Some(Rc::new(path)), FrameKind::Include, cond_depth));
        Ok(())
    }

    // ── Removal ────────────────────────────────────────────────────────

    fn parse_undef(&mut self) -> Result<()> {
        let name = self.raw_word("identifier")?;
        match self.symbols.find_with_index(&name) {
            Some((index, _)) => {
                self.symbols.table_mut(index).remove_symbol(&name);
                Ok(())
            }
            None => self.warning(format!("Attempt to undef unknown identifier '{name}'.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::express::Arity;
    use crate::options::ParserOptions;

    fn parser(src: &str) -> Parser {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        p
    }

    fn global(p: &Parser, name: &str) -> f64 {
        p.symbols()
            .global()
            .find(name)
            .and_then(|e| e.express())
            .map(|v| v.first())
            .expect("float global")
    }

    fn run(src: &str) -> Parser {
        let mut p = parser(src);
        p.parse_items().expect("parse");
        p
    }

    #[test]
    fn if_else_chains() {
        let p = run("#if (0) #declare A = 1; #elseif (1) #declare A = 2; #else #declare A = 3; #end");
        assert_eq!(global(&p, "A"), 2.0);
        let p = run("#if (1) #declare A = 1; #else #declare A = 3; #end");
        assert_eq!(global(&p, "A"), 1.0);
        let p = run("#if (0) #if (1) #declare A = 1; #end #else #declare A = 4; #end");
        assert_eq!(global(&p, "A"), 4.0);
    }

    #[test]
    fn ifdef_and_ifndef() {
        let p = run("#declare B = 1; #ifdef (B) #declare A = 1; #end #ifndef (C) #declare D = 1; #end");
        assert_eq!(global(&p, "A"), 1.0);
        assert_eq!(global(&p, "D"), 1.0);
    }

    #[test]
    fn while_loop() {
        let p = run("#declare I = 0; #declare S = 0; #while (I < 5) #declare S = S + I; #declare I = I + 1; #end");
        assert_eq!(global(&p, "S"), 10.0);
        assert_eq!(global(&p, "I"), 5.0);
    }

    #[test]
    fn for_loop_with_step() {
        let p = run("#declare S = 0; #for (K, 10, 0, -2.5) #declare S = S + K; #end");
        assert_eq!(global(&p, "S"), 25.0);
        let p = run("#declare S = 0; #for (K, 1, 0) #declare S = 1; #end");
        assert_eq!(global(&p, "S"), 0.0);
    }

    #[test]
    fn unclosed_if_is_reported() {
        let mut p = parser("#if (1) #declare A = 1;");
        let err = p.parse_items().expect_err("unclosed");
        assert_eq!(err.message(), "End of file reached but #end expected.");
    }

    #[test]
    fn stray_end_and_else() {
        let err = parser("#end").parse_items().expect_err("stray end");
        assert!(err.message().starts_with("#end without matching"));
        let err = parser("#else").parse_items().expect_err("stray else");
        assert_eq!(err.message(), "#else without matching #if.");
    }

    #[test]
    fn macros_splice_their_body() {
        let mut p = parser("#macro Twice(V) (V * 2) #end Twice(3) + 1");
        assert_eq!(p.parse_express(Arity::Float).expect("macro"), Express::float(7.0));
        p.expect_eof().expect("eof");
    }

    #[test]
    fn macro_table_is_popped_after_the_body() {
        let mut p = parser("#macro Set(V) #declare Out = V; #end Set(4)");
        let depth = p.symbols().depth();
        p.parse_items().expect("parse");
        assert_eq!(global(&p, "Out"), 4.0);
        assert_eq!(p.symbols().depth(), depth);
        assert!(p.symbols().find("V").is_none());
    }

    #[test]
    fn identifier_arguments_alias_the_caller() {
        let p = run("#declare N = 1; #macro Bump(X) #declare X = X + 1; #end Bump(N)");
        let n = p.symbols().find("N").expect("N");
        assert_eq!(n.ref_count(), 1);
        assert_eq!(global(&p, "N"), 2.0);
    }

    #[test]
    fn macro_argument_count() {
        let err = parser("#macro M(A, B) A #end M(1)").parse_items().expect_err("arity");
        assert_eq!(err.message(), "Macro 'M' expects 2 parameters, 1 given.");
    }

    #[test]
    fn recursive_macros_hit_the_table_limit() {
        let mut p = Parser::new(ParserOptions {
            max_symbol_tables: 8,
            ..ParserOptions::default()
        });
        p.push_source("#macro R(N) R(N) #end R(1)").expect("lex");
        let err = p.parse_items().expect_err("runaway");
        assert_eq!(err.message(), "Too many nested symbol tables");
    }

    #[test]
    fn messages_and_user_errors() {
        let p = run("#debug \"hello\" #warning \"careful\" #version 3.5;");
        assert_eq!(p.messages(), ["hello"]);
        assert_eq!(p.warnings(), ["careful"]);
        assert_eq!(p.version, 3.5);

        let err = parser("#error \"stop\"").parse_items().expect_err("user");
        assert!(matches!(err.kind, ErrorKind::User(ref m) if m == "stop"));
    }

    #[test]
    fn undef_removes_the_innermost_binding() {
        let p = run("#declare A = 1; #undef A #undef Missing");
        assert!(p.symbols().find("A").is_none());
        assert_eq!(p.warnings().len(), 1);
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene-lang-directive-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn includes_declare_globals_and_pop_locals() {
        let dir = scratch_dir("include");
        fs::write(dir.join("defs.inc"), "#local Hidden = 1; #declare Shared = Hidden + 1;").expect("write");
        let main = dir.join("main.pov");
        fs::write(&main, "#include \"defs.inc\"\n#declare Result = Shared * 10;").expect("write");

        let mut p = Parser::new(ParserOptions::default());
        p.push_file(&main).expect("load");
        p.parse_items().expect("parse");
        assert_eq!(global(&p, "Result"), 20.0);
        assert!(p.symbols().find("Hidden").is_none());
    }

    #[test]
    fn include_depth_is_limited() {
        let dir = scratch_dir("depth");
        fs::write(dir.join("self.inc"), "#include \"self.inc\"").expect("write");
        let main = dir.join("main.pov");
        fs::write(&main, "#include \"self.inc\"").expect("write");

        let mut p = Parser::new(ParserOptions {
            max_include_depth: 4,
            ..ParserOptions::default()
        });
        p.push_file(&main).expect("load");
        let err = p.parse_items().expect_err("depth");
        assert_eq!(err.message(), "Too many nested include files.");
    }
}

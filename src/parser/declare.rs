//! `#declare` / `#local` and the values they can bind.

use crate::colour::Colour;
use crate::error::{Result, SceneError};
use crate::express::Arity;
use crate::keywords::Keyword;
use crate::material::{Pigment, TNormal, Texture};
use crate::spline::SplineHandle;
use crate::symbols::{ArrayValue, Declarable, SymbolEntry, SymbolKind, SymbolTable};
use crate::token::Token;

use super::stream::Tok;
use super::Parser;

/// Identifiers of these kinds are copied whole on the right of `=`.
fn copied_kind(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Pigment
            | SymbolKind::Normal
            | SymbolKind::Finish
            | SymbolKind::Texture
            | SymbolKind::ColourMap
            | SymbolKind::PigmentMap
            | SymbolKind::NormalMap
            | SymbolKind::SlopeMap
            | SymbolKind::TextureMap
            | SymbolKind::Transform
            | SymbolKind::Array
            | SymbolKind::Dictionary
    )
}

fn is_comparison(token: &Token) -> bool {
    matches!(
        token,
        Token::Less
            | Token::LessEqual
            | Token::Equal
            | Token::EqualEqual
            | Token::NotEqual
            | Token::GreaterEqual
            | Token::Greater
    )
}

impl Parser {
    /// After `#declare` or `#local`: `Name = value [;]`, or an element
    /// assignment `Name[i] = value` / `Name.key = value`.
    pub(crate) fn parse_declare(&mut self, local: bool) -> Result<()> {
        let name = self.raw_word("identifier")?;
        if Keyword::lookup(&name).is_some() {
            return Err(self.error(&format!("Cannot redeclare reserved word '{name}'.")));
        }

        let la = self.get()?;
        match &la.tok {
            Tok::Raw(Token::Equal) => {}
            Tok::Raw(Token::LBracket | Token::Dot) => {
                self.unget(la);
                return self.parse_element_assignment(&name);
            }
            _ => return Err(self.unexpected("=", &la)),
        }

        let index = if local { self.symbols.local_index() } else { 0 };
        if self.declaring(true, |p| p.accept_keyword(Keyword::Function))? {
            // bound before the body so a self-call is diagnosed
            let table = self.symbols.table_mut(index);
            if table.find(&name).is_some() {
                table.remove_symbol(&name);
            }
            let entry = SymbolEntry::placeholder(&name, SymbolKind::Function);
            table.bind(&name, std::rc::Rc::clone(&entry));
            let function = self.declaring(true, |p| p.parse_function())?;
            entry.set_data(Box::new(function));
            log::debug!("#declare {name} = {}", entry.kind().name());
        } else {
            let value = self.declaring(true, |p| p.parse_rvalue())?;
            let kind = value.kind();
            self.bind_value(index, local, &name, value);
            log::debug!("#{} {name} = {}", if local { "local" } else { "declare" }, kind.name());
        }
        self.accept(&Token::Semicolon)?;
        Ok(())
    }

    fn bind_value(&mut self, index: usize, local: bool, name: &str, value: Box<dyn Declarable>) {
        // a macro parameter aliasing a caller's identifier writes through
        if !local {
            if let Some((found, entry)) = self.symbols.find_with_index(name) {
                if found > 0 && entry.ref_count() > 1 {
                    entry.set_data(value);
                    return;
                }
            }
        }
        self.symbols.declare(index, name, value);
    }

    /// `A[i]...[j] = value` and `D.key = value` / `D["key"] = value`,
    /// possibly nested.
    fn parse_element_assignment(&mut self, name: &str) -> Result<()> {
        let mut entry = self
            .symbols
            .find(name)
            .ok_or_else(|| self.located(SceneError::undeclared(name)))?;
        loop {
            match entry.kind() {
                SymbolKind::Array => {
                    let dims = entry.with(|a: &ArrayValue| a.dimensions()).unwrap_or(0);
                    let mut subscripts = Vec::with_capacity(dims);
                    for _ in 0..dims {
                        self.expect(&Token::LBracket)?;
                        let index = self.parse_float()?;
                        self.expect(&Token::RBracket)?;
                        if index < 0.0 {
                            return Err(self.error("Negative subscript"));
                        }
                        subscripts.push(index as i64);
                    }
                    let flat = entry
                        .with(|a: &ArrayValue| a.flat_index(&subscripts))
                        .ok_or_else(|| self.error("Array identifier has no value."))?
                        .map_err(|e| self.located(e))?;

                    if self.accept(&Token::Equal)? {
                        let value = self.declaring(true, |p| p.parse_rvalue())?;
                        entry
                            .with_mut(|a: &mut ArrayValue| a.set(flat, value))
                            .ok_or_else(|| self.error("Array identifier has no value."))?
                            .map_err(|e| self.located(e))?;
                        break;
                    }
                    entry = match entry.with(|a: &ArrayValue| a.is_set(flat).then(|| a.get(flat))) {
                        Some(Some(element)) => element.map_err(|e| self.located(e))?,
                        _ => return Err(self.error("Attempt to access uninitialized array element.")),
                    };
                }
                SymbolKind::Dictionary => {
                    let la = self.get()?;
                    let key = match &la.tok {
                        Tok::Raw(Token::Dot) => self.raw_word("dictionary member name")?,
                        Tok::Raw(Token::LBracket) => {
                            let key = self.parse_string()?;
                            self.expect(&Token::RBracket)?;
                            key
                        }
                        _ => return Err(self.unexpected("'.' or '['", &la)),
                    };

                    if self.accept(&Token::Equal)? {
                        let value = self.declaring(true, |p| p.parse_rvalue())?;
                        entry
                            .with_mut(|d: &mut SymbolTable| {
                                if d.find(&key).is_some() {
                                    d.remove_symbol(&key);
                                }
                                d.add_symbol(&key, value);
                            })
                            .ok_or_else(|| self.error("Dictionary identifier has no value."))?;
                        break;
                    }
                    entry = entry
                        .with(|d: &SymbolTable| d.find(&key))
                        .flatten()
                        .ok_or_else(|| self.error("Attempt to access uninitialized dictionary element."))?;
                }
                _ => {
                    return Err(self.error(&format!("'{}' is not an array or dictionary.", entry.name())));
                }
            }
        }
        log::debug!("#declare {name}[...]");
        self.accept(&Token::Semicolon)?;
        Ok(())
    }

    /// Anything that may follow `=`: numeric and string expressions,
    /// material blocks, maps, splines, functions, transforms, arrays and
    /// dictionaries. Identifiers of object kinds are copied.
    pub(crate) fn parse_rvalue(&mut self) -> Result<Box<dyn Declarable>> {
        let la = self.get()?;

        if let Some(k) = la.tok.keyword() {
            let value: Box<dyn Declarable> = match k {
                Keyword::Pigment => Box::new(self.parse_pigment()?),
                Keyword::Normal => Box::new(self.parse_normal()?),
                Keyword::Finish => Box::new(self.parse_finish()?),
                Keyword::Texture => Box::new(self.parse_texture()?),
                Keyword::ColorMap => Box::new(self.parse_colour_map()?),
                Keyword::PigmentMap => Box::new(self.parse_blend_map::<Pigment>(false)?),
                Keyword::NormalMap => Box::new(self.parse_blend_map::<TNormal>(false)?),
                Keyword::SlopeMap => Box::new(self.parse_blend_map::<crate::express::Express>(false)?),
                Keyword::TextureMap => Box::new(self.parse_blend_map::<Texture>(false)?),
                Keyword::Spline => Box::new(SplineHandle::new(self.parse_spline()?)),
                Keyword::Function => Box::new(self.parse_function()?),
                Keyword::Transform => Box::new(self.parse_transform()?),
                Keyword::Array => Box::new(self.parse_array()?),
                Keyword::Dictionary => Box::new(self.parse_dictionary()?),
                _ if k.is_colour_key() => {
                    self.unget(la);
                    let colour: Colour = self.parse_colour(true)?;
                    Box::new(colour.to_express())
                }
                _ => {
                    self.unget(la);
                    return self.parse_value_expression();
                }
            };
            return Ok(value);
        }

        if let Some(entry) = la.tok.entry().cloned() {
            let copy = match entry.kind() {
                kind if copied_kind(kind) => true,
                SymbolKind::Spline | SymbolKind::Function | SymbolKind::VectorFunction => {
                    !self.peek()?.tok.is(&Token::LParen)
                }
                _ => false,
            };
            if copy {
                return entry
                    .copy_value()
                    .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())));
            }
        }

        self.unget(la);
        self.parse_value_expression()
    }

    /// A string, unless it opens a string comparison; otherwise a numeric
    /// expression of its natural arity.
    fn parse_value_expression(&mut self) -> Result<Box<dyn Declarable>> {
        self.checkpoint();
        let string = match self.try_parse_string() {
            Ok(string) => string,
            Err(e) => {
                self.commit();
                return Err(e);
            }
        };
        if let Some(s) = string {
            let next = self.peek()?;
            if !matches!(&next.tok, Tok::Raw(t) if is_comparison(t)) {
                self.commit();
                return Ok(Box::new(s));
            }
            self.restore();
        } else {
            self.commit();
        }
        Ok(Box::new(self.parse_express(Arity::Float)?))
    }

    /// After `array`: `[n]...` then an optional `{ ... }` initialiser.
    fn parse_array(&mut self) -> Result<ArrayValue> {
        let mut sizes = Vec::new();
        while self.accept(&Token::LBracket)? {
            let size = self.parse_int(None)?;
            if size <= 0 {
                return Err(self.error("Illegal dimension in array."));
            }
            self.expect(&Token::RBracket)?;
            sizes.push(size as usize);
        }
        if sizes.is_empty() {
            let la = self.get()?;
            return Err(self.unexpected("[", &la));
        }

        let mut array = ArrayValue::new(sizes).map_err(|e| self.located(e))?;
        if self.accept(&Token::LBrace)? {
            self.parse_array_init(&mut array, 0, 0)?;
        }
        log::trace!("array {:?}", array.sizes());
        Ok(array)
    }

    /// One `{ ... }` level; inner levels nest another brace per dimension.
    /// Trailing elements may be left unset.
    fn parse_array_init(&mut self, array: &mut ArrayValue, dim: usize, prefix: usize) -> Result<()> {
        let size = array.sizes()[dim];
        let innermost = dim + 1 == array.dimensions();
        let mut i = 0;
        while !self.accept(&Token::RBrace)? {
            if i >= size {
                return Err(self.error("Too many elements in array initializer."));
            }
            let flat = prefix * size + i;
            if innermost {
                let value = self.parse_rvalue()?;
                array.set(flat, value).map_err(|e| self.located(e))?;
            } else {
                self.expect(&Token::LBrace)?;
                self.parse_array_init(array, dim + 1, flat)?;
            }
            i += 1;
            self.parse_comma()?;
        }
        Ok(())
    }

    /// After `dictionary`: `{ ["key"]: value, .key: value ... }`, or an
    /// empty dictionary when no brace follows.
    fn parse_dictionary(&mut self) -> Result<SymbolTable> {
        let mut table = SymbolTable::new();
        if !self.accept(&Token::LBrace)? {
            return Ok(table);
        }
        loop {
            let la = self.get()?;
            let key = match &la.tok {
                Tok::Raw(Token::RBrace) => break,
                Tok::Raw(Token::LBracket) => {
                    let key = self.parse_string()?;
                    self.expect(&Token::RBracket)?;
                    key
                }
                Tok::Raw(Token::Dot) => self.raw_word("dictionary member name")?,
                _ => return Err(self.unexpected("dictionary key", &la)),
            };
            self.expect(&Token::Colon)?;
            let value = self.parse_rvalue()?;
            if table.find(&key).is_some() {
                table.remove_symbol(&key);
            }
            table.add_symbol(&key, value);
            self.parse_comma()?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend_map::BlendMapPtr;
    use crate::options::ParserOptions;

    fn run(src: &str) -> Parser {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        p.expect_eof().expect("parse");
        p
    }

    fn run_err(src: &str) -> String {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        p.expect_eof().expect_err("should fail").message()
    }

    fn kind(p: &Parser, name: &str) -> Option<SymbolKind> {
        p.symbols().find(name).map(|e| e.kind())
    }

    fn first(p: &Parser, name: &str) -> f64 {
        p.symbols()
            .find(name)
            .and_then(|e| e.express())
            .map(|e| e.first())
            .expect("numeric value")
    }

    #[test]
    fn value_kinds() {
        let p = run(
            r#"#declare F = 1;
               #declare U = <1, 2>;
               #declare V = <1, 2, 3>;
               #declare C = color red 1;
               #declare S = "hi";
               #declare T = transform { translate x }
               #declare K = spline { 0, <0, 0> 1, <1, 1> }"#,
        );
        assert_eq!(kind(&p, "F"), Some(SymbolKind::Float));
        assert_eq!(kind(&p, "U"), Some(SymbolKind::Uv));
        assert_eq!(kind(&p, "V"), Some(SymbolKind::Vector));
        assert_eq!(kind(&p, "C"), Some(SymbolKind::Colour));
        assert_eq!(kind(&p, "S"), Some(SymbolKind::String));
        assert_eq!(kind(&p, "T"), Some(SymbolKind::Transform));
        assert_eq!(kind(&p, "K"), Some(SymbolKind::Spline));
    }

    #[test]
    fn string_comparison_is_numeric() {
        let p = run(r#"#declare B = "a" < "b"; #declare S = "a";"#);
        assert_eq!(kind(&p, "B"), Some(SymbolKind::Float));
        assert_eq!(first(&p, "B"), 1.0);
        assert_eq!(kind(&p, "S"), Some(SymbolKind::String));
    }

    #[test]
    fn redeclaring_replaces_the_binding() {
        let p = run("#declare A = 1; #declare A = <1, 2, 3>;");
        assert_eq!(kind(&p, "A"), Some(SymbolKind::Vector));
        assert_eq!(p.symbols().global().names().iter().filter(|n| **n == "A").count(), 1);
    }

    #[test]
    fn reserved_words_cannot_be_declared() {
        assert_eq!(run_err("#declare pigment = 1;"), "Cannot redeclare reserved word 'pigment'.");
    }

    #[test]
    fn local_stays_in_the_macro() {
        let p = run("#macro M() #local T = 1; #declare G = T + 1; #end M()");
        assert!(p.symbols().find("T").is_none());
        assert_eq!(first(&p, "G"), 2.0);
    }

    #[test]
    fn local_shadows_global_inside_the_macro() {
        let p = run("#declare T = 10; #macro M() #local T = 1; #declare G = T; #end M()");
        assert_eq!(first(&p, "G"), 1.0);
        assert_eq!(first(&p, "T"), 10.0);
    }

    #[test]
    fn maps_are_shared_and_materials_copied() {
        let p = run(
            "#declare M = color_map { [0 color red 1] [1 color blue 1] } \
             #declare N = M; \
             #declare P = pigment { color red 1 } \
             #declare Q = P;",
        );
        let users = p
            .symbols()
            .find("N")
            .and_then(|e| e.with(|m: &BlendMapPtr<Colour>| m.users()))
            .expect("map");
        assert_eq!(users, 2);
        assert_eq!(kind(&p, "Q"), Some(SymbolKind::Pigment));
    }

    #[test]
    fn functions_bind_before_their_body() {
        let p = run("#declare F = function(n) { n + 1 }");
        assert_eq!(kind(&p, "F"), Some(SymbolKind::Function));

        let msg = run_err("#declare G = function { G(x, y, z) }");
        assert!(msg.contains("currently declared"), "{msg}");
    }

    #[test]
    fn array_initialisers() {
        let p = run("#declare A = array[2][3] { {1, 2, 3}, {4, 5, 6} }");
        let fifth = p
            .symbols()
            .find("A")
            .and_then(|e| e.with(|a: &ArrayValue| a.get(4)))
            .expect("array")
            .expect("element");
        assert_eq!(fifth.express().map(|e| e.first()), Some(5.0));

        assert_eq!(run_err("#declare A = array[1] { 1, 2 }"), "Too many elements in array initializer.");
        assert_eq!(run_err("#declare A = array[0];"), "Illegal dimension in array.");
    }

    #[test]
    fn oversized_arrays_are_rejected() {
        assert_eq!(run_err("#declare A = array[1e10][1e10];"), "Illegal dimension in array.");
        assert_eq!(run_err("#declare A = array[65536][65536];"), "Illegal dimension in array.");
    }

    #[test]
    fn element_assignment() {
        let p = run("#declare A = array[2][2]; #declare A[1][0] = 4;");
        let element = p
            .symbols()
            .find("A")
            .and_then(|e| e.with(|a: &ArrayValue| a.get(2)))
            .expect("array")
            .expect("element");
        assert_eq!(element.express().map(|e| e.first()), Some(4.0));

        assert_eq!(
            run_err(r#"#declare A = array[2] { 1, 2 }; #declare A[0] = "s";"#),
            "Attempt to change array type."
        );
    }

    #[test]
    fn member_assignment() {
        let p = run(r#"#declare D = dictionary; #declare D.x = 3; #declare D["y"] = <1, 2>; #declare D.x = 5;"#);
        let (len, x) = p
            .symbols()
            .find("D")
            .and_then(|e| e.with(|d: &SymbolTable| (d.len(), d.find("x"))))
            .expect("dictionary");
        assert_eq!(len, 2);
        assert_eq!(x.and_then(|x| x.express()).map(|e| e.first()), Some(5.0));
    }

    #[test]
    fn nested_dictionary_member() {
        let p = run(r#"#declare D = dictionary { .inner: dictionary }; #declare D.inner.z = 7;"#);
        let z = p
            .symbols()
            .find("D")
            .and_then(|e| e.with(|d: &SymbolTable| d.find("inner")))
            .flatten()
            .and_then(|inner| inner.with(|d: &SymbolTable| d.find("z")))
            .flatten()
            .and_then(|z| z.express())
            .map(|e| e.first());
        assert_eq!(z, Some(7.0));
    }

    #[test]
    fn assignment_needs_equals() {
        let msg = run_err("#declare A 1;");
        assert!(msg.contains("="), "{msg}");
    }
}

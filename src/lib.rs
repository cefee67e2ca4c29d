pub mod blend_map;
pub mod colour;
pub mod error;
pub mod express;
pub mod function;
pub mod keywords;
pub mod lexer;
pub mod material;
pub mod options;
pub mod parser;
pub mod pattern;
pub mod random;
pub mod resolver;
pub mod spline;
pub mod symbols;
pub mod token;
pub mod vector;

use std::path::Path;

use serde::Serialize;

use error::Result;
use express::{Arity, Express};
use options::ParserOptions;
use parser::{Parser, Scene};

/// Value of a single expression plus the warnings raised computing it.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub value: Express,
    pub warnings: Vec<String>,
}

/// Parse scene text. Includes resolve against `options.lib_dirs` and the
/// working directory.
pub fn parse_scene(source: &str, options: &ParserOptions) -> Result<Scene> {
    let mut parser = Parser::new(options.clone());
    parser.push_source(source)?;
    parser.parse_scene()
}

/// Parse a scene file. Includes resolve relative to its directory first.
pub fn parse_file(path: &Path, options: &ParserOptions) -> Result<Scene> {
    let mut parser = Parser::new(options.clone());
    parser.push_file(path)?;
    parser.parse_scene()
}

/// Evaluate one generic expression at its natural arity. Directives may
/// precede it.
pub fn eval_expression(source: &str, options: &ParserOptions) -> Result<Evaluation> {
    let mut parser = Parser::new(options.clone());
    parser.push_source(source)?;
    let value = parser.parse_express(Arity::Float)?;
    parser.expect_eof()?;
    Ok(Evaluation {
        value,
        warnings: parser.take_warnings(),
    })
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn end_to_end_scene() {
        let source = r#"
            #declare Base = <1, 2, 3>;
            #declare Tint = pigment { checker color red 1 color blue 1 scale 2 }
            #macro Shift(V, D) V + D #end
            #declare Moved = Shift(Base, 1);
            global_settings { assumed_gamma 1.0 }
        "#;
        let scene = parse_scene(source, &ParserOptions::default()).expect("scene should parse");
        assert!(scene.warnings.is_empty(), "{:?}", scene.warnings);
        assert_eq!(scene.globals["Moved"]["kind"], "vector");
        assert_eq!(scene.globals["Moved"]["value"], serde_json::json!([2.0, 3.0, 4.0]));
        assert_eq!(scene.globals["Tint"]["kind"], "pigment");
    }

    #[test]
    fn comments_are_skipped() {
        let source = "/* c */ #declare A = 1;\n/* two\n lines */ #declare B = A + 1; // done";
        let scene = parse_scene(source, &ParserOptions::default()).expect("scene should parse");
        assert_eq!(scene.globals["A"]["value"], 1.0);
        assert_eq!(scene.globals["B"]["value"], 2.0);
    }

    #[test]
    fn eval_broadcasts_scalars() {
        let out = eval_expression("1 + <1, 2, 3>", &ParserOptions::default()).expect("eval");
        assert_eq!(out.value, Express::vector(2.0, 3.0, 4.0));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn eval_collects_warnings() {
        let out = eval_expression("5 / 0", &ParserOptions::default()).expect("eval");
        assert!(out.value.first().is_infinite());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn eval_rejects_trailing_input() {
        let err = eval_expression("1 2", &ParserOptions::default()).expect_err("trailing");
        assert!(matches!(err.kind, error::ErrorKind::UnexpectedToken { .. }));
    }

    #[test]
    fn eval_sees_clock() {
        let options = ParserOptions {
            clock: 0.25,
            ..ParserOptions::default()
        };
        let out = eval_expression("clock * 4", &options).expect("eval");
        assert_eq!(out.value.first(), 1.0);
    }
}

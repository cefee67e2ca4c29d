use logos::Logos;

use crate::error::{ErrorKind, Result, SceneError};
use crate::token::{LexError, Spanned, Token};

/// Tokenize scene source text into a vector of spanned tokens.
pub fn lex(source: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => {
                tokens.push(Spanned { token, span });
            }
            Err(LexError::UnclosedComment) => {
                return Err(SceneError::parse("No */ closing comment found.").with_span(span.start..span.start + 2));
            }
            Err(LexError::Unrecognized) => {
                let fragment = &source[span.clone()];
                return Err(SceneError {
                    kind: ErrorKind::UnrecognizedToken(fragment.to_string()),
                    span: Some(span),
                    file: None,
                });
            }
        }
    }

    Ok(tokens)
}

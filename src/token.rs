use logos::{FilterResult, Lexer, Logos};

/// Tokens produced by lexing a scene file.
///
/// Reserved words are not tokens of their own. Every word lexes as an
/// `Ident` and the parser classifies it against the keyword table and the
/// symbol stack at the moment it is read, because `#declare` can change what
/// a word means halfway through a file.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(error = LexError)]
pub enum Token {
    /// `/* ... */`, possibly nested. Never emitted.
    #[token("/*", block_comment)]
    BlockComment,

    // ── Literals ───────────────────────────────────────────────────────
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    String(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// `#declare`, `# if`, ... carrying the bare directive word.
    #[regex(r"#[ \t]*[a-zA-Z_]+", |lex| lex.slice()[1..].trim_start().to_string())]
    Directive(String),

    // ── Operators ──────────────────────────────────────────────────────
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("!=")]
    NotEqual,
    #[token("==")]
    EqualEqual,
    #[token("=")]
    Equal,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,

    // ── Delimiters ─────────────────────────────────────────────────────
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LexError {
    #[default]
    Unrecognized,
    UnclosedComment,
}

/// Skip to the `*/` matching the `/*` just read, counting nested pairs.
fn block_comment(lex: &mut Lexer<Token>) -> FilterResult<(), LexError> {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1;
    let mut i = 0;
    while i < rest.len() {
        match (rest[i], rest.get(i + 1)) {
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    lex.bump(i);
                    return FilterResult::Skip;
                }
            }
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            _ => i += 1,
        }
    }
    lex.bump(rest.len());
    FilterResult::Error(LexError::UnclosedComment)
}

fn unescape(slice: &str) -> Option<String> {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            other => out.push(other),
        }
    }
    Some(out)
}

impl Token {
    /// Human-readable name for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Float(_) => "float",
            Token::String(_) => "string",
            Token::Ident(_) => "identifier",
            Token::Directive(_) => "directive",
            Token::LessEqual => "'<='",
            Token::GreaterEqual => "'>='",
            Token::NotEqual => "'!='",
            Token::EqualEqual => "'=='",
            Token::Equal => "'='",
            Token::Less => "'<'",
            Token::Greater => "'>'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Slash => "'/'",
            Token::Caret => "'^'",
            Token::Bang => "'!'",
            Token::Ampersand => "'&'",
            Token::Pipe => "'|'",
            Token::Question => "'?'",
            Token::Colon => "':'",
            Token::Comma => "','",
            Token::Dot => "'.'",
            Token::Semicolon => "';'",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::BlockComment => "comment",
        }
    }
}

/// A token with its source location (byte offset span).
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

//! Tokenizer for the module language.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Assign,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1usize;
    let mut col = 1usize;

    macro_rules! bump {
        () => {{
            let c = chars.next();
            if c == Some('\n') {
                line += 1;
                col = 1;
            } else if c.is_some() {
                col += 1;
            }
            c
        }};
    }

    while let Some(&c) = chars.peek() {
        let (tok_line, tok_col) = (line, col);
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                bump!();
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    bump!();
                }
            }
            '/' => {
                bump!();
                if chars.peek() == Some(&'/') {
                    while let Some(&c) = chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        bump!();
                    }
                } else {
                    return Err(Error::parse(tok_line, tok_col, "unexpected character '/'"));
                }
            }
            '{' => {
                bump!();
                tokens.push(Token { kind: TokenKind::LBrace, line: tok_line, col: tok_col });
            }
            '}' => {
                bump!();
                tokens.push(Token { kind: TokenKind::RBrace, line: tok_line, col: tok_col });
            }
            '[' => {
                bump!();
                tokens.push(Token { kind: TokenKind::LBracket, line: tok_line, col: tok_col });
            }
            ']' => {
                bump!();
                tokens.push(Token { kind: TokenKind::RBracket, line: tok_line, col: tok_col });
            }
            '=' => {
                bump!();
                tokens.push(Token { kind: TokenKind::Assign, line: tok_line, col: tok_col });
            }
            ',' => {
                bump!();
                tokens.push(Token { kind: TokenKind::Comma, line: tok_line, col: tok_col });
            }
            '"' => {
                bump!();
                let mut s = String::new();
                loop {
                    match bump!() {
                        Some('"') => break,
                        Some('\\') => match bump!() {
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => {
                                return Err(Error::parse(
                                    line,
                                    col,
                                    format!("unknown escape '\\{other}'"),
                                ));
                            }
                            None => {
                                return Err(Error::parse(tok_line, tok_col, "unterminated string"));
                            }
                        },
                        Some(other) => s.push(other),
                        None => {
                            return Err(Error::parse(tok_line, tok_col, "unterminated string"));
                        }
                    }
                }
                tokens.push(Token { kind: TokenKind::Str(s), line: tok_line, col: tok_col });
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut s = String::new();
                s.push(bump!().unwrap());
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        s.push(bump!().unwrap());
                    } else if c == '.' && !is_float {
                        is_float = true;
                        s.push(bump!().unwrap());
                    } else {
                        break;
                    }
                }
                let kind = if is_float {
                    TokenKind::Float(s.parse().map_err(|_| {
                        Error::parse(tok_line, tok_col, format!("invalid number '{s}'"))
                    })?)
                } else {
                    TokenKind::Int(s.parse().map_err(|_| {
                        Error::parse(tok_line, tok_col, format!("invalid number '{s}'"))
                    })?)
                };
                tokens.push(Token { kind, line: tok_line, col: tok_col });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                        s.push(bump!().unwrap());
                    } else {
                        break;
                    }
                }
                tokens.push(Token { kind: TokenKind::Ident(s), line: tok_line, col: tok_col });
            }
            other => {
                return Err(Error::parse(
                    tok_line,
                    tok_col,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line, col });
    Ok(tokens)
}

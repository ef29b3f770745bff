//! Recursive-descent parser producing the [`Node`] tree.

use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::node::Node;
use crate::value::Value;

/// Parse module text into its top-level blocks.
pub fn parse(input: &str) -> Result<Vec<Node>> {
    let tokens = tokenize(input)?;
    let mut p = Parser { tokens, pos: 0 };
    let mut blocks = Vec::new();
    while !p.at_eof() {
        blocks.push(p.block()?);
    }
    Ok(blocks)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn err(&self, tok: &Token, message: impl Into<String>) -> Error {
        Error::parse(tok.line, tok.col, message)
    }

    fn expect_lbrace(&mut self) -> Result<()> {
        let tok = self.bump();
        if tok.kind == TokenKind::LBrace {
            Ok(())
        } else {
            Err(self.err(&tok, "expected '{'"))
        }
    }

    /// `kind STRING* { body }`, normalizing `case`/`default` headers.
    fn block(&mut self) -> Result<Node> {
        let tok = self.bump();
        let kind = match tok.kind {
            TokenKind::Ident(ref s) => s.clone(),
            _ => return Err(self.err(&tok, "expected block kind")),
        };

        let mut args = Vec::new();
        while let TokenKind::Str(s) = &self.peek().kind {
            args.push(s.clone());
            self.bump();
        }

        let (kind, name, predicate) = match (kind.as_str(), args.len()) {
            ("case", 2) => ("case".to_string(), args.pop().unwrap(), Some(args.pop().unwrap())),
            ("case", _) => {
                return Err(self.err(&tok, "case requires a predicate and a name"));
            }
            ("default", 0) => ("case".to_string(), "default".to_string(), None),
            ("default", _) => {
                return Err(self.err(&tok, "default takes no arguments"));
            }
            (_, 0) => (kind, String::new(), None),
            (_, 1) => (kind, args.pop().unwrap(), None),
            _ => {
                return Err(self.err(&tok, format!("too many names for block '{kind}'")));
            }
        };

        self.expect_lbrace()?;

        let mut fields = Vec::new();
        let mut children = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::Ident(_) => {
                    // `key = value` is a field, anything else starts a
                    // nested block
                    if self.tokens[self.pos + 1].kind == TokenKind::Assign {
                        let key_tok = self.bump();
                        let (key_line, key_col) = (key_tok.line, key_tok.col);
                        let TokenKind::Ident(key) = key_tok.kind else {
                            unreachable!()
                        };
                        self.bump(); // '='
                        let value = self.value()?;
                        if fields.iter().any(|(k, _): &(String, Value)| *k == key) {
                            return Err(Error::parse(
                                key_line,
                                key_col,
                                format!("duplicate key '{key}'"),
                            ));
                        }
                        fields.push((key, value));
                    } else {
                        children.push(self.block()?);
                    }
                }
                TokenKind::Eof => {
                    let tok = self.peek().clone();
                    return Err(self.err(&tok, "unexpected end of input, expected '}'"));
                }
                _ => {
                    let tok = self.bump();
                    return Err(self.err(&tok, "expected field or nested block"));
                }
            }
        }

        Ok(Node::new(kind, name, predicate, fields, children))
    }

    fn value(&mut self) -> Result<Value> {
        let tok = self.bump();
        match tok.kind {
            TokenKind::Str(s) => Ok(Value::String(s)),
            TokenKind::Int(i) => Ok(Value::Int(i)),
            TokenKind::Float(f) => Ok(Value::Float(f)),
            TokenKind::Ident(ref s) if s == "true" => Ok(Value::Bool(true)),
            TokenKind::Ident(ref s) if s == "false" => Ok(Value::Bool(false)),
            TokenKind::LBracket => {
                let mut items = Vec::new();
                loop {
                    match self.peek().kind {
                        TokenKind::RBracket => {
                            self.bump();
                            break;
                        }
                        TokenKind::Comma => {
                            self.bump();
                        }
                        _ => items.push(self.value()?),
                    }
                }
                Ok(Value::List(items))
            }
            TokenKind::LBrace => {
                let mut entries: Vec<(String, Value)> = Vec::new();
                loop {
                    let tok = self.bump();
                    match tok.kind {
                        TokenKind::RBrace => break,
                        TokenKind::Comma => {}
                        TokenKind::Ident(key) => {
                            let eq = self.bump();
                            if eq.kind != TokenKind::Assign {
                                return Err(self.err(&eq, "expected '=' in map entry"));
                            }
                            let value = self.value()?;
                            entries.push((key, value));
                        }
                        _ => return Err(self.err(&tok, "expected map key")),
                    }
                }
                Ok(Value::Map(entries))
            }
            _ => Err(self.err(&tok, "expected a value")),
        }
    }
}

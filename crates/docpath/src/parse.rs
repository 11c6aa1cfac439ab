use serde_json::Value;

use crate::error::{Error, Result};

/// Comparison operators usable inside filter predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parsed expression node.
///
/// A compiled expression is a tree of these nodes. Only `Field`, `Index`,
/// and `Chain`s of the two are valid assignment targets; everything else is
/// read-only.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// Field access, i.e. `foo`
    Field(String),
    /// Index access, i.e. `[0]`; negative indexes count from the end on read
    Index(i64),
    /// List projection, i.e. `[*]`
    Flatten,
    /// Filter projection, i.e. `[?pred]`
    Filter(Box<Node>),
    /// Subexpression, i.e. `foo.bar[0]`
    Chain(Vec<Node>),
    /// Fallback, i.e. `key || name`
    Or(Box<Node>, Box<Node>),
    /// Comparison against a literal, i.e. `key == 'abc'`
    Compare(Box<Node>, CmpOp, Value),
    /// Literal value, from `'raw'` or `` `json` ``
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(i64),
    RawString(String),
    JsonLiteral(Value),
    Dot,
    LBracket,
    RBracket,
    Star,
    Question,
    OrOr,
    Cmp(CmpOp),
    Eof,
}

fn syntax(expression: &str, position: usize, message: impl Into<String>) -> Error {
    Error::Syntax {
        expression: expression.to_string(),
        position,
        message: message.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push((pos, Token::Dot));
            }
            '[' => {
                chars.next();
                tokens.push((pos, Token::LBracket));
            }
            ']' => {
                chars.next();
                tokens.push((pos, Token::RBracket));
            }
            '*' => {
                chars.next();
                tokens.push((pos, Token::Star));
            }
            '?' => {
                chars.next();
                tokens.push((pos, Token::Question));
            }
            '|' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '|')) => {
                        chars.next();
                        tokens.push((pos, Token::OrOr));
                    }
                    _ => return Err(syntax(src, pos, "pipe expressions are not supported")),
                }
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        tokens.push((pos, Token::Cmp(CmpOp::Eq)));
                    }
                    _ => return Err(syntax(src, pos, "expected '==' operator")),
                }
            }
            '!' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        tokens.push((pos, Token::Cmp(CmpOp::Ne)));
                    }
                    _ => return Err(syntax(src, pos, "expected '!=' operator")),
                }
            }
            '<' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push((pos, Token::Cmp(CmpOp::Le)));
                } else {
                    tokens.push((pos, Token::Cmp(CmpOp::Lt)));
                }
            }
            '>' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push((pos, Token::Cmp(CmpOp::Ge)));
                } else {
                    tokens.push((pos, Token::Cmp(CmpOp::Gt)));
                }
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\'' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        _ => text.push(c),
                    }
                }
                if !closed {
                    return Err(syntax(src, pos, "unterminated raw string"));
                }
                tokens.push((pos, Token::RawString(text)));
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        _ => text.push(c),
                    }
                }
                if !closed {
                    return Err(syntax(src, pos, "unterminated quoted identifier"));
                }
                tokens.push((pos, Token::Ident(text)));
            }
            '`' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '`' {
                        closed = true;
                        break;
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(syntax(src, pos, "unterminated JSON literal"));
                }
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| syntax(src, pos, format!("invalid JSON literal: {e}")))?;
                tokens.push((pos, Token::JsonLiteral(value)));
            }
            '-' | '0'..='9' => {
                let mut text = String::new();
                if c == '-' {
                    text.push(c);
                    chars.next();
                }
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number: i64 = text
                    .parse()
                    .map_err(|_| syntax(src, pos, format!("invalid number '{text}'")))?;
                tokens.push((pos, Token::Number(number)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((pos, Token::Ident(ident)));
            }
            other => {
                return Err(syntax(src, pos, format!("unexpected character '{other}'")));
            }
        }
    }

    tokens.push((src.len(), Token::Eof));
    Ok(tokens)
}

pub(crate) fn parse(src: &str) -> Result<Node> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
    };
    let node = parser.parse_expression()?;
    parser.expect_eof()?;
    Ok(node)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].1
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].1.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(syntax(
                self.src,
                self.position(),
                "unexpected trailing input",
            ))
        }
    }

    fn parse_expression(&mut self) -> Result<Node> {
        let mut left = self.parse_comparison()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_comparison()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let left = self.parse_chain()?;
        if let Token::Cmp(op) = *self.peek() {
            self.advance();
            let rhs = self.parse_literal_operand()?;
            return Ok(Node::Compare(Box::new(left), op, rhs));
        }
        Ok(left)
    }

    fn parse_literal_operand(&mut self) -> Result<Value> {
        let position = self.position();
        match self.advance() {
            Token::Number(n) => Ok(Value::from(n)),
            Token::RawString(s) => Ok(Value::from(s)),
            Token::JsonLiteral(v) => Ok(v),
            _ => Err(syntax(
                self.src,
                position,
                "expected a literal on the right-hand side of a comparison",
            )),
        }
    }

    fn parse_chain(&mut self) -> Result<Node> {
        let mut steps = Vec::new();
        steps.push(self.parse_step(true)?);

        loop {
            if self.eat(&Token::Dot) {
                steps.push(self.parse_step(false)?);
            } else if *self.peek() == Token::LBracket {
                steps.push(self.parse_bracket()?);
            } else {
                break;
            }
        }

        if steps.len() == 1 {
            Ok(steps.remove(0))
        } else {
            Ok(Node::Chain(steps))
        }
    }

    fn parse_step(&mut self, leading: bool) -> Result<Node> {
        let position = self.position();
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(Node::Field(name))
            }
            Token::LBracket if leading => self.parse_bracket(),
            Token::RawString(s) if leading => {
                self.advance();
                Ok(Node::Literal(Value::from(s)))
            }
            Token::JsonLiteral(v) if leading => {
                self.advance();
                Ok(Node::Literal(v))
            }
            _ => Err(syntax(
                self.src,
                position,
                if leading {
                    "expected an identifier, literal, or '['"
                } else {
                    "expected an identifier after '.'"
                },
            )),
        }
    }

    fn parse_bracket(&mut self) -> Result<Node> {
        let position = self.position();
        if !self.eat(&Token::LBracket) {
            return Err(syntax(self.src, position, "expected '['"));
        }
        let node = match self.peek().clone() {
            Token::Number(index) => {
                self.advance();
                Node::Index(index)
            }
            Token::Star => {
                self.advance();
                Node::Flatten
            }
            Token::Question => {
                self.advance();
                let predicate = self.parse_expression()?;
                Node::Filter(Box::new(predicate))
            }
            _ => {
                return Err(syntax(
                    self.src,
                    self.position(),
                    "expected an index, '*', or '?' inside brackets",
                ));
            }
        };
        if !self.eat(&Token::RBracket) {
            return Err(syntax(self.src, self.position(), "unbalanced brackets"));
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_chain() {
        let node = parse("a.b.c").unwrap();
        assert_eq!(
            node,
            Node::Chain(vec![
                Node::Field("a".to_string()),
                Node::Field("b".to_string()),
                Node::Field("c".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_index_access() {
        let node = parse("items[0].name").unwrap();
        assert_eq!(
            node,
            Node::Chain(vec![
                Node::Field("items".to_string()),
                Node::Index(0),
                Node::Field("name".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_negative_index() {
        assert_eq!(parse("[-1]").unwrap(), Node::Index(-1));
    }

    #[test]
    fn test_parse_filter() {
        let node = parse("[?key == 'abc']").unwrap();
        assert_eq!(
            node,
            Node::Filter(Box::new(Node::Compare(
                Box::new(Node::Field("key".to_string())),
                CmpOp::Eq,
                Value::from("abc"),
            )))
        );
    }

    #[test]
    fn test_parse_or_fallback() {
        let node = parse("key || name").unwrap();
        assert_eq!(
            node,
            Node::Or(
                Box::new(Node::Field("key".to_string())),
                Box::new(Node::Field("name".to_string())),
            )
        );
    }

    #[test]
    fn test_parse_quoted_identifier() {
        let node = parse("\"strange key\".value").unwrap();
        assert_eq!(
            node,
            Node::Chain(vec![
                Node::Field("strange key".to_string()),
                Node::Field("value".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_json_literal() {
        let node = parse("count == `10`").unwrap();
        assert_eq!(
            node,
            Node::Compare(
                Box::new(Node::Field("count".to_string())),
                CmpOp::Eq,
                Value::from(10),
            )
        );
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(matches!(parse("a[0"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("a]"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_pipe_rejected() {
        assert!(matches!(parse("a | b"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(matches!(parse("a b"), Err(Error::Syntax { .. })));
    }
}

use crate::error::Error;

use super::ast::*;
use super::lexer::Token;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_additive()?;
        if !self.at_eof() {
            return Err(self.error(format!("unexpected token: {:?}", self.current())));
        }
        Ok(expr)
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn at_eof(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), Error> {
        if self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {:?}, got {:?}",
                expected,
                self.current()
            )))
        }
    }

    fn error(&self, message: String) -> Error {
        Error::TemplateEval(format!("{message} (at token {})", self.pos))
    }

    // ── Precedence levels (lowest to highest) ──────────────────────

    /// additive: term (('+' | '-') term)*
    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::BinOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// term: unary (('*' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Token::Star => BinOp::Mul,
                Token::SlashSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// unary: '-' unary | '+' unary | postfix
    fn parse_unary(&mut self) -> Result<Expr, Error> {
        match self.current() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_postfix(),
        }
    }

    /// postfix: primary ('[' subscript ']' | '.' IDENT '(' args ')')*
    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current() {
                Token::LBracket => {
                    self.advance();
                    expr = self.parse_subscript(expr)?;
                }
                Token::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        Token::Ident(name) => name,
                        other => {
                            return Err(self.error(format!(
                                "expected method name after '.', got {other:?}"
                            )))
                        }
                    };
                    if !matches!(self.current(), Token::LParen) {
                        return Err(self.error(format!(
                            "attribute access is not supported: .{name}"
                        )));
                    }
                    self.advance();
                    let args = self.parse_args()?;
                    expr = Expr::Method {
                        target: Box::new(expr),
                        name,
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// After '[': `index ']'` or `[start] ':' [stop] [':' [step]] ']'`
    fn parse_subscript(&mut self, target: Expr) -> Result<Expr, Error> {
        let start = if matches!(self.current(), Token::Colon) {
            None
        } else {
            Some(Box::new(self.parse_additive()?))
        };

        if !matches!(self.current(), Token::Colon) {
            self.expect(&Token::RBracket)?;
            let index = start.ok_or_else(|| self.error("empty subscript".into()))?;
            return Ok(Expr::Index(Box::new(target), index));
        }
        self.advance(); // skip ':'

        let stop = if matches!(self.current(), Token::Colon | Token::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_additive()?))
        };

        let mut step = None;
        if matches!(self.current(), Token::Colon) {
            self.advance();
            if !matches!(self.current(), Token::RBracket) {
                step = Some(Box::new(self.parse_additive()?));
            }
        }
        self.expect(&Token::RBracket)?;

        Ok(Expr::Slice {
            target: Box::new(target),
            start,
            stop,
            step,
        })
    }

    /// After '(': comma-separated arguments up to ')'.
    fn parse_args(&mut self) -> Result<Vec<Expr>, Error> {
        let mut args = Vec::new();
        while !matches!(self.current(), Token::RParen) {
            args.push(self.parse_additive()?);
            if matches!(self.current(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => {
                if matches!(self.current(), Token::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Token::LParen => {
                let expr = self.parse_additive()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            other => Err(self.error(format!("unexpected token: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lexer::Lexer;

    fn parse(input: &str) -> Result<Expr, Error> {
        let mut lexer = Lexer::new(input);
        lexer.tokenize()?;
        Parser::new(lexer.tokens).parse()
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.into()))
    }

    #[test]
    fn parse_rfind_slice() {
        assert_eq!(
            parse(r#"ENGINE[ENGINE.rfind(".")+1:]"#).unwrap(),
            Expr::Slice {
                target: name("ENGINE"),
                start: Some(Box::new(Expr::BinOp(
                    BinOp::Add,
                    Box::new(Expr::Method {
                        target: name("ENGINE"),
                        name: "rfind".into(),
                        args: vec![Expr::Str(".".into())],
                    }),
                    Box::new(Expr::Int(1)),
                ))),
                stop: None,
                step: None,
            }
        );
    }

    #[test]
    fn parse_index_and_step_slice() {
        assert_eq!(
            parse("X[-1]").unwrap(),
            Expr::Index(name("X"), Box::new(Expr::Neg(Box::new(Expr::Int(1)))))
        );
        assert_eq!(
            parse("X[::2]").unwrap(),
            Expr::Slice {
                target: name("X"),
                start: None,
                stop: None,
                step: Some(Box::new(Expr::Int(2))),
            }
        );
        assert_eq!(
            parse("X[:3]").unwrap(),
            Expr::Slice {
                target: name("X"),
                start: None,
                stop: Some(Box::new(Expr::Int(3))),
                step: None,
            }
        );
    }

    #[test]
    fn parse_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::BinOp(
                BinOp::Add,
                Box::new(Expr::Int(1)),
                Box::new(Expr::BinOp(
                    BinOp::Mul,
                    Box::new(Expr::Int(2)),
                    Box::new(Expr::Int(3))
                )),
            )
        );
    }

    #[test]
    fn parse_builtin_call() {
        assert_eq!(
            parse("len(NAME)").unwrap(),
            Expr::Call {
                name: "len".into(),
                args: vec![Expr::Name("NAME".into())],
            }
        );
    }

    #[test]
    fn parse_errors() {
        assert!(parse("X[]").is_err());
        assert!(parse("X.upper").is_err());
        assert!(parse("X[1").is_err());
        assert!(parse("X Y").is_err());
        assert!(parse(":05d").is_err());
    }
}

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Str(String),
    Ident(String),

    LParen,     // (
    RParen,     // )
    LBracket,   // [
    RBracket,   // ]
    Dot,        // .
    Comma,      // ,
    Colon,      // :

    Plus,       // +
    Minus,      // -
    Star,       // *
    SlashSlash, // //
    Percent,    // %

    Eof,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    pub tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(&mut self) -> Result<&[Token], Error> {
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            match ch {
                c if c.is_whitespace() => self.pos += 1,
                '(' => { self.pos += 1; self.tokens.push(Token::LParen); }
                ')' => { self.pos += 1; self.tokens.push(Token::RParen); }
                '[' => { self.pos += 1; self.tokens.push(Token::LBracket); }
                ']' => { self.pos += 1; self.tokens.push(Token::RBracket); }
                '.' => { self.pos += 1; self.tokens.push(Token::Dot); }
                ',' => { self.pos += 1; self.tokens.push(Token::Comma); }
                ':' => { self.pos += 1; self.tokens.push(Token::Colon); }
                '+' => { self.pos += 1; self.tokens.push(Token::Plus); }
                '-' => { self.pos += 1; self.tokens.push(Token::Minus); }
                '*' => { self.pos += 1; self.tokens.push(Token::Star); }
                '%' => { self.pos += 1; self.tokens.push(Token::Percent); }
                '/' => {
                    if self.input.get(self.pos + 1) == Some(&'/') {
                        self.pos += 2;
                        self.tokens.push(Token::SlashSlash);
                    } else {
                        return Err(self.error("true division is not supported, use '//'"));
                    }
                }
                '"' | '\'' => self.read_string(ch)?,
                c if c.is_ascii_digit() => self.read_int()?,
                c if c.is_alphabetic() || c == '_' => self.read_ident(),
                _ => return Err(self.error(&format!("unexpected character: '{ch}'"))),
            }
        }
        self.tokens.push(Token::Eof);
        Ok(&self.tokens)
    }

    fn error(&self, message: &str) -> Error {
        Error::TemplateEval(format!("{message} (at position {})", self.pos))
    }

    fn read_int(&mut self) -> Result<(), Error> {
        let start = self.pos;
        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_digit() || self.input[self.pos] == '_')
        {
            self.pos += 1;
        }
        let text: String = self.input[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let n = text
            .parse::<i64>()
            .map_err(|_| self.error(&format!("invalid integer: {text}")))?;
        self.tokens.push(Token::Int(n));
        Ok(())
    }

    fn read_string(&mut self, quote: char) -> Result<(), Error> {
        self.pos += 1; // skip opening quote
        let mut s = String::new();
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                c if c == quote => {
                    self.pos += 1;
                    self.tokens.push(Token::Str(s));
                    return Ok(());
                }
                '\\' => {
                    self.pos += 1;
                    let Some(&c) = self.input.get(self.pos) else {
                        break;
                    };
                    match c {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        '\\' | '\'' | '"' => s.push(c),
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    self.pos += 1;
                }
                c => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn read_ident(&mut self) {
        let start = self.pos;
        while self.pos < self.input.len()
            && (self.input[self.pos].is_alphanumeric() || self.input[self.pos] == '_')
        {
            self.pos += 1;
        }
        let word: String = self.input[start..self.pos].iter().collect();
        self.tokens.push(Token::Ident(word));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        lexer.tokenize().unwrap();
        lexer.tokens
    }

    #[test]
    fn lex_rfind_slice() {
        assert_eq!(
            lex(r#"ENGINE[ENGINE.rfind(".")+1:]"#),
            vec![
                Token::Ident("ENGINE".into()),
                Token::LBracket,
                Token::Ident("ENGINE".into()),
                Token::Dot,
                Token::Ident("rfind".into()),
                Token::LParen,
                Token::Str(".".into()),
                Token::RParen,
                Token::Plus,
                Token::Int(1),
                Token::Colon,
                Token::RBracket,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lex_operators() {
        assert_eq!(
            lex("+ - * // %"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::SlashSlash,
                Token::Percent,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lex_strings() {
        assert_eq!(lex(r"'a\'b'"), vec![Token::Str("a'b".into()), Token::Eof]);
        assert_eq!(lex(r#""x\ty""#), vec![Token::Str("x\ty".into()), Token::Eof]);
    }

    #[test]
    fn lex_errors() {
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("a / b").tokenize().is_err());
        assert!(Lexer::new("a = b").tokenize().is_err());
    }
}

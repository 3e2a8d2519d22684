use crate::error::Error;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrKind {
    Text,
    Bytes,
    Format,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    /// Raw number text, e.g. `0x1F`, `1_000`, `2.5e3`, `3j`.
    Number(String),
    /// String literal with escapes already decoded.
    Str { value: String, kind: StrKind },
    Op(&'static str),
    Newline,
    Eof,
}

/// A token with its position and byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: Pos,
    pub start: usize,
    pub end: usize,
}

// Longest first so that prefix matching picks `**=` over `**` over `*`.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "**", "//", "<<", ">>", "<=", ">=", "==",
    "!=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "+", "-", "*", "/", "%", "@",
    "&", "|", "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "=",
];

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
    brackets: Vec<(char, Pos)>,
    pub tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
            brackets: Vec::new(),
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, Error> {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\x0c' => {
                    self.bump();
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '\n' => {
                    let pos = self.here();
                    let start = self.pos;
                    self.bump();
                    if self.brackets.is_empty() && self.needs_newline() {
                        self.push(Token::Newline, pos, start);
                    }
                }
                '\\' => {
                    let pos = self.here();
                    self.bump();
                    match self.peek() {
                        Some('\n') => {
                            self.bump();
                        }
                        None => return Err(syntax(pos, "unexpected EOF while parsing")),
                        Some(_) => {
                            return Err(syntax(
                                pos,
                                "unexpected character after line continuation character",
                            ))
                        }
                    }
                }
                '\'' | '"' => self.read_string("")?,
                c if c.is_ascii_digit() => self.read_number()?,
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
                c if c.is_alphabetic() || c == '_' => self.read_name()?,
                _ => self.read_operator()?,
            }
        }

        if let Some(&(open, pos)) = self.brackets.last() {
            return Err(syntax(pos, format!("'{open}' was never closed")));
        }
        let pos = self.here();
        if self.needs_newline() {
            self.push(Token::Newline, pos, self.pos);
        }
        self.push(Token::Eof, pos, self.pos);
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    fn here(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.src[self.line_start..self.pos].chars().count() + 1,
        }
    }

    fn needs_newline(&self) -> bool {
        !matches!(
            self.tokens.last().map(|t| &t.token),
            None | Some(Token::Newline)
        )
    }

    fn push(&mut self, token: Token, pos: Pos, start: usize) {
        self.tokens.push(Spanned {
            token,
            pos,
            start,
            end: self.pos,
        });
    }

    fn read_name(&mut self) -> Result<(), Error> {
        let pos = self.here();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let word = &self.src[start..self.pos];
        if matches!(self.peek(), Some('\'' | '"')) && is_string_prefix(word) {
            let prefix = word.to_ascii_lowercase();
            return self.read_string_at(&prefix, pos, start);
        }
        self.push(Token::Name(word.to_string()), pos, start);
        Ok(())
    }

    fn read_number(&mut self) -> Result<(), Error> {
        let pos = self.here();
        let start = self.pos;
        let radix = matches!(
            (self.peek(), self.peek_at(1)),
            (Some('0'), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'))
        );
        if radix {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
        } else {
            self.eat_digits();
            if self.peek() == Some('.') {
                self.bump();
                self.eat_digits();
            }
            if matches!(self.peek(), Some('e' | 'E'))
                && (self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                    || (matches!(self.peek_at(1), Some('+' | '-'))
                        && self.peek_at(2).is_some_and(|c| c.is_ascii_digit())))
            {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.eat_digits();
            }
            if matches!(self.peek(), Some('j' | 'J')) {
                self.bump();
            }
        }
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(syntax(pos, "invalid decimal literal"));
        }
        let text = self.src[start..self.pos].to_string();
        self.push(Token::Number(text), pos, start);
        Ok(())
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn read_operator(&mut self) -> Result<(), Error> {
        let pos = self.here();
        let start = self.pos;
        let rest = &self.src[self.pos..];
        let Some(op) = OPERATORS.iter().copied().find(|op| rest.starts_with(op)) else {
            let c = self.peek().unwrap_or_default();
            return Err(syntax(pos, format!("invalid character '{c}'")));
        };
        self.pos += op.len();

        match op {
            "(" | "[" | "{" => self.brackets.push((op.chars().next().unwrap_or('('), pos)),
            ")" | "]" | "}" => {
                let close = op.chars().next().unwrap_or(')');
                match self.brackets.pop() {
                    None => return Err(syntax(pos, format!("unmatched '{close}'"))),
                    Some((open, _)) if matching(open) != close => {
                        return Err(syntax(
                            pos,
                            format!(
                                "closing parenthesis '{close}' does not match opening parenthesis '{open}'"
                            ),
                        ))
                    }
                    Some(_) => {}
                }
            }
            _ => {}
        }
        self.push(Token::Op(op), pos, start);
        Ok(())
    }

    fn read_string(&mut self, prefix: &str) -> Result<(), Error> {
        let pos = self.here();
        let start = self.pos;
        self.read_string_at(prefix, pos, start)
    }

    fn read_string_at(&mut self, prefix: &str, pos: Pos, start: usize) -> Result<(), Error> {
        let raw = prefix.contains('r');
        let kind = if prefix.contains('b') {
            StrKind::Bytes
        } else if prefix.contains('f') {
            StrKind::Format
        } else {
            StrKind::Text
        };

        let quote = self.bump().unwrap_or('\'');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                let message = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(syntax(pos, message));
            };
            match c {
                '\n' if !triple => return Err(syntax(pos, "unterminated string literal")),
                c if c == quote => {
                    if !triple {
                        self.bump();
                        break;
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.bump();
                        self.bump();
                        self.bump();
                        break;
                    }
                    self.bump();
                    value.push(c);
                }
                '\\' => {
                    let esc_pos = self.here();
                    self.bump();
                    if raw || kind == StrKind::Format {
                        value.push('\\');
                        if let Some(next) = self.bump() {
                            value.push(next);
                        }
                    } else {
                        self.read_escape(&mut value, kind, esc_pos)?;
                    }
                }
                _ => {
                    self.bump();
                    value.push(c);
                }
            }
        }

        self.push(Token::Str { value, kind }, pos, start);
        Ok(())
    }

    fn read_escape(&mut self, out: &mut String, kind: StrKind, pos: Pos) -> Result<(), Error> {
        let Some(c) = self.bump() else {
            return Err(syntax(pos, "unterminated string literal"));
        };
        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            'x' => out.push(self.read_hex(2, pos, "truncated \\xXX escape")?),
            'u' if kind == StrKind::Text => {
                out.push(self.read_hex(4, pos, "truncated \\uXXXX escape")?)
            }
            'U' if kind == StrKind::Text => {
                out.push(self.read_hex(8, pos, "truncated \\UXXXXXXXX escape")?)
            }
            // Named escapes need the Unicode name table; they are kept verbatim.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn read_hex(&mut self, digits: usize, pos: Pos, message: &str) -> Result<char, Error> {
        let mut code: u32 = 0;
        for _ in 0..digits {
            let d = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| syntax(pos, message))?;
            code = code * 16 + d;
            self.bump();
        }
        char::from_u32(code).ok_or_else(|| syntax(pos, "illegal Unicode character"))
    }
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

fn matching(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

pub(crate) fn syntax(pos: Pos, message: impl Into<String>) -> Error {
    Error::Syntax {
        line: pos.line,
        column: pos.column,
        message: message.into(),
    }
}

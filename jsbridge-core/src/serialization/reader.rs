use crate::error::BridgeError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    /// An object key. The tokenizer consumes the `:` that follows it.
    Property(String),
    String(String),
    /// Raw number text, interpreted later against the target type.
    Number(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Error, PartialEq)]
pub enum SyntaxError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    #[error("invalid string at offset {offset}: {reason}")]
    InvalidString { offset: usize, reason: String },
    #[error("invalid literal at offset {0}")]
    InvalidLiteral(usize),
    #[error("expected ':' after the property name at offset {0}")]
    MissingColon(usize),
}

impl From<SyntaxError> for BridgeError {
    fn from(err: SyntaxError) -> Self {
        BridgeError::invalid_operation(format!("Invalid json format - {}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Array,
    Object,
}

/// What the grammar allows at the current position.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    Value,
    ValueOrEnd,
    Key,
    KeyOrEnd,
    SeparatorOrEnd,
    Done,
}

/// Streaming JSON tokenizer. Separators and key/value placement are
/// checked here; reference metadata and end-of-input balance are checked
/// by the deserializer.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    containers: Vec<Container>,
    expect: Expect,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Tokenizer {
            input,
            pos: 0,
            containers: Vec::new(),
            expect: Expect::Value,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_byte().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> SyntaxError {
        let ch = self.input[self.pos..].chars().next().unwrap_or('\u{fffd}');
        SyntaxError::UnexpectedChar {
            ch,
            offset: self.pos,
        }
    }

    fn read_string(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        let mut i = start + 1;
        loop {
            match bytes.get(i) {
                None => return Err(SyntaxError::UnterminatedString(start)),
                Some(b'\\') => i += 2,
                Some(b'"') => break,
                Some(_) => i += 1,
            }
        }
        self.pos = i + 1;
        serde_json::from_str::<String>(&self.input[start..self.pos]).map_err(|e| {
            SyntaxError::InvalidString {
                offset: start,
                reason: e.to_string(),
            }
        })
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        while self
            .peek_byte()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        self.input[start..self.pos].to_owned()
    }

    fn read_literal(&mut self, literal: &str, token: Token) -> Result<Token, SyntaxError> {
        if self.input[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(token)
        } else {
            Err(SyntaxError::InvalidLiteral(self.pos))
        }
    }

    fn after_value(&mut self) {
        self.expect = if self.containers.is_empty() {
            Expect::Done
        } else {
            Expect::SeparatorOrEnd
        };
    }

    fn open(&mut self, container: Container) -> Token {
        self.pos += 1;
        self.containers.push(container);
        match container {
            Container::Array => {
                self.expect = Expect::ValueOrEnd;
                Token::StartArray
            }
            Container::Object => {
                self.expect = Expect::KeyOrEnd;
                Token::StartObject
            }
        }
    }

    fn close(&mut self, container: Container) -> Result<Token, SyntaxError> {
        if self.containers.last() != Some(&container) {
            return Err(self.unexpected());
        }
        self.pos += 1;
        self.containers.pop();
        self.after_value();
        Ok(match container {
            Container::Array => Token::EndArray,
            Container::Object => Token::EndObject,
        })
    }

    fn read_property(&mut self) -> Result<Token, SyntaxError> {
        let name = self.read_string()?;
        self.skip_whitespace();
        if self.peek_byte() != Some(b':') {
            return Err(SyntaxError::MissingColon(self.pos));
        }
        self.pos += 1;
        self.expect = Expect::Value;
        Ok(Token::Property(name))
    }

    fn read_value(&mut self, b: u8) -> Result<Token, SyntaxError> {
        let token = match b {
            b'{' => return Ok(self.open(Container::Object)),
            b'[' => return Ok(self.open(Container::Array)),
            b'"' => Token::String(self.read_string()?),
            b't' => self.read_literal("true", Token::Bool(true))?,
            b'f' => self.read_literal("false", Token::Bool(false))?,
            b'n' => self.read_literal("null", Token::Null)?,
            b'-' | b'0'..=b'9' => Token::Number(self.read_number()),
            _ => return Err(self.unexpected()),
        };
        self.after_value();
        Ok(token)
    }

    fn next_token(&mut self) -> Option<Result<Token, SyntaxError>> {
        loop {
            self.skip_whitespace();
            let b = self.peek_byte()?;
            let token = match (self.expect, b) {
                (Expect::SeparatorOrEnd, b',') => {
                    self.pos += 1;
                    self.expect = match self.containers.last() {
                        Some(Container::Object) => Expect::Key,
                        _ => Expect::Value,
                    };
                    continue;
                }
                (Expect::SeparatorOrEnd | Expect::ValueOrEnd, b']') => self.close(Container::Array),
                (Expect::SeparatorOrEnd | Expect::KeyOrEnd, b'}') => self.close(Container::Object),
                (Expect::Key | Expect::KeyOrEnd, b'"') => self.read_property(),
                (Expect::Value | Expect::ValueOrEnd, b) => self.read_value(b),
                _ => Err(self.unexpected()),
            };
            if token.is_err() {
                // stop after the first error
                self.pos = self.input.len();
            }
            return Some(token);
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

//! Relaxed structured-literal parser for Mongo shell arguments
//!
//! Accepts JSON plus the shell's relaxed conveniences: unquoted keys,
//! single-quoted strings, trailing commas, and the constructors
//! `ObjectId`, `ISODate`, `new Date`, `NumberLong`, `NumberInt`,
//! `NumberDecimal`. Constructors become MongoDB extended JSON.

use serde_json::{Map, Number, Value as Json};

use crate::{ConduitError, Result};

/// Parse one literal argument into JSON
pub fn parse_literal(text: &str) -> Result<Json> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.skip_ws();
    if parser.at_end() {
        return Ok(Json::Object(Map::new()));
    }
    let value = parser.value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, what: &str) -> ConduitError {
        let context: String = self.chars.iter().skip(self.pos).take(20).collect();
        ConduitError::Exec(format!(
            "invalid argument literal at position {}: {} near '{}'",
            self.pos, what, context
        ))
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn value(&mut self) -> Result<Json> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.object(),
            Some('[') => self.array(),
            Some('"') | Some('\'') => self.string().map(Json::String),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.word_value(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self) -> Result<Json> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Json::Object(map));
            }
            let key = match self.peek() {
                Some('"') | Some('\'') => self.string()?,
                _ => self.bare_key()?,
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn array(&mut self) -> Result<Json> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Json::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {}
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn bare_key(&mut self) -> Result<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a key"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.peek().ok_or_else(|| self.error("expected a string"))?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| self.error("unterminated string"))?;
            self.pos += 1;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escaped = self
                .peek()
                .ok_or_else(|| self.error("unterminated escape"))?;
            self.pos += 1;
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'u' => {
                    let hex: String = self.chars.iter().skip(self.pos).take(4).collect();
                    let code = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.error("invalid unicode escape"))?;
                    out.push(code);
                    self.pos += 4;
                }
                other => out.push(other),
            }
        }
    }

    fn number(&mut self) -> Result<Json> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = raw.parse::<i64>() {
            return Ok(Json::Number(i.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Json::Number)
            .ok_or_else(|| self.error("invalid number"))
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn word_value(&mut self) -> Result<Json> {
        let start = self.pos;
        let mut word = self.word();
        if word == "new" {
            self.skip_ws();
            word = self.word();
        }
        match word.as_str() {
            "true" => Ok(Json::Bool(true)),
            "false" => Ok(Json::Bool(false)),
            "null" | "undefined" => Ok(Json::Null),
            "ObjectId" => {
                let hex = self.constructor_string()?;
                Ok(serde_json::json!({ "$oid": hex }))
            }
            "ISODate" | "Date" => {
                let date = self.constructor_string()?;
                Ok(serde_json::json!({ "$date": date }))
            }
            "NumberDecimal" => {
                let raw = self.constructor_raw()?;
                Ok(serde_json::json!({ "$numberDecimal": raw }))
            }
            "NumberLong" => {
                let raw = self.constructor_raw()?;
                Ok(serde_json::json!({ "$numberLong": raw }))
            }
            "NumberInt" => {
                let raw = self.constructor_raw()?;
                raw.parse::<i32>()
                    .map(|n| Json::Number(n.into()))
                    .map_err(|_| self.error("NumberInt expects an integer"))
            }
            _ => {
                self.pos = start;
                Err(self.error(&format!("unsupported expression '{}'", word)))
            }
        }
    }

    /// Argument of a constructor that takes a quoted string
    fn constructor_string(&mut self) -> Result<String> {
        self.expect('(')?;
        self.skip_ws();
        let value = self.string()?;
        self.expect(')')?;
        Ok(value)
    }

    /// Argument of a numeric constructor, quoted or not, as text
    fn constructor_raw(&mut self) -> Result<String> {
        self.expect('(')?;
        self.skip_ws();
        let value = match self.peek() {
            Some('"') | Some('\'') => self.string()?,
            _ => match self.number()? {
                Json::Number(n) => n.to_string(),
                _ => return Err(self.error("expected a number")),
            },
        };
        self.expect(')')?;
        Ok(value)
    }
}

//! Decoding of string-encoded result cells into native values.
//!
//! Every cell arrives as text (or as a missing value for NULL) together with
//! its column type. Scalars are parsed directly. Arrays (`[a, b]`) and maps
//! (`{k=v}`) are parsed by a small recursive-descent parser driven by the
//! declared element, key and value types, so nested literals such as
//! `{a=[1, 2]}` decode correctly.

use crate::error::{QuarryError, Result};
use crate::types::DataType;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    /// Key/value pairs in the order they appeared.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Decode one raw cell. `None` is the service's NULL marker and decodes to
/// [`Value::Null`] for every type.
pub fn decode_cell(raw: Option<&str>, data_type: &DataType) -> Result<Value> {
    let raw = match raw {
        Some(raw) => raw,
        None => return Ok(Value::Null),
    };
    if !data_type.is_container() {
        return decode_scalar(raw, data_type);
    }
    let mut parser = LiteralParser::new(raw);
    let value = parser.parse_container(data_type)?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error(data_type, "unexpected characters after literal"));
    }
    Ok(value)
}

fn decode_scalar(raw: &str, data_type: &DataType) -> Result<Value> {
    match data_type {
        DataType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                Ok(Value::Boolean(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Ok(Value::Boolean(false))
            } else {
                Err(QuarryError::decode(data_type.to_string(), raw, "expected true or false"))
            }
        }
        DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| QuarryError::decode(data_type.to_string(), raw, e.to_string())),
        DataType::Real | DataType::Double => match raw {
            "NaN" => Ok(Value::Float(f64::NAN)),
            "Infinity" => Ok(Value::Float(f64::INFINITY)),
            "-Infinity" => Ok(Value::Float(f64::NEG_INFINITY)),
            _ => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| QuarryError::decode(data_type.to_string(), raw, e.to_string())),
        },
        DataType::Char | DataType::Varchar | DataType::Other(_) => {
            Ok(Value::String(raw.to_string()))
        }
        DataType::Array(_) | DataType::Map(_, _) => decode_cell(Some(raw), data_type),
    }
}

struct LiteralParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8, data_type: &DataType) -> Result<()> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(data_type, &format!("expected '{}'", expected as char)))
        }
    }

    fn error(&self, data_type: &DataType, message: &str) -> QuarryError {
        QuarryError::decode(
            data_type.to_string(),
            self.input,
            format!("{} at offset {}", message, self.pos),
        )
    }

    /// An element inside a container: either a nested container, a bare
    /// `null`, or a scalar running up to the next separator.
    fn parse_element(&mut self, data_type: &DataType, terminators: &[u8]) -> Result<Value> {
        self.skip_whitespace();
        if data_type.is_container() {
            if self.consume_null(terminators) {
                return Ok(Value::Null);
            }
            return self.parse_container(data_type);
        }
        let token = self.scan_scalar(terminators).trim();
        if token == "null" {
            return Ok(Value::Null);
        }
        decode_scalar(token, data_type)
    }

    fn parse_container(&mut self, data_type: &DataType) -> Result<Value> {
        match data_type {
            DataType::Array(element) => {
                self.expect(b'[', data_type)?;
                let mut items = Vec::new();
                self.skip_whitespace();
                if self.peek() == Some(b']') {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                loop {
                    items.push(self.parse_element(element, b",]")?);
                    self.skip_whitespace();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b']') => {
                            self.pos += 1;
                            return Ok(Value::Array(items));
                        }
                        _ => return Err(self.error(data_type, "expected ',' or ']'")),
                    }
                }
            }
            DataType::Map(key_type, value_type) => {
                self.expect(b'{', data_type)?;
                let mut entries = Vec::new();
                self.skip_whitespace();
                if self.peek() == Some(b'}') {
                    self.pos += 1;
                    return Ok(Value::Map(entries));
                }
                loop {
                    let key = self.parse_element(key_type, b"=")?;
                    self.expect(b'=', data_type)?;
                    let value = self.parse_element(value_type, b",}")?;
                    entries.push((key, value));
                    self.skip_whitespace();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b'}') => {
                            self.pos += 1;
                            return Ok(Value::Map(entries));
                        }
                        _ => return Err(self.error(data_type, "expected ',' or '}'")),
                    }
                }
            }
            _ => Err(self.error(data_type, "not a container type")),
        }
    }

    /// Consume a bare `null` if it is followed by a terminator or whitespace.
    fn consume_null(&mut self, terminators: &[u8]) -> bool {
        let rest = &self.input.as_bytes()[self.pos..];
        if !rest.starts_with(b"null") {
            return false;
        }
        match rest.get(4) {
            None => {}
            Some(b) if terminators.contains(b) || b.is_ascii_whitespace() => {}
            Some(_) => return false,
        }
        self.pos += 4;
        true
    }

    /// Advance to the next terminator at bracket depth zero, or to an
    /// unmatched closing bracket, and return the text passed over.
    fn scan_scalar(&mut self, terminators: &[u8]) -> &'a str {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        let mut depth = 0usize;
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            if depth == 0 && terminators.contains(&b) {
                break;
            }
            match b {
                b'[' | b'{' | b'(' => depth += 1,
                b']' | b'}' | b')' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }
}

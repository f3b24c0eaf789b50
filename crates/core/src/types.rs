//! Column type tags.
//!
//! The remote service annotates every result column with a type string such
//! as `integer`, `varchar(10)` or `map(varchar, array(bigint))`. [`DataType`]
//! is the parsed form that drives decoding.

use crate::error::{QuarryError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Char,
    Varchar,
    Array(Box<DataType>),
    Map(Box<DataType>, Box<DataType>),
    /// Any tag without a dedicated decoder. Values pass through as strings.
    Other(String),
}

impl DataType {
    /// Parse a type tag. Unknown names become [`DataType::Other`]; known
    /// container names with malformed parameters are an error.
    pub fn parse(tag: &str) -> Result<DataType> {
        let trimmed = tag.trim();
        let (name, params) = split_params(trimmed)
            .ok_or_else(|| QuarryError::decode("type", tag, "unbalanced parentheses"))?;

        let data_type = match name.to_ascii_lowercase().as_str() {
            "boolean" => DataType::Boolean,
            "tinyint" => DataType::TinyInt,
            "smallint" => DataType::SmallInt,
            "integer" | "int" => DataType::Integer,
            "bigint" => DataType::BigInt,
            "real" | "float" => DataType::Real,
            "double" => DataType::Double,
            "char" => DataType::Char,
            "varchar" | "string" => DataType::Varchar,
            "array" => match params {
                None => DataType::Array(Box::new(DataType::Varchar)),
                Some(inner) => {
                    let args = split_top_level(inner);
                    if args.len() != 1 {
                        return Err(QuarryError::decode(
                            "type",
                            tag,
                            "array takes exactly one element type",
                        ));
                    }
                    DataType::Array(Box::new(DataType::parse(args[0])?))
                }
            },
            "map" => match params {
                None => DataType::Map(Box::new(DataType::Varchar), Box::new(DataType::Varchar)),
                Some(inner) => {
                    let args = split_top_level(inner);
                    if args.len() != 2 {
                        return Err(QuarryError::decode(
                            "type",
                            tag,
                            "map takes a key type and a value type",
                        ));
                    }
                    DataType::Map(
                        Box::new(DataType::parse(args[0])?),
                        Box::new(DataType::parse(args[1])?),
                    )
                }
            },
            _ => DataType::Other(trimmed.to_string()),
        };
        Ok(data_type)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, DataType::Array(_) | DataType::Map(_, _))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => f.write_str("boolean"),
            DataType::TinyInt => f.write_str("tinyint"),
            DataType::SmallInt => f.write_str("smallint"),
            DataType::Integer => f.write_str("integer"),
            DataType::BigInt => f.write_str("bigint"),
            DataType::Real => f.write_str("real"),
            DataType::Double => f.write_str("double"),
            DataType::Char => f.write_str("char"),
            DataType::Varchar => f.write_str("varchar"),
            DataType::Array(element) => write!(f, "array({})", element),
            DataType::Map(key, value) => write!(f, "map({}, {})", key, value),
            DataType::Other(tag) => f.write_str(tag),
        }
    }
}

/// `name(params)` -> `(name, Some(params))`, `name` -> `(name, None)`.
/// Returns `None` when parentheses do not balance.
fn split_params(tag: &str) -> Option<(&str, Option<&str>)> {
    match tag.find('(') {
        None => {
            if tag.contains(')') {
                None
            } else {
                Some((tag, None))
            }
        }
        Some(open) => {
            if !tag.ends_with(')') {
                return None;
            }
            let inner = &tag[open + 1..tag.len() - 1];
            let mut depth = 0i32;
            for c in inner.chars() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth < 0 {
                            return None;
                        }
                    }
                    _ => {}
                }
            }
            if depth != 0 {
                return None;
            }
            Some((tag[..open].trim(), Some(inner)))
        }
    }
}

fn split_top_level(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(params[start..].trim());
    parts
}

//! Persistence format for cached [`QueryResults`].
//!
//! CSV with two header records (column names, then column type tags)
//! followed by one record per row. Every field is quoted.
//!
//! A table without columns writes every record as a single empty field.
//! Type tags are never empty, so a types record of one empty field can only
//! mean zero columns.
//!
//! NULL is written as an empty field. A non-null value that is empty or
//! starts with `\` gets one `\` prepended, which the reader strips again, so
//! NULL and the empty string stay distinct.

use crate::error::{QuarryError, Result};
use crate::results::QueryResults;
use std::io::{Read, Write};

const ESCAPE: char = '\\';

pub fn write_results<W: Write>(
    results: &QueryResults,
    sink: W,
) -> std::result::Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(sink);

    writer.write_record(results.column_names())?;
    writer.write_record(results.column_types())?;
    for row in results.data() {
        writer.write_record(row.iter().map(|cell| encode_cell(cell.as_deref())))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read results back. `key` only labels errors.
pub fn read_results<R: Read>(source: R, key: &str) -> Result<QueryResults> {
    let corrupt = |message: String| QuarryError::CorruptCache {
        key: key.to_string(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);
    let mut records = reader.records();

    let column_names: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| corrupt(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err(corrupt("missing column names".to_string())),
    };
    let column_types: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| corrupt(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err(corrupt("missing column types".to_string())),
    };

    let no_columns = is_empty_record(&column_types);
    if no_columns && !is_empty_record(&column_names) {
        return Err(corrupt("column names without column types".to_string()));
    }
    let (column_names, column_types) = if no_columns {
        (Vec::new(), Vec::new())
    } else {
        (column_names, column_types)
    };

    let mut data = Vec::new();
    for record in records {
        let record = record.map_err(|e| corrupt(e.to_string()))?;
        if no_columns {
            if record.iter().any(|field| !field.is_empty()) {
                return Err(corrupt("values in a table without columns".to_string()));
            }
            data.push(Vec::new());
        } else {
            data.push(record.iter().map(decode_cell).collect());
        }
    }

    QueryResults::new(column_names, column_types, data).map_err(|e| corrupt(e.to_string()))
}

fn is_empty_record(fields: &[String]) -> bool {
    fields.iter().all(String::is_empty) && fields.len() <= 1
}

fn encode_cell(cell: Option<&str>) -> String {
    match cell {
        None => String::new(),
        Some(value) if value.is_empty() || value.starts_with(ESCAPE) => {
            format!("{}{}", ESCAPE, value)
        }
        Some(value) => value.to_string(),
    }
}

fn decode_cell(field: &str) -> Option<String> {
    if field.is_empty() {
        return None;
    }
    match field.strip_prefix(ESCAPE) {
        Some(rest) => Some(rest.to_string()),
        None => Some(field.to_string()),
    }
}

//! Header-driven CSV reading
//!
//! Quoted fields may contain commas, doubled quotes and newlines. Blank
//! records are skipped. Rows are keyed by header in column order; a short
//! row fills the missing columns with `null` and a long row drops the extra
//! cells.

use fincraft_error::{Error, Result};
use serde_json::{Map, Value};

/// Parse CSV text into an array of row objects
pub fn parse_rows(content: &str) -> Result<Vec<Value>> {
    let mut records = split_records(content)?.into_iter();

    let Some(headers) = records.next() else {
        return Ok(Vec::new());
    };

    let rows = records
        .map(|record| {
            let mut row = Map::new();
            for (idx, header) in headers.iter().enumerate() {
                let value = record.get(idx).cloned().map(Value::String).unwrap_or(Value::Null);
                row.insert(header.clone(), value);
            }
            Value::Object(row)
        })
        .collect();

    Ok(rows)
}

fn split_records(content: &str) -> Result<Vec<Vec<String>>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(Error::parse_failed("unterminated quoted field in csv"));
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.len() == 1 && record[0].is_empty();
    if !blank {
        records.push(record);
    }
}

use std::sync::LazyLock;

use board::error::{BoardError, Result};
use csv::{ReaderBuilder, Trim};
use regex::Regex;
use serde::Deserialize;

static MESSAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?:(?:ptb|canary)\.)?discord(?:app)?\.com/channels/(\d+|@me)/(\d+)/(\d+)$")
        .expect("message url pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedRow {
    pub count: u64,
    pub user_id: String,
}

/// Normalizes a Discord message link, rejecting anything that is not one.
pub fn parse_message_url(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_start_matches('<').trim_end_matches('>');

    if MESSAGE_URL.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(BoardError::InvalidInput(format!(
            "{input} is not a Discord message link"
        )))
    }
}

pub fn parse_user_id(input: &str) -> Result<String> {
    // accept raw ids and pasted mentions like <@123> or <@!123>
    let trimmed = input
        .trim()
        .trim_start_matches("<@")
        .trim_start_matches('!')
        .trim_end_matches('>');

    if !trimmed.is_empty() && trimmed.len() <= 20 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Ok(trimmed.to_string())
    } else {
        Err(BoardError::InvalidInput(format!(
            "{input} is not a Discord user id"
        )))
    }
}

fn csv_error(line: usize, error: csv::Error) -> BoardError {
    let line = error
        .position()
        .map(|position| position.line() as usize)
        .unwrap_or(line);

    BoardError::Csv {
        line,
        reason: error.to_string(),
    }
}

/// Parses seed data with a `count,user_id` header (columns in any order, extra
/// columns ignored). Quoted fields and a leading BOM are accepted.
pub fn parse_seed_csv(text: &str) -> Result<Vec<SeedRow>> {
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(|e| csv_error(1, e))?.clone();
    for column in ["count", "user_id"] {
        if !headers.iter().any(|header| header == column) {
            return Err(BoardError::Csv {
                line: 1,
                reason: format!("missing {column} column"),
            });
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(rows.len() + 2, e))?;
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(rows.len() + 2);

        let row: SeedRow = record
            .deserialize(Some(&headers))
            .map_err(|e| csv_error(line, e))?;
        let user_id = parse_user_id(&row.user_id).map_err(|e| BoardError::Csv {
            line,
            reason: e.to_string(),
        })?;

        rows.push(SeedRow { user_id, ..row });
    }

    Ok(rows)
}

//! Classification of executed SQL statements by verb
//!
//! SELECT, INSERT and UPDATE match only as the leading keyword (followed by a
//! space), case-insensitively. DELETE matches as a whole word anywhere in the
//! statement, so `-- DELETE marker\nSELECT 1` counts as a delete. Statements are
//! tested in `SqlVerb::ALL` order and counted once. Anything else (BEGIN,
//! COMMIT, DDL) is ignored.

use std::time::Duration;

use serde_json::Value as JsonValue;

use crate::error::CoreError;
use crate::tracking::{QueryCount, SqlVerb};

/// A statement recorded by the per-request query log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub duration: Duration,
}

impl ExecutedStatement {
    pub fn new(sql: impl Into<String>, duration: Duration) -> Self {
        Self {
            sql: sql.into(),
            duration,
        }
    }
}

/// Counts statements per SQL verb
pub struct QueryCounter;

impl QueryCounter {
    /// Classify a single statement, or `None` if it matches no tracked verb
    pub fn classify(sql: &str) -> Option<SqlVerb> {
        SqlVerb::ALL.into_iter().find(|verb| match verb {
            SqlVerb::Delete => contains_word(sql, verb.as_str()),
            _ => starts_with_keyword(sql, verb.as_str()),
        })
    }

    /// Count a typed statement log
    pub fn count(statements: &[ExecutedStatement]) -> QueryCount {
        let mut counts = QueryCount::default();
        for statement in statements {
            if let Some(verb) = Self::classify(&statement.sql) {
                counts.increment(verb);
            }
        }
        counts
    }

    /// Count a raw statement log shaped as `[{"sql": "...", ...}, ...]`.
    ///
    /// Entries without a string `sql` field are skipped. Anything other than a
    /// list is rejected with [`CoreError::InvalidInput`].
    pub fn count_log(log: &JsonValue) -> Result<QueryCount, CoreError> {
        let entries = log.as_array().ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "query log must be a list of statement records, got {}",
                json_kind(log)
            ))
        })?;

        let mut counts = QueryCount::default();
        for sql in entries
            .iter()
            .filter_map(|entry| entry.get("sql").and_then(JsonValue::as_str))
        {
            if let Some(verb) = Self::classify(sql) {
                counts.increment(verb);
            }
        }
        Ok(counts)
    }
}

/// `^KEYWORD ` with ASCII case folding
fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let len = keyword.len();
    match (sql.get(..len), sql.as_bytes().get(len)) {
        (Some(prefix), Some(b' ')) => prefix.eq_ignore_ascii_case(keyword),
        _ => false,
    }
}

/// `\bWORD\b` anywhere, with ASCII case folding
fn contains_word(sql: &str, word: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    upper.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before = upper[..start].chars().next_back();
        let after = upper[end..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a single record",
    }
}

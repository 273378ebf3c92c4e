//! Request-tracking audit record

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Stored instead of the response body when it is not safe to capture
pub const LARGE_CONTENT_PLACEHOLDER: &str = "Large Content.. ignored";

/// `request_type` tag for requests received by this service
pub const REQUEST_TYPE_INCOMING: &str = "incoming";

/// Principal id recorded for anonymous requests
pub const ANONYMOUS_USER_ID: i64 = 0;

/// Format of `request_time` (UTC)
pub const REQUEST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQL verbs tracked per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlVerb {
    Select,
    Insert,
    Update,
    Delete,
}

impl SqlVerb {
    /// Classification order. A statement lands in the first matching bucket.
    pub const ALL: [SqlVerb; 4] = [
        SqlVerb::Select,
        SqlVerb::Insert,
        SqlVerb::Update,
        SqlVerb::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SqlVerb::Select => "SELECT",
            SqlVerb::Insert => "INSERT",
            SqlVerb::Update => "UPDATE",
            SqlVerb::Delete => "DELETE",
        }
    }
}

/// Per-verb statement counts. All four keys are always serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCount {
    #[serde(rename = "SELECT")]
    pub select: u32,
    #[serde(rename = "INSERT")]
    pub insert: u32,
    #[serde(rename = "UPDATE")]
    pub update: u32,
    #[serde(rename = "DELETE")]
    pub delete: u32,
}

impl QueryCount {
    pub fn increment(&mut self, verb: SqlVerb) {
        match verb {
            SqlVerb::Select => self.select += 1,
            SqlVerb::Insert => self.insert += 1,
            SqlVerb::Update => self.update += 1,
            SqlVerb::Delete => self.delete += 1,
        }
    }

    pub fn get(&self, verb: SqlVerb) -> u32 {
        match verb {
            SqlVerb::Select => self.select,
            SqlVerb::Insert => self.insert,
            SqlVerb::Update => self.update,
            SqlVerb::Delete => self.delete,
        }
    }

    pub fn total(&self) -> u32 {
        self.select + self.insert + self.update + self.delete
    }
}

/// One audit row per inbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub request_id: String,
    pub user_id: i64,
    pub method: String,
    pub path: String,
    pub ip_address: String,
    pub client: Option<String>,
    pub cookies: JsonValue,
    pub query_params: JsonValue,
    pub headers: JsonValue,
    pub body: String,
    pub response_status: String,
    pub response_data: String,
    pub execution_time: Duration,
    pub request_time: String,
    pub request_date: NaiveDate,
    pub query_count: QueryCount,
    pub node_id: String,
    pub request_type: String,
}

/// A persisted tracking record together with its store-assigned columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTrackingRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: TrackingRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Render a timestamp in the `request_time` format
pub fn format_request_time(at: DateTime<Utc>) -> String {
    at.format(REQUEST_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_count_serializes_all_verbs() {
        let mut count = QueryCount::default();
        count.increment(SqlVerb::Select);

        let json = serde_json::to_value(count).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"SELECT": 1, "INSERT": 0, "UPDATE": 0, "DELETE": 0})
        );
    }

    #[test]
    fn test_request_time_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_request_time(at), "2024-03-09 07:05:01");
    }
}

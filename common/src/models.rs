// Data models for the invocation contract, work items and completion records

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layout used for every emitted timestamp (naive UTC, microseconds)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Format a UTC instant the way the warehouse consumer expects it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a resumption timestamp.
///
/// Accepts RFC 3339 as well as naive timestamps with either a `T` or a space
/// separator, with or without fractional seconds. Naive values are UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .map(|naive| naive.and_utc())
}

/// One pending row of the recordings table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WorkItem {
    pub call_id: String,
    pub recording_url: String,
    pub file_name: String,
    #[sqlx(rename = "file_folder")]
    pub folder: String,
    pub date_started: Option<NaiveDateTime>,
}

impl WorkItem {
    /// Object key the recording is stored under: `folder/file_name`
    pub fn object_key(&self) -> String {
        let folder = self.folder.trim_end_matches('/');
        if folder.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}/{}", folder, self.file_name)
        }
    }
}

/// Completion row reported back for one transferred recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub call_id: String,
    pub file_name: String,
    pub uploaded_status_s3: bool,
    pub uploaded_to_s3_datetime: String,
}

impl CompletionRecord {
    pub fn completed(item: &WorkItem, at: DateTime<Utc>) -> Self {
        Self {
            call_id: item.call_id.clone(),
            file_name: item.file_name.clone(),
            uploaded_status_s3: true,
            uploaded_to_s3_datetime: format_timestamp(at),
        }
    }
}

/// Resumption checkpoint threaded between invocations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub uploaded_to_s3_datetime: Option<String>,
}

impl RunState {
    /// Checkpoint advanced to `now`, never earlier than the current one
    pub fn advanced_to(&self, now: DateTime<Utc>) -> RunState {
        let previous = self
            .uploaded_to_s3_datetime
            .as_deref()
            .and_then(parse_timestamp);

        let next = match previous {
            Some(previous) if previous > now => {
                tracing::warn!(
                    previous = %previous,
                    now = %now,
                    "Previous checkpoint is ahead of the clock, keeping it"
                );
                previous
            }
            _ => now,
        };

        RunState {
            uploaded_to_s3_datetime: Some(format_timestamp(next)),
        }
    }
}

/// Credentials carried by the invocation request
#[derive(Clone, Default, Deserialize)]
pub struct RequestSecrets {
    #[serde(default)]
    pub api_key: String,
    pub user: String,
    pub account: String,
}

impl fmt::Debug for RequestSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSecrets")
            .field("api_key", &"<redacted>")
            .field("user", &self.user)
            .field("account", &self.account)
            .finish()
    }
}

/// Invocation request handed over by the scheduler
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub secrets: RequestSecrets,
    #[serde(default)]
    pub state: RunState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub primary_key: Vec<String>,
}

/// Invocation response consumed by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    pub schema: BTreeMap<String, TableSchema>,
    pub state: RunState,
    pub insert: BTreeMap<String, Vec<CompletionRecord>>,
}

impl SyncResponse {
    /// Completion records emitted for `table`, empty if the table is absent
    pub fn records(&self, table: &str) -> &[CompletionRecord] {
        self.insert.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(folder: &str, file_name: &str) -> WorkItem {
        WorkItem {
            call_id: "42".to_string(),
            recording_url: "https://media.example.com/r/42".to_string(),
            file_name: file_name.to_string(),
            folder: folder.to_string(),
            date_started: None,
        }
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2023, 10, 30, 13, 38, 13).unwrap();
        assert_eq!(parse_timestamp("2023-10-30T13:38:13"), Some(expected));
        assert_eq!(parse_timestamp("2023-10-30 13:38:13"), Some(expected));
        assert_eq!(parse_timestamp("2023-10-30T13:38:13Z"), Some(expected));

        let fractional = parse_timestamp("2023-10-30 13:38:13.347135").unwrap();
        assert_eq!(fractional.timestamp_subsec_micros(), 347135);

        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_format_timestamp_uses_microseconds() {
        let at = Utc.with_ymd_and_hms(2023, 10, 30, 13, 38, 13).unwrap();
        assert_eq!(format_timestamp(at), "2023-10-30T13:38:13.000000");
    }

    #[test]
    fn test_run_state_advances() {
        let state = RunState {
            uploaded_to_s3_datetime: Some("2023-10-30T13:38:13".to_string()),
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = state.advanced_to(now);
        assert_eq!(
            next.uploaded_to_s3_datetime.as_deref(),
            Some("2024-01-01T00:00:00.000000")
        );
    }

    #[test]
    fn test_run_state_never_moves_backwards() {
        let state = RunState {
            uploaded_to_s3_datetime: Some("2030-01-01T00:00:00".to_string()),
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = state.advanced_to(now);
        assert_eq!(
            next.uploaded_to_s3_datetime.as_deref(),
            Some("2030-01-01T00:00:00.000000")
        );
    }

    #[test]
    fn test_run_state_from_empty_or_garbage() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expected = Some("2024-01-01T00:00:00.000000".to_string());
        assert_eq!(RunState::default().advanced_to(now).uploaded_to_s3_datetime, expected);

        let garbage = RunState {
            uploaded_to_s3_datetime: Some("not a date".to_string()),
        };
        assert_eq!(garbage.advanced_to(now).uploaded_to_s3_datetime, expected);
    }

    #[test]
    fn test_object_key() {
        assert_eq!(item("2023/10", "call.mp3").object_key(), "2023/10/call.mp3");
        assert_eq!(item("2023/10/", "call.mp3").object_key(), "2023/10/call.mp3");
        assert_eq!(item("", "call.mp3").object_key(), "call.mp3");
    }

    #[test]
    fn test_completion_record_shape() {
        let at = Utc.with_ymd_and_hms(2023, 10, 30, 13, 38, 13).unwrap();
        let record = CompletionRecord::completed(&item("f", "call.mp3"), at);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "call_id": "42",
                "file_name": "call.mp3",
                "uploaded_status_s3": true,
                "uploaded_to_s3_datetime": "2023-10-30T13:38:13.000000"
            })
        );
    }

    #[test]
    fn test_request_without_state() {
        let request: SyncRequest = serde_json::from_value(serde_json::json!({
            "secrets": {"api_key": "k", "user": "lambda_svc", "account": "pk83162"}
        }))
        .unwrap();
        assert_eq!(request.state, RunState::default());
        assert_eq!(request.secrets.user, "lambda_svc");
    }

    #[test]
    fn test_request_secrets_debug_is_redacted() {
        let secrets = RequestSecrets {
            api_key: "super-secret".to_string(),
            user: "lambda_svc".to_string(),
            account: "pk83162".to_string(),
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("lambda_svc"));
    }
}

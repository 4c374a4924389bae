// SQL for the recordings table

/// Columns selected for a [`crate::models::WorkItem`].
///
/// `call_id` and `date_started` are cast so the row decodes regardless of the
/// column types used by the ingestion process.
pub const WORK_ITEM_COLUMNS: &str = r#"CAST(recording.call_id AS TEXT) AS call_id,
        recording.recording_url, recording.file_name, recording.file_folder,
        CAST(recording.date_started AS TIMESTAMP) AS date_started"#;

/// Query selecting the next batch of recordings not yet uploaded.
/// The row limit is bound as `$1`.
///
/// Ordering uses the stored `call_id`, not its text cast, so numeric ids sort
/// numerically. `table` must already be validated as an SQL identifier.
pub fn pending_items(table: &str) -> String {
    format!(
        "SELECT {} FROM {} AS recording \
         WHERE recording.uploaded_status_s3 = false \
         ORDER BY recording.call_id ASC LIMIT $1",
        WORK_ITEM_COLUMNS, table
    )
}

use super::codec;
use super::{RecordStore, StatusCounts};
use crate::common::error::{Result, ScraperError};
use crate::common::types::{Field, MediaRecord, Metadata, RecordStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::debug;

/// SQLite-backed record store.
///
/// Opens a fresh connection for every operation and never holds a
/// transaction across identifiers. Single writer only; concurrent pipelines
/// against the same file can race on upsert.
pub struct SqliteRecordStore {
    db_path: PathBuf,
}

/// Column values as stored, before decoding
struct StoredRow {
    identifier: String,
    fields: Vec<Option<String>>,
    status: String,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SqliteRecordStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { db_path };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn init_schema(&self) -> Result<()> {
        let field_columns: String = Field::ALL
            .iter()
            .map(|f| format!("    {} TEXT,\n", f.as_str()))
            .collect();
        let conn = self.connect()?;
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS media_records (
                identifier     TEXT PRIMARY KEY,
            {field_columns}
                status         TEXT NOT NULL DEFAULT 'PENDING',
                error_message  TEXT,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_media_records_status ON media_records(status);
            "#
        ))?;
        debug!("Record store ready at {}", self.db_path.display());
        Ok(())
    }

    fn select_columns() -> String {
        let fields: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();
        format!(
            "identifier, {}, status, error_message, created_at, updated_at",
            fields.join(", ")
        )
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
        let field_count = Field::ALL.len();
        let mut fields = Vec::with_capacity(field_count);
        for i in 0..field_count {
            fields.push(row.get::<_, Option<String>>(1 + i)?);
        }
        Ok(StoredRow {
            identifier: row.get(0)?,
            fields,
            status: row.get(1 + field_count)?,
            error_message: row.get(2 + field_count)?,
            created_at: row.get(3 + field_count)?,
            updated_at: row.get(4 + field_count)?,
        })
    }

    fn decode_row(row: StoredRow) -> Result<MediaRecord> {
        let StoredRow {
            identifier,
            mut fields,
            status,
            error_message,
            created_at,
            updated_at,
        } = row;
        let metadata = codec::decode_metadata(|field| {
            let index = Field::ALL.iter().position(|f| *f == field).unwrap_or(0);
            Ok(fields.get_mut(index).and_then(Option::take))
        })?;
        Ok(MediaRecord {
            identifier,
            file_location: None,
            metadata,
            status: status.parse()?,
            error_message,
            created_at: parse_timestamp("created_at", &created_at)?,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        })
    }

    fn upsert_sql() -> String {
        let names: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();
        let placeholders: Vec<String> = (0..names.len()).map(|i| format!("?{}", i + 2)).collect();
        let status_param = names.len() + 2;
        let time_param = names.len() + 3;
        let updates: Vec<String> = names
            .iter()
            .map(|n| format!("{n} = COALESCE(excluded.{n}, media_records.{n})"))
            .collect();
        format!(
            "INSERT INTO media_records (identifier, {cols}, status, error_message, created_at, updated_at)
             VALUES (?1, {vals}, ?{status_param}, NULL, ?{time_param}, ?{time_param})
             ON CONFLICT(identifier) DO UPDATE SET
                {updates},
                status = excluded.status,
                error_message = NULL,
                updated_at = excluded.updated_at",
            cols = names.join(", "),
            vals = placeholders.join(", "),
            updates = updates.join(",\n                "),
        )
    }
}

fn now_text() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(column: &str, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ScraperError::Codec {
            column: column.to_string(),
            message: e.to_string(),
        })
}

impl RecordStore for SqliteRecordStore {
    fn exists_and_succeeded(&self, identifier: &str) -> Result<bool> {
        let conn = self.connect()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM media_records WHERE identifier = ?1",
                params![identifier],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.as_deref() == Some(RecordStatus::Success.as_str()))
    }

    fn upsert(&self, identifier: &str, metadata: &Metadata, status: RecordStatus) -> Result<()> {
        let mut values: Vec<Option<String>> = vec![Some(identifier.to_string())];
        values.extend(
            codec::encode_metadata(metadata)?
                .into_iter()
                .map(|(_, column)| column),
        );
        values.push(Some(status.as_str().to_string()));
        values.push(Some(now_text()));

        let conn = self.connect()?;
        conn.execute(&Self::upsert_sql(), params_from_iter(values.iter()))?;
        debug!("Upserted {} as {}", identifier, status);
        Ok(())
    }

    fn mark_failed(&self, identifier: &str, message: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO media_records (identifier, status, error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(identifier) DO UPDATE SET
                status = excluded.status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at",
            params![identifier, RecordStatus::Failed.as_str(), message, now_text()],
        )?;
        debug!("Marked {} as FAILED: {}", identifier, message);
        Ok(())
    }

    fn get(&self, identifier: &str) -> Result<Option<MediaRecord>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM media_records WHERE identifier = ?1",
                    Self::select_columns()
                ),
                params![identifier],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::decode_row).transpose()
    }

    fn register_pending(&self, identifier: &str) -> Result<bool> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO media_records (identifier, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![identifier, RecordStatus::Pending.as_str(), now_text()],
        )?;
        Ok(inserted > 0)
    }

    fn unresolved(&self) -> Result<Vec<MediaRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media_records WHERE status IN (?1, ?2) ORDER BY updated_at, identifier",
            Self::select_columns()
        ))?;
        let rows = stmt
            .query_map(
                params![RecordStatus::Pending.as_str(), RecordStatus::Failed.as_str()],
                Self::read_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Self::decode_row).collect()
    }

    fn counts(&self) -> Result<StatusCounts> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM media_records GROUP BY status")?;
        let mut rows = stmt.query([])?;
        let mut counts = StatusCounts::default();
        while let Some(row) = rows.next()? {
            let status: String = row.get(0)?;
            let count = row.get::<_, i64>(1)? as u64;
            match status.parse::<RecordStatus>()? {
                RecordStatus::Pending => counts.pending = count,
                RecordStatus::Success => counts.success = count,
                RecordStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }
}

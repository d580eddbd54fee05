//! Detection/anomaly record persistence.
//!
//! The kernel itself only emits structured records; this store is the local
//! sink the daemon writes them to. SQLite keeps the original deployment
//! model: one file, no server, queries for the operator views (recent rows,
//! per-type stats), retention pruning, and CSV export.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use std::io::Write;
use std::time::Duration;

use crate::detect::Detection;
use crate::rules::AnomalyEvent;

/// Tables exposed to export. An enum rather than a raw table name keeps
/// arbitrary SQL identifiers out of the query path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordTable {
    Detections,
    Anomalies,
}

impl RecordTable {
    fn name(&self) -> &'static str {
        match self {
            RecordTable::Detections => "detections",
            RecordTable::Anomalies => "anomalies",
        }
    }
}

/// A detection row as read back for operator views.
#[derive(Clone, Debug)]
pub struct DetectionRow {
    pub created_at: u64,
    pub object_type: String,
    pub confidence: f32,
}

/// An anomaly row as read back for operator views.
#[derive(Clone, Debug)]
pub struct AnomalyRow {
    pub created_at: u64,
    pub anomaly_type: String,
    pub description: String,
}

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS detections (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created_at INTEGER NOT NULL,
              object_type TEXT NOT NULL,
              confidence REAL NOT NULL,
              x_min REAL NOT NULL,
              y_min REAL NOT NULL,
              x_max REAL NOT NULL,
              y_max REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS anomalies (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created_at INTEGER NOT NULL,
              anomaly_type TEXT NOT NULL,
              description TEXT NOT NULL,
              x_min REAL NOT NULL,
              y_min REAL NOT NULL,
              x_max REAL NOT NULL,
              y_max REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_detections_created ON detections(created_at);
            CREATE INDEX IF NOT EXISTS idx_anomalies_created ON anomalies(created_at);
            "#,
        )?;
        // Columns added after the first release; existing databases are
        // migrated in place.
        ensure_columns(&self.conn, "detections", &[("frame_number", "INTEGER")])?;
        ensure_columns(
            &self.conn,
            "anomalies",
            &[("frame_number", "INTEGER"), ("severity", "INTEGER")],
        )?;
        Ok(())
    }

    pub fn log_detection(
        &mut self,
        detection: &Detection,
        frame_number: u64,
        created_at: u64,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO detections (created_at, object_type, confidence, x_min, y_min, x_max, y_max, frame_number)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                created_at as i64,
                detection.label,
                detection.confidence,
                detection.bounds.xmin,
                detection.bounds.ymin,
                detection.bounds.xmax,
                detection.bounds.ymax,
                frame_number as i64,
            ],
        )?;
        Ok(())
    }

    pub fn log_anomaly(&mut self, event: &AnomalyEvent, created_at: u64) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO anomalies (created_at, anomaly_type, description, x_min, y_min, x_max, y_max, frame_number, severity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                created_at as i64,
                event.kind.as_str(),
                event.message,
                event.subject.xmin,
                event.subject.ymin,
                event.subject.xmax,
                event.subject.ymax,
                event.frame_number as i64,
                event.severity as i64,
            ],
        )?;
        Ok(())
    }

    pub fn recent_detections(&self, limit: usize) -> Result<Vec<DetectionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT created_at, object_type, confidence FROM detections ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(DetectionRow {
                created_at: row.get::<_, i64>(0)? as u64,
                object_type: row.get(1)?,
                confidence: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn recent_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT created_at, anomaly_type, description FROM anomalies ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AnomalyRow {
                created_at: row.get::<_, i64>(0)? as u64,
                anomaly_type: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Detection counts grouped by object type, optionally restricted to
    /// rows newer than `since` (epoch seconds).
    pub fn detection_stats(&self, since: Option<u64>) -> Result<Vec<(String, u64)>> {
        self.stats("detections", "object_type", since)
    }

    /// Anomaly counts grouped by anomaly type.
    pub fn anomaly_stats(&self, since: Option<u64>) -> Result<Vec<(String, u64)>> {
        self.stats("anomalies", "anomaly_type", since)
    }

    fn stats(
        &self,
        table: &'static str,
        type_column: &'static str,
        since: Option<u64>,
    ) -> Result<Vec<(String, u64)>> {
        let sql = match since {
            Some(_) => format!(
                "SELECT {col}, COUNT(*) FROM {table} WHERE created_at > ?1 GROUP BY {col} ORDER BY {col}",
                col = type_column,
                table = table,
            ),
            None => format!(
                "SELECT {col}, COUNT(*) FROM {table} GROUP BY {col} ORDER BY {col}",
                col = type_column,
                table = table,
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        };
        let mut out = Vec::new();
        match since {
            Some(cutoff) => {
                let rows = stmt.query_map(params![cutoff as i64], map_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let rows = stmt.query_map([], map_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Delete records older than `retention` relative to `now_s`. Returns
    /// the number of rows removed across both tables.
    pub fn enforce_retention(&mut self, retention: Duration, now_s: u64) -> Result<usize> {
        let cutoff = now_s.saturating_sub(retention.as_secs()) as i64;
        let detections = self
            .conn
            .execute("DELETE FROM detections WHERE created_at < ?1", params![cutoff])?;
        let anomalies = self
            .conn
            .execute("DELETE FROM anomalies WHERE created_at < ?1", params![cutoff])?;
        Ok(detections + anomalies)
    }

    /// Dump a table as CSV (header row first). Returns the number of data
    /// rows written.
    pub fn export_csv(&self, table: RecordTable, writer: &mut dyn Write) -> Result<usize> {
        let sql = format!("SELECT * FROM {}", table.name());
        let mut stmt = self.conn.prepare(&sql)?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|c| c.to_string()).collect();
        writeln!(writer, "{}", column_names.join(","))?;

        let column_count = column_names.len();
        let mut rows = stmt.query([])?;
        let mut written = 0usize;
        while let Some(row) = rows.next()? {
            let mut fields = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value = row.get_ref(idx)?;
                fields.push(csv_field(value)?);
            }
            writeln!(writer, "{}", fields.join(","))?;
            written += 1;
        }
        Ok(written)
    }
}

fn csv_field(value: rusqlite::types::ValueRef<'_>) -> Result<String> {
    use rusqlite::types::ValueRef;
    Ok(match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(v) => csv_quote(std::str::from_utf8(v)?),
        ValueRef::Blob(_) => return Err(anyhow!("unexpected blob column in record table")),
    })
}

fn csv_quote(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Add missing columns to an existing table. SQLite has no IF NOT EXISTS
/// for ALTER TABLE, so presence is checked via PRAGMA table_info.
pub fn ensure_columns(
    conn: &Connection,
    table: &str,
    columns: &[(&str, &str)],
) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    let mut existing = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        existing.push(name);
    }
    for (name, col_type) in columns {
        if !existing.iter().any(|c| c == name) {
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {} {}", table, name, col_type),
                [],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::rules::AnomalyKind;

    fn detection() -> Detection {
        Detection::new("person", 0.8, BoundingBox::new(10.0, 10.0, 60.0, 90.0))
    }

    fn anomaly(kind: AnomalyKind, severity: u8) -> AnomalyEvent {
        AnomalyEvent {
            kind,
            message: "test anomaly".to_string(),
            subject: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            frame_number: 4,
            severity,
        }
    }

    #[test]
    fn round_trips_detections_and_anomalies() -> Result<()> {
        let mut store = RecordStore::open_in_memory()?;
        store.log_detection(&detection(), 3, 1_000)?;
        store.log_anomaly(&anomaly(AnomalyKind::Loitering, 2), 1_001)?;

        let detections = store.recent_detections(5)?;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].object_type, "person");

        let anomalies = store.recent_anomalies(5)?;
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, "Loitering");
        Ok(())
    }

    #[test]
    fn stats_group_by_type_and_honor_cutoff() -> Result<()> {
        let mut store = RecordStore::open_in_memory()?;
        store.log_detection(&detection(), 1, 100)?;
        store.log_detection(&detection(), 2, 200)?;
        let mut car = detection();
        car.label = "car".to_string();
        store.log_detection(&car, 3, 300)?;

        let all = store.detection_stats(None)?;
        assert_eq!(all, vec![("car".to_string(), 1), ("person".to_string(), 2)]);

        let recent = store.detection_stats(Some(150))?;
        assert_eq!(
            recent,
            vec![("car".to_string(), 1), ("person".to_string(), 1)]
        );
        Ok(())
    }

    #[test]
    fn retention_removes_only_expired_rows() -> Result<()> {
        let mut store = RecordStore::open_in_memory()?;
        store.log_detection(&detection(), 1, 100)?;
        store.log_detection(&detection(), 2, 5_000)?;
        store.log_anomaly(&anomaly(AnomalyKind::UnusualSize, 1), 100)?;

        let removed = store.enforce_retention(Duration::from_secs(1_000), 5_500)?;
        assert_eq!(removed, 2);
        assert_eq!(store.recent_detections(10)?.len(), 1);
        assert!(store.recent_anomalies(10)?.is_empty());
        Ok(())
    }

    #[test]
    fn csv_export_writes_header_and_rows() -> Result<()> {
        let mut store = RecordStore::open_in_memory()?;
        store.log_anomaly(&anomaly(AnomalyKind::SuspiciousInteraction, 3), 42)?;

        let mut buf = Vec::new();
        let written = store.export_csv(RecordTable::Anomalies, &mut buf)?;
        assert_eq!(written, 1);
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("id,created_at,anomaly_type"));
        assert!(lines.next().unwrap().contains("Suspicious Interaction"));
        Ok(())
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}

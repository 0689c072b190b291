use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::matcher::ReferenceDistrict;
use crate::records::{ReferenceSeed, RosterRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub batch_id: i64,
    pub jurisdiction: String,
    pub source: String,
    pub source_hash: String,
    pub record_count: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordAudit {
    pub record_id: i64,
    pub name: String,
    pub ref_id: Option<String>,
    pub method: Option<String>,
    pub confidence: Option<f64>,
    pub needs_review: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMatchEdge<'a> {
    pub record_id: i64,
    pub ref_id: &'a str,
    pub batch_id: i64,
    pub method: &'a str,
    pub confidence: f64,
    pub needs_review: bool,
    pub detail: &'a str,
}

pub struct RosterStore {
    conn: Connection,
}

impl RosterStore {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )?;

        let version: i64 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            self.create_schema_v1()?;
            self.conn.execute_batch("PRAGMA user_version = 1;")?;
        } else if version == 1 {
            self.create_schema_v1()?;
        } else {
            return Err(rusqlite::Error::InvalidQuery);
        }
        Ok(())
    }

    fn create_schema_v1(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS reference_districts (
                ref_id TEXT NOT NULL PRIMARY KEY,
                jurisdiction TEXT NOT NULL,
                name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reference_jurisdiction
                ON reference_districts(jurisdiction);

            CREATE TABLE IF NOT EXISTS import_batches (
                batch_id INTEGER PRIMARY KEY AUTOINCREMENT,
                jurisdiction TEXT NOT NULL,
                source TEXT NOT NULL,
                source_hash TEXT NOT NULL,
                record_count INTEGER NOT NULL,
                success_count INTEGER NOT NULL DEFAULT 0,
                error_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS roster_records (
                record_id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id INTEGER NOT NULL REFERENCES import_batches(batch_id),
                jurisdiction TEXT NOT NULL,
                name TEXT NOT NULL,
                admin_first_name TEXT,
                admin_last_name TEXT,
                email TEXT,
                phone TEXT,
                payload TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_jurisdiction
                ON roster_records(jurisdiction);
            CREATE INDEX IF NOT EXISTS idx_records_batch
                ON roster_records(batch_id);

            CREATE TABLE IF NOT EXISTS match_edges (
                record_id INTEGER NOT NULL REFERENCES roster_records(record_id),
                ref_id TEXT NOT NULL REFERENCES reference_districts(ref_id),
                batch_id INTEGER NOT NULL REFERENCES import_batches(batch_id),
                method TEXT NOT NULL,
                confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
                needs_review INTEGER NOT NULL CHECK (needs_review IN (0, 1)),
                detail TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                UNIQUE(record_id)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_ref ON match_edges(ref_id);
            CREATE INDEX IF NOT EXISTS idx_edges_batch ON match_edges(batch_id);
            ",
        )?;
        Ok(())
    }

    pub fn upsert_reference(&self, seed: &ReferenceSeed) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO reference_districts (ref_id, jurisdiction, name)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(ref_id) DO UPDATE SET jurisdiction = ?2, name = ?3",
            params![seed.ref_id, seed.jurisdiction.to_lowercase(), seed.name],
        )?;
        Ok(())
    }

    // Ordered by ref_id so a fuzzy score tie resolves to the lowest
    // reference identifier regardless of seed insertion order.
    pub fn reference_candidates(
        &self,
        jurisdiction: &str,
    ) -> rusqlite::Result<Vec<ReferenceDistrict>> {
        let mut stmt = self.conn.prepare(
            "SELECT ref_id, name FROM reference_districts
             WHERE jurisdiction = ?1
             ORDER BY ref_id ASC",
        )?;
        let mut rows = stmt.query(params![jurisdiction.to_lowercase()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(ReferenceDistrict {
                ref_id: row.get(0)?,
                name: row.get(1)?,
            });
        }
        Ok(out)
    }

    pub fn reference_count(&self, jurisdiction: &str) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM reference_districts WHERE jurisdiction = ?1",
            params![jurisdiction.to_lowercase()],
            |row| row.get(0),
        )
    }

    pub fn matched_reference_count(&self, jurisdiction: &str) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(DISTINCT e.ref_id)
             FROM match_edges e
             JOIN reference_districts r ON r.ref_id = e.ref_id
             WHERE r.jurisdiction = ?1",
            params![jurisdiction.to_lowercase()],
            |row| row.get(0),
        )
    }

    pub fn roster_record_count(&self, jurisdiction: &str) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM roster_records WHERE jurisdiction = ?1",
            params![jurisdiction.to_lowercase()],
            |row| row.get(0),
        )
    }

    pub fn create_batch(
        &self,
        jurisdiction: &str,
        source: &str,
        source_hash: &str,
        incoming_count: usize,
    ) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO import_batches (
                jurisdiction, source, source_hash, record_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                jurisdiction.to_lowercase(),
                source,
                source_hash,
                incoming_count as i64,
                now_iso8601()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_record(
        &self,
        batch_id: i64,
        record: &RosterRecord,
        payload: &str,
    ) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO roster_records (
                batch_id, jurisdiction, name, admin_first_name, admin_last_name,
                email, phone, payload, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                batch_id,
                record.jurisdiction.to_lowercase(),
                record.name,
                record.admin_first_name,
                record.admin_last_name,
                record.email,
                record.phone,
                payload,
                now_iso8601()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_match_edge(&self, edge: &NewMatchEdge<'_>) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO match_edges (
                record_id, ref_id, batch_id, method, confidence, needs_review,
                detail, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                edge.record_id,
                edge.ref_id,
                edge.batch_id,
                edge.method,
                edge.confidence,
                if edge.needs_review { 1_i64 } else { 0_i64 },
                edge.detail,
                now_iso8601()
            ],
        )?;
        Ok(())
    }

    // Counters get their final values exactly once, at run end.
    pub fn finalize_batch(
        &self,
        batch_id: i64,
        record_count: usize,
        success_count: usize,
        error_count: usize,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE import_batches
             SET record_count = ?2, success_count = ?3, error_count = ?4
             WHERE batch_id = ?1",
            params![
                batch_id,
                record_count as i64,
                success_count as i64,
                error_count as i64
            ],
        )?;
        Ok(())
    }

    pub fn batches(&self) -> rusqlite::Result<Vec<BatchRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT batch_id, jurisdiction, source, source_hash, record_count,
                    success_count, error_count, created_at
             FROM import_batches
             ORDER BY created_at DESC, batch_id DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(batch_from_row(row)?);
        }
        Ok(out)
    }

    pub fn batch(&self, batch_id: i64) -> rusqlite::Result<Option<BatchRow>> {
        self.conn
            .query_row(
                "SELECT batch_id, jurisdiction, source, source_hash, record_count,
                        success_count, error_count, created_at
                 FROM import_batches
                 WHERE batch_id = ?1",
                params![batch_id],
                batch_from_row,
            )
            .optional()
    }

    pub fn batch_records(&self, batch_id: i64) -> rusqlite::Result<Vec<RecordAudit>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.record_id, r.name, e.ref_id, e.method, e.confidence, e.needs_review
             FROM roster_records r
             LEFT JOIN match_edges e ON e.record_id = r.record_id
             WHERE r.batch_id = ?1
             ORDER BY r.record_id ASC",
        )?;
        let mut rows = stmt.query(params![batch_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(RecordAudit {
                record_id: row.get(0)?,
                name: row.get(1)?,
                ref_id: row.get(2)?,
                method: row.get(3)?,
                confidence: row.get(4)?,
                needs_review: row
                    .get::<_, Option<i64>>(5)?
                    .map(|flag| flag != 0),
            });
        }
        Ok(out)
    }
}

fn batch_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BatchRow> {
    Ok(BatchRow {
        batch_id: row.get(0)?,
        jurisdiction: row.get(1)?,
        source: row.get(2)?,
        source_hash: row.get(3)?,
        record_count: row.get(4)?,
        success_count: row.get(5)?,
        error_count: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

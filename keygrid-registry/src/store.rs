//! Persistent storage for license records, backed by SQLite.
//!
//! One `licenses` table keyed by the surrogate id, with a unique index on
//! `license_key`. The bound machine list is stored as a JSON array in
//! activation order. Timestamps are stored as RFC 3339 text.
//!
//! Each operation runs on its own connection and on-disk stores use WAL
//! journaling, so `check` reads proceed alongside an in-flight activation
//! and operations on unrelated keys never queue behind one lock. Per-key
//! atomicity comes from the IMMEDIATE transaction in
//! [`LicenseStore::modify_record`].

use crate::error::{RegistryError, RegistryResult};
use crate::key::LicenseKey;
use crate::record::{LicenseRecord, LicenseType};
use chrono::{DateTime, Utc};
use keygrid_types::{LicenseId, MachineId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// How long a writer waits for a competing transaction before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent store for license records backed by SQLite.
///
/// Cheap to clone; clones share the same database.
#[derive(Clone)]
pub struct LicenseStore {
    uri: Arc<String>,
    /// Keeps a shared in-memory database alive for the store's lifetime;
    /// `None` for on-disk stores. The mutex is never locked, it only
    /// makes the held connection shareable across threads.
    _anchor: Option<Arc<Mutex<Connection>>>,
}

impl LicenseStore {
    /// Opens (or creates) a license store at the given path.
    pub fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let store = Self {
            uri: Arc::new(path.as_ref().to_string_lossy().into_owned()),
            _anchor: None,
        };
        let conn = store.connect()?;
        // WAL lets readers proceed alongside the single writer; the mode
        // is persisted in the database file.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init_schema(&conn)?;
        Ok(store)
    }

    /// Opens an in-memory license store (for testing).
    pub fn open_in_memory() -> RegistryResult<Self> {
        // A named shared-cache database so that per-operation connections
        // all see the same data; the anchor connection keeps it alive.
        let uri = format!(
            "file:keygrid-mem-{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        let anchor = Connection::open(&uri)?;
        init_schema(&anchor)?;
        Ok(Self {
            uri: Arc::new(uri),
            _anchor: Some(Arc::new(Mutex::new(anchor))),
        })
    }

    fn connect(&self) -> RegistryResult<Connection> {
        let conn = Connection::open(self.uri.as_str())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Inserts a freshly minted record.
    pub fn insert_record(&self, record: &LicenseRecord) -> RegistryResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO licenses (id, license_key, license_type, owner_user_id, starts_at, expires_at, machine_ids, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.license_key.as_str(),
                record.license_type.as_str(),
                record.owner_user_id.map(|u| u.get()),
                format_timestamp(record.starts_at),
                record.expires_at.map(format_timestamp),
                serde_json::to_string(&record.bound_machine_ids)?,
                format_timestamp(record.created_at),
            ],
        )?;
        Ok(())
    }

    /// Looks up a record by license key.
    pub fn record_by_key(&self, key: &LicenseKey) -> RegistryResult<Option<LicenseRecord>> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                "SELECT id, license_key, license_type, owner_user_id, starts_at, expires_at, machine_ids, created_at
                 FROM licenses WHERE license_key = ?1",
                params![key.as_str()],
                read_raw_row,
            )
            .optional()?;
        raw.map(decode_record).transpose()
    }

    /// Loads all records owned by `user_id`, in storage (insertion) order.
    pub fn records_owned_by(&self, user_id: UserId) -> RegistryResult<Vec<LicenseRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, license_key, license_type, owner_user_id, starts_at, expires_at, machine_ids, created_at
             FROM licenses WHERE owner_user_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![user_id.get()], read_raw_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode_record(row?)?);
        }
        Ok(records)
    }

    /// Runs `f` against the record for `key` as a single atomic
    /// read-modify-write. The record (if any) is fetched inside an
    /// immediate transaction; when `f` asks for persistence the mutated
    /// binding fields are written back before commit.
    ///
    /// Two racing activations of the same key therefore serialize: neither
    /// can observe a stale machine list.
    pub fn modify_record<T>(
        &self,
        key: &LicenseKey,
        f: impl FnOnce(Option<&mut LicenseRecord>) -> (T, bool),
    ) -> RegistryResult<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = tx
            .query_row(
                "SELECT id, license_key, license_type, owner_user_id, starts_at, expires_at, machine_ids, created_at
                 FROM licenses WHERE license_key = ?1",
                params![key.as_str()],
                read_raw_row,
            )
            .optional()?;
        let mut record = raw.map(decode_record).transpose()?;

        let (out, persist) = f(record.as_mut());
        if persist {
            if let Some(record) = &record {
                tx.execute(
                    "UPDATE licenses SET owner_user_id = ?1, machine_ids = ?2, starts_at = ?3 WHERE id = ?4",
                    params![
                        record.owner_user_id.map(|u| u.get()),
                        serde_json::to_string(&record.bound_machine_ids)?,
                        format_timestamp(record.starts_at),
                        record.id.to_string(),
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> RegistryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_key TEXT UNIQUE NOT NULL,
            license_type TEXT NOT NULL,
            owner_user_id INTEGER,
            starts_at TEXT NOT NULL,
            expires_at TEXT,
            machine_ids TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Raw column values before domain decoding.
type RawRow = (
    String,
    String,
    String,
    Option<i64>,
    String,
    Option<String>,
    String,
    String,
);

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode_record(raw: RawRow) -> RegistryResult<LicenseRecord> {
    let (id, license_key, license_type, owner_user_id, starts_at, expires_at, machine_ids, created_at) =
        raw;

    let machine_ids: Vec<MachineId> = serde_json::from_str(&machine_ids)?;
    Ok(LicenseRecord {
        id: LicenseId::parse(&id)
            .map_err(|e| RegistryError::InvalidData(format!("bad license id {id}: {e}")))?,
        license_key: LicenseKey::new(license_key),
        license_type: LicenseType::from_str(&license_type).map_err(RegistryError::InvalidData)?,
        owner_user_id: owner_user_id.map(UserId::new),
        starts_at: parse_timestamp(&starts_at)?,
        expires_at: expires_at.as_deref().map(parse_timestamp).transpose()?,
        bound_machine_ids: machine_ids,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Formats a timestamp the way it is stored and sent on the wire.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> RegistryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RegistryError::InvalidData(format!("bad timestamp {s}: {e}")))
}

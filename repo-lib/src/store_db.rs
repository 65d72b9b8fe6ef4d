use crate::{RepoError, RepoResult};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;

/// One persisted row: the URI-encoded name plus the serialized object
/// fields.
#[derive(Debug, Clone)]
pub struct ObjectRow {
    pub key: String,
    pub payload: Vec<u8>,
    pub content_type: String,
    pub signature: Option<Vec<u8>>,
}

/// The ordered key-value engine backing a ContentStore. Keys are the
/// URI-encoded names; ordering is the TEXT primary key order, i.e.
/// lexicographic on the encoded string.
pub struct StoreDb {
    conn: Mutex<Connection>,
}

impl StoreDb {
    /// Open the engine. Read-only mode fails when the db file does not
    /// already exist; read-write mode creates it and the schema.
    pub fn open(db_path: &Path, read_only: bool) -> RepoResult<Self> {
        let conn = if read_only {
            Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| {
                RepoError::Open(format!(
                    "open read-only {} failed: {}",
                    db_path.to_string_lossy(),
                    e
                ))
            })?
        } else {
            let conn = Connection::open(db_path).map_err(|e| {
                RepoError::Open(format!("open {} failed: {}", db_path.to_string_lossy(), e))
            })?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS objects (
                    name TEXT PRIMARY KEY,
                    payload BLOB NOT NULL,
                    content_type TEXT NOT NULL,
                    signature BLOB
                )",
                [],
            )
            .map_err(|e| RepoError::Open(format!("create schema failed: {}", e)))?;
            conn
        };

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn put_object(
        &self,
        key: &str,
        payload: &[u8],
        content_type: &str,
        signature: Option<&[u8]>,
    ) -> RepoResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO objects (name, payload, content_type, signature)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, payload, content_type, signature],
        )
        .map_err(|e| RepoError::Write(format!("put {} failed: {}", key, e)))?;
        Ok(())
    }

    pub fn get_object(&self, key: &str) -> RepoResult<Option<ObjectRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, payload, content_type, signature FROM objects WHERE name = ?1",
        )?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(ObjectRow {
                key: row.get(0)?,
                payload: row.get(1)?,
                content_type: row.get(2)?,
                signature: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    /// Forward scan from `start` in key order, admitting keys while
    /// they keep `prefix` as a literal string prefix. Stops at the
    /// first key past the prefix range.
    pub fn scan_prefix_keys(&self, start: &str, prefix: &str) -> RepoResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT name FROM objects WHERE name >= ?1 ORDER BY name")?;
        let mut rows = stmt.query(params![start])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Full key-space scan for the discovery rebuild: every key plus
    /// its payload size.
    pub fn scan_all(&self) -> RepoResult<Vec<(String, u64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT name, length(payload) FROM objects ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

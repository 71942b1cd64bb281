use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params};

use crate::digest::ContentId;
use crate::error::{Error, Result};
use crate::phash::PerceptualHash;

/// Bumped whenever the on-disk layout or the hash rendering changes. Files
/// of other versions are left where they are and never read.
pub const SCHEMA_VERSION: i64 = 2;

const CREATE_SCHEMA: &str = "
    CREATE TABLE imagehashes (digest TEXT NOT NULL, imagehash TEXT NOT NULL);
    CREATE INDEX imagehashes_digest ON imagehashes (digest);
";

/// Persistent map from content digest to perceptual hash.
///
/// Entries are only ever inserted. The table has no uniqueness constraint,
/// so a digest may appear more than once; lookups take the oldest row.
pub struct HashCache {
    /// Path of the database file on disk.
    pub cache_file: PathBuf,
    conn: Connection,
}

impl HashCache {
    /// File name of the store inside a cache directory.
    pub fn file_name() -> String {
        format!("imagehashcache-v{SCHEMA_VERSION}.db")
    }

    /// Opens the store under `cache_dir`, creating the directory and the
    /// database if they don't exist yet.
    ///
    /// An existing database must carry [`SCHEMA_VERSION`] and the expected
    /// table, otherwise this fails here rather than at the first query.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir).map_err(|e| Error::io(cache_dir, e))?;
        let cache_file = cache_dir.join(Self::file_name());
        let mut conn = Connection::open(&cache_file)?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        let has_table = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'imagehashes'",
                [],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if version == 0 && !has_table {
            info!("Creating hash cache at {}", cache_file.display());
            let tx = conn.transaction()?;
            tx.execute_batch(CREATE_SCHEMA)?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tx.commit()?;
        } else if version != SCHEMA_VERSION {
            return Err(Error::CacheVersion {
                path: cache_file,
                found: version,
                expected: SCHEMA_VERSION,
            });
        } else {
            check_columns(&conn, &cache_file)?;
        }

        let cache = Self { cache_file, conn };
        info!(
            "Hash cache {} has {} entries",
            cache.cache_file.display(),
            cache.len()?
        );
        Ok(cache)
    }

    pub fn lookup(&self, id: &ContentId) -> Result<Option<PerceptualHash>> {
        let hash = self
            .conn
            .prepare_cached(
                "SELECT imagehash FROM imagehashes WHERE digest = ?1 ORDER BY rowid LIMIT 1",
            )?
            .query_row([id.as_str()], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(hash.map(PerceptualHash::from))
    }

    /// Inserts all entries in a single transaction: either every entry is
    /// visible afterwards or none is.
    pub fn insert_all(&mut self, entries: &[(ContentId, PerceptualHash)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO imagehashes (digest, imagehash) VALUES (?1, ?2)")?;
            for (id, hash) in entries {
                stmt.execute(params![id.as_str(), hash.as_str()])?;
            }
        }
        tx.commit()?;
        debug!("Stored {} new perceptual hashes", entries.len());
        Ok(())
    }

    /// Number of rows in the store.
    pub fn len(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM imagehashes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn check_columns(conn: &Connection, cache_file: &Path) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('imagehashes')")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for expected in ["digest", "imagehash"] {
        if !columns.iter().any(|c| c == expected) {
            return Err(Error::CacheSchema {
                path: cache_file.to_path_buf(),
                detail: format!("table imagehashes has no '{expected}' column"),
            });
        }
    }
    Ok(())
}

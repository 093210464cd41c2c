//! Observation storage using SQLite + USearch hybrid approach
//!
//! SQLite stores the source of truth (observation text, timing, embedding
//! bytes, video summaries). USearch provides fast vector similarity search via
//! an HNSW index keyed by SQLite rowid. Searches are restricted to the rowids
//! of one video and modality with a filtered index search.

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};
use uuid::Uuid;
use zerocopy::AsBytes;

use super::pool::ConnectionPool;
use super::{
    CallBudget, Modality, Observation, ObservationSink, ObservationStore, ScoredCandidate,
    StoreError,
};
use crate::cancel::CancelToken;
use crate::config::StoreSection;

/// Writes are not on the query path; they get a generous pool wait
const WRITE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Row data for a search hit (id, modality, timestamp, end_timestamp, text)
type CandidateRow = (String, String, f64, Option<f64>, String);

/// Dual storage for observations: SQLite + USearch
pub struct SqliteObservationStore {
    pool: ConnectionPool,
    vectors: Mutex<Index>,
    index_path: PathBuf,
    dimension: usize,
}

impl SqliteObservationStore {
    /// Open or create observation storage under `section.path`
    ///
    /// Creates two files:
    /// - `{path}/observations.db` - SQLite database
    /// - `{path}/observations.usearch` - USearch vector index
    ///
    /// The index is rebuilt from SQLite when it is missing or holds a
    /// different number of vectors than the database.
    pub fn open(section: &StoreSection) -> Result<Self> {
        let base = section.resolved_path();
        std::fs::create_dir_all(&base)
            .with_context(|| format!("Failed to create store directory {}", base.display()))?;

        let db_path = base.join("observations.db");
        {
            let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;
            Self::init_schema(&conn)?;
        }
        let pool = ConnectionPool::open(&db_path, section.pool_size)?;

        let index = new_index(section.dimensions)?;
        let index_path = base.join("observations.usearch");
        if index_path.exists() {
            index
                .load(path_str(&index_path)?)
                .context("Failed to load existing USearch index")?;
        }

        let store = Self {
            pool,
            vectors: Mutex::new(index),
            index_path,
            dimension: section.dimensions,
        };

        let stored = store.count_all()?;
        let indexed = store.vectors.lock().size();
        if stored != indexed {
            tracing::info!(stored, indexed, "observation index out of sync, rebuilding");
            store.rebuild_index()?;
        }

        Ok(store)
    }

    /// Initialize SQLite schema
    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS observations (
                rowid INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                video_id TEXT NOT NULL,
                modality TEXT NOT NULL,
                timestamp REAL NOT NULL,
                end_timestamp REAL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_observations_video_modality
                ON observations(video_id, modality);
            CREATE TABLE IF NOT EXISTS video_summaries (
                video_id TEXT PRIMARY KEY,
                summary TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .context("Failed to initialize observation schema")?;

        Ok(())
    }

    /// Save USearch index to disk
    pub fn save_index(&self) -> Result<()> {
        self.vectors
            .lock()
            .save(path_str(&self.index_path)?)
            .context("Failed to save USearch index")?;
        Ok(())
    }

    /// Rebuild the USearch index from the embeddings stored in SQLite
    pub fn rebuild_index(&self) -> Result<()> {
        let conn = self.write_connection()?;
        let mut stmt = conn.prepare("SELECT rowid, embedding FROM observations")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let index = new_index(self.dimension)?;
        index.reserve(rows.len().max(1))?;
        for (rowid, bytes) in rows {
            let embedding = embedding_from_bytes(&bytes);
            index
                .add(rowid as u64, &embedding)
                .with_context(|| format!("Failed to index observation row {}", rowid))?;
        }

        *self.vectors.lock() = index;
        self.save_index()
    }

    /// Total number of stored observations
    pub fn count_all(&self) -> Result<usize> {
        let conn = self.write_connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn write_connection(&self) -> Result<super::pool::PooledConnection<'_>> {
        self.pool
            .acquire(WRITE_ACQUIRE_TIMEOUT)
            .ok_or_else(|| anyhow!("Timed out waiting for a database connection"))
    }

    /// Rowids of one video's observations of one modality
    fn candidate_keys(
        conn: &Connection,
        video_id: &str,
        modality: Modality,
    ) -> rusqlite::Result<HashSet<u64>> {
        let mut stmt = conn
            .prepare_cached("SELECT rowid FROM observations WHERE video_id = ?1 AND modality = ?2")?;
        let keys = stmt
            .query_map(params![video_id, modality.as_str()], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|rowid| rowid as u64))
            .collect();
        keys
    }

    /// Load the displayable part of an observation by rowid
    fn load_candidate(conn: &Connection, rowid: u64) -> rusqlite::Result<Option<CandidateRow>> {
        conn.prepare_cached(
            "SELECT id, modality, timestamp, end_timestamp, text FROM observations WHERE rowid = ?1",
        )?
        .query_row(params![rowid as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .optional()
    }
}

impl ObservationStore for SqliteObservationStore {
    fn search(
        &self,
        video_id: &str,
        modality: Modality,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        let budget = CallBudget::new(timeout, cancel);
        budget.checkpoint()?;

        if query_embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }

        let conn = self
            .pool
            .acquire(budget.remaining())
            .ok_or(StoreError::Timeout(timeout))?;

        let keys = Self::candidate_keys(&conn, video_id, modality)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        budget.checkpoint()?;

        let matches = self
            .vectors
            .lock()
            .filtered_search(query_embedding, top_k.min(keys.len()), |key| {
                keys.contains(&key)
            })
            .map_err(|e| StoreError::Backend(anyhow!("USearch filtered search failed: {}", e)))?;

        let mut candidates = Vec::with_capacity(matches.keys.len());
        for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            budget.checkpoint()?;

            // Cosine distance -> similarity
            let score = 1.0 - distance;
            if score < min_score {
                continue;
            }

            let Some((id, stored_modality, timestamp, end_timestamp, text)) =
                Self::load_candidate(&conn, *key)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?
            else {
                continue;
            };

            let observation_id = Uuid::parse_str(&id)
                .with_context(|| format!("Corrupt observation id '{}'", id))?;
            let modality = Modality::parse(&stored_modality)
                .ok_or_else(|| anyhow!("Corrupt modality '{}' for {}", stored_modality, id))?;

            candidates.push(ScoredCandidate {
                observation_id,
                modality,
                timestamp,
                end_timestamp,
                text,
                score,
            });
        }

        Ok(candidates)
    }

    fn get_summary(
        &self,
        video_id: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<String>, StoreError> {
        let budget = CallBudget::new(timeout, cancel);
        budget.checkpoint()?;

        let conn = self
            .pool
            .acquire(budget.remaining())
            .ok_or(StoreError::Timeout(timeout))?;

        let summary = conn
            .query_row(
                "SELECT summary FROM video_summaries WHERE video_id = ?1",
                params![video_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        budget.checkpoint()?;
        Ok(summary)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl ObservationSink for SqliteObservationStore {
    fn insert_all(&self, observations: &[Observation]) -> Result<()> {
        for observation in observations {
            if let Err(reason) = observation.validate(self.dimension) {
                anyhow::bail!("Rejected observation {}: {}", observation.id, reason);
            }
        }

        let conn = self.write_connection()?;
        let tx = conn.unchecked_transaction()?;
        let mut rowids = Vec::with_capacity(observations.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO observations
                    (id, video_id, modality, timestamp, end_timestamp, text, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING rowid",
            )?;
            let created_at = chrono::Utc::now().to_rfc3339();
            for observation in observations {
                let rowid: i64 = stmt
                    .query_row(
                        params![
                            observation.id.to_string(),
                            &observation.video_id,
                            observation.modality.as_str(),
                            observation.timestamp,
                            observation.end_timestamp,
                            &observation.text,
                            observation.embedding.as_slice().as_bytes(),
                            &created_at,
                        ],
                        |row| row.get(0),
                    )
                    .with_context(|| format!("Failed to insert observation {}", observation.id))?;
                rowids.push(rowid);
            }
        }
        tx.commit().context("Failed to commit observations")?;

        // Insert into USearch (vector index) using rowid as key. A failure here
        // leaves the index short of SQLite; it is rebuilt on the next open.
        let vectors = self.vectors.lock();
        let needed = vectors.size() + observations.len();
        if needed > vectors.capacity() {
            vectors.reserve(needed.max(vectors.capacity() * 2).max(1024))?;
        }
        for (rowid, observation) in rowids.iter().zip(observations) {
            vectors
                .add(*rowid as u64, &observation.embedding)
                .context("Failed to add vector to USearch index")?;
        }

        Ok(())
    }

    fn put_summary(&self, video_id: &str, summary: &str) -> Result<()> {
        let conn = self.write_connection()?;
        conn.execute(
            "INSERT INTO video_summaries (video_id, summary, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(video_id) DO UPDATE SET
                summary = excluded.summary,
                created_at = excluded.created_at",
            params![video_id, summary, chrono::Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("Failed to store summary for video {}", video_id))?;
        Ok(())
    }

    fn count(&self, video_id: &str, modality: Modality) -> Result<usize> {
        let conn = self.write_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM observations WHERE video_id = ?1 AND modality = ?2",
            params![video_id, modality.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn new_index(dimensions: usize) -> Result<Index> {
    let options = IndexOptions {
        dimensions,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        ..Default::default()
    };
    let index = Index::new(&options).context("Failed to create USearch index")?;
    index.reserve(1024)?;
    Ok(index)
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("Index path is not valid UTF-8: {}", path.display()))
}

/// Decode an embedding written with `as_bytes` (native-endian f32)
fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn section(temp: &TempDir) -> StoreSection {
        StoreSection {
            path: temp.path().to_string_lossy().into_owned(),
            dimensions: 4,
            pool_size: 2,
        }
    }

    #[test]
    fn test_store_creation() -> Result<()> {
        let temp = TempDir::new()?;
        let store = SqliteObservationStore::open(&section(&temp))?;
        assert_eq!(store.count_all()?, 0);
        assert_eq!(store.dimension(), 4);
        Ok(())
    }

    #[test]
    fn test_search_filters_by_video_and_modality() -> Result<()> {
        let temp = TempDir::new()?;
        let store = SqliteObservationStore::open(&section(&temp))?;

        store.insert(&Observation::visual("v1", 0.0, "a man in a black shirt", vec![1.0, 0.0, 0.0, 0.0]))?;
        store.insert(&Observation::audio("v1", 0.5, 3.0, "discussing a problem", vec![1.0, 0.0, 0.0, 0.0]))?;
        store.insert(&Observation::visual("v2", 0.0, "another video", vec![1.0, 0.0, 0.0, 0.0]))?;

        let hits = store
            .search("v1", Modality::Visual, &[1.0, 0.0, 0.0, 0.0], 10, 0.0, TIMEOUT, &CancelToken::new())
            .map_err(|e| anyhow!(e))?;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "a man in a black shirt");
        assert_eq!(hits[0].modality, Modality::Visual);
        assert_relative_eq!(hits[0].score, 1.0, epsilon = 1e-4);

        let audio = store
            .search("v1", Modality::Audio, &[1.0, 0.0, 0.0, 0.0], 10, 0.0, TIMEOUT, &CancelToken::new())
            .map_err(|e| anyhow!(e))?;
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].end_timestamp, Some(3.0));
        Ok(())
    }

    #[test]
    fn test_search_unknown_video_is_empty() -> Result<()> {
        let temp = TempDir::new()?;
        let store = SqliteObservationStore::open(&section(&temp))?;
        store.insert(&Observation::visual("v1", 0.0, "frame", vec![0.0, 1.0, 0.0, 0.0]))?;

        let hits = store
            .search("missing", Modality::Visual, &[0.0, 1.0, 0.0, 0.0], 10, 0.0, TIMEOUT, &CancelToken::new())
            .map_err(|e| anyhow!(e))?;
        assert!(hits.is_empty());
        Ok(())
    }

    #[test]
    fn test_reopen_rebuilds_missing_index() -> Result<()> {
        let temp = TempDir::new()?;
        {
            let store = SqliteObservationStore::open(&section(&temp))?;
            store.insert(&Observation::visual("v1", 1.0, "frame", vec![0.0, 0.0, 1.0, 0.0]))?;
            // Index deliberately not saved
        }

        let store = SqliteObservationStore::open(&section(&temp))?;
        let hits = store
            .search("v1", Modality::Visual, &[0.0, 0.0, 1.0, 0.0], 10, 0.0, TIMEOUT, &CancelToken::new())
            .map_err(|e| anyhow!(e))?;
        assert_eq!(hits.len(), 1);
        Ok(())
    }

    #[test]
    fn test_failed_batch_writes_nothing() -> Result<()> {
        let temp = TempDir::new()?;
        let store = SqliteObservationStore::open(&section(&temp))?;
        let frame = Observation::visual("v1", 0.0, "frame", vec![1.0, 0.0, 0.0, 0.0]);

        // Invalid entry: rejected before any write
        let backwards = Observation::audio("v1", 5.0, 4.0, "speech", vec![0.0, 1.0, 0.0, 0.0]);
        assert!(store.insert_all(&[frame.clone(), backwards]).is_err());
        assert_eq!(store.count_all()?, 0);

        // Duplicate id: fails inside the transaction, which rolls back
        assert!(store.insert_all(&[frame.clone(), frame.clone()]).is_err());
        assert_eq!(store.count_all()?, 0);

        store.insert_all(&[frame])?;
        assert_eq!(store.count("v1", Modality::Visual)?, 1);
        let hits = store
            .search("v1", Modality::Visual, &[1.0, 0.0, 0.0, 0.0], 10, 0.0, TIMEOUT, &CancelToken::new())
            .map_err(|e| anyhow!(e))?;
        assert_eq!(hits.len(), 1);
        Ok(())
    }

    #[test]
    fn test_summary_upsert() -> Result<()> {
        let temp = TempDir::new()?;
        let store = SqliteObservationStore::open(&section(&temp))?;
        let cancel = CancelToken::new();

        assert!(store.get_summary("v1", TIMEOUT, &cancel).map_err(|e| anyhow!(e))?.is_none());

        store.put_summary("v1", "first")?;
        store.put_summary("v1", "second")?;
        let summary = store.get_summary("v1", TIMEOUT, &cancel).map_err(|e| anyhow!(e))?;
        assert_eq!(summary.as_deref(), Some("second"));
        Ok(())
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let embedding = vec![1.0f32, -2.5, 0.125];
        assert_eq!(embedding_from_bytes(embedding.as_slice().as_bytes()), embedding);
    }
}

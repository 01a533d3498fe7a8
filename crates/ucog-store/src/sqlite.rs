//! Durable chunk store backed by SQLite.
//!
//! Single-writer embedded database with write-ahead logging. Chunk rows,
//! LSH bands, co-occurrence edges, data→chunks edges, and the cold archive
//! all live in one file; the in-memory LSH index and the hot-tier pin
//! cache are rebuilt from non-cold rows at open.
//!
//! Hot-tier hits mutate the pinned entry without a durable write; pinned
//! counters are written back when a pin is demoted.

use crate::cold::{deflate, inflate};
use crate::lsh::{extract_bands, LshIndex};
use crate::{jaccard, now_secs, CogStore};
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use ucog_core::{
    simhash64, ChunkEntry, Error, Result, Sha256Digest, StoreStats, Tier, TierPolicy,
    SIMILARITY_THRESHOLD,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id INTEGER PRIMARY KEY AUTOINCREMENT,
    sha256 BLOB NOT NULL UNIQUE,
    simhash INTEGER NOT NULL,
    data BLOB NOT NULL,
    size_bytes INTEGER NOT NULL,
    ref_count INTEGER NOT NULL DEFAULT 1,
    last_access INTEGER NOT NULL DEFAULT 0,
    tier TEXT NOT NULL DEFAULT 'warm'
);
CREATE INDEX IF NOT EXISTS idx_chunks_simhash ON chunks(simhash);
CREATE INDEX IF NOT EXISTS idx_chunks_tier ON chunks(tier);

CREATE TABLE IF NOT EXISTS lsh_bands (
    band_id INTEGER NOT NULL,
    band_value INTEGER NOT NULL,
    chunk_id INTEGER NOT NULL REFERENCES chunks(chunk_id),
    PRIMARY KEY (band_id, band_value, chunk_id)
);
CREATE INDEX IF NOT EXISTS idx_lsh_lookup ON lsh_bands(band_id, band_value);

CREATE TABLE IF NOT EXISTS cooccurrence (
    chunk_a INTEGER NOT NULL,
    chunk_b INTEGER NOT NULL,
    count INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (chunk_a, chunk_b)
);
CREATE INDEX IF NOT EXISTS idx_cooccur_a ON cooccurrence(chunk_a);

CREATE TABLE IF NOT EXISTS data_chunks (
    data_id TEXT NOT NULL,
    chunk_id INTEGER NOT NULL,
    PRIMARY KEY (data_id, chunk_id)
);
CREATE INDEX IF NOT EXISTS idx_data_chunks_chunk ON data_chunks(chunk_id);

CREATE TABLE IF NOT EXISTS cold_archive (
    chunk_id INTEGER PRIMARY KEY REFERENCES chunks(chunk_id),
    compressed_data BLOB NOT NULL,
    original_size INTEGER NOT NULL
);
";

fn db_err(err: rusqlite::Error) -> Error {
    Error::Database(err.to_string())
}

struct HotChunk {
    sha256: Sha256Digest,
    simhash: u64,
    data: Bytes,
    ref_count: u64,
    last_access: i64,
}

struct RawRow {
    chunk_id: u64,
    sha256: Sha256Digest,
    simhash: u64,
    data: Vec<u8>,
    ref_count: u64,
    last_access: i64,
    tier: Tier,
}

/// Durable chunk store on SQLite.
pub struct SqliteCogStore {
    conn: Connection,
    policy: TierPolicy,
    lsh: LshIndex,
    hot: HashMap<u64, HotChunk>,
    hot_by_sha: HashMap<Sha256Digest, u64>,
}

impl SqliteCogStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>, policy: TierPolicy) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        Self::init(conn, policy)
    }

    /// Open a transient in-memory database (tests).
    pub fn open_in_memory(policy: TierPolicy) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, policy)
    }

    fn init(conn: Connection, policy: TierPolicy) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        let mut store = Self {
            conn,
            policy,
            lsh: LshIndex::new(),
            hot: HashMap::new(),
            hot_by_sha: HashMap::new(),
        };
        store.rebuild_lsh()?;
        store.load_hot()?;
        Ok(store)
    }

    fn rebuild_lsh(&mut self) -> Result<()> {
        let entries = {
            let mut stmt = self
                .conn
                .prepare("SELECT chunk_id, simhash FROM chunks WHERE tier != 'cold'")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64))
                })
                .map_err(db_err)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(db_err)?);
            }
            entries
        };
        self.lsh.rebuild(entries);
        Ok(())
    }

    fn load_hot(&mut self) -> Result<()> {
        let pins = {
            let mut stmt = self
                .conn
                .prepare(
                    "SELECT chunk_id, sha256, simhash, data, ref_count, last_access \
                     FROM chunks WHERE ref_count >= ?1 AND tier != 'cold' \
                     ORDER BY ref_count DESC LIMIT ?2",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(
                    params![
                        self.policy.hot_min_ref_count as i64,
                        self.policy.hot_max_chunks as i64
                    ],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)? as u64,
                            row.get::<_, Vec<u8>>(1)?,
                            row.get::<_, i64>(2)? as u64,
                            row.get::<_, Vec<u8>>(3)?,
                            row.get::<_, i64>(4)? as u64,
                            row.get::<_, i64>(5)?,
                        ))
                    },
                )
                .map_err(db_err)?;
            let mut pins = Vec::new();
            for row in rows {
                pins.push(row.map_err(db_err)?);
            }
            pins
        };

        for (chunk_id, sha, simhash, data, ref_count, last_access) in pins {
            self.conn
                .execute(
                    "UPDATE chunks SET tier = 'hot' WHERE chunk_id = ?1",
                    params![chunk_id as i64],
                )
                .map_err(db_err)?;
            let sha256 = Sha256Digest::from_slice(&sha);
            self.hot_by_sha.insert(sha256, chunk_id);
            self.hot.insert(
                chunk_id,
                HotChunk {
                    sha256,
                    simhash,
                    data: Bytes::from(data),
                    ref_count,
                    last_access,
                },
            );
        }
        Ok(())
    }

    fn map_raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
        let sha: Vec<u8> = row.get(1)?;
        let tier: String = row.get(6)?;
        Ok(RawRow {
            chunk_id: row.get::<_, i64>(0)? as u64,
            sha256: Sha256Digest::from_slice(&sha),
            simhash: row.get::<_, i64>(2)? as u64,
            data: row.get(3)?,
            ref_count: row.get::<_, i64>(4)? as u64,
            last_access: row.get(5)?,
            tier: Tier::parse(&tier).unwrap_or(Tier::Warm),
        })
    }

    fn row_by_sha(&self, sha256: &Sha256Digest) -> Result<Option<RawRow>> {
        self.conn
            .query_row(
                "SELECT chunk_id, sha256, simhash, data, ref_count, last_access, tier \
                 FROM chunks WHERE sha256 = ?1",
                params![sha256.as_bytes().as_slice()],
                Self::map_raw_row,
            )
            .optional()
            .map_err(db_err)
    }

    fn row_by_id(&self, chunk_id: u64) -> Result<Option<RawRow>> {
        self.conn
            .query_row(
                "SELECT chunk_id, sha256, simhash, data, ref_count, last_access, tier \
                 FROM chunks WHERE chunk_id = ?1",
                params![chunk_id as i64],
                Self::map_raw_row,
            )
            .optional()
            .map_err(db_err)
    }

    fn entry_from_row(&self, row: RawRow) -> Result<ChunkEntry> {
        let data = if row.tier == Tier::Cold {
            let compressed: Vec<u8> = self
                .conn
                .query_row(
                    "SELECT compressed_data FROM cold_archive WHERE chunk_id = ?1",
                    params![row.chunk_id as i64],
                    |r| r.get(0),
                )
                .optional()
                .map_err(db_err)?
                .ok_or(Error::ArchiveRead(row.chunk_id))?;
            Bytes::from(inflate(&compressed)?)
        } else {
            Bytes::from(row.data)
        };
        Ok(ChunkEntry {
            chunk_id: row.chunk_id,
            sha256: row.sha256,
            simhash: row.simhash,
            data,
            ref_count: row.ref_count,
            last_access: row.last_access,
            tier: row.tier,
        })
    }

    fn maybe_promote(&mut self, entry: &ChunkEntry) -> Result<()> {
        if entry.tier == Tier::Cold
            || entry.ref_count < self.policy.hot_min_ref_count
            || self.hot.contains_key(&entry.chunk_id)
        {
            return Ok(());
        }
        if self.hot.len() >= self.policy.hot_max_chunks {
            let victim = self
                .hot
                .iter()
                .min_by_key(|(_, pin)| pin.last_access)
                .map(|(&id, _)| id);
            if let Some(victim) = victim {
                if let Some(pin) = self.hot.remove(&victim) {
                    self.hot_by_sha.remove(&pin.sha256);
                    // Write back the pinned counters before demoting.
                    self.conn
                        .execute(
                            "UPDATE chunks SET tier = 'warm', ref_count = ?1, last_access = ?2 \
                             WHERE chunk_id = ?3",
                            params![pin.ref_count as i64, pin.last_access, victim as i64],
                        )
                        .map_err(db_err)?;
                    tracing::debug!(chunk_id = victim, "hot tier full, demoting to warm");
                }
            }
        }
        self.conn
            .execute(
                "UPDATE chunks SET tier = 'hot' WHERE chunk_id = ?1",
                params![entry.chunk_id as i64],
            )
            .map_err(db_err)?;
        self.hot_by_sha.insert(entry.sha256, entry.chunk_id);
        self.hot.insert(
            entry.chunk_id,
            HotChunk {
                sha256: entry.sha256,
                simhash: entry.simhash,
                data: entry.data.clone(),
                ref_count: entry.ref_count,
                last_access: entry.last_access,
            },
        );
        Ok(())
    }

    /// Rank registered payload ids by Jaccard overlap with the target.
    pub fn find_structurally_similar(
        &mut self,
        data_id: &str,
        threshold: f64,
    ) -> Result<Vec<(String, f64)>> {
        let target = self.get_chunk_ids_for_data(data_id)?;
        if target.is_empty() {
            return Ok(Vec::new());
        }

        let others = {
            let mut stmt = self
                .conn
                .prepare_cached(
                    "SELECT DISTINCT d2.data_id FROM data_chunks d1 \
                     JOIN data_chunks d2 USING (chunk_id) \
                     WHERE d1.data_id = ?1 AND d2.data_id != ?1",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![data_id], |row| row.get::<_, String>(0))
                .map_err(db_err)?;
            let mut others = Vec::new();
            for row in rows {
                others.push(row.map_err(db_err)?);
            }
            others
        };

        let mut results = Vec::new();
        for other in others {
            let score = jaccard(&target, &self.get_chunk_ids_for_data(&other)?);
            if score >= threshold {
                results.push((other, score));
            }
        }
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(results)
    }
}

impl CogStore for SqliteCogStore {
    fn lookup_exact(&mut self, sha256: &Sha256Digest) -> Result<Option<ChunkEntry>> {
        if let Some(&chunk_id) = self.hot_by_sha.get(sha256) {
            if let Some(pin) = self.hot.get_mut(&chunk_id) {
                pin.ref_count += 1;
                pin.last_access = now_secs();
                return Ok(Some(ChunkEntry {
                    chunk_id,
                    sha256: pin.sha256,
                    simhash: pin.simhash,
                    data: pin.data.clone(),
                    ref_count: pin.ref_count,
                    last_access: pin.last_access,
                    tier: Tier::Hot,
                }));
            }
        }

        let Some(row) = self.row_by_sha(sha256)? else {
            return Ok(None);
        };
        let now = now_secs();
        self.conn
            .execute(
                "UPDATE chunks SET ref_count = ref_count + 1, last_access = ?1 WHERE chunk_id = ?2",
                params![now, row.chunk_id as i64],
            )
            .map_err(db_err)?;
        let mut entry = self.entry_from_row(row)?;
        entry.ref_count += 1;
        entry.last_access = now;
        self.maybe_promote(&entry)?;
        Ok(Some(entry))
    }

    fn lookup_similar(&mut self, simhash: u64) -> Result<Option<ChunkEntry>> {
        let Some(chunk_id) = self.lsh.query_nearest(simhash, SIMILARITY_THRESHOLD) else {
            return Ok(None);
        };
        self.conn
            .execute(
                "UPDATE chunks SET last_access = ?1 WHERE chunk_id = ?2",
                params![now_secs(), chunk_id as i64],
            )
            .map_err(db_err)?;
        self.get(chunk_id)
    }

    fn store(&mut self, data: &[u8]) -> Result<ChunkEntry> {
        let sha256 = Sha256Digest::of(data);
        let now = now_secs();

        if let Some(&chunk_id) = self.hot_by_sha.get(&sha256) {
            if let Some(pin) = self.hot.get_mut(&chunk_id) {
                pin.ref_count += 1;
                pin.last_access = now;
                let entry = ChunkEntry {
                    chunk_id,
                    sha256: pin.sha256,
                    simhash: pin.simhash,
                    data: pin.data.clone(),
                    ref_count: pin.ref_count,
                    last_access: now,
                    tier: Tier::Hot,
                };
                self.conn
                    .execute(
                        "UPDATE chunks SET ref_count = ref_count + 1, last_access = ?1 \
                         WHERE chunk_id = ?2",
                        params![now, chunk_id as i64],
                    )
                    .map_err(db_err)?;
                return Ok(entry);
            }
        }

        if let Some(row) = self.row_by_sha(&sha256)? {
            self.conn
                .execute(
                    "UPDATE chunks SET ref_count = ref_count + 1, last_access = ?1 \
                     WHERE chunk_id = ?2",
                    params![now, row.chunk_id as i64],
                )
                .map_err(db_err)?;
            let mut entry = self.entry_from_row(row)?;
            entry.ref_count += 1;
            entry.last_access = now;
            self.maybe_promote(&entry)?;
            return Ok(entry);
        }

        let simhash = simhash64(data);
        self.conn
            .execute(
                "INSERT INTO chunks (sha256, simhash, data, size_bytes, ref_count, last_access, tier) \
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, 'warm')",
                params![
                    sha256.as_bytes().as_slice(),
                    simhash as i64,
                    data,
                    data.len() as i64,
                    now
                ],
            )
            .map_err(db_err)?;
        let chunk_id = self.conn.last_insert_rowid() as u64;

        {
            let mut stmt = self
                .conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO lsh_bands (band_id, band_value, chunk_id) \
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(db_err)?;
            for (band_id, band_value) in extract_bands(simhash).into_iter().enumerate() {
                stmt.execute(params![band_id as i64, band_value as i64, chunk_id as i64])
                    .map_err(db_err)?;
            }
        }
        self.lsh.insert(chunk_id, simhash);

        Ok(ChunkEntry {
            chunk_id,
            sha256,
            simhash,
            data: Bytes::copy_from_slice(data),
            ref_count: 1,
            last_access: now,
            tier: Tier::Warm,
        })
    }

    fn get(&mut self, chunk_id: u64) -> Result<Option<ChunkEntry>> {
        if let Some(pin) = self.hot.get(&chunk_id) {
            return Ok(Some(ChunkEntry {
                chunk_id,
                sha256: pin.sha256,
                simhash: pin.simhash,
                data: pin.data.clone(),
                ref_count: pin.ref_count,
                last_access: pin.last_access,
                tier: Tier::Hot,
            }));
        }
        let Some(row) = self.row_by_id(chunk_id)? else {
            return Ok(None);
        };
        self.entry_from_row(row).map(Some)
    }

    fn record_cooccurrence(&mut self, chunk_ids: &[u64]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO cooccurrence (chunk_a, chunk_b, count) VALUES (?1, ?2, 1) \
                 ON CONFLICT(chunk_a, chunk_b) DO UPDATE SET count = count + 1",
            )
            .map_err(db_err)?;
        for &a in chunk_ids {
            for &b in chunk_ids {
                if a == b {
                    continue;
                }
                stmt.execute(params![a as i64, b as i64]).map_err(db_err)?;
            }
        }
        Ok(())
    }

    fn get_predicted_chunks(&mut self, chunk_id: u64, top_k: usize) -> Result<Vec<ChunkEntry>> {
        let ids = {
            let mut stmt = self
                .conn
                .prepare_cached(
                    "SELECT chunk_b FROM cooccurrence WHERE chunk_a = ?1 \
                     ORDER BY count DESC, chunk_b ASC LIMIT ?2",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![chunk_id as i64, top_k as i64], |row| {
                    Ok(row.get::<_, i64>(0)? as u64)
                })
                .map_err(db_err)?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row.map_err(db_err)?);
            }
            ids
        };

        let mut entries = Vec::new();
        for id in ids {
            if let Some(entry) = self.get(id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn register_data_chunks(&mut self, data_id: &str, chunk_ids: &BTreeSet<u64>) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO data_chunks (data_id, chunk_id) VALUES (?1, ?2)")
            .map_err(db_err)?;
        for &chunk_id in chunk_ids {
            stmt.execute(params![data_id, chunk_id as i64])
                .map_err(db_err)?;
        }
        Ok(())
    }

    fn get_chunk_ids_for_data(&mut self, data_id: &str) -> Result<BTreeSet<u64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT chunk_id FROM data_chunks WHERE data_id = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![data_id], |row| Ok(row.get::<_, i64>(0)? as u64))
            .map_err(db_err)?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row.map_err(db_err)?);
        }
        Ok(ids)
    }

    fn archive_cold(&mut self) -> Result<usize> {
        let cutoff = now_secs() - self.policy.cold_age_secs;
        let candidates = {
            let mut stmt = self
                .conn
                .prepare(
                    "SELECT chunk_id, data FROM chunks \
                     WHERE tier = 'warm' AND ref_count <= ?1 AND last_access <= ?2",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(
                    params![self.policy.cold_max_ref_count as i64, cutoff],
                    |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, Vec<u8>>(1)?)),
                )
                .map_err(db_err)?;
            let mut candidates = Vec::new();
            for row in rows {
                candidates.push(row.map_err(db_err)?);
            }
            candidates
        };

        let mut archived = 0;
        for (chunk_id, data) in candidates {
            let compressed = deflate(&data)?;
            self.conn
                .execute(
                    "INSERT OR REPLACE INTO cold_archive (chunk_id, compressed_data, original_size) \
                     VALUES (?1, ?2, ?3)",
                    params![chunk_id as i64, compressed, data.len() as i64],
                )
                .map_err(db_err)?;
            self.conn
                .execute(
                    "UPDATE chunks SET data = X'', tier = 'cold' WHERE chunk_id = ?1",
                    params![chunk_id as i64],
                )
                .map_err(db_err)?;
            self.conn
                .execute(
                    "DELETE FROM lsh_bands WHERE chunk_id = ?1",
                    params![chunk_id as i64],
                )
                .map_err(db_err)?;
            self.lsh.remove(chunk_id);
            archived += 1;
        }
        if archived > 0 {
            tracing::debug!(archived, "archived warm chunks to cold");
        }
        Ok(archived)
    }

    fn stats(&self) -> Result<StoreStats> {
        let (unique_chunks, total_references): (i64, i64) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(ref_count), 0) FROM chunks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db_err)?;
        let resident_bytes: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM chunks WHERE tier != 'cold'",
                [],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let cold_bytes_compressed: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(compressed_data)), 0) FROM cold_archive",
                [],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let cooccurrence_edges: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cooccurrence", [], |row| row.get(0))
            .map_err(db_err)?;

        let mut stats = StoreStats {
            unique_chunks: unique_chunks as u64,
            total_references: total_references as u64,
            resident_bytes: resident_bytes as u64,
            cold_bytes_compressed: cold_bytes_compressed as u64,
            cooccurrence_edges: cooccurrence_edges as u64,
            lsh_entries: self.lsh.len() as u64,
            ..Default::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT tier, COUNT(*) FROM chunks GROUP BY tier")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_err)?;
        for row in rows {
            let (tier, count) = row.map_err(db_err)?;
            match Tier::parse(&tier) {
                Some(Tier::Hot) => stats.hot_chunks = count as u64,
                Some(Tier::Warm) => stats.warm_chunks = count as u64,
                Some(Tier::Cold) => stats.cold_chunks = count as u64,
                None => {}
            }
        }
        Ok(stats)
    }

    fn begin_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(db_err)
    }

    fn commit_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(db_err)
    }

    fn rollback_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(db_err)?;
        // A rolled-back encode may have left ghost ids in the in-memory
        // structures; rebuild them from the database.
        self.hot.clear();
        self.hot_by_sha.clear();
        self.rebuild_lsh()?;
        self.load_hot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_lookup() {
        let mut store = SqliteCogStore::open_in_memory(TierPolicy::default()).unwrap();
        let entry = store.store(b"hello world").unwrap();
        assert_eq!(entry.ref_count, 1);

        let found = store
            .lookup_exact(&Sha256Digest::of(b"hello world"))
            .unwrap()
            .unwrap();
        assert_eq!(found.chunk_id, entry.chunk_id);
        assert_eq!(found.ref_count, 2);
        assert_eq!(found.data.as_ref(), b"hello world");
    }

    #[test]
    fn test_dedup_same_sha() {
        let mut store = SqliteCogStore::open_in_memory(TierPolicy::default()).unwrap();
        let e1 = store.store(b"duplicate").unwrap();
        let e2 = store.store(b"duplicate").unwrap();
        assert_eq!(e1.chunk_id, e2.chunk_id);
        assert_eq!(e2.ref_count, 2);
        assert_eq!(store.stats().unwrap().unique_chunks, 1);
    }

    #[test]
    fn test_similar_lookup() {
        let mut store = SqliteCogStore::open_in_memory(TierPolicy::default()).unwrap();
        let original: Vec<u8> = b"log line repeated many times over and over\n".repeat(80);
        store.store(&original).unwrap();

        let mut modified = original.clone();
        modified[5] = b'X';
        if let Some(entry) = store.lookup_similar(simhash64(&modified)).unwrap() {
            assert_eq!(entry.data.as_ref(), &original[..]);
        }
    }

    #[test]
    fn test_cooccurrence_and_prediction() {
        let mut store = SqliteCogStore::open_in_memory(TierPolicy::default()).unwrap();
        let a = store.store(b"aaaa").unwrap().chunk_id;
        let b = store.store(b"bbbb").unwrap().chunk_id;
        let c = store.store(b"cccc").unwrap().chunk_id;
        store.record_cooccurrence(&[a, b]).unwrap();
        store.record_cooccurrence(&[a, b]).unwrap();
        store.record_cooccurrence(&[a, c]).unwrap();

        let ids: Vec<u64> = store
            .get_predicted_chunks(a, 5)
            .unwrap()
            .iter()
            .map(|e| e.chunk_id)
            .collect();
        assert_eq!(ids, vec![b, c]);
    }

    #[test]
    fn test_find_structurally_similar() {
        let mut store = SqliteCogStore::open_in_memory(TierPolicy::default()).unwrap();
        store
            .register_data_chunks("doc-a", &BTreeSet::from([1, 2, 3, 4]))
            .unwrap();
        store
            .register_data_chunks("doc-b", &BTreeSet::from([2, 3, 4, 5]))
            .unwrap();
        store
            .register_data_chunks("doc-c", &BTreeSet::from([9, 10]))
            .unwrap();

        let similar = store.find_structurally_similar("doc-a", 0.3).unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].0, "doc-b");
        assert_eq!(similar[0].1, 0.5);

        assert!(store.find_structurally_similar("doc-c", 0.3).unwrap().is_empty());
        assert!(store.find_structurally_similar("missing", 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_batch_rollback_restores_index() {
        let mut store = SqliteCogStore::open_in_memory(TierPolicy::default()).unwrap();
        store.store(b"committed before the batch").unwrap();

        store.begin_batch().unwrap();
        let entry = store.store(&b"rolled back chunk".repeat(10)).unwrap();
        store.rollback_batch().unwrap();

        assert!(store.get(entry.chunk_id).unwrap().is_none());
        assert!(store.lookup_similar(entry.simhash).unwrap().is_none());
        assert_eq!(store.stats().unwrap().unique_chunks, 1);
    }

    #[test]
    fn test_archive_cold() {
        let policy = TierPolicy {
            cold_age_secs: 0,
            ..TierPolicy::default()
        };
        let mut store = SqliteCogStore::open_in_memory(policy).unwrap();
        let data = b"rarely touched payload".repeat(64);
        let entry = store.store(&data).unwrap();

        assert_eq!(store.archive_cold().unwrap(), 1);
        let stats = store.stats().unwrap();
        assert_eq!(stats.cold_chunks, 1);
        assert_eq!(stats.lsh_entries, 0);

        let got = store.get(entry.chunk_id).unwrap().unwrap();
        assert_eq!(got.data.as_ref(), &data[..]);
        assert_eq!(got.tier, Tier::Cold);
    }
}

//! Cross-agent knowledge transfer via store federation.
//!
//! Each agent owns a private store and consults a shared tier first on
//! reads. New chunks land locally; a chunk whose ref count crosses the
//! promotion threshold is copied into the shared tier so other agents can
//! reference it. Federation is a composition, not a store subtype.

use crate::memory::MemoryCogStore;
use crate::CogStore;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use ucog_core::{ChunkEntry, Result, Sha256Digest, StoreStats};

/// A per-agent store layered over a shared tier.
///
/// `get` resolves shared ids before local ids, so a local id that was
/// also assigned in the shared tier resolves to the shared chunk; callers
/// that interleave many agents should treat ids as opaque within one
/// agent's blobs only.
pub struct FederatedStore {
    agent_id: String,
    local: MemoryCogStore,
    shared: Arc<Mutex<MemoryCogStore>>,
    promote_threshold: u64,
    promoted: HashSet<Sha256Digest>,
    id_remap: HashMap<u64, u64>,
}

impl FederatedStore {
    /// Compose a federated store from a private and a shared backend.
    pub fn new(
        agent_id: impl Into<String>,
        local: MemoryCogStore,
        shared: Arc<Mutex<MemoryCogStore>>,
        promote_threshold: u64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            local,
            shared,
            promote_threshold,
            promoted: HashSet::new(),
            id_remap: HashMap::new(),
        }
    }

    /// The owning agent's id.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Number of chunks promoted into the shared tier by this agent.
    pub fn promoted_count(&self) -> usize {
        self.promoted.len()
    }

    /// Statistics of the shared tier.
    pub fn shared_stats(&self) -> Result<StoreStats> {
        self.shared.lock().stats()
    }

    fn promote(&mut self, entry: &ChunkEntry) -> Result<()> {
        let shared_entry = self.shared.lock().store(&entry.data)?;
        self.promoted.insert(entry.sha256);
        self.id_remap.insert(entry.chunk_id, shared_entry.chunk_id);
        tracing::debug!(
            agent = %self.agent_id,
            local_id = entry.chunk_id,
            shared_id = shared_entry.chunk_id,
            "promoted chunk to shared tier"
        );
        Ok(())
    }
}

impl CogStore for FederatedStore {
    fn lookup_exact(&mut self, sha256: &Sha256Digest) -> Result<Option<ChunkEntry>> {
        // Shared first: common patterns are the likeliest hits.
        if let Some(entry) = self.shared.lock().lookup_exact(sha256)? {
            return Ok(Some(entry));
        }
        self.local.lookup_exact(sha256)
    }

    fn lookup_similar(&mut self, simhash: u64) -> Result<Option<ChunkEntry>> {
        if let Some(entry) = self.shared.lock().lookup_similar(simhash)? {
            return Ok(Some(entry));
        }
        self.local.lookup_similar(simhash)
    }

    fn store(&mut self, data: &[u8]) -> Result<ChunkEntry> {
        let sha256 = Sha256Digest::of(data);
        if let Some(entry) = self.shared.lock().lookup_exact(&sha256)? {
            return Ok(entry);
        }

        let entry = self.local.store(data)?;
        if entry.ref_count >= self.promote_threshold && !self.promoted.contains(&sha256) {
            self.promote(&entry)?;
        }
        Ok(entry)
    }

    fn get(&mut self, chunk_id: u64) -> Result<Option<ChunkEntry>> {
        if let Some(entry) = self.shared.lock().get(chunk_id)? {
            return Ok(Some(entry));
        }
        if let Some(&shared_id) = self.id_remap.get(&chunk_id) {
            if let Some(entry) = self.shared.lock().get(shared_id)? {
                return Ok(Some(entry));
            }
        }
        self.local.get(chunk_id)
    }

    fn record_cooccurrence(&mut self, chunk_ids: &[u64]) -> Result<()> {
        self.local.record_cooccurrence(chunk_ids)
    }

    fn get_predicted_chunks(&mut self, chunk_id: u64, top_k: usize) -> Result<Vec<ChunkEntry>> {
        // Merge predictions from both tiers, shared first, deduplicated
        // by content.
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for entry in self
            .shared
            .lock()
            .get_predicted_chunks(chunk_id, top_k)?
            .into_iter()
            .chain(self.local.get_predicted_chunks(chunk_id, top_k)?)
        {
            if seen.insert(entry.sha256) {
                merged.push(entry);
            }
        }
        merged.truncate(top_k);
        Ok(merged)
    }

    fn register_data_chunks(&mut self, data_id: &str, chunk_ids: &BTreeSet<u64>) -> Result<()> {
        self.local.register_data_chunks(data_id, chunk_ids)
    }

    fn get_chunk_ids_for_data(&mut self, data_id: &str) -> Result<BTreeSet<u64>> {
        self.local.get_chunk_ids_for_data(data_id)
    }

    fn archive_cold(&mut self) -> Result<usize> {
        self.local.archive_cold()
    }

    fn stats(&self) -> Result<StoreStats> {
        self.local.stats()
    }
}

/// Factory for per-agent federated stores over one shared tier.
pub struct Federation {
    shared: Arc<Mutex<MemoryCogStore>>,
    promote_threshold: u64,
    agent_ids: Vec<String>,
}

impl Federation {
    /// Create a federation with a fresh shared tier.
    pub fn new(promote_threshold: u64) -> Self {
        Self::with_shared(MemoryCogStore::new(), promote_threshold)
    }

    /// Create a federation around an existing shared store.
    pub fn with_shared(shared: MemoryCogStore, promote_threshold: u64) -> Self {
        Self {
            shared: Arc::new(Mutex::new(shared)),
            promote_threshold,
            agent_ids: Vec::new(),
        }
    }

    /// Hand out a store for an agent.
    pub fn agent_store(&mut self, agent_id: impl Into<String>) -> FederatedStore {
        let agent_id = agent_id.into();
        self.agent_ids.push(agent_id.clone());
        FederatedStore::new(
            agent_id,
            MemoryCogStore::new(),
            Arc::clone(&self.shared),
            self.promote_threshold,
        )
    }

    /// Handle to the shared tier.
    pub fn shared(&self) -> Arc<Mutex<MemoryCogStore>> {
        Arc::clone(&self.shared)
    }

    /// Agents that have been handed stores.
    pub fn agent_ids(&self) -> &[String] {
        &self.agent_ids
    }
}

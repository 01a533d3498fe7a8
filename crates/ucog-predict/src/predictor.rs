//! Predictive pre-compression: anticipate chunks before they arrive.
//!
//! Co-occurrence data from the store predicts which chunks are likely to
//! appear together. When chunk A has just been emitted, the dictionary
//! built from A's predicted companions is ready before the next chunk
//! arrives, so delta compression against it costs one cache hit.

use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use ucog_core::{PredictorConfig, Result};
use ucog_store::CogStore;

/// A pre-built dictionary plus the ordered chunk ids that produced it.
///
/// The id list must travel with the dictionary: the wire format embeds it
/// so decode rebuilds the exact same bytes even after co-occurrence data
/// has moved on.
#[derive(Clone, Debug)]
pub struct PredictedDictionary {
    /// Concatenated chunk payloads, in store-returned order.
    pub dict: Bytes,
    /// The chunk ids whose data built `dict`, in concatenation order.
    pub ids: Vec<u64>,
}

/// Maintains pre-built dictionaries keyed by trigger chunk id.
pub struct PredictiveCompressor {
    config: PredictorConfig,
    cache: LruCache<u64, PredictedDictionary>,
}

impl PredictiveCompressor {
    /// Create a predictor with the given configuration.
    pub fn new(config: PredictorConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            cache: LruCache::new(capacity),
        }
    }

    /// Dictionary and source ids for a trigger chunk, or `None` when the
    /// co-occurrence data is too thin to be worth a dictionary.
    ///
    /// Store failures propagate; a dictionary that merely cannot be
    /// built is not an error.
    pub fn get_dictionary_and_ids(
        &mut self,
        store: &mut dyn CogStore,
        trigger: u64,
    ) -> Result<Option<PredictedDictionary>> {
        if let Some(hit) = self.cache.get(&trigger) {
            return Ok(Some(hit.clone()));
        }

        let predicted = store.get_predicted_chunks(trigger, self.config.top_k)?;
        let usable: Vec<_> = predicted
            .into_iter()
            .filter(|entry| !entry.data.is_empty())
            .collect();
        if usable.is_empty() {
            return Ok(None);
        }

        let total: usize = usable.iter().map(|entry| entry.data.len()).sum();
        if total < self.config.min_dict_len {
            return Ok(None);
        }

        let mut dict = Vec::with_capacity(total);
        let mut ids = Vec::with_capacity(usable.len());
        for entry in &usable {
            dict.extend_from_slice(&entry.data);
            ids.push(entry.chunk_id);
        }

        let built = PredictedDictionary {
            dict: Bytes::from(dict),
            ids,
        };
        self.cache.put(trigger, built.clone());
        Ok(Some(built))
    }

    /// Record co-occurrence for an encoded batch and warm the cache for
    /// the most recent trigger ids.
    pub fn update_after_encode(
        &mut self,
        store: &mut dyn CogStore,
        chunk_ids: &[u64],
    ) -> Result<()> {
        if chunk_ids.len() < 2 {
            return Ok(());
        }
        store.record_cooccurrence(chunk_ids)?;

        let warm_from = chunk_ids.len().saturating_sub(3);
        for &trigger in &chunk_ids[warm_from..] {
            if !self.cache.contains(&trigger) {
                self.get_dictionary_and_ids(store, trigger)?;
            }
        }
        Ok(())
    }

    /// Evict a single cached dictionary.
    pub fn invalidate(&mut self, trigger: u64) {
        self.cache.pop(&trigger);
    }

    /// Drop every cached dictionary.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of cached dictionaries.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for PredictiveCompressor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucog_core::PredictorConfig;
    use ucog_store::MemoryCogStore;

    fn seeded_store() -> (MemoryCogStore, u64, Vec<u64>) {
        let mut store = MemoryCogStore::new();
        let trigger = store.store(&b"trigger chunk ".repeat(8)).unwrap().chunk_id;
        let mut companions = Vec::new();
        for i in 0..3u8 {
            let data = format!("companion chunk number {i} ").repeat(8);
            companions.push(store.store(data.as_bytes()).unwrap().chunk_id);
        }
        let mut batch = vec![trigger];
        batch.extend(&companions);
        store.record_cooccurrence(&batch).unwrap();
        (store, trigger, companions)
    }

    #[test]
    fn test_builds_dictionary_from_cooccurrence() {
        let (mut store, trigger, companions) = seeded_store();
        let mut predictor = PredictiveCompressor::default();

        let built = predictor
            .get_dictionary_and_ids(&mut store, trigger)
            .unwrap()
            .unwrap();
        for id in &companions {
            assert!(built.ids.contains(id));
        }
        assert!(built.dict.len() >= 64);
        assert_eq!(predictor.cache_len(), 1);
    }

    #[test]
    fn test_no_dictionary_without_history() {
        let mut store = MemoryCogStore::new();
        let id = store.store(b"lonely chunk").unwrap().chunk_id;
        let mut predictor = PredictiveCompressor::default();
        assert!(predictor
            .get_dictionary_and_ids(&mut store, id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_tiny_dictionary_rejected() {
        let mut store = MemoryCogStore::new();
        let a = store.store(b"aa").unwrap().chunk_id;
        let b = store.store(b"bb").unwrap().chunk_id;
        store.record_cooccurrence(&[a, b]).unwrap();

        let mut predictor = PredictiveCompressor::default();
        assert!(
            predictor
                .get_dictionary_and_ids(&mut store, a)
                .unwrap()
                .is_none(),
            "a dictionary under the minimum length is not worth building"
        );
    }

    #[test]
    fn test_update_after_encode_warms_cache() {
        let (mut store, trigger, companions) = seeded_store();
        let mut predictor = PredictiveCompressor::default();

        let mut batch = vec![trigger];
        batch.extend(&companions);
        predictor.update_after_encode(&mut store, &batch).unwrap();
        assert!(predictor.cache_len() >= 1, "recent triggers should be pre-warmed");
    }

    #[test]
    fn test_update_after_encode_single_id_is_noop() {
        let mut store = MemoryCogStore::new();
        let id = store.store(b"solo").unwrap().chunk_id;
        let mut predictor = PredictiveCompressor::default();
        predictor.update_after_encode(&mut store, &[id]).unwrap();
        assert_eq!(store.stats().unwrap().cooccurrence_edges, 0);
    }

    #[test]
    fn test_lru_eviction() {
        let (mut store, trigger, companions) = seeded_store();
        let config = PredictorConfig {
            cache_size: 1,
            ..PredictorConfig::default()
        };
        let mut predictor = PredictiveCompressor::new(config);

        predictor
            .get_dictionary_and_ids(&mut store, trigger)
            .unwrap();
        // Seed a second trigger and build its dictionary.
        let other = companions[0];
        let mut batch = vec![other, trigger];
        batch.extend(&companions[1..]);
        store.record_cooccurrence(&batch).unwrap();
        predictor.get_dictionary_and_ids(&mut store, other).unwrap();

        assert_eq!(predictor.cache_len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (mut store, trigger, _) = seeded_store();
        let mut predictor = PredictiveCompressor::default();
        predictor
            .get_dictionary_and_ids(&mut store, trigger)
            .unwrap();
        predictor.invalidate(trigger);
        assert_eq!(predictor.cache_len(), 0);

        predictor
            .get_dictionary_and_ids(&mut store, trigger)
            .unwrap();
        predictor.clear();
        assert_eq!(predictor.cache_len(), 0);
    }
}

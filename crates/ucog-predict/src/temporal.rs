//! Temporal motif detection: compress event order, not just content.
//!
//! Agent traces repeat *sequences* of event types (search, read, think,
//! act) whose contents differ every time. The tracker counts sliding
//! n-grams over event types and promotes recurring ones to motifs; the
//! encoder then replaces recognised subsequences with motif references.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ucog_core::{Error, Result};

/// Tracker parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MotifConfig {
    /// Minimum events in a motif.
    pub min_pattern_len: usize,
    /// Maximum events in a motif.
    pub max_pattern_len: usize,
    /// Times a pattern must repeat before it becomes a motif.
    pub min_occurrences: u64,
}

impl Default for MotifConfig {
    fn default() -> Self {
        Self {
            min_pattern_len: 3,
            max_pattern_len: 10,
            min_occurrences: 2,
        }
    }
}

/// A recurring pattern of event types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemporalMotif {
    pub motif_id: u64,
    pub pattern: Vec<String>,
    pub occurrences: u64,
    /// Index in the event history where the pattern first completed.
    pub first_seen: usize,
}

impl TemporalMotif {
    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }
}

/// One element of a motif-compressed sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotifToken {
    /// Reference to a detected motif.
    Motif(u64),
    /// A literal event that matched no motif.
    Literal(String),
}

/// A motif-compressed event sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotifEncoding {
    pub tokens: Vec<MotifToken>,
    pub original_events: usize,
    pub motifs_used: usize,
}

impl MotifEncoding {
    /// Fraction of events absorbed into motif references.
    pub fn savings_pct(&self) -> f64 {
        (self.original_events - self.tokens.len()) as f64 * 100.0
            / self.original_events.max(1) as f64
    }
}

/// Detects recurring temporal motifs via sliding n-gram counts.
pub struct TemporalMotifTracker {
    config: MotifConfig,
    history: Vec<String>,
    ngram_counts: HashMap<Vec<String>, u64>,
    motifs: HashMap<Vec<String>, TemporalMotif>,
    next_motif_id: u64,
}

impl TemporalMotifTracker {
    pub fn new(config: MotifConfig) -> Self {
        Self {
            config,
            history: Vec::new(),
            ngram_counts: HashMap::new(),
            motifs: HashMap::new(),
            next_motif_id: 0,
        }
    }

    /// Record an event; returns the longest motif the last events
    /// complete, if any.
    pub fn observe(&mut self, event_type: &str) -> Option<TemporalMotif> {
        self.history.push(event_type.to_string());
        let len = self.history.len();

        let mut matched: Option<TemporalMotif> = None;
        let max_n = self.config.max_pattern_len.min(len);
        for n in self.config.min_pattern_len..=max_n {
            let pattern = self.history[len - n..].to_vec();
            let count = {
                let count = self.ngram_counts.entry(pattern.clone()).or_insert(0);
                *count += 1;
                *count
            };

            if count >= self.config.min_occurrences {
                if !self.motifs.contains_key(&pattern) {
                    let motif = TemporalMotif {
                        motif_id: self.next_motif_id,
                        pattern: pattern.clone(),
                        occurrences: count,
                        first_seen: len - n,
                    };
                    self.next_motif_id += 1;
                    self.motifs.insert(pattern.clone(), motif);
                }
                if let Some(motif) = self.motifs.get_mut(&pattern) {
                    motif.occurrences = count;
                    if matched.as_ref().map_or(true, |m| n > m.len()) {
                        matched = Some(motif.clone());
                    }
                }
            }
        }
        matched
    }

    /// Observe a batch of events.
    pub fn observe_batch<I, S>(&mut self, events: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for event in events {
            self.observe(event.as_ref());
        }
    }

    /// All detected motifs, strongest first (occurrences x length).
    pub fn detected_motifs(&self) -> Vec<TemporalMotif> {
        let mut motifs: Vec<TemporalMotif> = self.motifs.values().cloned().collect();
        motifs.sort_by(|a, b| {
            (b.occurrences * b.len() as u64)
                .cmp(&(a.occurrences * a.len() as u64))
                .then_with(|| a.motif_id.cmp(&b.motif_id))
        });
        motifs
    }

    /// Number of events observed.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Number of distinct motifs detected.
    pub fn motif_count(&self) -> usize {
        self.motifs.len()
    }
}

impl Default for TemporalMotifTracker {
    fn default() -> Self {
        Self::new(MotifConfig::default())
    }
}

/// Compresses event sequences against a tracker's detected motifs.
pub struct MotifEncoder<'a> {
    tracker: &'a TemporalMotifTracker,
}

impl<'a> MotifEncoder<'a> {
    pub fn new(tracker: &'a TemporalMotifTracker) -> Self {
        Self { tracker }
    }

    /// Replace recognised subsequences with motif references, greedy
    /// longest-match first.
    pub fn encode(&self, events: &[String]) -> MotifEncoding {
        let mut by_len = self.tracker.detected_motifs();
        by_len.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.motif_id.cmp(&b.motif_id)));

        let mut tokens = Vec::new();
        let mut motifs_used = std::collections::HashSet::new();
        let mut i = 0;
        while i < events.len() {
            let hit = by_len.iter().find(|motif| {
                events[i..]
                    .get(..motif.len())
                    .is_some_and(|window| window == motif.pattern.as_slice())
            });
            match hit {
                Some(motif) => {
                    tokens.push(MotifToken::Motif(motif.motif_id));
                    motifs_used.insert(motif.motif_id);
                    i += motif.len();
                }
                None => {
                    tokens.push(MotifToken::Literal(events[i].clone()));
                    i += 1;
                }
            }
        }

        MotifEncoding {
            tokens,
            original_events: events.len(),
            motifs_used: motifs_used.len(),
        }
    }

    /// Expand a compressed sequence back to its events.
    pub fn decode(&self, encoding: &MotifEncoding) -> Result<Vec<String>> {
        let by_id: HashMap<u64, &TemporalMotif> = self
            .tracker
            .motifs
            .values()
            .map(|motif| (motif.motif_id, motif))
            .collect();

        let mut events = Vec::with_capacity(encoding.original_events);
        for token in &encoding.tokens {
            match token {
                MotifToken::Motif(id) => {
                    let motif = by_id.get(id).ok_or(Error::UnknownMotif(*id))?;
                    events.extend(motif.pattern.iter().cloned());
                }
                MotifToken::Literal(event) => events.push(event.clone()),
            }
        }
        Ok(events)
    }
}

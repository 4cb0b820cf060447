//! Bounded FIFO cache of synthesized clips.
//!
//! The host sweeps a continuous pitch range, but keys are rounded
//! (frequency to 0.1 Hz, volume to 0.01) so repeated progress values hit the
//! same entry. Duration, sample rate and fade are fixed for the lifetime of a
//! configuration; the cache is cleared whenever the configuration changes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::synth::{self, AudioClip, ClipParams, Waveform};
use crate::tools::round_scaled;

/// Default number of clips kept before FIFO eviction starts.
pub const DEFAULT_MAX_ENTRIES: usize = 300;

/// Rounded identity of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Frequency in tenths of a hertz.
    pub decihertz: i64,
    /// Volume in hundredths.
    pub centivolume: i64,
    pub waveform: Waveform,
}

impl CacheKey {
    pub fn new(frequency: f64, volume: f64, waveform: Waveform) -> Self {
        Self {
            decihertz: round_scaled(frequency, 1),
            centivolume: round_scaled(volume, 2),
            waveform,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}Hz_{:.2}vol_{}",
            self.decihertz as f64 / 10.0,
            self.centivolume as f64 / 100.0,
            self.waveform
        )
    }
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

/// Insertion-ordered clip store bounded at `capacity` entries.
#[derive(Debug)]
pub struct ClipCache {
    entries: HashMap<CacheKey, Arc<AudioClip>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Default for ClipCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ClipCache {
    /// Create an empty cache. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Return the cached clip for `params`, synthesizing and inserting it on
    /// a miss.
    pub fn get_or_create(&mut self, params: &ClipParams) -> Result<Arc<AudioClip>> {
        self.get_or_insert_with(params, synth::synthesize)
    }

    /// Like [`get_or_create`](Self::get_or_create) with a custom synthesizer.
    pub fn get_or_insert_with<F>(&mut self, params: &ClipParams, build: F) -> Result<Arc<AudioClip>>
    where
        F: FnOnce(&ClipParams) -> Result<AudioClip>,
    {
        let key = CacheKey::new(params.frequency, params.volume, params.waveform);
        if let Some(clip) = self.entries.get(&key) {
            self.hits += 1;
            debug!(
                "clip cache hit: {} ({}/{})",
                key,
                self.hits,
                self.hits + self.misses
            );
            return Ok(clip.clone());
        }

        let clip = Arc::new(build(params)?);
        self.misses += 1;

        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key, clip.clone());
        self.order.push_back(key);
        debug!(
            "clip cache miss: {} cached ({}/{})",
            key,
            self.entries.len(),
            self.capacity
        );

        Ok(clip)
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.order.pop_front() {
            self.entries.remove(&oldest);
            self.evictions += 1;
            debug!("clip cache full, evicted {}", oldest);
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
        debug!("clip cache cleared ({} entries)", dropped);
    }

    /// Clear and change the capacity.
    pub fn reset(&mut self, capacity: usize) {
        self.clear();
        self.capacity = capacity.max(1);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.entries.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::FadeAlgorithm;

    fn params(frequency: f64) -> ClipParams {
        ClipParams {
            frequency,
            duration_secs: 0.02,
            sample_rate: 8_000,
            volume: 0.4,
            waveform: Waveform::Sine,
            fade: FadeAlgorithm::Cosine,
        }
    }

    #[test]
    fn repeated_rounded_requests_hit() {
        let mut cache = ClipCache::new(10);
        let first = cache.get_or_create(&params(440.01)).expect("first");
        let second = cache.get_or_create(&params(440.04)).expect("second");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[test]
    fn only_one_synthesis_per_key() {
        let mut cache = ClipCache::new(4);
        let mut calls = 0;
        for _ in 0..5 {
            cache
                .get_or_insert_with(&params(523.3), |p| {
                    calls += 1;
                    synth::synthesize(p)
                })
                .expect("clip");
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.stats().hits, 4);
    }

    #[test]
    fn volume_and_waveform_are_part_of_the_key() {
        let mut cache = ClipCache::new(10);
        cache.get_or_create(&params(440.0)).expect("base");
        cache
            .get_or_create(&ClipParams {
                volume: 0.5,
                ..params(440.0)
            })
            .expect("louder");
        cache
            .get_or_create(&ClipParams {
                waveform: Waveform::Triangle,
                ..params(440.0)
            })
            .expect("triangle");
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn evicts_in_insertion_order_regardless_of_access() {
        let capacity = 5;
        let extra = 3;
        let mut cache = ClipCache::new(capacity);
        for i in 0..capacity {
            cache.get_or_create(&params(200.0 + i as f64)).expect("fill");
        }
        // Touch the oldest entries; FIFO must still evict them first.
        cache.get_or_create(&params(200.0)).expect("touch");
        cache.get_or_create(&params(201.0)).expect("touch");

        for i in 0..extra {
            cache.get_or_create(&params(900.0 + i as f64)).expect("overflow");
            assert!(cache.len() <= capacity);
        }

        assert_eq!(cache.len(), capacity);
        for i in 0..extra {
            let key = CacheKey::new(200.0 + i as f64, 0.4, Waveform::Sine);
            assert!(!cache.contains(&key), "{} should be evicted", key);
        }
        for i in extra..capacity {
            let key = CacheKey::new(200.0 + i as f64, 0.4, Waveform::Sine);
            assert!(cache.contains(&key));
        }
        assert_eq!(cache.stats().evictions, extra as u64);
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let mut cache = ClipCache::new(3);
        cache.get_or_create(&params(300.0)).expect("miss");
        cache.get_or_create(&params(300.0)).expect("hit");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats { capacity: 3, ..CacheStats::default() });
    }

    #[test]
    fn failed_synthesis_is_not_cached() {
        let mut cache = ClipCache::new(3);
        let bad = ClipParams {
            sample_rate: 0,
            ..params(300.0)
        };
        assert!(cache.get_or_create(&bad).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn zero_capacity_still_holds_one_entry() {
        let mut cache = ClipCache::new(0);
        cache.get_or_create(&params(300.0)).expect("first");
        cache.get_or_create(&params(400.0)).expect("second");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn key_display_matches_rounding() {
        let key = CacheKey::new(439.96, 0.404, Waveform::WhiteNoise);
        assert_eq!(key.to_string(), "440.0Hz_0.40vol_white_noise");
    }
}

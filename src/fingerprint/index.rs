use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::{hamming_distance, Fingerprint, DEFAULT_BITS};
use crate::error::{ContactError, Result};

pub const DEFAULT_MAX_DISTANCE: u32 = 3;
pub const DEFAULT_BANDS: u32 = DEFAULT_MAX_DISTANCE + 1;

/// Width and tolerance of a [`FingerprintIndex`].
///
/// Fingerprints are cut into `bands` contiguous bit ranges. Two fingerprints
/// at most `max_distance` bits apart agree on at least one band whenever
/// `bands > max_distance`, so bucket lookup never misses a true candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    pub bits: u32,
    pub bands: u32,
    pub max_distance: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            bits: DEFAULT_BITS,
            bands: DEFAULT_BANDS,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl IndexSettings {
    pub fn validate(&self) -> Result<()> {
        if self.bits == 0 || self.bits > 64 {
            return Err(ContactError::InvalidConfiguration(format!(
                "bits must be between 1 and 64, got {}",
                self.bits
            )));
        }
        if self.bands == 0 || self.bands > self.bits {
            return Err(ContactError::InvalidConfiguration(format!(
                "bands must be between 1 and {}, got {}",
                self.bits, self.bands
            )));
        }
        if self.bands <= self.max_distance {
            return Err(ContactError::InvalidConfiguration(format!(
                "bands ({}) must exceed max_distance ({})",
                self.bands, self.max_distance
            )));
        }
        Ok(())
    }

    /// `(shift, width)` of each band; earlier bands take the remainder bits.
    fn band_ranges(&self) -> Vec<(u32, u32)> {
        let base = self.bits / self.bands;
        let extra = self.bits % self.bands;
        let mut shift = 0;

        (0..self.bands)
            .map(|band| {
                let width = base + u32::from(band < extra);
                let range = (shift, width);
                shift += width;
                range
            })
            .collect()
    }
}

/// A candidate returned by an index lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    pub cid: &'a str,
    pub distance: u32,
}

/// Banded index over fingerprints for approximate (Hamming) lookup.
#[derive(Debug, Clone)]
pub struct FingerprintIndex {
    settings: IndexSettings,
    ranges: Vec<(u32, u32)>,
    entries: Vec<Fingerprint>,
    buckets: HashMap<(usize, u64), Vec<usize>>,
}

impl FingerprintIndex {
    pub fn new(settings: IndexSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            ranges: settings.band_ranges(),
            settings,
            entries: Vec::new(),
            buckets: HashMap::new(),
        })
    }

    pub fn build(
        fingerprints: impl IntoIterator<Item = Fingerprint>,
        settings: IndexSettings,
    ) -> Result<Self> {
        let mut index = Self::new(settings)?;
        for fingerprint in fingerprints {
            index.insert(fingerprint);
        }
        debug!(
            entries = index.entries.len(),
            buckets = index.buckets.len(),
            "fingerprint index built"
        );
        Ok(index)
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, fingerprint: Fingerprint) {
        let position = self.entries.len();
        let keys: Vec<(usize, u64)> = self.band_keys(fingerprint.value()).collect();
        for key in keys {
            self.buckets.entry(key).or_default().push(position);
        }
        self.entries.push(fingerprint);
    }

    /// Candidates within `max_distance` of `fingerprint`, nearest first and
    /// in insertion order among equals. Nothing is computed until the
    /// iterator is first polled.
    pub fn find_duplicates<'a>(&'a self, fingerprint: &Fingerprint) -> Duplicates<'a> {
        Duplicates {
            index: self,
            value: fingerprint.value(),
            pending: None,
        }
    }

    /// Every unordered pair within `max_distance`, reported once as
    /// `(a, b)` with `a < b`.
    pub fn find_all_duplicate_pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().enumerate().flat_map(move |(i, a)| {
            self.bucket_neighbours(a.value())
                .into_iter()
                .filter(move |&j| j != i)
                .filter_map(move |j| {
                    let b = &self.entries[j];
                    let close = a.distance(b) <= self.settings.max_distance;
                    (close && a.cid() < b.cid()).then(|| (a.cid(), b.cid()))
                })
        })
    }

    fn band_keys(&self, value: u64) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.ranges.iter().enumerate().map(move |(band, &(shift, width))| {
            let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
            (band, (value >> shift) & mask)
        })
    }

    /// Positions sharing at least one band with `value`, ascending.
    fn bucket_neighbours(&self, value: u64) -> BTreeSet<usize> {
        self.band_keys(value)
            .filter_map(|key| self.buckets.get(&key))
            .flatten()
            .copied()
            .collect()
    }

    fn matches(&self, value: u64) -> Vec<Match<'_>> {
        let mut found: Vec<(u32, usize)> = self
            .bucket_neighbours(value)
            .into_iter()
            .map(|pos| (hamming_distance(value, self.entries[pos].value()), pos))
            .filter(|(distance, _)| *distance <= self.settings.max_distance)
            .collect();
        found.sort_unstable();

        found
            .into_iter()
            .map(|(distance, pos)| Match {
                cid: self.entries[pos].cid(),
                distance,
            })
            .collect()
    }
}

/// Lazy, one-shot lookup result of [`FingerprintIndex::find_duplicates`].
pub struct Duplicates<'a> {
    index: &'a FingerprintIndex,
    value: u64,
    pending: Option<std::vec::IntoIter<Match<'a>>>,
}

impl<'a> Duplicates<'a> {
    /// Yield the full [`Match`] (id and distance) instead of just the id.
    pub fn with_distance(self) -> impl Iterator<Item = Match<'a>> {
        let Duplicates {
            index,
            value,
            pending,
        } = self;
        pending.unwrap_or_else(|| index.matches(value).into_iter())
    }
}

impl<'a> Iterator for Duplicates<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.index;
        let value = self.value;
        self.pending
            .get_or_insert_with(|| index.matches(value).into_iter())
            .next()
            .map(|m| m.cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(value: u64, cid: &str) -> Fingerprint {
        Fingerprint::from_value(value, 64, cid)
    }

    fn index(fps: Vec<Fingerprint>) -> FingerprintIndex {
        FingerprintIndex::build(fps, IndexSettings::default()).unwrap()
    }

    #[test]
    fn band_ranges_cover_all_bits() {
        let settings = IndexSettings {
            bits: 10,
            bands: 3,
            max_distance: 2,
        };
        assert_eq!(settings.band_ranges(), vec![(0, 4), (4, 3), (7, 3)]);
    }

    #[test]
    fn settings_reject_bad_values() {
        let bad = [
            IndexSettings { bits: 0, ..IndexSettings::default() },
            IndexSettings { bits: 65, ..IndexSettings::default() },
            IndexSettings { bands: 0, ..IndexSettings::default() },
            IndexSettings { bands: 3, max_distance: 3, ..IndexSettings::default() },
        ];
        for settings in bad {
            assert!(matches!(
                settings.validate(),
                Err(ContactError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn empty_index_finds_nothing() {
        let idx = index(vec![]);
        assert!(idx.is_empty());
        assert_eq!(idx.find_duplicates(&fp(42, "q")).count(), 0);
        assert_eq!(idx.find_all_duplicate_pairs().count(), 0);
    }

    #[test]
    fn finds_within_threshold_ordered_by_distance() {
        let base = 0xF0F0_F0F0_F0F0_F0F0u64;
        let idx = index(vec![
            fp(base ^ 0b111, "three"),
            fp(base ^ 0b1, "one"),
            fp(base, "zero"),
            fp(base ^ 0b1111, "four"),
            fp(!base, "far"),
        ]);

        let found: Vec<&str> = idx.find_duplicates(&fp(base, "q")).collect();
        assert_eq!(found, vec!["zero", "one", "three"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let idx = index(vec![fp(0b10, "b"), fp(0b01, "a")]);
        let found: Vec<&str> = idx.find_duplicates(&fp(0, "q")).collect();
        assert_eq!(found, vec!["b", "a"]);
    }

    #[test]
    fn differences_spread_across_bands_are_found() {
        // One differing bit in each of three bands.
        let value = 1 | (1 << 20) | (1 << 40);
        let idx = index(vec![fp(value, "spread")]);
        let matches: Vec<Match> = idx.find_duplicates(&fp(0, "q")).with_distance().collect();
        assert_eq!(matches, vec![Match { cid: "spread", distance: 3 }]);
    }

    #[test]
    fn pairs_are_reported_once_in_order() {
        let idx = index(vec![
            fp(0, "c"),
            fp(1, "a"),
            fp(3, "b"),
            fp(u64::MAX, "z"),
        ]);

        let mut pairs: Vec<(&str, &str)> = idx.find_all_duplicate_pairs().collect();
        pairs.sort();
        assert_eq!(pairs, vec![("a", "b"), ("a", "c"), ("b", "c")]);
    }

    #[test]
    fn lookup_is_restartable() {
        let idx = index(vec![fp(0, "a")]);
        let query = fp(0, "q");
        assert_eq!(idx.find_duplicates(&query).count(), 1);
        assert_eq!(idx.find_duplicates(&query).count(), 1);
    }
}

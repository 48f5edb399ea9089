//! An open-addressing hash map from fixed-width bit vectors to values.
//!
//! The map stores its keys bit-packed: every bucket reserves the same number of
//! words, fixed once at construction from the key width. Collisions are resolved
//! by double hashing. The primary hash selects the initial bucket and the
//! secondary hash determines the probe step. Since all capacities are prime, every
//! probe sequence visits every bucket before it returns to its start.
//!
//! Capacities are taken from a fixed ascending sequence of primes. When the load
//! of the map would exceed the configured load factor, the map moves to the next
//! capacity and reinserts all entries.

use ahash::RandomState;
use log::debug;

use super::{BitVector, StorageError};

/// The capacities the map may grow through.
const SIZES: [usize; 28] = [
    5, 13, 31, 79, 163, 277, 499, 1021, 2029, 3989, 8059, 16001, 32099, 64301, 127921, 256499,
    511111, 1024901, 2048003, 4096891, 8192411, 15485863, 32142191, 64285127, 128572517,
    257148523, 514299959, 1073741789,
];

/// How often a failed reinsertion may move on to an even larger capacity.
const MAX_GROWTH_RETRIES: usize = 2;

/// The result of probing for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// The key is stored in the bucket.
    Occupied(usize),
    /// The key is absent and may be stored in the bucket.
    Vacant(usize),
    /// The probe sequence cycled without finding the key or a free bucket.
    Exhausted,
}

/// Bucket storage of one capacity.
#[derive(Debug, Clone)]
struct Table<V> {
    words_per_bucket: usize,
    buckets: Vec<u64>,
    occupied: BitVector,
    values: Vec<V>,
}

impl<V: Copy + Default> Table<V> {
    fn new(capacity: usize, words_per_bucket: usize) -> Self {
        Self {
            words_per_bucket,
            buckets: vec![0; capacity * words_per_bucket],
            occupied: BitVector::new(capacity),
            values: vec![V::default(); capacity],
        }
    }

    fn capacity(&self) -> usize {
        self.values.len()
    }

    fn key_words(&self, bucket: usize) -> &[u64] {
        let start = bucket * self.words_per_bucket;
        &self.buckets[start..start + self.words_per_bucket]
    }

    fn find(&self, words: &[u64], primary: u64, secondary: u64) -> Slot {
        let capacity = self.capacity() as u64;
        let initial = (primary % capacity) as usize;
        let step = (1 + secondary % (capacity - 1)) as usize;
        let mut bucket = initial;
        while self.occupied.get(bucket) {
            if self.key_words(bucket) == words {
                return Slot::Occupied(bucket);
            }
            bucket = (bucket + step) % self.capacity();
            if bucket == initial {
                return Slot::Exhausted;
            }
        }
        Slot::Vacant(bucket)
    }

    fn store(&mut self, bucket: usize, words: &[u64], value: V) {
        let start = bucket * self.words_per_bucket;
        self.buckets[start..start + self.words_per_bucket].copy_from_slice(words);
        self.occupied.set(bucket, true);
        self.values[bucket] = value;
    }
}

/// A hash map from bit vectors of one fixed width to values.
#[derive(Debug, Clone)]
pub struct BitVectorHashMap<V> {
    load_factor: f64,
    key_width: usize,
    size_index: usize,
    number_of_elements: usize,
    table: Table<V>,
    primary: RandomState,
    secondary: RandomState,
}

impl<V: Copy + Default> BitVectorHashMap<V> {
    /// Creates a map for keys of `key_width` bits with room for more than
    /// `initial_size` buckets. Fails if `initial_size` is not below the largest
    /// capacity.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is not positive.
    pub fn new(
        key_width: usize,
        initial_size: usize,
        load_factor: f64,
    ) -> Result<Self, StorageError> {
        assert!(load_factor > 0.0, "The load factor must be positive.");
        let size_index = SIZES
            .iter()
            .position(|size| *size > initial_size)
            .ok_or(StorageError::CapacityExhausted {
                elements: initial_size,
            })?;
        // Fixed seeds keep bucket order (and thus iteration order) reproducible.
        Ok(Self {
            load_factor,
            key_width,
            size_index,
            number_of_elements: 0,
            table: Table::new(SIZES[size_index], Self::words_per_bucket(key_width)),
            primary: RandomState::with_seeds(
                0x243f_6a88_85a3_08d3,
                0x1319_8a2e_0370_7344,
                0xa409_3822_299f_31d0,
                0x082e_fa98_ec4e_6c89,
            ),
            secondary: RandomState::with_seeds(
                0x4528_21e6_38d0_1377,
                0xbe54_66cf_34e9_0c6c,
                0xc0ac_29b7_c97c_50dd,
                0x3f84_d5b5_b547_0917,
            ),
        })
    }

    fn words_per_bucket(key_width: usize) -> usize {
        BitVector::words_for(key_width).max(1)
    }

    /// The width of the keys in bits.
    pub fn key_width(&self) -> usize {
        self.key_width
    }

    /// The number of bits reserved for a key in each bucket.
    pub fn bucket_size(&self) -> usize {
        self.table.words_per_bucket * BitVector::BITS_PER_WORD
    }

    /// The number of stored elements.
    pub fn len(&self) -> usize {
        self.number_of_elements
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_elements == 0
    }

    /// The number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    fn padded_words<'k>(&self, key: &'k BitVector) -> std::borrow::Cow<'k, [u64]> {
        assert!(
            key.len() == self.key_width,
            "Key has wrong width. (Expected: {}, Actual: {})",
            self.key_width,
            key.len()
        );
        if key.words().len() == self.table.words_per_bucket {
            std::borrow::Cow::Borrowed(key.words())
        } else {
            // Zero-width keys still occupy one word.
            std::borrow::Cow::Owned(vec![0; self.table.words_per_bucket])
        }
    }

    fn hashes(&self, words: &[u64]) -> (u64, u64) {
        (self.primary.hash_one(words), self.secondary.hash_one(words))
    }

    fn find_slot(&self, words: &[u64]) -> Slot {
        let (primary, secondary) = self.hashes(words);
        self.table.find(words, primary, secondary)
    }

    /// Moves to the next capacity and reinserts all entries.
    fn increase_size(&mut self) -> Result<(), StorageError> {
        let mut attempts = 0;
        loop {
            self.size_index += 1;
            let Some(capacity) = SIZES.get(self.size_index).copied() else {
                return Err(StorageError::CapacityExhausted {
                    elements: self.number_of_elements + 1,
                });
            };
            debug!(
                "Growing hash map from {} to {} buckets ({} elements).",
                self.table.capacity(),
                capacity,
                self.number_of_elements
            );
            let mut table = Table::new(capacity, self.table.words_per_bucket);
            let mut failed = false;
            for bucket in self.table.occupied.iter_ones() {
                let words = self.table.key_words(bucket);
                let (primary, secondary) = self.hashes(words);
                match table.find(words, primary, secondary) {
                    Slot::Vacant(target) => table.store(target, words, self.table.values[bucket]),
                    Slot::Occupied(_) => unreachable!("Keys of a hash map are unique."),
                    Slot::Exhausted => {
                        failed = true;
                        break;
                    }
                }
            }
            if !failed {
                self.table = table;
                return Ok(());
            }
            attempts += 1;
            if attempts > MAX_GROWTH_RETRIES {
                return Err(StorageError::GrowthFailed { attempts });
            }
        }
    }

    fn needs_growth(&self) -> bool {
        self.number_of_elements as f64 >= self.load_factor * self.table.capacity() as f64
    }

    /// Returns the value stored for `key` together with its bucket. If `key` is
    /// absent, `value` is stored for it first.
    ///
    /// The caller learns whether the key is new by comparing the returned value with
    /// the proposed one.
    pub fn find_or_add_and_get_bucket(
        &mut self,
        key: &BitVector,
        value: V,
    ) -> Result<(V, usize), StorageError> {
        if self.needs_growth() {
            self.increase_size()?;
        }
        let words = self.padded_words(key).into_owned();
        loop {
            match self.find_slot(&words) {
                Slot::Occupied(bucket) => return Ok((self.table.values[bucket], bucket)),
                Slot::Vacant(bucket) => {
                    self.table.store(bucket, &words, value);
                    self.number_of_elements += 1;
                    return Ok((value, bucket));
                }
                Slot::Exhausted => self.increase_size()?,
            }
        }
    }

    /// Returns the value stored for `key`, storing `value` for it if it is absent.
    pub fn find_or_add(&mut self, key: &BitVector, value: V) -> Result<V, StorageError> {
        self.find_or_add_and_get_bucket(key, value)
            .map(|(value, _)| value)
    }

    /// Stores `value` for `key`, overwriting a present value, and returns the bucket.
    pub fn set_or_add(&mut self, key: &BitVector, value: V) -> Result<usize, StorageError> {
        if self.needs_growth() {
            self.increase_size()?;
        }
        let words = self.padded_words(key).into_owned();
        loop {
            match self.find_slot(&words) {
                Slot::Occupied(bucket) => {
                    self.table.values[bucket] = value;
                    return Ok(bucket);
                }
                Slot::Vacant(bucket) => {
                    self.table.store(bucket, &words, value);
                    self.number_of_elements += 1;
                    return Ok(bucket);
                }
                Slot::Exhausted => self.increase_size()?,
            }
        }
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &BitVector) -> Option<V> {
        match self.find_slot(&self.padded_words(key)) {
            Slot::Occupied(bucket) => Some(self.table.values[bucket]),
            Slot::Vacant(_) | Slot::Exhausted => None,
        }
    }

    /// Returns the value stored for `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is absent.
    pub fn get_value(&self, key: &BitVector) -> V {
        self.get(key).expect("Unknown key.")
    }

    pub fn contains(&self, key: &BitVector) -> bool {
        self.get(key).is_some()
    }

    /// Returns the key and value stored in `bucket`.
    ///
    /// # Panics
    ///
    /// Panics if the bucket is not occupied.
    pub fn bucket_and_value(&self, bucket: usize) -> (BitVector, V) {
        assert!(self.table.occupied.get(bucket), "Bucket is not occupied.");
        (
            BitVector::from_words(self.key_width, self.table.key_words(bucket).to_vec()),
            self.table.values[bucket],
        )
    }

    /// Replaces every stored value `v` by `remapping(v)`.
    pub fn remap(&mut self, mut remapping: impl FnMut(V) -> V) {
        let Table {
            occupied, values, ..
        } = &mut self.table;
        for bucket in occupied.iter_ones() {
            values[bucket] = remapping(values[bucket]);
        }
    }

    /// Iterates over all key-value pairs in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (BitVector, V)> + '_ {
        self.table
            .occupied
            .iter_ones()
            .map(|bucket| self.bucket_and_value(bucket))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn key(width: usize, value: u64) -> BitVector {
        let mut key = BitVector::new(width);
        key.set_from_int(0, width.min(64), value);
        key
    }

    #[test]
    fn test_find_or_add() {
        let mut map = BitVectorHashMap::<usize>::new(64, 0, 0.75).unwrap();
        assert_eq!(map.find_or_add_and_get_bucket(&key(64, 7), 0).unwrap().0, 0);
        assert_eq!(map.find_or_add_and_get_bucket(&key(64, 9), 1).unwrap().0, 1);
        // A known key keeps its value.
        assert_eq!(map.find_or_add_and_get_bucket(&key(64, 7), 2).unwrap().0, 0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_value(&key(64, 9)), 1);
        assert!(!map.contains(&key(64, 8)));
    }

    #[test]
    fn test_dense_unique_ids() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut map = BitVectorHashMap::<usize>::new(128, 0, 0.75).unwrap();
        let mut expected = HashMap::new();
        for _ in 0..5000 {
            let mut state = BitVector::new(128);
            state.set_from_int(0, 64, rng.random_range(0..2000));
            state.set_from_int(64, 64, rng.random_range(0..3));
            let proposed = map.len();
            let actual = map.find_or_add(&state, proposed).unwrap();
            let known = *expected.entry(state).or_insert(proposed);
            assert_eq!(actual, known);
        }
        assert_eq!(map.len(), expected.len());
        let ids: HashSet<usize> = map.iter().map(|(_, id)| id).collect();
        assert_eq!(ids, (0..expected.len()).collect());
    }

    #[test]
    fn test_three_growths_keep_entries() {
        let mut map = BitVectorHashMap::<usize>::new(64, 0, 0.75).unwrap();
        assert_eq!(map.capacity(), 5);
        for value in 0..30 {
            map.find_or_add(&key(64, value), value as usize).unwrap();
        }
        assert_eq!(map.capacity(), 79);
        assert_eq!(map.len(), 30);
        for value in 0..30 {
            assert!(map.contains(&key(64, value)));
            assert_eq!(map.get_value(&key(64, value)), value as usize);
        }
        assert!(!map.contains(&key(64, 30)));
    }

    #[test]
    fn test_full_table_grows_during_probe() {
        // A load factor above one lets the table fill up completely.
        let mut map = BitVectorHashMap::<usize>::new(64, 0, 2.0).unwrap();
        for value in 0..6 {
            map.find_or_add(&key(64, value), value as usize).unwrap();
        }
        assert_eq!(map.capacity(), 13);
        assert!((0..6).all(|value| map.contains(&key(64, value))));
    }

    #[test]
    fn test_keys_wider_than_a_word() {
        let mut map = BitVectorHashMap::<u32>::new(70, 0, 0.75).unwrap();
        let mut a = BitVector::new(70);
        a.set(69, true);
        let b = BitVector::new(70);
        map.find_or_add(&a, 1).unwrap();
        map.find_or_add(&b, 2).unwrap();
        assert_eq!(map.bucket_size(), 128);
        assert_eq!(map.get(&a), Some(1));
        assert_eq!(map.get(&b), Some(2));
        let keys: HashSet<BitVector> = map.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, HashSet::from([a, b]));
    }

    #[test]
    fn test_remap_and_set_or_add() {
        let mut map = BitVectorHashMap::<usize>::new(64, 10, 0.75).unwrap();
        for value in 0..4 {
            map.find_or_add(&key(64, value), value as usize).unwrap();
        }
        map.remap(|id| 3 - id);
        assert_eq!(map.get_value(&key(64, 0)), 3);
        assert_eq!(map.get_value(&key(64, 3)), 0);
        map.set_or_add(&key(64, 0), 10).unwrap();
        map.set_or_add(&key(64, 4), 11).unwrap();
        assert_eq!(map.get_value(&key(64, 0)), 10);
        assert_eq!(map.get_value(&key(64, 4)), 11);
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn test_initial_size_beyond_largest_capacity() {
        assert!(matches!(
            BitVectorHashMap::<usize>::new(64, 1073741789, 0.75),
            Err(StorageError::CapacityExhausted { .. })
        ));
        assert_eq!(BitVectorHashMap::<usize>::new(64, 13, 0.75).unwrap().capacity(), 31);
    }

    #[test]
    #[should_panic(expected = "Unknown key.")]
    fn test_get_value_of_missing_key() {
        let map = BitVectorHashMap::<usize>::new(64, 0, 0.75).unwrap();
        map.get_value(&key(64, 1));
    }

    #[test]
    #[should_panic(expected = "Key has wrong width.")]
    fn test_wrong_key_width() {
        let mut map = BitVectorHashMap::<usize>::new(64, 0, 0.75).unwrap();
        let _ = map.find_or_add(&BitVector::new(32), 0);
    }
}

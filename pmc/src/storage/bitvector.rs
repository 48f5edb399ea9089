//! Fixed-length bit vectors.
//!
//! A [`BitVector`] serves two purposes: it is the compressed encoding of a state
//! (see [`CompressedState`]) and it is the set representation used for labels,
//! initial states and Markovian states.
//!
//! Bits beyond [`BitVector::len`] are always zero. Equality and hashing therefore
//! only depend on the encoded bits, which the state index table relies on.

use std::fmt;

/// The compressed representation of one valuation of all model variables.
pub type CompressedState = BitVector;

/// A fixed-length bit vector backed by a vector of `u64` words.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitVector {
    /// Number of bits.
    length: usize,
    /// Storage: each u64 holds 64 bits, the least significant bit first.
    words: Vec<u64>,
}

impl BitVector {
    /// Number of bits per word.
    pub const BITS_PER_WORD: usize = 64;

    /// Creates a bit vector of the given length with all bits cleared.
    pub fn new(length: usize) -> Self {
        Self {
            length,
            words: vec![0; Self::words_for(length)],
        }
    }

    /// Creates a bit vector of the given length with the given bits set.
    ///
    /// # Panics
    ///
    /// Panics if an index is out-of-bounds.
    pub fn from_indices(length: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut result = Self::new(length);
        for index in indices {
            result.set(index, true);
        }
        result
    }

    /// Creates a bit vector from raw words, clearing the bits beyond `length`.
    pub fn from_words(length: usize, mut words: Vec<u64>) -> Self {
        words.resize(Self::words_for(length), 0);
        let mut result = Self { length, words };
        result.clear_padding();
        result
    }

    /// The number of words needed to store `length` bits.
    #[inline]
    pub fn words_for(length: usize) -> usize {
        length.div_ceil(Self::BITS_PER_WORD)
    }

    /// Returns the length in bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the bit vector has length zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the underlying words.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns true if the bit at the given index is set.
    ///
    /// # Panics
    ///
    /// Panics if the access is out-of-bounds.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(
            index < self.length,
            "Out-of-bounds access. (Index: {}, Length: {})",
            index,
            self.length
        );
        let (word, bit) = Self::word_and_bit(index);
        (self.words[word] >> bit) & 1 == 1
    }

    /// Sets the bit at the given index to `value`.
    ///
    /// # Panics
    ///
    /// Panics if the access is out-of-bounds.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(
            index < self.length,
            "Out-of-bounds access. (Index: {}, Length: {})",
            index,
            self.length
        );
        let (word, bit) = Self::word_and_bit(index);
        if value {
            self.words[word] |= 1 << bit;
        } else {
            self.words[word] &= !(1 << bit);
        }
    }

    /// Reads `width` bits starting at `offset` as an unsigned integer.
    ///
    /// # Panics
    ///
    /// Panics if `width` exceeds 64 or the range is out-of-bounds.
    pub fn get_as_int(&self, offset: usize, width: usize) -> u64 {
        assert!(width <= 64, "Integers are at most 64 bits wide.");
        assert!(offset + width <= self.length, "Out-of-bounds access.");
        if width == 0 {
            return 0;
        }
        let (word, bit) = Self::word_and_bit(offset);
        let mut value = self.words[word] >> bit;
        let taken = Self::BITS_PER_WORD - bit;
        if taken < width {
            value |= self.words[word + 1] << taken;
        }
        value & Self::mask(width)
    }

    /// Writes the lowest `width` bits of `value` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `width` exceeds 64 or the range is out-of-bounds.
    pub fn set_from_int(&mut self, offset: usize, width: usize, value: u64) {
        assert!(width <= 64, "Integers are at most 64 bits wide.");
        assert!(offset + width <= self.length, "Out-of-bounds access.");
        if width == 0 {
            return;
        }
        let value = value & Self::mask(width);
        let (word, bit) = Self::word_and_bit(offset);
        let low_mask = Self::mask(width) << bit;
        self.words[word] = (self.words[word] & !low_mask) | (value << bit);
        let taken = Self::BITS_PER_WORD - bit;
        if taken < width {
            let high_mask = Self::mask(width - taken);
            self.words[word + 1] = (self.words[word + 1] & !high_mask) | (value >> taken);
        }
    }

    /// Changes the length, clearing newly added bits.
    pub fn resize(&mut self, length: usize) {
        self.length = length;
        self.words.resize(Self::words_for(length), 0);
        self.clear_padding();
    }

    /// Grows the bit vector to at least `length` bits.
    pub fn grow(&mut self, length: usize) {
        if length > self.length {
            self.resize(length);
        }
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Returns true if no bit is set.
    pub fn none(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    /// Iterates over the indices of all set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(index, word)| {
                let mut word = *word;
                std::iter::from_fn(move || {
                    if word == 0 {
                        None
                    } else {
                        let bit = word.trailing_zeros() as usize;
                        word &= word - 1;
                        Some(index * Self::BITS_PER_WORD + bit)
                    }
                })
            })
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    #[inline]
    fn mask(width: usize) -> u64 {
        if width >= 64 { u64::MAX } else { (1 << width) - 1 }
    }

    fn clear_padding(&mut self) {
        let used = self.length % Self::BITS_PER_WORD;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= Self::mask(used);
            }
        }
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({self})")
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in 0..self.length {
            write!(f, "{}", if self.get(index) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_cleared() {
        let bits = BitVector::new(130);
        assert_eq!(bits.len(), 130);
        assert_eq!(bits.words().len(), 3);
        assert!(bits.none());
    }

    #[test]
    fn test_set_get() {
        let mut bits = BitVector::new(100);
        bits.set(3, true);
        bits.set(64, true);
        assert!(bits.get(3));
        assert!(bits.get(64));
        assert!(!bits.get(4));
        bits.set(3, false);
        assert!(!bits.get(3));
        assert_eq!(bits.count_ones(), 1);
    }

    #[test]
    fn test_int_across_word_boundary() {
        let mut bits = BitVector::new(128);
        bits.set_from_int(60, 10, 0b1011001101);
        assert_eq!(bits.get_as_int(60, 10), 0b1011001101);
        bits.set_from_int(60, 10, 3);
        assert_eq!(bits.get_as_int(60, 10), 3);
        assert_eq!(bits.get_as_int(0, 60), 0);
        assert_eq!(bits.get_as_int(70, 58), 0);
    }

    #[test]
    fn test_iter_ones() {
        let bits = BitVector::from_indices(200, [0, 5, 64, 199]);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0, 5, 64, 199]);
    }

    #[test]
    fn test_padding_does_not_affect_equality() {
        let a = BitVector::from_words(3, vec![0b1111_0101]);
        let b = BitVector::from_indices(3, [0, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_resize() {
        let mut bits = BitVector::from_indices(70, [1, 69]);
        bits.resize(10);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![1]);
        bits.grow(80);
        assert!(!bits.get(69));
        assert_eq!(bits.len(), 80);
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds() {
        BitVector::new(8).get(8);
    }
}

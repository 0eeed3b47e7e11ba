//! Define [`Nibbles`] and how to convert bytes and hex prefix encodings into
//! nibbles.
use std::fmt::{self, Debug, Display, LowerHex};

use bytes::Bytes;
use thiserror::Error;

// Use a whole byte for a Nibble just for convenience
/// A Nibble has 4 bits and is stored as `u8`.
pub type Nibble = u8;

/// The longest key (in nibbles) a trie path may have. Keys are at most 32
/// bytes long.
pub const MAX_NIBBLES: usize = 64;

const MULTIPLE_NIBBLES_APPEND_ASSERT_ERR_MSG: &str =
    "Attempted to create a nibbles sequence longer than 64!";

#[derive(Clone, Debug, Eq, Error, PartialEq, Hash)]
/// Errors encountered when converting from bytes to `Nibbles`.
pub enum BytesToNibblesError {
    #[error("Tried constructing `Nibbles` from a byte slice with more than 32 bytes (len: {0})")]
    /// The slice is too large.
    TooManyBytes(usize),
}

#[derive(Clone, Debug, Eq, Error, PartialEq, Hash)]
/// Errors encountered when converting a hex prefix encoding to nibbles.
pub enum FromHexPrefixError {
    #[error("Tried to convert an empty hex prefix byte string into `Nibbles`")]
    /// There was no flag byte.
    Empty,

    #[error("Tried to convert a hex prefix byte string into `Nibbles` with invalid flags at the start: {0:#04b}")]
    /// The hex prefix encoding flag is invalid.
    InvalidFlags(Nibble),

    #[error("Tried to convert a hex prefix byte string into `Nibbles` that was longer than 33 bytes: (bytes: {0}, length: {1})")]
    /// The hex prefix encoding is too large.
    TooLong(String, usize),
}

/// A sequence of nibbles, used both as a full trie key and as the key piece
/// stored in extension and leaf nodes.
///
/// Leading zero nibbles are significant: `0x0123` and `0x123` are different
/// keys.
#[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Nibbles {
    /// The number of nibbles in this sequence.
    count: usize,
    /// One nibble per byte. Only the first `count` entries are used; the rest
    /// are always zero so that derived comparisons stay correct.
    packed: [Nibble; MAX_NIBBLES],
}

impl Default for Nibbles {
    fn default() -> Self {
        Self {
            count: 0,
            packed: [0; MAX_NIBBLES],
        }
    }
}

impl Display for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as LowerHex>::fmt(self, f)
    }
}

impl LowerHex for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for n in self.iter() {
            write!(f, "{n:x}")?;
        }

        Ok(())
    }
}

// Manual impl in order to print `packed` nicely.
impl Debug for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nibbles")
            .field("count", &self.count)
            .field("packed", &format!("{self:x}"))
            .finish()
    }
}

impl Nibbles {
    /// Creates `Nibbles` from big endian bytes. Every byte becomes two
    /// nibbles, so the result is always byte padded.
    pub fn from_bytes_be(bytes: &[u8]) -> Result<Self, BytesToNibblesError> {
        if bytes.len() > MAX_NIBBLES / 2 {
            return Err(BytesToNibblesError::TooManyBytes(bytes.len()));
        }

        let mut nibbles = Self::default();
        for b in bytes {
            nibbles.push_nibble_back(b >> 4);
            nibbles.push_nibble_back(b & 0xf);
        }

        Ok(nibbles)
    }

    /// Creates `Nibbles` from a slice of nibbles.
    ///
    /// # Panics
    /// Panics if the slice is longer than [`MAX_NIBBLES`] or holds a value
    /// greater than 15.
    pub fn from_nibble_slice(nibs: &[Nibble]) -> Self {
        let mut nibbles = Self::default();
        for n in nibs {
            nibbles.push_nibble_back(*n);
        }

        nibbles
    }

    /// Creates a single nibble sequence.
    pub fn from_nibble(n: Nibble) -> Self {
        Self::from_nibble_slice(&[n])
    }

    /// The number of nibbles.
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if there are no nibbles.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The used nibbles as a slice.
    pub fn as_slice(&self) -> &[Nibble] {
        &self.packed[..self.count]
    }

    /// Iterates over the nibbles from the front.
    pub fn iter(&self) -> impl Iterator<Item = Nibble> + '_ {
        self.as_slice().iter().copied()
    }

    /// Gets the nibble at the given index.
    ///
    /// # Panics
    /// Panics if `idx` is out of bounds.
    pub fn get_nibble(&self, idx: usize) -> Nibble {
        assert!(idx < self.count, "nibble index {idx} out of bounds ({self})");
        self.packed[idx]
    }

    /// Pops the nibble at the front.
    ///
    /// # Panics
    /// Panics if there are no nibbles left.
    pub fn pop_next_nibble_front(&mut self) -> Nibble {
        let n = self.get_nibble(0);
        self.truncate_n_nibbles_front_mut(1);

        n
    }

    /// Appends a nibble at the back.
    ///
    /// # Panics
    /// Panics if the sequence is already full or `n` is not a nibble.
    pub fn push_nibble_back(&mut self, n: Nibble) {
        assert!(
            self.count < MAX_NIBBLES,
            "{}",
            MULTIPLE_NIBBLES_APPEND_ASSERT_ERR_MSG
        );
        assert!(n < 16, "Attempted to append a value greater than 15 as a nibble!");

        self.packed[self.count] = n;
        self.count += 1;
    }

    /// Drops the first `n` nibbles in place.
    pub fn truncate_n_nibbles_front_mut(&mut self, n: usize) {
        let n = n.min(self.count);
        self.packed.copy_within(n..self.count, 0);
        self.packed[self.count - n..self.count].fill(0);
        self.count -= n;
    }

    /// Returns a copy without the first `n` nibbles.
    pub fn truncate_n_nibbles_front(&self, n: usize) -> Nibbles {
        let mut copy = *self;
        copy.truncate_n_nibbles_front_mut(n);

        copy
    }

    /// Returns the first `n` nibbles.
    pub fn get_next_nibbles(&self, n: usize) -> Nibbles {
        Self::from_nibble_slice(&self.as_slice()[..n.min(self.count)])
    }

    /// Splits into the nibbles before `idx` and the nibbles from `idx` on.
    pub fn split_at_idx(&self, idx: usize) -> (Nibbles, Nibbles) {
        (self.get_next_nibbles(idx), self.truncate_n_nibbles_front(idx))
    }

    /// Concatenates `self` and `post`.
    pub fn merge_nibbles(&self, post: &Nibbles) -> Nibbles {
        assert!(
            self.count + post.count <= MAX_NIBBLES,
            "{}",
            MULTIPLE_NIBBLES_APPEND_ASSERT_ERR_MSG
        );

        let mut merged = *self;
        merged.packed[self.count..self.count + post.count].copy_from_slice(post.as_slice());
        merged.count += post.count;

        merged
    }

    /// Prepends a single nibble.
    pub fn with_nibble_front(&self, n: Nibble) -> Nibbles {
        Self::from_nibble(n).merge_nibbles(self)
    }

    /// Returns `true` if `prefix` is a prefix of `self`.
    pub fn starts_with(&self, prefix: &Nibbles) -> bool {
        self.as_slice().starts_with(prefix.as_slice())
    }

    /// Length of the longest common prefix of `self` and `other`.
    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        self.iter()
            .zip(other.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Returns the minimum number of bytes needed to represent these `Nibbles`.
    pub const fn min_bytes(&self) -> usize {
        (self.count + 1) / 2
    }

    /// Returns the nibbles as big endian bytes. An odd count is left padded
    /// with a zero nibble.
    pub fn bytes_be(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.min_bytes());
        let nibs = self.as_slice();
        let (head, rest) = match self.count % 2 {
            1 => (Some(nibs[0]), &nibs[1..]),
            _ => (None, nibs),
        };

        out.extend(head);
        out.extend(rest.chunks(2).map(|pair| (pair[0] << 4) | pair[1]));

        out
    }

    /// Converts `Nibbles` to hex-prefix encoding (AKA "compact").
    /// This appends an extra nibble to the end which encodes if the node is
    /// even and if it's a leaf (terminator) or not.
    pub fn to_hex_prefix_encoding(&self, is_leaf: bool) -> Bytes {
        let odd_bit = (self.count % 2) as u8;
        let term_bit = u8::from(is_leaf);
        let flags = odd_bit | (term_bit << 1);

        let mut out = Vec::with_capacity(self.count / 2 + 1);
        let nibs = self.as_slice();
        let rest = match odd_bit {
            1 => {
                out.push((flags << 4) | nibs[0]);
                &nibs[1..]
            }
            _ => {
                out.push(flags << 4);
                nibs
            }
        };
        out.extend(rest.chunks(2).map(|pair| (pair[0] << 4) | pair[1]));

        out.into()
    }

    /// Converts a hex prefix byte string ("AKA "compact") into `Nibbles`,
    /// also returning whether the terminator (leaf) flag was set.
    pub fn from_hex_prefix_encoding(
        hex_prefix_bytes: &[u8],
    ) -> Result<(Self, bool), FromHexPrefixError> {
        let Some((&first, rest)) = hex_prefix_bytes.split_first() else {
            return Err(FromHexPrefixError::Empty);
        };
        if hex_prefix_bytes.len() > MAX_NIBBLES / 2 + 1 {
            return Err(FromHexPrefixError::TooLong(
                hex::encode(hex_prefix_bytes),
                hex_prefix_bytes.len(),
            ));
        }

        // is_odd --> 0b01
        // is_leaf --> 0b10
        let flag_bits = first >> 4;
        let (is_leaf, is_odd) = match flag_bits {
            0b00 => (false, false),
            0b01 => (false, true),
            0b10 => (true, false),
            0b11 => (true, true),
            _ => return Err(FromHexPrefixError::InvalidFlags(flag_bits)),
        };

        if !is_odd && first & 0xf != 0 {
            return Err(FromHexPrefixError::InvalidFlags(flag_bits));
        }

        let mut nibbles = Nibbles::default();
        if is_odd {
            nibbles.push_nibble_back(first & 0xf);
        }
        if nibbles.count + rest.len() * 2 > MAX_NIBBLES {
            return Err(FromHexPrefixError::TooLong(
                hex::encode(hex_prefix_bytes),
                hex_prefix_bytes.len(),
            ));
        }
        for b in rest {
            nibbles.push_nibble_back(b >> 4);
            nibbles.push_nibble_back(b & 0xf);
        }

        Ok((nibbles, is_leaf))
    }
}

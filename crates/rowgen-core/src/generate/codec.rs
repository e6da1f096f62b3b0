//! # Alphabet Codec
//!
//! Bijective integer ↔ string codec over a configurable alphabet, used by
//! the sequence and random generators for text-typed columns. Stepping a
//! text value by `n` means decoding it to an integer, adding `n`, and
//! encoding back, the same way spreadsheets label columns
//! (`a`..`z`, `aa`, `ab`, ...), generalized to an arbitrary radix.
//!
//! The encoding is bijective (no zero digit): `a` = 1, `z` = 26, `aa` = 27
//! for the lowercase alphabet. The empty string maps to 0. This makes
//! `decode(encode(i)) == i` and `encode(decode(s)) == s` hold exactly.

use std::collections::HashMap;

/// Largest supported radix: lowercase + uppercase + digits.
pub const MAX_RADIX: usize = 62;

/// A positional alphabet. Lowercase letters are always present; uppercase
/// letters and digits are optional extensions of the radix.
#[derive(Debug, Clone)]
pub struct AlphabetCodec {
    chars: Vec<char>,
    index: HashMap<char, u64>,
}

impl AlphabetCodec {
    /// Lowercase letters only (radix 26). The default for text columns.
    pub fn lower() -> Self {
        Self::from_chars(('a'..='z').collect())
    }

    /// Lowercase and uppercase letters (radix 52).
    pub fn lower_upper() -> Self {
        Self::from_chars(('a'..='z').chain('A'..='Z').collect())
    }

    /// Lowercase, uppercase and digits (radix 62).
    pub fn alphanumeric() -> Self {
        Self::from_chars(('a'..='z').chain('A'..='Z').chain('0'..='9').collect())
    }

    fn from_chars(chars: Vec<char>) -> Self {
        debug_assert!(chars.len() <= MAX_RADIX);
        let index = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u64 + 1))
            .collect();
        Self { chars, index }
    }

    pub fn radix(&self) -> u64 {
        self.chars.len() as u64
    }

    /// Encode an integer as a bijective base-N string. 0 encodes to the
    /// empty string.
    pub fn encode(&self, mut value: u64) -> String {
        let radix = self.radix();
        let mut out = Vec::new();
        while value > 0 {
            let digit = (value - 1) % radix;
            out.push(self.chars[digit as usize]);
            value = (value - 1) / radix;
        }
        out.iter().rev().collect()
    }

    /// Decode a bijective base-N string back to its integer. Returns `None`
    /// when the string contains a character outside the alphabet.
    pub fn decode(&self, text: &str) -> Option<u64> {
        let radix = self.radix();
        let mut acc: u64 = 0;
        for c in text.chars() {
            let digit = *self.index.get(&c)?;
            acc = acc.checked_mul(radix)?.checked_add(digit)?;
        }
        Some(acc)
    }
}

impl Default for AlphabetCodec {
    fn default() -> Self {
        Self::lower()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters() {
        let codec = AlphabetCodec::lower();
        assert_eq!(codec.decode("a"), Some(1));
        assert_eq!(codec.decode("z"), Some(26));
        assert_eq!(codec.encode(1), "a");
        assert_eq!(codec.encode(26), "z");
        assert_eq!(codec.encode(27), "aa");
    }

    #[test]
    fn test_round_trip_integers() {
        let codec = AlphabetCodec::lower();
        for i in 0..5000 {
            assert_eq!(codec.decode(&codec.encode(i)), Some(i), "i={}", i);
        }
    }

    #[test]
    fn test_round_trip_strings() {
        let codec = AlphabetCodec::lower();
        for s in ["", "a", "q", "z", "aa", "az", "ba", "zz", "aaa", "rust"] {
            let decoded = codec.decode(s).unwrap();
            assert_eq!(codec.encode(decoded), s, "s={}", s);
        }
    }

    #[test]
    fn test_unknown_character_is_rejected() {
        let codec = AlphabetCodec::lower();
        assert_eq!(codec.decode("A"), None);
        assert_eq!(codec.decode("a1"), None);
    }

    #[test]
    fn test_extended_alphabets() {
        let codec = AlphabetCodec::alphanumeric();
        assert_eq!(codec.radix(), 62);
        for s in ["a", "Z", "9", "aA9"] {
            let decoded = codec.decode(s).unwrap();
            assert_eq!(codec.encode(decoded), s);
        }
        // Stepping 'z' lands on the next alphabet character, not 'aa',
        // because uppercase extends the radix.
        assert_eq!(codec.encode(codec.decode("z").unwrap() + 1), "A");
    }
}

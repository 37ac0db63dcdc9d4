//! Fixed-length strings over an arbitrary ordered alphabet.
//!
//! Positions are big-endian numbers in base `|alphabet|`: position 0 is the
//! first character repeated `length` times, the last position is the last
//! character repeated.
use std::collections::HashMap;

use serde_json::{Value, json};

use super::{CandidateSpace, SpaceKind, batch_len, check_position};
use crate::error::{CrackError, Result};

pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Ordered set of characters with an O(1) reverse index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    chars: Vec<char>,
    index: HashMap<char, usize>,
}

impl Alphabet {
    pub fn new(chars: &str) -> Result<Self> {
        let chars: Vec<char> = chars.chars().collect();
        if chars.is_empty() {
            return Err(CrackError::config("alphabet is empty"));
        }
        let mut index = HashMap::with_capacity(chars.len());
        for (i, &c) in chars.iter().enumerate() {
            if index.insert(c, i).is_some() {
                return Err(CrackError::config(format!(
                    "alphabet repeats character {c:?}"
                )));
            }
        }
        Ok(Self { chars, index })
    }

    /// Concatenate the preset sets in a fixed order: lower, upper, digits,
    /// symbols.
    pub fn from_sets(lowercase: bool, uppercase: bool, digits: bool, symbols: bool) -> Result<Self> {
        let mut s = String::new();
        for (on, set) in [
            (lowercase, LOWERCASE),
            (uppercase, UPPERCASE),
            (digits, DIGITS),
            (symbols, SYMBOLS),
        ] {
            if on {
                s.push_str(set);
            }
        }
        Self::new(&s)
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn index_of(&self, c: char) -> Option<usize> {
        self.index.get(&c).copied()
    }

    pub fn char_at(&self, i: usize) -> char {
        self.chars[i]
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetSpace {
    length: usize,
    alphabet: Alphabet,
    total: u64,
}

impl CharsetSpace {
    pub fn new(length: usize, alphabet: Alphabet) -> Result<Self> {
        if length == 0 {
            return Err(CrackError::config("candidate length must be at least 1"));
        }
        let total = u32::try_from(length)
            .ok()
            .and_then(|l| (alphabet.len() as u64).checked_pow(l))
            .ok_or_else(|| {
                CrackError::config(format!(
                    "{} characters at length {length} exceeds 64-bit positions",
                    alphabet.len()
                ))
            })?;
        Ok(Self {
            length,
            alphabet,
            total,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Base-`|alphabet|` digits of `position`, most significant first.
    fn digits_of(&self, mut position: u64) -> Vec<usize> {
        let base = self.alphabet.len() as u64;
        let mut digits = vec![0usize; self.length];
        for slot in digits.iter_mut().rev() {
            *slot = (position % base) as usize;
            position /= base;
        }
        digits
    }

    fn render(&self, digits: &[usize]) -> String {
        digits.iter().map(|&d| self.alphabet.char_at(d)).collect()
    }
}

impl CandidateSpace for CharsetSpace {
    fn kind(&self) -> SpaceKind {
        SpaceKind::FixedLengthCharset
    }

    fn params(&self) -> Value {
        // Code points rather than a string: fingerprints compare strings
        // case-insensitively, which would merge "abc" and "ABC".
        let alphabet: Vec<u32> = self.alphabet.chars.iter().map(|&c| c as u32).collect();
        json!({ "length": self.length, "alphabet": alphabet })
    }

    fn total_count(&self) -> u64 {
        self.total
    }

    fn position_to_candidate(&self, position: u64) -> Result<String> {
        check_position(position, self.total)?;
        Ok(self.render(&self.digits_of(position)))
    }

    fn candidate_to_position(&self, candidate: &str) -> Result<u64> {
        let base = self.alphabet.len() as u64;
        let mut position = 0u64;
        let mut seen = 0usize;
        for c in candidate.chars() {
            seen += 1;
            if seen > self.length {
                break;
            }
            let idx = self.alphabet.index_of(c).ok_or_else(|| {
                CrackError::not_found(format!("{c:?} is not in the alphabet"))
            })?;
            position = position * base + idx as u64;
        }
        if seen != self.length {
            return Err(CrackError::not_found(format!(
                "{candidate:?} is not {} characters long",
                self.length
            )));
        }
        Ok(position)
    }

    fn generate_batch(&self, start: u64, count: u64) -> Result<Vec<String>> {
        let len = batch_len(start, count, self.total)?;
        let mut out = Vec::with_capacity(len as usize);
        if len == 0 {
            return Ok(out);
        }
        let base = self.alphabet.len();
        let mut digits = self.digits_of(start);
        out.push(self.render(&digits));
        for _ in 1..len {
            // Odometer increment from the least significant character.
            for d in digits.iter_mut().rev() {
                *d += 1;
                if *d < base {
                    break;
                }
                *d = 0;
            }
            out.push(self.render(&digits));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc(length: usize) -> CharsetSpace {
        CharsetSpace::new(length, Alphabet::new("abc").unwrap()).unwrap()
    }

    #[test]
    fn size_is_alphabet_to_the_length() {
        let s = abc(4);
        assert_eq!(s.total_count(), 81);
        assert_eq!(s.position_to_candidate(0).unwrap(), "aaaa");
        assert_eq!(s.position_to_candidate(80).unwrap(), "cccc");
    }

    #[test]
    fn big_endian_numbering() {
        let s = abc(2);
        let all = s.generate_batch(0, 9).unwrap();
        assert_eq!(
            all,
            vec!["aa", "ab", "ac", "ba", "bb", "bc", "ca", "cb", "cc"]
        );
        assert_eq!(s.candidate_to_position("ca").unwrap(), 6);
    }

    #[test]
    fn batch_matches_pointwise_mapping() {
        let s = CharsetSpace::new(3, Alphabet::from_sets(true, false, true, false).unwrap()).unwrap();
        let batch = s.generate_batch(1_000, 500).unwrap();
        for (i, c) in batch.iter().enumerate() {
            assert_eq!(*c, s.position_to_candidate(1_000 + i as u64).unwrap());
        }
    }

    #[test]
    fn foreign_characters_and_lengths_are_not_members() {
        let s = abc(3);
        assert!(matches!(
            s.candidate_to_position("abd"),
            Err(CrackError::NotFound(_))
        ));
        assert!(matches!(
            s.candidate_to_position("ab"),
            Err(CrackError::NotFound(_))
        ));
        assert!(matches!(
            s.candidate_to_position("abca"),
            Err(CrackError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_alphabets_are_rejected() {
        assert!(matches!(Alphabet::new(""), Err(CrackError::Configuration(_))));
        assert!(matches!(
            Alphabet::new("abca"),
            Err(CrackError::Configuration(_))
        ));
        assert!(matches!(
            Alphabet::from_sets(false, false, false, false),
            Err(CrackError::Configuration(_))
        ));
        assert!(matches!(
            CharsetSpace::new(0, Alphabet::new("ab").unwrap()),
            Err(CrackError::Configuration(_))
        ));
    }

    #[test]
    fn preset_sets_have_expected_sizes() {
        assert_eq!(Alphabet::from_sets(true, true, false, false).unwrap().len(), 52);
        assert_eq!(Alphabet::from_sets(true, true, true, false).unwrap().len(), 62);
        assert_eq!(Alphabet::from_sets(true, true, true, true).unwrap().len(), 94);
    }

    #[test]
    fn case_distinct_alphabets_have_distinct_params() {
        let lower = CharsetSpace::new(2, Alphabet::new(LOWERCASE).unwrap()).unwrap();
        let upper = CharsetSpace::new(2, Alphabet::new(UPPERCASE).unwrap()).unwrap();
        assert_ne!(lower.params(), upper.params());
    }

    #[test]
    fn multibyte_alphabet_round_trips() {
        let s = CharsetSpace::new(2, Alphabet::new("äöü").unwrap()).unwrap();
        let c = s.position_to_candidate(5).unwrap();
        assert_eq!(c, "öü");
        assert_eq!(s.candidate_to_position(&c).unwrap(), 5);
    }
}

//! Fixed-length numeric PINs: position `p` is `p` itself, zero-padded.
use serde_json::{Value, json};

use super::{CandidateSpace, SpaceKind, batch_len, check_position};
use crate::error::{CrackError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitSpace {
    length: usize,
    total: u64,
}

impl DigitSpace {
    /// Lengths 1 through 19 are supported; `10^20` no longer fits a `u64`.
    pub fn new(length: usize) -> Result<Self> {
        if length == 0 {
            return Err(CrackError::config("digit length must be at least 1"));
        }
        let total = u32::try_from(length)
            .ok()
            .and_then(|l| 10u64.checked_pow(l))
            .ok_or_else(|| {
                CrackError::config(format!("{length}-digit space exceeds 64-bit positions"))
            })?;
        Ok(Self { length, total })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl CandidateSpace for DigitSpace {
    fn kind(&self) -> SpaceKind {
        SpaceKind::FixedLengthDigits
    }

    fn params(&self) -> Value {
        json!({ "length": self.length })
    }

    fn total_count(&self) -> u64 {
        self.total
    }

    fn position_to_candidate(&self, position: u64) -> Result<String> {
        check_position(position, self.total)?;
        Ok(format!("{:0width$}", position, width = self.length))
    }

    fn candidate_to_position(&self, candidate: &str) -> Result<u64> {
        if candidate.len() != self.length || !candidate.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CrackError::not_found(format!(
                "{candidate:?} is not a {}-digit candidate",
                self.length
            )));
        }
        // All-digit and at most 19 characters, so this cannot overflow.
        candidate
            .parse::<u64>()
            .map_err(|_| CrackError::not_found(format!("{candidate:?} is not numeric")))
    }

    fn generate_batch(&self, start: u64, count: u64) -> Result<Vec<String>> {
        let len = batch_len(start, count, self.total)?;
        Ok((start..start + len)
            .map(|p| format!("{:0width$}", p, width = self.length))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_and_parses() {
        let s = DigitSpace::new(4).unwrap();
        assert_eq!(s.total_count(), 10_000);
        assert_eq!(s.position_to_candidate(42).unwrap(), "0042");
        assert_eq!(s.candidate_to_position("0042").unwrap(), 42);
        assert_eq!(s.position_to_candidate(9999).unwrap(), "9999");
    }

    #[test]
    fn rejects_out_of_range_and_foreign_candidates() {
        let s = DigitSpace::new(3).unwrap();
        assert!(matches!(
            s.position_to_candidate(1000),
            Err(CrackError::Range { .. })
        ));
        assert!(matches!(
            s.candidate_to_position("12"),
            Err(CrackError::NotFound(_))
        ));
        assert!(matches!(
            s.candidate_to_position("1a2"),
            Err(CrackError::NotFound(_))
        ));
        assert!(matches!(
            s.candidate_to_position("+12"),
            Err(CrackError::NotFound(_))
        ));
    }

    #[test]
    fn zero_and_oversized_lengths_are_configuration_errors() {
        assert!(matches!(DigitSpace::new(0), Err(CrackError::Configuration(_))));
        assert!(matches!(DigitSpace::new(20), Err(CrackError::Configuration(_))));
        assert_eq!(DigitSpace::new(19).unwrap().total_count(), 10u64.pow(19));
    }

    #[test]
    fn batch_is_clipped_at_end() {
        let s = DigitSpace::new(2).unwrap();
        let batch = s.generate_batch(97, 10).unwrap();
        assert_eq!(batch, vec!["97", "98", "99"]);
    }
}

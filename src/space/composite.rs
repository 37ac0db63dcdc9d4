//! Concatenation of sub-spaces into one position range.
use serde_json::{Value, json};

use super::{CandidateSpace, PasswordSpace, SpaceKind, batch_len, check_position};
use crate::error::{CrackError, Result};

#[derive(Debug, Clone)]
pub struct CompositeSpace {
    parts: Vec<PasswordSpace>,
    /// `cumulative[i]` is the first global position of `parts[i]`;
    /// the final entry is the total.
    cumulative: Vec<u64>,
}

impl CompositeSpace {
    pub fn new(parts: Vec<PasswordSpace>) -> Result<Self> {
        if parts.is_empty() {
            return Err(CrackError::config("composite space has no sub-spaces"));
        }
        let mut cumulative = Vec::with_capacity(parts.len() + 1);
        let mut acc = 0u64;
        cumulative.push(acc);
        for part in &parts {
            acc = acc.checked_add(part.total_count()).ok_or_else(|| {
                CrackError::config("composite space exceeds 64-bit positions")
            })?;
            cumulative.push(acc);
        }
        Ok(Self { parts, cumulative })
    }

    pub fn parts(&self) -> &[PasswordSpace] {
        &self.parts
    }

    /// Map a global position to `(sub-space index, local position)`.
    pub fn locate(&self, position: u64) -> Result<(usize, u64)> {
        check_position(position, self.total_count())?;
        // Empty sub-spaces share a boundary with their successor; the last
        // boundary not above `position` belongs to the non-empty one.
        let idx = self.cumulative.partition_point(|&c| c <= position) - 1;
        Ok((idx, position - self.cumulative[idx]))
    }
}

impl CandidateSpace for CompositeSpace {
    fn kind(&self) -> SpaceKind {
        SpaceKind::Composite
    }

    fn params(&self) -> Value {
        let parts: Vec<Value> = self
            .parts
            .iter()
            .map(|p| json!({ "type": p.kind(), "params": p.params() }))
            .collect();
        json!({ "parts": parts })
    }

    fn total_count(&self) -> u64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    fn position_to_candidate(&self, position: u64) -> Result<String> {
        let (idx, local) = self.locate(position)?;
        self.parts[idx].position_to_candidate(local)
    }

    fn candidate_to_position(&self, candidate: &str) -> Result<u64> {
        for (part, offset) in self.parts.iter().zip(&self.cumulative) {
            if let Ok(local) = part.candidate_to_position(candidate) {
                return Ok(offset + local);
            }
        }
        Err(CrackError::not_found(format!(
            "{candidate:?} is not in any sub-space"
        )))
    }

    fn generate_batch(&self, start: u64, count: u64) -> Result<Vec<String>> {
        let len = batch_len(start, count, self.total_count())?;
        let mut out = Vec::with_capacity(len as usize);
        if len == 0 {
            return Ok(out);
        }
        let end = start + len;
        let (mut idx, mut local) = self.locate(start)?;
        let mut pos = start;
        while pos < end {
            let part = &self.parts[idx];
            let take = (end - pos).min(part.total_count() - local);
            out.extend(part.generate_batch(local, take)?);
            pos += take;
            idx += 1;
            local = 0;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{Alphabet, CharsetSpace, DigitSpace};

    fn digits_1_to_3() -> CompositeSpace {
        CompositeSpace::new(
            (1..=3)
                .map(|l| DigitSpace::new(l).unwrap().into())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn total_is_sum_of_parts() {
        assert_eq!(digits_1_to_3().total_count(), 10 + 100 + 1000);
    }

    #[test]
    fn boundaries_map_to_local_zero() {
        let c = digits_1_to_3();
        assert_eq!(c.locate(9).unwrap(), (0, 9));
        assert_eq!(c.locate(10).unwrap(), (1, 0));
        assert_eq!(c.locate(110).unwrap(), (2, 0));
        assert_eq!(c.position_to_candidate(10).unwrap(), "00");
        assert_eq!(c.position_to_candidate(110).unwrap(), "000");
        assert!(matches!(
            c.position_to_candidate(1110),
            Err(CrackError::Range { .. })
        ));
    }

    #[test]
    fn batches_stitch_across_boundaries() {
        let c = digits_1_to_3();
        let batch = c.generate_batch(8, 4).unwrap();
        assert_eq!(batch, vec!["8", "9", "00", "01"]);
        let tail = c.generate_batch(108, 5).unwrap();
        assert_eq!(tail, vec!["98", "99", "000", "001", "002"]);
    }

    #[test]
    fn reverse_lookup_returns_first_owning_part() {
        let c = digits_1_to_3();
        assert_eq!(c.candidate_to_position("7").unwrap(), 7);
        assert_eq!(c.candidate_to_position("07").unwrap(), 17);
        assert_eq!(c.candidate_to_position("007").unwrap(), 117);
        assert!(matches!(
            c.candidate_to_position("x"),
            Err(CrackError::NotFound(_))
        ));
    }

    #[test]
    fn mixed_parts_and_empty_composite() {
        let mixed = CompositeSpace::new(vec![
            DigitSpace::new(1).unwrap().into(),
            CharsetSpace::new(1, Alphabet::new("xy").unwrap()).unwrap().into(),
        ])
        .unwrap();
        assert_eq!(mixed.generate_batch(9, 10).unwrap(), vec!["9", "x", "y"]);
        assert_eq!(mixed.params()["parts"][1]["type"], "FixedLengthCharset");

        assert!(matches!(
            CompositeSpace::new(Vec::new()),
            Err(CrackError::Configuration(_))
        ));
    }
}

//! Candidate spaces: bijective, position-addressable enumerations of guesses.
//!
//! Every space maps an integer position in `[0, total_count)` to exactly one
//! candidate string and back. The distributor only ever talks to spaces in
//! terms of positions, which is what makes dispatch resumable: a checkpoint
//! is a position plus the space's identity (`kind` + `params`).
//!
//! The closed set of variants lives in [`PasswordSpace`]; each variant is its
//! own struct implementing [`CandidateSpace`].
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CrackError, Result};

pub mod charset;
pub mod composite;
pub mod digits;
pub mod heuristic;
pub mod wordlist;

pub use charset::{Alphabet, CharsetSpace};
pub use composite::CompositeSpace;
pub use digits::DigitSpace;
pub use heuristic::{HeuristicConfig, HeuristicSpace};
pub use wordlist::{Transform, WordListSpace};

/// Type tag of a space, serialized verbatim into checkpoint records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceKind {
    FixedLengthDigits,
    FixedLengthCharset,
    WordList,
    HeuristicSet,
    Composite,
}

impl SpaceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SpaceKind::FixedLengthDigits => "FixedLengthDigits",
            SpaceKind::FixedLengthCharset => "FixedLengthCharset",
            SpaceKind::WordList => "WordList",
            SpaceKind::HeuristicSet => "HeuristicSet",
            SpaceKind::Composite => "Composite",
        }
    }
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four enumeration operations plus the identity used for checkpoints.
pub trait CandidateSpace {
    fn kind(&self) -> SpaceKind;

    /// Parameter object identifying this space among others of its kind.
    fn params(&self) -> Value;

    fn total_count(&self) -> u64;

    fn position_to_candidate(&self, position: u64) -> Result<String>;

    fn candidate_to_position(&self, candidate: &str) -> Result<u64>;

    /// Candidates for `[start, start + count)`, clipped to the end of the
    /// space.
    fn generate_batch(&self, start: u64, count: u64) -> Result<Vec<String>> {
        let len = batch_len(start, count, self.total_count())?;
        (start..start + len)
            .map(|p| self.position_to_candidate(p))
            .collect()
    }
}

/// Number of candidates a batch starting at `start` actually holds.
pub(crate) fn batch_len(start: u64, count: u64, total: u64) -> Result<u64> {
    if start > total {
        return Err(CrackError::Range {
            position: start,
            total,
        });
    }
    Ok(count.min(total - start))
}

pub(crate) fn check_position(position: u64, total: u64) -> Result<()> {
    if position >= total {
        return Err(CrackError::Range { position, total });
    }
    Ok(())
}

/// Closed set of enumeration strategies.
#[derive(Debug, Clone)]
pub enum PasswordSpace {
    Digits(DigitSpace),
    Charset(CharsetSpace),
    WordList(WordListSpace),
    Heuristic(HeuristicSpace),
    Composite(CompositeSpace),
}

impl PasswordSpace {
    fn inner(&self) -> &dyn CandidateSpace {
        match self {
            PasswordSpace::Digits(s) => s,
            PasswordSpace::Charset(s) => s,
            PasswordSpace::WordList(s) => s,
            PasswordSpace::Heuristic(s) => s,
            PasswordSpace::Composite(s) => s,
        }
    }

    /// Short human label, e.g. `FixedLengthDigits(len=4)`.
    pub fn describe(&self) -> String {
        match self {
            PasswordSpace::Digits(s) => format!("{}(len={})", self.kind(), s.length()),
            PasswordSpace::Charset(s) => format!(
                "{}(len={}, alphabet={})",
                self.kind(),
                s.length(),
                s.alphabet().len()
            ),
            PasswordSpace::WordList(s) => {
                format!("{}({})", self.kind(), s.source().display())
            }
            PasswordSpace::Heuristic(s) => format!("{}(cap={})", self.kind(), s.config().cap),
            PasswordSpace::Composite(s) => format!("{}(parts={})", self.kind(), s.parts().len()),
        }
    }
}

impl CandidateSpace for PasswordSpace {
    fn kind(&self) -> SpaceKind {
        self.inner().kind()
    }

    fn params(&self) -> Value {
        self.inner().params()
    }

    fn total_count(&self) -> u64 {
        self.inner().total_count()
    }

    fn position_to_candidate(&self, position: u64) -> Result<String> {
        self.inner().position_to_candidate(position)
    }

    fn candidate_to_position(&self, candidate: &str) -> Result<u64> {
        self.inner().candidate_to_position(candidate)
    }

    fn generate_batch(&self, start: u64, count: u64) -> Result<Vec<String>> {
        self.inner().generate_batch(start, count)
    }
}

impl From<DigitSpace> for PasswordSpace {
    fn from(s: DigitSpace) -> Self {
        PasswordSpace::Digits(s)
    }
}

impl From<CharsetSpace> for PasswordSpace {
    fn from(s: CharsetSpace) -> Self {
        PasswordSpace::Charset(s)
    }
}

impl From<WordListSpace> for PasswordSpace {
    fn from(s: WordListSpace) -> Self {
        PasswordSpace::WordList(s)
    }
}

impl From<HeuristicSpace> for PasswordSpace {
    fn from(s: HeuristicSpace) -> Self {
        PasswordSpace::Heuristic(s)
    }
}

impl From<CompositeSpace> for PasswordSpace {
    fn from(s: CompositeSpace) -> Self {
        PasswordSpace::Composite(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_len_clips_and_rejects_out_of_range_start() {
        assert_eq!(batch_len(0, 10, 100).unwrap(), 10);
        assert_eq!(batch_len(95, 10, 100).unwrap(), 5);
        assert_eq!(batch_len(100, 10, 100).unwrap(), 0);
        assert!(matches!(
            batch_len(101, 1, 100),
            Err(CrackError::Range { position: 101, .. })
        ));
    }

    #[test]
    fn enum_delegates_to_variant() {
        let space: PasswordSpace = DigitSpace::new(2).unwrap().into();
        assert_eq!(space.kind(), SpaceKind::FixedLengthDigits);
        assert_eq!(space.total_count(), 100);
        assert_eq!(space.position_to_candidate(7).unwrap(), "07");
        assert_eq!(space.describe(), "FixedLengthDigits(len=2)");
    }

    #[test]
    fn kind_serializes_as_its_name() {
        let json = serde_json::to_string(&SpaceKind::HeuristicSet).unwrap();
        assert_eq!(json, "\"HeuristicSet\"");
    }
}

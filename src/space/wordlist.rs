//! Dictionary candidates: a line-delimited source expanded by transforms.
//!
//! The space is the sorted, deduplicated union of every source entry and
//! every transformed form of it, so positions are stable for a given source
//! and transform set regardless of line order or duplicates in the file.
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::{CandidateSpace, SpaceKind, batch_len, check_position};
use crate::error::{CrackError, Result};
use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, read_entries};

/// Rewrite applied to every word-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    Lowercase,
    Uppercase,
    /// First character upper-cased, the rest lower-cased.
    Capitalize,
    Reverse,
    /// Numeric suffixes `0` through `9` and `123`.
    Digits,
}

impl Transform {
    pub const DEFAULTS: [Transform; 5] = [
        Transform::Capitalize,
        Transform::Lowercase,
        Transform::Uppercase,
        Transform::Reverse,
        Transform::Digits,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Lowercase => "lowercase",
            Transform::Uppercase => "uppercase",
            Transform::Capitalize => "capitalize",
            Transform::Reverse => "reverse",
            Transform::Digits => "digits",
        }
    }

    pub fn apply(&self, word: &str) -> Vec<String> {
        match self {
            Transform::Lowercase => vec![word.to_lowercase()],
            Transform::Uppercase => vec![word.to_uppercase()],
            Transform::Capitalize => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        let mut s: String = first.to_uppercase().collect();
                        s.push_str(&chars.as_str().to_lowercase());
                        vec![s]
                    }
                    None => vec![String::new()],
                }
            }
            Transform::Reverse => vec![word.chars().rev().collect()],
            Transform::Digits => (0..10)
                .map(|d| format!("{word}{d}"))
                .chain(std::iter::once(format!("{word}123")))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WordListSpace {
    source: PathBuf,
    transforms: Vec<Transform>,
    words: Vec<String>,
    digest: String,
}

impl WordListSpace {
    pub fn new(source: &Path, transforms: &[Transform]) -> Result<Self> {
        Self::with_threshold(source, transforms, DEFAULT_MMAP_THRESHOLD_BYTES)
    }

    pub fn with_threshold(source: &Path, transforms: &[Transform], mmap_threshold: u64) -> Result<Self> {
        let entries = read_entries(source, mmap_threshold)?;
        let canonical = std::fs::canonicalize(source)?;
        debug!(
            "Loaded {} entries from {}",
            entries.len(),
            canonical.display()
        );
        Self::from_entries(canonical, entries, transforms)
    }

    /// Build from already-loaded entries; `source` only labels the space.
    pub fn from_entries(source: PathBuf, entries: Vec<String>, transforms: &[Transform]) -> Result<Self> {
        let mut transforms = transforms.to_vec();
        transforms.sort();
        transforms.dedup();

        let mut words: Vec<String> = entries
            .par_iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .flat_map_iter(|e| {
                std::iter::once(e.to_string()).chain(transforms.iter().flat_map(move |t| t.apply(e)))
            })
            .filter(|w| !w.is_empty())
            .collect();
        words.par_sort_unstable();
        words.dedup();

        if words.is_empty() {
            return Err(CrackError::config(format!(
                "word list {} yields no candidates",
                source.display()
            )));
        }

        let mut hasher = Sha256::new();
        for w in &words {
            hasher.update(w.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hex::encode(hasher.finalize())[..16].to_string();

        Ok(Self {
            source,
            transforms,
            words,
            digest,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }
}

impl CandidateSpace for WordListSpace {
    fn kind(&self) -> SpaceKind {
        SpaceKind::WordList
    }

    fn params(&self) -> Value {
        let transforms: Vec<&str> = self.transforms.iter().map(Transform::name).collect();
        json!({
            "source": self.source.display().to_string(),
            "transforms": transforms,
            "digest": self.digest,
        })
    }

    fn total_count(&self) -> u64 {
        self.words.len() as u64
    }

    fn position_to_candidate(&self, position: u64) -> Result<String> {
        check_position(position, self.total_count())?;
        Ok(self.words[position as usize].clone())
    }

    fn candidate_to_position(&self, candidate: &str) -> Result<u64> {
        self.words
            .binary_search_by(|w| w.as_str().cmp(candidate))
            .map(|i| i as u64)
            .map_err(|_| CrackError::not_found(format!("{candidate:?} is not in the word list")))
    }

    fn generate_batch(&self, start: u64, count: u64) -> Result<Vec<String>> {
        let len = batch_len(start, count, self.total_count())?;
        let (start, end) = (start as usize, (start + len) as usize);
        Ok(self.words[start..end].to_vec())
    }
}

//! Precomputed "likely PIN" set: years, digit runs, repeats, well-known
//! sequences and calendar dates in common field orders.
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{CandidateSpace, SpaceKind, batch_len, check_position};
use crate::error::{CrackError, Result};

pub const DEFAULT_SEED: u64 = 0x5eed_d0c5;
pub const DEFAULT_CAP: usize = 1_000_000;

const COMMON_SEQUENCES: [&str; 10] = [
    "123123", "112233", "121212", "123321", "654321", "789456", "456789", "147258", "258369",
    "159753",
];

const RUN_LENGTHS: std::ops::RangeInclusive<usize> = 4..=8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub year_start: i32,
    pub year_end: i32,
    /// Upper bound on the set size; larger sets are subsampled.
    pub cap: usize,
    /// `None` draws a seed from entropy at construction time.
    pub seed: Option<u64>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            year_start: 1950,
            year_end: 2023,
            cap: DEFAULT_CAP,
            seed: Some(DEFAULT_SEED),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicSpace {
    config: HeuristicConfig,
    words: Vec<String>,
    subsampled: bool,
}

impl HeuristicSpace {
    pub fn new(mut config: HeuristicConfig) -> Result<Self> {
        if config.year_start > config.year_end {
            return Err(CrackError::config(format!(
                "year range {}..={} is empty",
                config.year_start, config.year_end
            )));
        }
        if config.year_start < 0 || config.year_end > 9999 {
            return Err(CrackError::config("years must be within 0..=9999"));
        }
        if config.cap == 0 {
            return Err(CrackError::config("heuristic cap must be at least 1"));
        }
        let mut words = generate(config.year_start, config.year_end);
        words.par_sort_unstable();
        words.dedup();
        let full = words.len();

        let subsampled = full > config.cap;
        if subsampled {
            let seed = match config.seed {
                Some(seed) => seed,
                None => {
                    let drawn = rand::random::<u64>();
                    info!("Heuristic subsample seed: {drawn}");
                    drawn
                }
            };
            config.seed = Some(seed);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut keep = rand::seq::index::sample(&mut rng, full, config.cap).into_vec();
            keep.sort_unstable();
            let picked: Vec<String> = keep
                .into_iter()
                .map(|i| std::mem::take(&mut words[i]))
                .collect();
            words = picked;
            debug!("Subsampled heuristic set from {full} to {}", words.len());
        }

        Ok(Self {
            config,
            words,
            subsampled,
        })
    }

    /// Effective configuration; `seed` holds the one actually used when the
    /// set was subsampled.
    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    pub fn is_subsampled(&self) -> bool {
        self.subsampled
    }
}

fn generate(year_start: i32, year_end: i32) -> Vec<String> {
    let mut words: Vec<String> = (year_start..=year_end)
        .into_par_iter()
        .flat_map_iter(year_patterns)
        .collect();

    for len in RUN_LENGTHS {
        let ascending: String = (0..len).map(|j| digit(j % 10)).collect();
        let from_one: String = (1..=len).map(|j| digit(j % 10)).collect();
        let descending: String = (0..len).map(|j| digit(9 - j % 10)).collect();
        words.push(ascending.chars().rev().collect());
        words.push(from_one.chars().rev().collect());
        words.push(ascending);
        words.push(from_one);
        words.push(descending);
        for d in 0..10 {
            words.push(digit(d).to_string().repeat(len));
        }
    }
    words.extend(COMMON_SEQUENCES.iter().map(|s| s.to_string()));
    words
}

fn digit(d: usize) -> char {
    char::from(b'0' + d as u8)
}

/// The year itself plus every real date in it, in five field orders.
fn year_patterns(year: i32) -> Vec<String> {
    let mut out = vec![format!("{year:04}")];
    let Some(first) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return out;
    };
    let yy = year.rem_euclid(100);
    for date in first.iter_days().take_while(|d| d.year() == year) {
        let (m, d) = (date.month(), date.day());
        out.push(format!("{m:02}{d:02}{year:04}"));
        out.push(format!("{d:02}{m:02}{year:04}"));
        out.push(format!("{year:04}{m:02}{d:02}"));
        out.push(format!("{m:02}{d:02}{yy:02}"));
        out.push(format!("{d:02}{m:02}{yy:02}"));
    }
    out
}

impl CandidateSpace for HeuristicSpace {
    fn kind(&self) -> SpaceKind {
        SpaceKind::HeuristicSet
    }

    fn params(&self) -> Value {
        json!({
            "year_start": self.config.year_start,
            "year_end": self.config.year_end,
            "cap": self.config.cap,
            // The seed only shapes the set when it was subsampled.
            "seed": self.config.seed.filter(|_| self.subsampled),
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
            .map_err(|_| CrackError::not_found(format!("{candidate:?} is not a heuristic candidate")))
    }

    fn generate_batch(&self, start: u64, count: u64) -> Result<Vec<String>> {
        let len = batch_len(start, count, self.total_count())?;
        Ok(self.words[start as usize..(start + len) as usize].to_vec())
    }
}

//! Run configuration: every knob of a search, loadable from and savable to a
//! JSON file. Missing fields take their defaults, and the binary overlays
//! command-line flags on top of whatever the file provides.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::distributor::DistributorConfig;
use crate::error::CrackError;
use crate::oracle::{CommandOracle, DigestOracle, Oracle};
use crate::orchestrator::Strategy;
use crate::space::{HeuristicConfig, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// Target file holds the hex SHA-256 of the credential
    Digest,
    /// External verifier command, exit 0 on success
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub kind: OracleKind,
    /// Argument template with `{target}` and `{candidate}` placeholders.
    pub command: Option<String>,
    pub no_match_codes: Vec<i32>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::Digest,
            command: None,
            no_match_codes: CommandOracle::DEFAULT_NO_MATCH_CODES.to_vec(),
        }
    }
}

impl OracleConfig {
    pub fn build(&self) -> crate::error::Result<Arc<dyn Oracle>> {
        match self.kind {
            OracleKind::Digest => Ok(Arc::new(DigestOracle::new())),
            OracleKind::Command => {
                let template = self.command.as_deref().ok_or_else(|| {
                    CrackError::config("command oracle selected without a command")
                })?;
                let oracle = CommandOracle::from_template(template)?
                    .with_no_match_codes(self.no_match_codes.iter().copied());
                Ok(Arc::new(oracle))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub strategies: Vec<Strategy>,
    pub min_length: usize,
    pub max_length: usize,
    /// Exact length; overrides the bounds when set.
    pub length: Option<usize>,
    pub workers: usize,
    pub batch_size: Option<u64>,
    /// Defaults to the target's directory.
    pub checkpoint_dir: Option<PathBuf>,
    pub checkpoint_interval_secs: f64,
    pub ignore_checkpoint: bool,
    pub wordlist: Option<PathBuf>,
    pub transforms: Vec<Transform>,
    pub lowercase: bool,
    pub uppercase: bool,
    pub symbols: bool,
    pub heuristic: HeuristicConfig,
    pub merge_lengths: bool,
    pub result_path: Option<PathBuf>,
    pub oracle: OracleConfig,
}

pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategies: vec![Strategy::HeuristicSet, Strategy::FixedLengthDigits],
            min_length: 3,
            max_length: 6,
            length: None,
            workers: default_workers(),
            batch_size: None,
            checkpoint_dir: None,
            checkpoint_interval_secs: 5.0,
            ignore_checkpoint: false,
            wordlist: None,
            transforms: Transform::DEFAULTS.to_vec(),
            lowercase: true,
            uppercase: true,
            symbols: false,
            heuristic: HeuristicConfig::default(),
            merge_lengths: false,
            result_path: None,
            oracle: OracleConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n").with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Lengths to sweep, shortest first.
    pub fn lengths(&self) -> crate::error::Result<Vec<usize>> {
        if let Some(l) = self.length {
            return Ok(vec![l]);
        }
        if self.min_length > self.max_length {
            return Err(CrackError::config(format!(
                "minimum length {} exceeds maximum {}",
                self.min_length, self.max_length
            )));
        }
        Ok((self.min_length..=self.max_length).collect())
    }

    pub fn distributor(&self) -> crate::error::Result<DistributorConfig> {
        let secs = self.checkpoint_interval_secs;
        let checkpoint_interval = Duration::try_from_secs_f64(secs).map_err(|_| {
            CrackError::config(format!(
                "checkpoint interval must be a finite, non-negative number of seconds, got {secs}"
            ))
        })?;
        Ok(DistributorConfig {
            worker_count: self.workers.max(1),
            batch_size: self.batch_size,
            checkpoint_interval,
            ..DistributorConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"strategies": ["numeric", "dictionary"], "length": 4}"#).unwrap();
        let cfg = RunConfig::load(&path).unwrap();
        assert_eq!(
            cfg.strategies,
            vec![Strategy::FixedLengthDigits, Strategy::WordList]
        );
        assert_eq!(cfg.lengths().unwrap(), vec![4]);
        assert_eq!(cfg.transforms, Transform::DEFAULTS.to_vec());
        assert_eq!(cfg.oracle.kind, OracleKind::Digest);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cfg.json");
        let cfg = RunConfig {
            workers: 3,
            symbols: true,
            heuristic: HeuristicConfig {
                cap: 500,
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{").unwrap();
        let err = RunConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn length_bounds() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.lengths().unwrap(), vec![3, 4, 5, 6]);
        let inverted = RunConfig {
            min_length: 5,
            max_length: 2,
            ..Default::default()
        };
        assert!(inverted.lengths().is_err());
    }

    #[test]
    fn checkpoint_interval_out_of_range_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"checkpoint_interval_secs": 1e300}"#).unwrap();
        let huge = RunConfig::load(&path).unwrap();
        assert!(matches!(
            huge.distributor(),
            Err(CrackError::Configuration(_))
        ));
        for secs in [f64::INFINITY, f64::NAN, -1.0] {
            let cfg = RunConfig {
                checkpoint_interval_secs: secs,
                ..Default::default()
            };
            assert!(cfg.distributor().is_err(), "{secs} accepted");
        }
        let ok = RunConfig {
            checkpoint_interval_secs: 0.25,
            ..Default::default()
        };
        assert_eq!(
            ok.distributor().unwrap().checkpoint_interval,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn command_oracle_needs_a_command() {
        let cfg = OracleConfig {
            kind: OracleKind::Command,
            ..Default::default()
        };
        assert!(cfg.build().is_err());
        let ok = OracleConfig {
            kind: OracleKind::Command,
            command: Some("qpdf --password={candidate} --check {target}".into()),
            ..Default::default()
        };
        assert!(ok.build().is_ok());
    }
}

//! Verification oracles: the black-box "is this the credential" check.
//!
//! The search engine only depends on the [`Oracle`] trait. Two concrete
//! oracles ship with the crate:
//!
//! - [`DigestOracle`]: the target file holds the hex SHA-256 digest of the
//!   credential. Useful for tests and for rehearsing a search.
//! - [`CommandOracle`]: runs an external verifier (for example `qpdf`) once
//!   per candidate and classifies its exit status.
use std::collections::BTreeSet;
use std::fs;
use std::io;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::{CrackError, Result};

pub const TARGET_PLACEHOLDER: &str = "{target}";
pub const CANDIDATE_PLACEHOLDER: &str = "{candidate}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    NoMatch,
    /// The check itself failed; the candidate counts as tried.
    Error(String),
}

pub trait Oracle: Send + Sync {
    /// Validate the target before a search starts.
    fn prepare(&self, _target: &Path) -> Result<()> {
        Ok(())
    }

    fn check(&self, target: &Path, candidate: &str) -> Verdict;
}

pub fn sha256_hex(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

fn read_target(target: &Path) -> Result<String> {
    fs::read_to_string(target).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CrackError::not_found(format!("target {}", target.display())),
        _ => CrackError::Io(e),
    })
}

/// Matches candidates whose SHA-256 equals the digest stored in the target.
#[derive(Debug, Default)]
pub struct DigestOracle {
    digest: OnceLock<[u8; 32]>,
}

impl DigestOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(text: &str, target: &Path) -> Result<[u8; 32]> {
        let raw = hex::decode(text.trim()).map_err(|e| {
            CrackError::config(format!("{} is not a hex digest: {e}", target.display()))
        })?;
        raw.try_into().map_err(|v: Vec<u8>| {
            CrackError::config(format!(
                "{} holds a {}-byte digest, expected 32",
                target.display(),
                v.len()
            ))
        })
    }
}

impl Oracle for DigestOracle {
    fn prepare(&self, target: &Path) -> Result<()> {
        let digest = Self::parse(&read_target(target)?, target)?;
        match self.digest.get() {
            Some(existing) if *existing != digest => Err(CrackError::config(
                "digest oracle is already bound to a different target",
            )),
            Some(_) => Ok(()),
            None => {
                let _ = self.digest.set(digest);
                Ok(())
            }
        }
    }

    fn check(&self, target: &Path, candidate: &str) -> Verdict {
        let Some(expected) = self.digest.get() else {
            return Verdict::Error(format!("{} was never prepared", target.display()));
        };
        if Sha256::digest(candidate.as_bytes()).as_slice() == expected.as_slice() {
            Verdict::Match
        } else {
            Verdict::NoMatch
        }
    }
}

/// Runs `program args...` per candidate with `{target}` and `{candidate}`
/// substituted. Exit 0 is a match; listed exit codes are a miss; anything
/// else, including a failure to spawn, is an oracle error.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    no_match_codes: BTreeSet<i32>,
}

impl CommandOracle {
    pub const DEFAULT_NO_MATCH_CODES: [i32; 2] = [1, 2];

    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            no_match_codes: Self::DEFAULT_NO_MATCH_CODES.into_iter().collect(),
        }
    }

    /// Split a whitespace-separated template such as
    /// `qpdf --password={candidate} --check {target}`.
    pub fn from_template(template: &str) -> Result<Self> {
        let mut words = template.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| CrackError::config("oracle command is empty"))?;
        Ok(Self::new(program, words.collect()))
    }

    pub fn with_no_match_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.no_match_codes = codes.into_iter().collect();
        self
    }

    fn render_args(&self, target: &Path, candidate: &str) -> Vec<String> {
        let target = target.display().to_string();
        self.args
            .iter()
            .map(|a| {
                a.replace(TARGET_PLACEHOLDER, &target)
                    .replace(CANDIDATE_PLACEHOLDER, candidate)
            })
            .collect()
    }
}

impl Oracle for CommandOracle {
    fn prepare(&self, target: &Path) -> Result<()> {
        if !self.args.iter().any(|a| a.contains(CANDIDATE_PLACEHOLDER)) {
            return Err(CrackError::config(format!(
                "oracle command never passes {CANDIDATE_PLACEHOLDER}"
            )));
        }
        fs::metadata(target).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                CrackError::not_found(format!("target {}", target.display()))
            }
            _ => CrackError::Io(e),
        })?;
        debug!("Command oracle: {} {:?}", self.program, self.args);
        Ok(())
    }

    fn check(&self, target: &Path, candidate: &str) -> Verdict {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.render_args(target, candidate))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group, so a terminal Ctrl-C reaches us but not the
        // verifier.
        #[cfg(unix)]
        cmd.process_group(0);
        let status = cmd.status();
        match status {
            Ok(s) => match s.code() {
                Some(0) => Verdict::Match,
                Some(c) if self.no_match_codes.contains(&c) => Verdict::NoMatch,
                Some(c) => Verdict::Error(format!("{} exited with {c}", self.program)),
                None => Verdict::Error(format!("{} terminated by signal", self.program)),
            },
            Err(e) => Verdict::Error(format!("spawning {}: {e}", self.program)),
        }
    }
}

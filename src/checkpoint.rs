//! Durable, crash-safe progress records keyed by target and space identity.
//!
//! A space's identity is its [`SpaceKind`] plus its JSON parameter object.
//! Identities are compared tolerantly: numbers within [`EPSILON`], strings
//! case-insensitively, containers recursively. The file name carries a
//! fingerprint of the canonical form so equivalent identities land on the
//! same record; `load` then re-checks equivalence against what was stored.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::distributor::DispatchSnapshot;
use crate::error::{CrackError, Result};
use crate::space::{CandidateSpace, SpaceKind};

/// Numeric tolerance for parameter equivalence. Fingerprints snap floats to
/// this grid, so two values closer than `EPSILON` but straddling a rounding
/// midpoint (0.5004 and 0.5006) hash to different files and do not share a
/// record. Every parameter the built-in spaces emit is an integer or string.
pub const EPSILON: f64 = 1e-3;

/// Identity of a space for checkpoint purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceKey {
    pub kind: SpaceKind,
    pub params: Value,
}

impl SpaceKey {
    pub fn of<S: CandidateSpace + ?Sized>(space: &S) -> Self {
        Self {
            kind: space.kind(),
            params: space.params(),
        }
    }

    /// 16 hex characters of SHA-256 over the canonical form.
    pub fn fingerprint(&self) -> String {
        // `serde_json::Map` is ordered by key, so serialization is canonical
        // once values are.
        let canonical = canonicalize(&self.params).to_string();
        let mut hasher = Sha256::new();
        hasher.update(self.kind.name().to_lowercase().as_bytes());
        hasher.update(b":");
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())[..16].to_string()
    }

    pub fn equivalent(&self, other: &SpaceKey) -> bool {
        self.kind == other.kind && params_equivalent(&self.params, &other.params)
    }
}

/// Lower-case strings and snap non-integral numbers to the epsilon grid.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::Number(n) => canonical_number(n),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.to_lowercase(), canonicalize(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

fn canonical_number(n: &Number) -> Value {
    if n.is_u64() || n.is_i64() {
        return Value::Number(n.clone());
    }
    let f = n.as_f64().unwrap_or(0.0);
    // Whole multiples of the grid, so 2.0 and 2 canonicalize alike.
    let units = (f / EPSILON).round() as i64;
    if units % 1000 == 0 {
        Value::from(units / 1000)
    } else {
        Value::String(format!("{:.3}", units as f64 / 1000.0))
    }
}

/// Tolerant structural equality used to accept a stored record.
pub fn params_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
                (Some(x), Some(y), _, _) => x == y,
                (_, _, Some(x), Some(y)) => x == y,
                _ => match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => (x - y).abs() < EPSILON,
                    _ => false,
                },
            }
        }
        (Value::String(x), Value::String(y)) => x.to_lowercase() == y.to_lowercase(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| params_equivalent(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.iter()
                        .find(|(k2, _)| k2.to_lowercase() == k.to_lowercase())
                        .is_some_and(|(_, v2)| params_equivalent(v, v2))
                })
        }
        _ => a == b,
    }
}

/// Persisted progress for one `(target, space)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub target_id: String,
    pub space_type: SpaceKind,
    pub space_params: Value,
    /// Every position below this one has been tried.
    pub position: u64,
    pub tried_count: u64,
    pub elapsed_seconds: f64,
    pub timestamp: DateTime<Utc>,
    /// Fully tried `[start, end)` ranges above `position`.
    #[serde(default)]
    pub completed: Vec<(u64, u64)>,
}

impl CheckpointRecord {
    pub fn new(target_id: &str, key: &SpaceKey) -> Self {
        Self {
            target_id: target_id.to_string(),
            space_type: key.kind,
            space_params: key.params.clone(),
            position: 0,
            tried_count: 0,
            elapsed_seconds: 0.0,
            timestamp: Utc::now(),
            completed: Vec::new(),
        }
    }

    pub fn key(&self) -> SpaceKey {
        SpaceKey {
            kind: self.space_type,
            params: self.space_params.clone(),
        }
    }
}

/// Ties a dispatch run to its record: which store, which target, which space,
/// and what earlier runs already contributed.
#[derive(Debug, Clone)]
pub struct CheckpointBinding<'a> {
    pub store: &'a CheckpointStore,
    pub target_id: &'a str,
    pub key: SpaceKey,
    pub prior_tried: u64,
    pub prior_elapsed: f64,
}

impl CheckpointBinding<'_> {
    pub fn record(&self, snapshot: &DispatchSnapshot) -> CheckpointRecord {
        CheckpointRecord {
            position: snapshot.position,
            tried_count: self.prior_tried + snapshot.tried,
            elapsed_seconds: self.prior_elapsed + snapshot.elapsed.as_secs_f64(),
            completed: snapshot.completed.clone(),
            ..CheckpointRecord::new(self.target_id, &self.key)
        }
    }

    pub fn save(&self, snapshot: &DispatchSnapshot) -> Result<()> {
        self.store.save(&self.record(snapshot))
    }

    pub fn delete(&self) -> Result<()> {
        self.store.delete(self.target_id, &self.key)
    }
}

/// Stable identity of a target: its canonical absolute path.
pub fn target_id(target: &Path) -> Result<String> {
    fs::canonicalize(target)
        .map(|p| p.display().to_string())
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CrackError::not_found(format!("target {}", target.display())),
            _ => CrackError::Io(e),
        })
}

fn sanitize(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.is_empty() { "target".to_string() } else { s }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store records next to the target file.
    pub fn beside(target: &Path) -> Self {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, target_id: &str, key: &SpaceKey) -> PathBuf {
        let base = Path::new(target_id)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id_hash = hex::encode(Sha256::digest(target_id.as_bytes()));
        self.dir.join(format!(
            "{}-{}-{}.json",
            sanitize(&base),
            &id_hash[..8],
            key.fingerprint()
        ))
    }

    /// Copy of the previous record, refreshed on every save.
    pub fn backup_path_for(&self, target_id: &str, key: &SpaceKey) -> PathBuf {
        self.path_for(target_id, key).with_extension("json.bak")
    }

    /// Atomically replace the record for `record`'s key, keeping the old one
    /// as a `.bak` alongside.
    pub fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let path = self.path_for(&record.target_id, &record.key());
        let io_err = |what: &str, e: &dyn std::fmt::Display| {
            CrackError::CheckpointIo(format!("{what} {}: {e}", path.display()))
        };
        fs::create_dir_all(&self.dir).map_err(|e| io_err("creating directory for", &e))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| io_err("staging", &e))?;
        serde_json::to_writer_pretty(&mut tmp, record).map_err(|e| io_err("encoding", &e))?;
        tmp.write_all(b"\n").map_err(|e| io_err("writing", &e))?;
        tmp.as_file().sync_all().map_err(|e| io_err("syncing", &e))?;
        if path.exists() {
            let backup = path.with_extension("json.bak");
            if let Err(e) = fs::copy(&path, &backup) {
                warn!("Could not back up {}: {e}", path.display());
            }
        }
        tmp.persist(&path).map_err(|e| io_err("renaming into", &e.error))?;
        debug!(
            "Checkpoint saved: {} at position {}",
            path.display(),
            record.position
        );
        Ok(())
    }

    /// The stored record for `(target_id, key)`, if one exists and matches.
    pub fn load(&self, target_id: &str, key: &SpaceKey) -> Result<Option<CheckpointRecord>> {
        let path = self.path_for(target_id, key);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CrackError::CheckpointIo(format!(
                    "reading {}: {e}",
                    path.display()
                )));
            }
        };
        let record: CheckpointRecord = serde_json::from_str(&text).map_err(|e| {
            CrackError::CheckpointIo(format!("corrupt checkpoint {}: {e}", path.display()))
        })?;
        if record.target_id != target_id || !record.key().equivalent(key) {
            debug!("Checkpoint {} belongs to a different search", path.display());
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub fn delete(&self, target_id: &str, key: &SpaceKey) -> Result<()> {
        let path = self.path_for(target_id, key);
        if let Err(e) = fs::remove_file(self.backup_path_for(target_id, key)) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove backup of {}: {e}", path.display());
            }
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Checkpoint deleted: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CrackError::CheckpointIo(format!(
                "deleting {}: {e}",
                path.display()
            ))),
        }
    }
}

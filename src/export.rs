//! Result artifact: a small text file naming the target and the recovered
//! credential.
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::Result;

pub fn save_result<P: AsRef<Path>>(path: P, target_id: &str, candidate: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut f = File::create(path)?;
    writeln!(f, "target: {target_id}")?;
    writeln!(f, "candidate: {candidate}")?;
    f.sync_all()?;
    Ok(())
}

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::LangMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Written { added: usize },
    Unchanged,
}

/// Adds `translated` entries whose key the target does not have yet.
/// Existing target entries always win. Returns the number of keys added.
pub fn merge_into(target: &mut LangMap, translated: &LangMap) -> usize {
    let mut added = 0;
    for (key, value) in translated {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
            added += 1;
        }
    }
    added
}

/// Serialized with four-space indentation; non-ASCII is written as-is.
pub fn render_mapping(mapping: &LangMap) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    mapping
        .serialize(&mut serializer)
        .with_context(|| "failed to serialize mapping")?;
    out.push(b'\n');
    Ok(out)
}

/// Mapping written to a temporary sibling of the target, not yet visible
/// at the target path. Dropping it without `commit` removes the temp file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically replaces the target with the staged file.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|err| anyhow!("failed to replace {}: {}", target.display(), err.error))?;
        Ok(())
    }
}

pub fn stage(target: &Path, mapping: &LangMap) -> Result<StagedWrite> {
    let dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("target");
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    let bytes = render_mapping(mapping)?;
    temp.write_all(&bytes)
        .with_context(|| format!("failed to write temp file for {}", target.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("failed to flush temp file for {}", target.display()))?;
    Ok(StagedWrite {
        temp,
        target: target.to_path_buf(),
    })
}

/// Merges `translated` into `existing` and writes the result to `target`
/// via temp file + rename. Nothing is written when no key is added.
pub fn commit(target: &Path, existing: LangMap, translated: &LangMap) -> Result<CommitOutcome> {
    let mut merged = existing;
    let added = merge_into(&mut merged, translated);
    if added == 0 {
        return Ok(CommitOutcome::Unchanged);
    }
    stage(target, &merged)?.commit()?;
    Ok(CommitOutcome::Written { added })
}

//! Stage run artifacts beside their destination, then publish them together.
//!
//! Files are written into a transaction directory inside the output
//! directory, then moved into place one by one. A failed backup or move
//! restores any file it displaced and removes the ones it created.
use crate::report::ArtifactBundle;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const DOCUMENT_FILE: &str = "out.docx";
pub const REPLACE_LOG_FILE: &str = "out.replace_log.json";
pub const MISSING_FIELDS_FILE: &str = "out.missing_fields.json";
pub const FORMAT_REPORT_FILE: &str = "out.format_report.json";

/// A staging area that disappears when dropped, published or not.
pub struct ArtifactTransaction {
    root: TempDir,
    out_dir: PathBuf,
    /// Staged file and its destination, in publish order.
    entries: Vec<(PathBuf, PathBuf)>,
}

impl ArtifactTransaction {
    pub fn begin(out_dir: &Path) -> Result<Self> {
        fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
        let root = tempfile::Builder::new()
            .prefix(".docops-txn-")
            .tempdir_in(out_dir)
            .with_context(|| format!("create staging area in {}", out_dir.display()))?;
        Ok(Self {
            root,
            out_dir: out_dir.to_path_buf(),
            entries: Vec::new(),
        })
    }

    fn staging_root(&self) -> PathBuf {
        self.root.path().join("stage")
    }

    fn backup_root(&self) -> PathBuf {
        self.root.path().join("backup")
    }

    /// Stage a file for `<out_dir>/<rel_path>`.
    pub fn write_bytes(&mut self, rel_path: &str, bytes: &[u8]) -> Result<()> {
        let dest = self.out_dir.join(rel_path);
        self.stage(rel_path.to_string(), dest, bytes)
    }

    pub fn write_json<T: serde::Serialize>(&mut self, rel_path: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).context("serialize staged JSON")?;
        self.write_bytes(rel_path, &bytes)
    }

    /// Stage a file for a destination outside the output directory.
    pub fn write_external(&mut self, dest: &Path, bytes: &[u8]) -> Result<()> {
        if dest.file_name().is_none() {
            return Err(anyhow!("invalid output file name {}", dest.display()));
        }
        let slot = format!("external/{}", self.entries.len());
        self.stage(slot, dest.to_path_buf(), bytes)
    }

    fn stage(&mut self, slot: String, dest: PathBuf, bytes: &[u8]) -> Result<()> {
        let staged = write_staged_bytes(&self.staging_root(), &slot, bytes)?;
        self.entries.push((staged, dest));
        Ok(())
    }

    /// Move every staged file into place, or none of them.
    pub fn publish(self) -> Result<Vec<PathBuf>> {
        publish_staging(&self.entries, &self.backup_root())
    }
}

/// Write every artifact of `bundle` into `out_dir`, plus the suggested
/// policy when a path is given, as one unit.
pub fn write_bundle(
    out_dir: &Path,
    bundle: &ArtifactBundle,
    suggested_policy: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let mut txn = ArtifactTransaction::begin(out_dir)?;
    txn.write_bytes(DOCUMENT_FILE, &bundle.document)?;
    txn.write_json(REPLACE_LOG_FILE, &bundle.replace_log)?;
    txn.write_json(MISSING_FIELDS_FILE, &bundle.missing_fields)?;
    txn.write_json(FORMAT_REPORT_FILE, &bundle.format_report)?;
    if let (Some(path), Some(text)) = (suggested_policy, &bundle.suggested_policy) {
        txn.write_external(path, text.as_bytes())?;
    }
    txn.publish()
}

fn write_staged_bytes(staging_root: &Path, rel_path: &str, bytes: &[u8]) -> Result<PathBuf> {
    let staging_path = staging_root.join(rel_path);
    if let Some(parent) = staging_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&staging_path, bytes).with_context(|| format!("write {}", staging_path.display()))?;
    Ok(staging_path)
}

fn publish_staging(entries: &[(PathBuf, PathBuf)], backup_root: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(backup_root)
        .with_context(|| format!("create {}", backup_root.display()))?;
    let mut published = Vec::new();
    let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut created: Vec<PathBuf> = Vec::new();
    for (index, (staged, dest)) in entries.iter().enumerate() {
        match backup_existing(dest, &backup_root.join(index.to_string())) {
            Ok(Some(backup)) => backups.push((dest.clone(), backup)),
            Ok(None) => created.push(dest.clone()),
            Err(err) => {
                tracing::warn!(dest = %dest.display(), "backup failed; rolling back");
                rollback_publish(&published, &backups, &created);
                return Err(err);
            }
        }

        if let Err(err) = publish_file(staged, dest) {
            tracing::warn!(dest = %dest.display(), "publish failed; rolling back");
            rollback_publish(&published, &backups, &created);
            return Err(err);
        }
        published.push(dest.clone());
    }
    Ok(published)
}

/// Move an existing destination aside. `None` when there was nothing there.
fn backup_existing(dest: &Path, backup: &Path) -> Result<Option<PathBuf>> {
    if !dest.exists() {
        return Ok(None);
    }
    fs::rename(dest, backup)
        .or_else(|_| fs::copy(dest, backup).map(|_| ()))
        .with_context(|| format!("backup {}", dest.display()))?;
    Ok(Some(backup.to_path_buf()))
}

fn publish_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    let tmp_path = dest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::copy(source, &tmp_path).with_context(|| format!("publish {}", dest.display()))?;
    fs::rename(&tmp_path, dest).with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

fn rollback_publish(published: &[PathBuf], backups: &[(PathBuf, PathBuf)], created: &[PathBuf]) {
    for path in published.iter().chain(created) {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }
    for (dest, backup) in backups {
        if let Some(parent) = dest.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::rename(backup, dest).or_else(|_| fs::copy(backup, dest).map(|_| ()));
    }
}

//! Atomic publication of a run's output files.
//!
//! Every file is first written to a temporary file in the destination
//! directory, then renamed into place. A reader of the output directory sees
//! either the complete file or no file at all. If a rename fails, the files of
//! this run that were already published are removed again; unpublished
//! temporaries are deleted when dropped.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error};

use crate::error::AppError;

pub struct StagedWrite {
    dir: PathBuf,
    staged: Vec<(NamedTempFile, PathBuf)>,
}

impl StagedWrite {
    pub fn new(dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::sink(format!("Failed to create output directory '{}': {e}", dir.display())))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            staged: Vec::new(),
        })
    }

    /// Write `bytes` to a temporary file destined for `dir/name`.
    pub fn stage(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let target = self.dir.join(name);
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| AppError::sink(format!("Failed to create temporary file in '{}': {e}", self.dir.display())))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AppError::sink(format!("Failed to write '{}': {e}", target.display())))?;
        debug!(target = %target.display(), bytes = bytes.len(), "staged output file");
        self.staged.push((tmp, target.clone()));
        Ok(target)
    }

    /// Rename every staged file into place, in staging order.
    pub fn commit(self) -> Result<Vec<PathBuf>, AppError> {
        let mut published: Vec<PathBuf> = Vec::new();
        for (tmp, target) in self.staged {
            if let Err(e) = tmp.persist(&target) {
                error!(target = %target.display(), error = %e.error, "failed to publish output file");
                for path in &published {
                    if let Err(rm) = fs::remove_file(path) {
                        error!(path = %path.display(), error = %rm, "failed to remove published file");
                    }
                }
                return Err(AppError::sink(format!("Failed to write '{}': {}", target.display(), e.error)));
            }
            published.push(target);
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn files_appear_only_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut staged = StagedWrite::new(&out).unwrap();
        staged.stage("a.csv", b"x,y\n1,2\n").unwrap();
        staged.stage("a.json", b"[]").unwrap();
        assert!(!out.join("a.csv").exists());

        let published = staged.commit().unwrap();
        assert_eq!(published, vec![out.join("a.csv"), out.join("a.json")]);
        assert_eq!(fs::read_to_string(out.join("a.csv")).unwrap(), "x,y\n1,2\n");
        assert_eq!(entries(&out), vec!["a.csv", "a.json"]);
    }

    #[test]
    fn dropped_stage_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut staged = StagedWrite::new(dir.path()).unwrap();
            staged.stage("a.csv", b"data").unwrap();
        }
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn failed_rename_rolls_back_published_files() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        fs::create_dir(dir.path().join("b.json")).unwrap();
        fs::write(dir.path().join("b.json").join("keep"), b"").unwrap();

        let mut staged = StagedWrite::new(dir.path()).unwrap();
        staged.stage("a.csv", b"data").unwrap();
        staged.stage("b.json", b"[]").unwrap();
        let err = staged.commit().unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(entries(dir.path()), vec!["b.json"]);
    }
}

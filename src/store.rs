use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile, TempDir};

use crate::domain::Branch;
use crate::error::RefseqError;
use crate::fs_util;

pub const MANIFEST_FILE: &str = "assembly_summary.txt";

/// On-disk layout: raw downloads and manifests live under
/// `<genomes_root>/<branch>/`, tagged output under `<output_root>/<branch>/`.
#[derive(Debug, Clone)]
pub struct Store {
    genomes_root: Utf8PathBuf,
    output_root: Utf8PathBuf,
}

impl Store {
    pub fn new_with_paths(genomes_root: Utf8PathBuf, output_root: Utf8PathBuf) -> Self {
        Self {
            genomes_root,
            output_root,
        }
    }

    pub fn genomes_root(&self) -> &Utf8Path {
        &self.genomes_root
    }

    pub fn output_root(&self) -> &Utf8Path {
        &self.output_root
    }

    pub fn branch_genomes_dir(&self, branch: &Branch) -> Utf8PathBuf {
        self.genomes_root.join(branch.as_str())
    }

    pub fn branch_output_dir(&self, branch: &Branch) -> Utf8PathBuf {
        self.output_root.join(branch.as_str())
    }

    pub fn manifest_path(&self, branch: &Branch) -> Utf8PathBuf {
        self.branch_genomes_dir(branch).join(MANIFEST_FILE)
    }

    pub fn staging_path(&self, branch: &Branch, file_name: &str) -> Utf8PathBuf {
        self.branch_genomes_dir(branch).join(file_name)
    }

    pub fn destination_path(&self, branch: &Branch, file_name: &str) -> Utf8PathBuf {
        self.branch_output_dir(branch).join(file_name)
    }

    pub fn ensure_genomes_dir(&self, branch: &Branch) -> Result<(), RefseqError> {
        fs_util::ensure_dir(self.branch_genomes_dir(branch).as_std_path())
    }

    pub fn ensure_output_dir(&self, branch: &Branch) -> Result<(), RefseqError> {
        fs_util::ensure_dir(self.branch_output_dir(branch).as_std_path())
    }

    /// Private scratch directory next to `target`, removed on drop.
    pub fn scratch_dir_for(target: &Utf8Path) -> Result<TempDir, RefseqError> {
        let parent = parent_dir(target)?;
        fs_util::ensure_dir(parent.as_std_path())?;
        Builder::new()
            .prefix(".kraken-refseq-fetch")
            .tempdir_in(parent.as_std_path())
            .map_err(|err| RefseqError::Filesystem(err.to_string()))
    }

    /// Temporary file in the directory of `target`, so the final rename stays
    /// on one filesystem.
    pub fn temp_file_for(target: &Utf8Path) -> Result<NamedTempFile, RefseqError> {
        let parent = parent_dir(target)?;
        fs_util::ensure_dir(parent.as_std_path())?;
        Builder::new()
            .prefix(".kraken-refseq-part")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| RefseqError::Filesystem(err.to_string()))
    }

    pub fn persist(temp: NamedTempFile, dest: &Utf8Path) -> Result<(), RefseqError> {
        temp.persist(dest.as_std_path())
            .map_err(|err| RefseqError::Filesystem(format!("persist {dest}: {}", err.error)))?;
        Ok(())
    }

    /// Moves a finished file into place, replacing any previous version.
    pub fn install_file(from: &Path, to: &Utf8Path) -> Result<(), RefseqError> {
        fs::rename(from, to.as_std_path()).map_err(|err| {
            RefseqError::Filesystem(format!("rename {} -> {to}: {err}", from.display()))
        })
    }
}

fn parent_dir(path: &Utf8Path) -> Result<&Utf8Path, RefseqError> {
    path.parent()
        .ok_or_else(|| RefseqError::Filesystem(format!("path has no parent: {path}")))
}

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{AssemblyLevel, Branch, DEFAULT_BRANCHES, TagMode, TransferKind};
use crate::error::RefseqError;
use crate::store::Store;

pub const DEFAULT_CONFIG_FILE: &str = "kraken-refseq.json";
pub const DEFAULT_GENOMES_DIR: &str = "genomes/refseq";
pub const DEFAULT_OUTPUT_DIR: &str = "kraken";
pub const DEFAULT_REMOTE_BASE: &str = "https://ftp.ncbi.nlm.nih.gov/genomes/refseq";
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// On-disk `kraken-refseq.json`. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub branches: Option<Vec<String>>,
    #[serde(default)]
    pub levels: Option<Vec<String>>,
    #[serde(default)]
    pub processes: Option<usize>,
    #[serde(default)]
    pub genomes_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub remote_base: Option<String>,
    #[serde(default)]
    pub transfer: Option<TransferKind>,
    #[serde(default)]
    pub tag_mode: Option<TagMode>,
    #[serde(default)]
    pub compress_output: Option<bool>,
    #[serde(default)]
    pub keep_staging: Option<bool>,
    #[serde(default)]
    pub progress_interval_ms: Option<u64>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

/// Values given on the command line; `Some` wins over the file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub branches: Option<Vec<Branch>>,
    pub levels: Option<Vec<AssemblyLevel>>,
    pub processes: Option<usize>,
    pub genomes_dir: Option<Utf8PathBuf>,
    pub output_dir: Option<Utf8PathBuf>,
    pub transfer: Option<TransferKind>,
    pub tag_mode: Option<TagMode>,
    pub compress_output: Option<bool>,
    pub keep_staging: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub branches: Vec<Branch>,
    pub levels: BTreeSet<AssemblyLevel>,
    pub processes: usize,
    pub genomes_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub remote_base: String,
    pub transfer: TransferKind,
    pub tag_mode: TagMode,
    pub compress_output: bool,
    pub keep_staging: bool,
    pub progress_interval: Duration,
    pub http_timeout: Duration,
}

impl ResolvedConfig {
    pub fn store(&self) -> Store {
        Store::new_with_paths(self.genomes_dir.clone(), self.output_dir.clone())
    }

    /// Remote address of a branch's `assembly_summary.txt`.
    pub fn manifest_locator(&self, branch: &Branch) -> String {
        format!(
            "{}/{}/{}",
            self.remote_base.trim_end_matches('/'),
            branch,
            crate::store::MANIFEST_FILE
        )
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `kraken-refseq.json` when none is given. Only an
    /// explicit path has to exist.
    pub fn load(path: Option<&Path>) -> Result<Config, RefseqError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| RefseqError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| RefseqError::ConfigParse(err.to_string()))
    }

    pub fn resolve(
        path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, RefseqError> {
        Self::resolve_config(Self::load(path)?, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, RefseqError> {
        let branches = match overrides.branches {
            Some(branches) => branches,
            None => match config.branches {
                Some(names) => names
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<Vec<Branch>, _>>()?,
                None => DEFAULT_BRANCHES
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<Vec<Branch>, _>>()?,
            },
        };
        if branches.is_empty() {
            return Err(RefseqError::InvalidBranch("empty branch list".to_string()));
        }
        let mut seen = BTreeSet::new();
        let branches = branches
            .into_iter()
            .filter(|branch| seen.insert(branch.clone()))
            .collect::<Vec<_>>();

        let levels = match overrides.levels {
            Some(levels) => levels.into_iter().collect::<BTreeSet<_>>(),
            None => match config.levels {
                Some(names) => names
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<BTreeSet<AssemblyLevel>, _>>()?,
                None => BTreeSet::from([AssemblyLevel::CompleteGenome]),
            },
        };
        if levels.is_empty() {
            return Err(RefseqError::InvalidLevel("empty level list".to_string()));
        }

        let processes = overrides.processes.or(config.processes).unwrap_or(1);
        if processes == 0 {
            return Err(RefseqError::InvalidConcurrency(processes));
        }

        Ok(ResolvedConfig {
            branches,
            levels,
            processes,
            genomes_dir: overrides
                .genomes_dir
                .or(config.genomes_dir)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_GENOMES_DIR)),
            output_dir: overrides
                .output_dir
                .or(config.output_dir)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR)),
            remote_base: config
                .remote_base
                .unwrap_or_else(|| DEFAULT_REMOTE_BASE.to_string()),
            transfer: overrides.transfer.or(config.transfer).unwrap_or_default(),
            tag_mode: overrides.tag_mode.or(config.tag_mode).unwrap_or_default(),
            compress_output: overrides
                .compress_output
                .or(config.compress_output)
                .unwrap_or(false),
            keep_staging: overrides
                .keep_staging
                .or(config.keep_staging)
                .unwrap_or(false),
            progress_interval: Duration::from_millis(
                config
                    .progress_interval_ms
                    .unwrap_or(DEFAULT_PROGRESS_INTERVAL_MS)
                    .max(1),
            ),
            http_timeout: Duration::from_secs(
                config
                    .http_timeout_secs
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        })
    }
}

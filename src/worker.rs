//! Fetch-then-tag execution of a single [`Job`].
//!
//! A job is idempotent: an existing destination short-circuits everything,
//! and both the staged download and the tagged output only appear at their
//! final paths once complete.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::TagMode;
use crate::error::RefseqError;
use crate::fasta::{self, TagSummary};
use crate::fs_util::{self, OutputWriter};
use crate::planner::Job;
use crate::pool::JobExecutor;
use crate::store::Store;
use crate::transfer::TransferClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Skipped,
    Done,
    NotFound,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Skipped => "skipped",
            JobStatus::Done => "done",
            JobStatus::NotFound => "not_found",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Skipped | JobStatus::Done)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub job: Job,
    pub status: JobStatus,
    /// Error message for `NotFound` and `Failed`.
    pub detail: Option<String>,
}

impl JobResult {
    pub fn skipped(job: Job) -> Self {
        Self {
            job,
            status: JobStatus::Skipped,
            detail: None,
        }
    }

    pub fn done(job: Job) -> Self {
        Self {
            job,
            status: JobStatus::Done,
            detail: None,
        }
    }

    pub fn not_found(job: Job, detail: String) -> Self {
        Self {
            job,
            status: JobStatus::NotFound,
            detail: Some(detail),
        }
    }

    pub fn failed(job: Job, detail: String) -> Self {
        Self {
            job,
            status: JobStatus::Failed,
            detail: Some(detail),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerOptions {
    pub tag_mode: TagMode,
    pub keep_staging: bool,
    pub offline: bool,
    pub compress_output: bool,
}

pub struct FetchTransformWorker<T> {
    transfer: T,
    options: WorkerOptions,
}

impl<T: TransferClient> FetchTransformWorker<T> {
    pub fn new(transfer: T, options: WorkerOptions) -> Self {
        Self { transfer, options }
    }

    pub fn execute(&self, job: &Job) -> JobResult {
        if job.destination_path.as_std_path().exists() {
            debug!(destination = %job.destination_path, "already tagged, skipping");
            return JobResult::skipped(job.clone());
        }

        if let Err(err) = self.stage(job) {
            warn!(
                destination = %job.destination_path,
                source = %job.source_locator,
                "fetch failed: {err}"
            );
            return match err {
                RefseqError::SourceNotFound(_) => JobResult::not_found(job.clone(), err.to_string()),
                other => JobResult::failed(job.clone(), other.to_string()),
            };
        }

        match self.transform(job) {
            Ok(summary) => {
                debug!(
                    destination = %job.destination_path,
                    records = summary.records,
                    tagged = summary.tagged,
                    "tagged"
                );
            }
            Err(err) => {
                warn!(
                    destination = %job.destination_path,
                    source = %job.source_locator,
                    "tagging failed: {err}"
                );
                if matches!(err, RefseqError::SequenceFormat { .. }) && self.owns_staging() {
                    // Unreadable download; let the next run fetch it again.
                    let _ = fs_util::remove_file_if_exists(job.staging_path.as_std_path());
                }
                return JobResult::failed(job.clone(), err.to_string());
            }
        }

        if self.owns_staging() {
            if let Err(err) = fs_util::remove_file_if_exists(job.staging_path.as_std_path()) {
                warn!(staging = %job.staging_path, "could not remove staged file: {err}");
            }
        }
        JobResult::done(job.clone())
    }

    // Offline runs work on files the operator staged; those are never removed.
    fn owns_staging(&self) -> bool {
        !self.options.keep_staging && !self.options.offline
    }

    fn stage(&self, job: &Job) -> Result<(), RefseqError> {
        if job.staging_path.as_std_path().is_file() {
            return Ok(());
        }
        if self.options.offline {
            return Err(RefseqError::SourceNotFound(format!(
                "{} (offline, nothing staged at {})",
                job.source_locator, job.staging_path
            )));
        }
        let scratch = Store::scratch_dir_for(&job.staging_path)?;
        let fetched = self.transfer.fetch(&job.source_locator, scratch.path())?;
        Store::install_file(&fetched, &job.staging_path)
    }

    fn transform(&self, job: &Job) -> Result<TagSummary, RefseqError> {
        let reader = fs_util::open_reader(job.staging_path.as_std_path())?;
        let temp = Store::temp_file_for(&job.destination_path)?;
        let file = temp
            .as_file()
            .try_clone()
            .map_err(|err| RefseqError::Filesystem(err.to_string()))?;

        let mut writer = OutputWriter::new(file, self.options.compress_output);
        let summary = fasta::tag_records(reader, &mut writer, job.taxonomy_id, self.options.tag_mode)
            .map_err(|err| RefseqError::SequenceFormat {
                path: job.staging_path.clone().into_std_path_buf(),
                message: err.to_string(),
            })?;
        writer
            .finish()
            .map_err(|err| RefseqError::Filesystem(err.to_string()))?;

        Store::persist(temp, &job.destination_path)?;
        Ok(summary)
    }
}

impl<T: TransferClient + 'static> JobExecutor for FetchTransformWorker<T> {
    fn execute(&self, job: &Job) -> JobResult {
        FetchTransformWorker::execute(self, job)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use camino::Utf8PathBuf;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;
    use crate::domain::TaxId;
    use crate::transfer::remote_file_name;

    const FASTA: &str = ">NC_1.1 chromosome\nACGT\n>NC_2.1 plasmid\nTTAA\n";

    #[derive(Default)]
    struct FakeTransfer {
        calls: Mutex<usize>,
        missing: bool,
    }

    impl TransferClient for FakeTransfer {
        fn fetch(&self, locator: &str, destination_dir: &Path) -> Result<PathBuf, RefseqError> {
            *self.calls.lock().unwrap() += 1;
            if self.missing {
                return Err(RefseqError::SourceNotFound(locator.to_string()));
            }
            let path = destination_dir.join(remote_file_name(locator)?);
            let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::fast());
            encoder.write_all(FASTA.as_bytes()).unwrap();
            encoder.finish().unwrap();
            Ok(path)
        }
    }

    fn job(root: &Path) -> Job {
        let root = Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap();
        fs::create_dir_all(root.join("genomes/viral")).unwrap();
        fs::create_dir_all(root.join("kraken/viral")).unwrap();
        Job {
            taxonomy_id: TaxId::new(10239),
            source_locator: "rsync://host/all/GCF_1.1_A/GCF_1.1_A_genomic.fna.gz".to_string(),
            staging_path: root.join("genomes/viral/GCF_1.1_A_genomic.fna.gz"),
            destination_path: root.join("kraken/viral/GCF_1.1_A_genomic.tax.fna"),
            branch: "viral".parse().unwrap(),
        }
    }

    #[test]
    fn fetches_tags_and_cleans_staging() {
        let temp = tempfile::tempdir().unwrap();
        let job = job(temp.path());
        let worker = FetchTransformWorker::new(FakeTransfer::default(), WorkerOptions::default());

        let result = worker.execute(&job);
        assert_eq!(result.status, JobStatus::Done);
        assert_eq!(result.detail, None);
        let text = fs::read_to_string(job.destination_path.as_std_path()).unwrap();
        assert_eq!(
            text,
            ">NC_1.1|kraken:taxid|10239 chromosome\nACGT\n>NC_2.1|kraken:taxid|10239 plasmid\nTTAA\n"
        );
        assert!(!job.staging_path.as_std_path().exists());
    }

    #[test]
    fn existing_destination_is_skipped_without_transfer() {
        let temp = tempfile::tempdir().unwrap();
        let job = job(temp.path());
        fs::write(job.destination_path.as_std_path(), b"previous").unwrap();
        let worker = FetchTransformWorker::new(FakeTransfer::default(), WorkerOptions::default());

        let result = worker.execute(&job);
        assert_eq!(result.status, JobStatus::Skipped);
        assert_eq!(*worker.transfer.calls.lock().unwrap(), 0);
        assert_eq!(fs::read(job.destination_path.as_std_path()).unwrap(), b"previous");
    }

    #[test]
    fn second_run_skips() {
        let temp = tempfile::tempdir().unwrap();
        let job = job(temp.path());
        let worker = FetchTransformWorker::new(FakeTransfer::default(), WorkerOptions::default());

        assert_eq!(worker.execute(&job).status, JobStatus::Done);
        let first = fs::read(job.destination_path.as_std_path()).unwrap();
        assert_eq!(worker.execute(&job).status, JobStatus::Skipped);
        assert_eq!(fs::read(job.destination_path.as_std_path()).unwrap(), first);
        assert_eq!(*worker.transfer.calls.lock().unwrap(), 1);
    }

    #[test]
    fn missing_remote_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let job = job(temp.path());
        let transfer = FakeTransfer {
            missing: true,
            ..FakeTransfer::default()
        };
        let worker = FetchTransformWorker::new(transfer, WorkerOptions::default());

        let result = worker.execute(&job);
        assert_eq!(result.status, JobStatus::NotFound);
        assert!(result.detail.is_some());
        assert!(!job.destination_path.as_std_path().exists());
    }

    #[test]
    fn offline_uses_staged_file_and_keeps_it() {
        let temp = tempfile::tempdir().unwrap();
        let job = job(temp.path());
        let options = WorkerOptions {
            offline: true,
            ..WorkerOptions::default()
        };
        let worker = FetchTransformWorker::new(FakeTransfer::default(), options);

        assert_eq!(worker.execute(&job).status, JobStatus::NotFound);

        let mut encoder = GzEncoder::new(
            fs::File::create(job.staging_path.as_std_path()).unwrap(),
            Compression::fast(),
        );
        encoder.write_all(FASTA.as_bytes()).unwrap();
        encoder.finish().unwrap();

        assert_eq!(worker.execute(&job).status, JobStatus::Done);
        assert!(job.staging_path.as_std_path().exists());
        assert_eq!(*worker.transfer.calls.lock().unwrap(), 0);
    }

    #[test]
    fn corrupt_download_fails_without_destination() {
        let temp = tempfile::tempdir().unwrap();
        let job = job(temp.path());
        fs::write(job.staging_path.as_std_path(), b"not gzip at all").unwrap();
        let worker = FetchTransformWorker::new(FakeTransfer::default(), WorkerOptions::default());

        let result = worker.execute(&job);
        assert_eq!(result.status, JobStatus::Failed);
        assert!(!job.destination_path.as_std_path().exists());
        assert!(!job.staging_path.as_std_path().exists());
        let leftovers = fs::read_dir(job.destination_path.parent().unwrap().as_std_path())
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn compressed_output_and_first_record_tagging() {
        let temp = tempfile::tempdir().unwrap();
        let mut job = job(temp.path());
        job.destination_path.set_extension("fna.gz");
        let options = WorkerOptions {
            tag_mode: TagMode::FirstRecord,
            compress_output: true,
            keep_staging: true,
            ..WorkerOptions::default()
        };
        let worker = FetchTransformWorker::new(FakeTransfer::default(), options);

        assert_eq!(worker.execute(&job).status, JobStatus::Done);
        assert!(job.staging_path.as_std_path().exists());

        let mut text = String::new();
        std::io::Read::read_to_string(
            &mut fs_util::open_reader(job.destination_path.as_std_path()).unwrap(),
            &mut text,
        )
        .unwrap();
        assert!(text.starts_with(">NC_1.1|kraken:taxid|10239 chromosome\n"));
        assert!(text.contains(">NC_2.1 plasmid\n"));
    }
}

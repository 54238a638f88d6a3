use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{Branch, TaxId};
use crate::error::RefseqError;
use crate::manifest::{self, BranchStats, DEFAULT_STATUS};
use crate::planner::{Job, JobPlanner, PlanRequest};
use crate::pool::WorkerPool;
use crate::progress::{ProgressCounter, ProgressReporter};
use crate::store::Store;
use crate::transfer::TransferClient;
use crate::worker::{FetchTransformWorker, JobResult, JobStatus, WorkerOptions};

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config: ResolvedConfig,
    pub taxa: Option<BTreeSet<TaxId>>,
    pub stats_only: bool,
    pub offline: bool,
    pub refresh_manifest: bool,
    pub show_progress: bool,
}

impl RunRequest {
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            config,
            taxa: None,
            stats_only: false,
            offline: false,
            refresh_manifest: false,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    pub branch: Branch,
    pub manifest: Utf8PathBuf,
    pub stats: BranchStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub elapsed_secs: f64,
    pub total: usize,
    pub done: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Every job that ended `NotFound` or `Failed`.
    pub failures: Vec<JobResult>,
}

impl RunReport {
    fn record(&mut self, result: JobResult) {
        match result.status {
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::Done => self.done += 1,
            JobStatus::NotFound => self.not_found += 1,
            JobStatus::Failed => self.failed += 1,
        }
        if !result.status.is_success() {
            self.failures.push(result);
        }
    }

    pub fn completed(&self) -> usize {
        self.done + self.skipped + self.not_found + self.failed
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Stats(Vec<BranchReport>),
    Completed(RunReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Planning,
    StatsOnly,
    Executing,
    Reporting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Planning => "Planning",
            Phase::StatsOnly => "StatsOnly",
            Phase::Executing => "Executing",
            Phase::Reporting => "Reporting",
            Phase::Done => "Done",
        };
        f.write_str(name)
    }
}

fn transition(phase: &mut Phase, next: Phase) {
    info!(from = %phase, "phase={next}");
    *phase = next;
}

/// Manifest -> plan -> execute -> report.
pub struct Pipeline<T> {
    transfer: Arc<T>,
}

impl<T: TransferClient + 'static> Pipeline<T> {
    pub fn new(transfer: T) -> Self {
        Self {
            transfer: Arc::new(transfer),
        }
    }

    pub fn run(&self, request: &RunRequest) -> Result<PipelineOutcome, RefseqError> {
        let config = &request.config;
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();
        let mut phase = Phase::Idle;

        transition(&mut phase, Phase::Planning);
        let pool = WorkerPool::new(config.processes)?;
        let store = config.store();
        let mut planner = JobPlanner::new();
        let mut reports = Vec::new();
        let mut jobs: Vec<Job> = Vec::new();

        for branch in &config.branches {
            let manifest_path = self.ensure_manifest(&store, branch, request)?;
            let parsed = manifest::read_manifest(manifest_path.as_std_path(), Some(DEFAULT_STATUS))?;
            info!(
                branch = %branch,
                records = parsed.records.len(),
                other_status = parsed.stats.other_status,
                "manifest parsed"
            );

            if request.stats_only {
                reports.push(BranchReport {
                    branch: branch.clone(),
                    manifest: manifest_path,
                    stats: parsed.stats,
                });
                continue;
            }

            let planned = planner.plan(
                &parsed.records,
                &PlanRequest {
                    branch,
                    levels: &config.levels,
                    taxa: request.taxa.as_ref(),
                    store: &store,
                    compress_output: config.compress_output,
                },
            )?;
            info!(branch = %branch, jobs = planned.len(), "jobs planned");
            jobs.extend(planned);
        }

        if request.stats_only {
            transition(&mut phase, Phase::StatsOnly);
            transition(&mut phase, Phase::Done);
            return Ok(PipelineOutcome::Stats(reports));
        }

        transition(&mut phase, Phase::Executing);
        let total = jobs.len();
        info!(jobs = total, processes = pool.concurrency(), "starting workers");
        let counter = ProgressCounter::new(total);
        let reporter = request.show_progress.then(|| {
            ProgressReporter::spawn(counter.clone(), io::stderr(), config.progress_interval)
        });
        let worker = Arc::new(FetchTransformWorker::new(
            Arc::clone(&self.transfer),
            WorkerOptions {
                tag_mode: config.tag_mode,
                keep_staging: config.keep_staging,
                offline: request.offline,
                compress_output: config.compress_output,
            },
        ));

        let mut report = RunReport {
            started_at,
            total,
            ..RunReport::default()
        };
        for result in pool.run(worker, jobs, counter)? {
            report.record(result);
        }
        if let Some(handle) = reporter {
            if let Err(err) = handle.finish() {
                warn!("progress output failed: {err}");
            }
        }

        transition(&mut phase, Phase::Reporting);
        report
            .failures
            .sort_by(|left, right| left.job.destination_path.cmp(&right.job.destination_path));
        report.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            total = report.total,
            done = report.done,
            skipped = report.skipped,
            not_found = report.not_found,
            failed = report.failed,
            elapsed_secs = report.elapsed_secs,
            "run finished"
        );
        transition(&mut phase, Phase::Done);
        Ok(PipelineOutcome::Completed(report))
    }

    /// Local manifest path for `branch`, downloading it when absent or when a
    /// refresh was asked for.
    fn ensure_manifest(
        &self,
        store: &Store,
        branch: &Branch,
        request: &RunRequest,
    ) -> Result<Utf8PathBuf, RefseqError> {
        let path = store.manifest_path(branch);
        let present = path.as_std_path().is_file();
        let missing = || RefseqError::ManifestMissing {
            branch: branch.to_string(),
            path: path.clone().into_std_path_buf(),
        };

        if request.offline {
            return if present { Ok(path.clone()) } else { Err(missing()) };
        }
        if present && !request.refresh_manifest {
            return Ok(path.clone());
        }

        let locator = request.config.manifest_locator(branch);
        info!(branch = %branch, source = %locator, "fetching manifest");
        let scratch = Store::scratch_dir_for(&path)?;
        match self.transfer.fetch(&locator, scratch.path()) {
            Ok(fetched) => Store::install_file(&fetched, &path)?,
            Err(RefseqError::SourceNotFound(_)) if !present => return Err(missing()),
            Err(err) if present => {
                warn!(branch = %branch, "manifest refresh failed, using local copy: {err}");
            }
            Err(err) => return Err(err),
        }
        Ok(path)
    }
}

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::warn;

use crate::error::RefseqError;
use crate::planner::Job;
use crate::progress::ProgressCounter;
use crate::worker::JobResult;

/// Runs one job to completion. Implementations must not panic across jobs;
/// a panic is contained to the job that raised it.
pub trait JobExecutor: Send + Sync + 'static {
    fn execute(&self, job: &Job) -> JobResult;
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Result<Self, RefseqError> {
        if concurrency == 0 {
            return Err(RefseqError::InvalidConcurrency(concurrency));
        }
        Ok(Self { concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Submits every job and returns the results in completion order.
    pub fn run<E: JobExecutor>(
        &self,
        executor: Arc<E>,
        jobs: Vec<Job>,
        counter: ProgressCounter,
    ) -> Result<JobResults, RefseqError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|index| format!("kraken-refseq-worker-{index}"))
            .build()
            .map_err(|err| RefseqError::Pool(err.to_string()))?;

        let (sender, receiver) = mpsc::channel();
        let remaining = jobs.len();
        for job in jobs {
            let sender = sender.clone();
            let executor = Arc::clone(&executor);
            let counter = counter.clone();
            pool.spawn(move || {
                let result = match panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&job)))
                {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        warn!(destination = %job.destination_path, "worker panicked: {message}");
                        JobResult::failed(job, format!("worker panicked: {message}"))
                    }
                };
                counter.increment();
                let _ = sender.send(result);
            });
        }

        Ok(JobResults {
            receiver,
            remaining,
            _pool: pool,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Lazily yields one result per submitted job. Owns the thread pool, which
/// shuts down once this iterator is dropped.
pub struct JobResults {
    receiver: Receiver<JobResult>,
    remaining: usize,
    _pool: ThreadPool,
}

impl Iterator for JobResults {
    type Item = JobResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let result = self.receiver.recv().ok()?;
        self.remaining -= 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

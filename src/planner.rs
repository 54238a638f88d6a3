use std::collections::{BTreeSet, HashSet};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::debug;

use crate::domain::{AssemblyLevel, Branch, TaxId};
use crate::error::RefseqError;
use crate::manifest::ManifestRecord;
use crate::store::Store;

pub const SOURCE_SUFFIX: &str = "_genomic.fna.gz";
pub const TAGGED_SUFFIX: &str = "_genomic.tax.fna";

/// One fetch-and-tag unit of work. Identified by `destination_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub taxonomy_id: TaxId,
    pub source_locator: String,
    pub staging_path: Utf8PathBuf,
    pub destination_path: Utf8PathBuf,
    pub branch: Branch,
}

#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub branch: &'a Branch,
    pub levels: &'a BTreeSet<AssemblyLevel>,
    pub taxa: Option<&'a BTreeSet<TaxId>>,
    pub store: &'a Store,
    pub compress_output: bool,
}

/// Turns manifest records into jobs. Destinations stay unique across every
/// `plan` call made on the same planner; the first record for a destination
/// wins.
#[derive(Debug, Default)]
pub struct JobPlanner {
    seen: HashSet<Utf8PathBuf>,
}

impl JobPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(
        &mut self,
        records: &[ManifestRecord],
        request: &PlanRequest<'_>,
    ) -> Result<Vec<Job>, RefseqError> {
        request.store.ensure_output_dir(request.branch)?;
        request.store.ensure_genomes_dir(request.branch)?;

        let output_suffix = if request.compress_output {
            format!("{TAGGED_SUFFIX}.gz")
        } else {
            TAGGED_SUFFIX.to_string()
        };

        let mut jobs = Vec::new();
        for record in records {
            if !request.levels.contains(&record.assembly_level) {
                continue;
            }
            if let Some(taxa) = request.taxa {
                if !taxa.contains(&record.taxonomy_id) {
                    continue;
                }
            }
            let basename = record.basename();
            if !is_safe_file_stem(basename) {
                debug!(accession = %record.accession, path = %record.remote_path, "unusable remote path");
                continue;
            }

            let source_file = format!("{basename}{SOURCE_SUFFIX}");
            let destination_path = request
                .store
                .destination_path(request.branch, &format!("{basename}{output_suffix}"));
            if !self.seen.insert(destination_path.clone()) {
                debug!(destination = %destination_path, accession = %record.accession, "duplicate destination, keeping first");
                continue;
            }

            jobs.push(Job {
                taxonomy_id: record.taxonomy_id,
                source_locator: format!(
                    "{}/{source_file}",
                    record.remote_path.trim_end_matches('/')
                ),
                staging_path: request.store.staging_path(request.branch, &source_file),
                destination_path,
                branch: request.branch.clone(),
            });
        }
        Ok(jobs)
    }
}

fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

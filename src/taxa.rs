use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead};
use std::path::Path;

use serde::Serialize;

use crate::domain::TaxId;
use crate::error::RefseqError;
use crate::fs_util;
use crate::manifest::ManifestRecord;
use crate::planner::TAGGED_SUFFIX;

/// Taxonomy ids from the first tab-separated column, in file order, without
/// duplicates. Blank and `#` lines are ignored.
pub fn parse_taxids<R: BufRead>(reader: R) -> Result<Vec<TaxId>, RefseqError> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|err| RefseqError::Filesystem(err.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let first = trimmed.split('\t').next().unwrap_or(trimmed);
        let id: TaxId = first.parse()?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Loads an allow-list file; `-` reads standard input.
pub fn load_taxids(path: &Path) -> Result<Vec<TaxId>, RefseqError> {
    let wrap = |err: RefseqError| RefseqError::TaxIdFileRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    if path.as_os_str() == "-" {
        return parse_taxids(io::stdin().lock()).map_err(wrap);
    }
    let reader = fs_util::open_reader(path).map_err(wrap)?;
    parse_taxids(reader).map_err(wrap)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocateRow {
    pub taxonomy_id: TaxId,
    pub assembly_level: Option<String>,
    pub version_status: Option<String>,
    pub file_name: Option<String>,
}

impl LocateRow {
    pub fn to_tsv(&self) -> String {
        let na = "n/a";
        format!(
            "{}\t{}\t{}\t{}",
            self.taxonomy_id,
            self.assembly_level.as_deref().unwrap_or(na),
            self.version_status.as_deref().unwrap_or(na),
            self.file_name.as_deref().unwrap_or(na),
        )
    }
}

/// For each requested id, lists the tagged output file names the manifest
/// would produce, or a single `n/a` row when the id is absent.
pub fn locate(records: &[ManifestRecord], taxa: &[TaxId]) -> Vec<LocateRow> {
    let mut by_taxid: BTreeMap<TaxId, BTreeSet<(String, String, String)>> = BTreeMap::new();
    for record in records {
        by_taxid.entry(record.taxonomy_id).or_default().insert((
            format!("{}{TAGGED_SUFFIX}", record.basename()),
            record.assembly_level.to_string(),
            record.version_status.to_string(),
        ));
    }

    let mut rows = Vec::new();
    for taxid in taxa {
        match by_taxid.get(taxid) {
            Some(entries) => {
                for (file_name, level, status) in entries {
                    rows.push(LocateRow {
                        taxonomy_id: *taxid,
                        assembly_level: Some(level.clone()),
                        version_status: Some(status.clone()),
                        file_name: Some(file_name.clone()),
                    });
                }
            }
            None => rows.push(LocateRow {
                taxonomy_id: *taxid,
                assembly_level: None,
                version_status: None,
                file_name: None,
            }),
        }
    }
    rows
}

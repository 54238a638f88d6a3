//! Parser for NCBI `assembly_summary.txt` manifests.
//!
//! Columns are mapped to named fields here and nowhere else.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use serde::Serialize;

use crate::domain::{AssemblyLevel, TaxId, VersionStatus};
use crate::error::RefseqError;
use crate::fs_util;

pub const DEFAULT_STATUS: &str = "latest";

const MIN_FIELDS: usize = 20;
const COL_ACCESSION: usize = 0;
const COL_TAXID: usize = 5;
const COL_VERSION_STATUS: usize = 10;
const COL_ASSEMBLY_LEVEL: usize = 11;
const COL_FTP_PATH: usize = 19;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRecord {
    pub accession: String,
    pub taxonomy_id: TaxId,
    pub version_status: VersionStatus,
    pub assembly_level: AssemblyLevel,
    pub remote_path: String,
}

impl ManifestRecord {
    /// Last segment of the remote directory, e.g.
    /// `GCF_000005845.2_ASM584v2`.
    pub fn basename(&self) -> &str {
        self.remote_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.remote_path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchStats {
    /// Records matching the status filter, by assembly level.
    pub levels: BTreeMap<AssemblyLevel, usize>,
    /// Valid records removed by the status filter.
    pub other_status: usize,
}

impl BranchStats {
    pub fn count(&self, level: &AssemblyLevel) -> usize {
        self.levels.get(level).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.levels.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedManifest {
    pub records: Vec<ManifestRecord>,
    pub stats: BranchStats,
}

/// Parses manifest lines, keeping records whose version status equals
/// `status_filter` (all records when `None`). Malformed lines are skipped;
/// only an I/O failure aborts.
pub fn parse_manifest<R: BufRead>(
    mut reader: R,
    status_filter: Option<&str>,
) -> std::io::Result<ParsedManifest> {
    let mut parsed = ParsedManifest::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            continue;
        };
        let Some(record) = parse_line(line) else {
            continue;
        };
        let matches = status_filter
            .map(|status| record.version_status.as_str() == status)
            .unwrap_or(true);
        if matches {
            *parsed
                .stats
                .levels
                .entry(record.assembly_level.clone())
                .or_insert(0) += 1;
            parsed.records.push(record);
        } else {
            parsed.stats.other_status += 1;
        }
    }
    Ok(parsed)
}

pub fn read_manifest(
    path: &Path,
    status_filter: Option<&str>,
) -> Result<ParsedManifest, RefseqError> {
    if !path.is_file() {
        let branch = path
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(RefseqError::ManifestMissing {
            branch,
            path: path.to_path_buf(),
        });
    }
    let reader = fs_util::open_reader(path)?;
    parse_manifest(reader, status_filter).map_err(|err| RefseqError::ManifestRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn parse_line(line: &str) -> Option<ManifestRecord> {
    if line.starts_with('#') {
        return None;
    }
    let fields = line.trim_end_matches(['\r', '\n']).split('\t').collect::<Vec<_>>();
    if fields.len() < MIN_FIELDS {
        return None;
    }
    if fields[COL_ACCESSION] == "assembly_accession"
        || fields[COL_ASSEMBLY_LEVEL] == "assembly_level"
    {
        return None;
    }
    let remote_path = fields[COL_FTP_PATH].trim();
    if remote_path.is_empty() || remote_path == "na" {
        return None;
    }
    let assembly_level = fields[COL_ASSEMBLY_LEVEL].parse().ok()?;
    let taxonomy_id = fields[COL_TAXID].parse().ok()?;
    Some(ManifestRecord {
        accession: fields[COL_ACCESSION].trim().to_string(),
        taxonomy_id,
        version_status: VersionStatus::from(fields[COL_VERSION_STATUS]),
        assembly_level,
        remote_path: remote_path.to_string(),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::manifest_line;
    use super::*;

    fn ftp(name: &str) -> String {
        format!("https://ftp.ncbi.nlm.nih.gov/genomes/all/GCF/000/000/000/{name}")
    }

    #[test]
    fn skips_comments_header_and_short_lines() {
        let text = [
            "#   See ftp://ftp.ncbi.nlm.nih.gov/genomes/README_assembly_summary.txt".to_string(),
            manifest_line(
                "assembly_accession",
                "taxid",
                "version_status",
                "assembly_level",
                "ftp_path",
            ),
            "GCF_1.1\tshort\tline".to_string(),
            manifest_line("GCF_2.1", "562", "latest", "Complete Genome", &ftp("GCF_2.1_A")),
        ]
        .join("\n");

        let parsed = parse_manifest(text.as_bytes(), Some(DEFAULT_STATUS)).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].accession, "GCF_2.1");
        assert_eq!(parsed.records[0].taxonomy_id, TaxId::new(562));
        assert_eq!(parsed.records[0].basename(), "GCF_2.1_A");
    }

    #[test]
    fn counts_levels_and_filtered_status() {
        let text = [
            manifest_line("GCF_1.1", "1", "latest", "Complete Genome", &ftp("a")),
            manifest_line("GCF_2.1", "2", "latest", "Complete Genome", &ftp("b")),
            manifest_line("GCF_3.1", "3", "latest", "Complete Genome", &ftp("c")),
            manifest_line("GCF_4.1", "4", "latest", "Contig", &ftp("d")),
            manifest_line("GCF_5.1", "5", "replaced", "Contig", &ftp("e")),
        ]
        .join("\n");

        let parsed = parse_manifest(text.as_bytes(), Some(DEFAULT_STATUS)).unwrap();
        assert_eq!(parsed.records.len(), 4);
        assert!(
            parsed
                .records
                .iter()
                .all(|record| record.version_status == VersionStatus::Latest)
        );
        assert_eq!(parsed.stats.count(&AssemblyLevel::CompleteGenome), 3);
        assert_eq!(parsed.stats.count(&AssemblyLevel::Contig), 1);
        assert_eq!(parsed.stats.other_status, 1);
    }

    #[test]
    fn status_comparison_is_case_sensitive() {
        let text = manifest_line("GCF_1.1", "1", "Latest", "Contig", &ftp("a"));
        let parsed = parse_manifest(text.as_bytes(), Some(DEFAULT_STATUS)).unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn no_filter_keeps_every_status() {
        let text = [
            manifest_line("GCF_1.1", "1", "latest", "Contig", &ftp("a")),
            manifest_line("GCF_1.2", "1", "suppressed", "Contig", &ftp("b")),
        ]
        .join("\n");
        let parsed = parse_manifest(text.as_bytes(), None).unwrap();
        assert_eq!(parsed.records.len(), 2);
    }

    #[test]
    fn skips_missing_path_level_or_taxid() {
        let text = [
            manifest_line("GCF_1.1", "1", "latest", "Contig", "na"),
            manifest_line("GCF_2.1", "2", "latest", "", &ftp("b")),
            manifest_line("GCF_3.1", "", "latest", "Contig", &ftp("c")),
        ]
        .join("\n");
        let parsed = parse_manifest(text.as_bytes(), Some(DEFAULT_STATUS)).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.stats.total(), 0);
    }

    #[test]
    fn non_utf8_line_is_skipped() {
        let mut text = manifest_line("GCF_1.1", "1", "latest", "Contig", &ftp("a")).into_bytes();
        text.extend_from_slice(b"\nGCF_9.1\t\xff\xfe broken\n");
        text.extend_from_slice(
            manifest_line("GCF_2.1", "2", "latest", "Contig", &ftp("b")).as_bytes(),
        );

        let parsed = parse_manifest(text.as_slice(), Some(DEFAULT_STATUS)).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].accession, "GCF_2.1");
    }

    #[test]
    fn read_manifest_missing_file_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("viral").join("assembly_summary.txt");
        let err = read_manifest(&path, None).unwrap_err();
        assert!(
            matches!(err, RefseqError::ManifestMissing { ref branch, .. } if branch == "viral")
        );
    }
}

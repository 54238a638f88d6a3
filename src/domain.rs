use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::RefseqError;

pub const DEFAULT_BRANCHES: &[&str] = &["bacteria", "viral", "fungi", "protozoa", "archaea"];

/// Top-level RefSeq organism group, e.g. `bacteria` or `vertebrate_mammalian`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Branch(String);

impl Branch {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Branch {
    type Err = RefseqError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(RefseqError::InvalidBranch(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for Branch {
    type Error = RefseqError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Branch> for String {
    fn from(value: Branch) -> Self {
        value.0
    }
}

/// Assembly completeness as reported in column 12 of `assembly_summary.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssemblyLevel {
    CompleteGenome,
    Chromosome,
    Contig,
    Scaffold,
    Other(String),
}

impl AssemblyLevel {
    pub fn as_str(&self) -> &str {
        match self {
            AssemblyLevel::CompleteGenome => "Complete Genome",
            AssemblyLevel::Chromosome => "Chromosome",
            AssemblyLevel::Contig => "Contig",
            AssemblyLevel::Scaffold => "Scaffold",
            AssemblyLevel::Other(value) => value,
        }
    }
}

impl fmt::Display for AssemblyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssemblyLevel {
    type Err = RefseqError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed {
            "" => Err(RefseqError::InvalidLevel(value.to_string())),
            "Complete Genome" => Ok(AssemblyLevel::CompleteGenome),
            "Chromosome" => Ok(AssemblyLevel::Chromosome),
            "Contig" => Ok(AssemblyLevel::Contig),
            "Scaffold" => Ok(AssemblyLevel::Scaffold),
            other => Ok(AssemblyLevel::Other(other.to_string())),
        }
    }
}

impl TryFrom<String> for AssemblyLevel {
    type Error = RefseqError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssemblyLevel> for String {
    fn from(value: AssemblyLevel) -> Self {
        value.as_str().to_string()
    }
}

// Ordered by display name so stats print alphabetically.
impl Ord for AssemblyLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for AssemblyLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum VersionStatus {
    Latest,
    Other(String),
}

impl VersionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            VersionStatus::Latest => "latest",
            VersionStatus::Other(value) => value,
        }
    }
}

impl From<&str> for VersionStatus {
    fn from(value: &str) -> Self {
        if value == "latest" {
            VersionStatus::Latest
        } else {
            VersionStatus::Other(value.to_string())
        }
    }
}

impl From<VersionStatus> for String {
    fn from(value: VersionStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// NCBI taxonomy identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxId(u32);

impl TaxId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxId {
    type Err = RefseqError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| RefseqError::InvalidTaxId(value.to_string()))
    }
}

/// Which FASTA headers receive the `|kraken:taxid|` annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TagMode {
    #[default]
    AllRecords,
    FirstRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    #[default]
    Rsync,
    Http,
}

/// Splits a comma separated CLI value, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn parse_branches(value: &str) -> Result<Vec<Branch>, RefseqError> {
    split_list(value).iter().map(|item| item.parse()).collect()
}

pub fn parse_levels(value: &str) -> Result<Vec<AssemblyLevel>, RefseqError> {
    split_list(value).iter().map(|item| item.parse()).collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_branch_normalizes_case() {
        let branch: Branch = " Bacteria ".parse().unwrap();
        assert_eq!(branch.as_str(), "bacteria");
    }

    #[test]
    fn parse_branch_rejects_paths() {
        let err = "../etc".parse::<Branch>().unwrap_err();
        assert_matches!(err, RefseqError::InvalidBranch(_));
    }

    #[test]
    fn parse_level_known_and_other() {
        let level: AssemblyLevel = "Complete Genome".parse().unwrap();
        assert_eq!(level, AssemblyLevel::CompleteGenome);
        let level: AssemblyLevel = "Draft".parse().unwrap();
        assert_eq!(level, AssemblyLevel::Other("Draft".to_string()));
        assert_matches!(
            " ".parse::<AssemblyLevel>(),
            Err(RefseqError::InvalidLevel(_))
        );
    }

    #[test]
    fn levels_sort_by_name() {
        let mut levels = vec![
            AssemblyLevel::Scaffold,
            AssemblyLevel::CompleteGenome,
            AssemblyLevel::Chromosome,
            AssemblyLevel::Contig,
        ];
        levels.sort();
        assert_eq!(
            levels,
            vec![
                AssemblyLevel::Chromosome,
                AssemblyLevel::CompleteGenome,
                AssemblyLevel::Contig,
                AssemblyLevel::Scaffold,
            ]
        );
    }

    #[test]
    fn parse_level_list() {
        let levels = parse_levels("Complete Genome, Chromosome,,").unwrap();
        assert_eq!(
            levels,
            vec![AssemblyLevel::CompleteGenome, AssemblyLevel::Chromosome]
        );
    }

    #[test]
    fn parse_tax_id() {
        let id: TaxId = "562".parse().unwrap();
        assert_eq!(id.get(), 562);
        assert_matches!("na".parse::<TaxId>(), Err(RefseqError::InvalidTaxId(_)));
    }
}

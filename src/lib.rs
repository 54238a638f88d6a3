//! Fetches RefSeq genomes listed in NCBI assembly summaries and rewrites
//! their FASTA headers with `|kraken:taxid|` tags for Kraken database builds.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fasta;
pub mod fs_util;
pub mod manifest;
pub mod output;
pub mod planner;
pub mod pool;
pub mod progress;
pub mod store;
pub mod taxa;
pub mod transfer;
pub mod worker;

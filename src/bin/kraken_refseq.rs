use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kraken_refseq::app::{Pipeline, RunRequest};
use kraken_refseq::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use kraken_refseq::domain::{self, TagMode, TransferKind};
use kraken_refseq::error::RefseqError;
use kraken_refseq::manifest;
use kraken_refseq::output::{HumanOutput, JsonOutput, OutputMode};
use kraken_refseq::taxa;
use kraken_refseq::transfer::{HttpTransfer, RsyncTransfer, TransferClient};

#[derive(Parser)]
#[command(name = "kraken-refseq")]
#[command(about = "Download RefSeq genomes and tag FASTA headers for Kraken")]
#[command(version, author)]
struct Cli {
    /// Print JSON results and disable the live progress bar.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// JSON config file (default: ./kraken-refseq.json when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch genomes and write taxonomy-tagged FASTA files")]
    Fetch(FetchArgs),
    #[command(about = "Look up output file names for taxonomy ids in a manifest")]
    Locate(LocateArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Comma-separated branches, e.g. bacteria,viral.
    #[arg(short = 'b', long)]
    branch: Option<String>,

    /// Comma-separated assembly levels, e.g. "Complete Genome,Chromosome".
    #[arg(short = 'l', long)]
    level: Option<String>,

    /// Number of parallel workers.
    #[arg(short = 'p', long)]
    processes: Option<usize>,

    /// Print per-branch assembly level counts and exit.
    #[arg(short = 'a', long)]
    assembly_stats: bool,

    /// Only fetch these taxonomy ids (first column of FILE, `-` for stdin).
    #[arg(short = 't', long, value_name = "FILE")]
    taxids: Option<PathBuf>,

    #[arg(long)]
    genomes_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long, value_enum)]
    transfer: Option<TransferKind>,

    /// Never transfer; work only on manifests and files already on disk.
    #[arg(long)]
    offline: bool,

    /// Download the manifests again even if present.
    #[arg(long)]
    refresh_manifest: bool,

    /// Tag only the first record of each file.
    #[arg(long)]
    tag_first_only: bool,

    /// Write gzip-compressed `.tax.fna.gz` files.
    #[arg(long)]
    compress: bool,

    /// Keep raw downloads after tagging.
    #[arg(long)]
    keep_staging: bool,
}

#[derive(Args)]
struct LocateArgs {
    /// assembly_summary.txt (plain or .gz).
    manifest: PathBuf,
    /// Taxonomy id list, `-` for stdin.
    taxids: PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<RefseqError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RefseqError) -> u8 {
    match error {
        RefseqError::ManifestMissing { .. }
        | RefseqError::ConfigRead(_)
        | RefseqError::TaxIdFileRead { .. } => 2,
        RefseqError::MissingTool(_)
        | RefseqError::Transfer(_)
        | RefseqError::TransferStatus { .. }
        | RefseqError::SourceNotFound(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, cli.config, output_mode),
        Commands::Locate(args) => run_locate(args, output_mode),
    }
}

fn run_fetch(
    args: FetchArgs,
    config_path: Option<PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let overrides = ConfigOverrides {
        branches: args
            .branch
            .as_deref()
            .map(domain::parse_branches)
            .transpose()?,
        levels: args
            .level
            .as_deref()
            .map(domain::parse_levels)
            .transpose()?,
        processes: args.processes,
        genomes_dir: args.genomes_dir,
        output_dir: args.output_dir,
        transfer: args.transfer,
        tag_mode: args.tag_first_only.then_some(TagMode::FirstRecord),
        compress_output: args.compress.then_some(true),
        keep_staging: args.keep_staging.then_some(true),
    };
    let config = ConfigLoader::resolve(config_path.as_deref(), overrides)?;

    let taxa = match &args.taxids {
        Some(path) => Some(taxa::load_taxids(path)?.into_iter().collect::<BTreeSet<_>>()),
        None => None,
    };

    let request = RunRequest {
        taxa,
        stats_only: args.assembly_stats,
        offline: args.offline,
        refresh_manifest: args.refresh_manifest,
        show_progress: matches!(output_mode, OutputMode::Interactive)
            && std::io::stderr().is_terminal(),
        config,
    };
    let transfer = build_transfer(&request.config, request.offline)?;
    let outcome = Pipeline::new(transfer).run(&request)?;

    match output_mode {
        OutputMode::Interactive => HumanOutput::print_outcome(&outcome).into_diagnostic(),
        OutputMode::NonInteractive => JsonOutput::print_outcome(&outcome).into_diagnostic(),
    }
}

fn build_transfer(
    config: &ResolvedConfig,
    offline: bool,
) -> Result<Box<dyn TransferClient>, RefseqError> {
    match config.transfer {
        TransferKind::Rsync => {
            let rsync = RsyncTransfer::new();
            if !offline && !rsync.is_available() {
                return Err(RefseqError::MissingTool("rsync".to_string()));
            }
            Ok(Box::new(rsync))
        }
        TransferKind::Http => Ok(Box::new(HttpTransfer::new(config.http_timeout)?)),
    }
}

fn run_locate(args: LocateArgs, output_mode: OutputMode) -> miette::Result<()> {
    let parsed = manifest::read_manifest(&args.manifest, None)?;
    let ids = taxa::load_taxids(&args.taxids)?;
    let rows = taxa::locate(&parsed.records, &ids);

    match output_mode {
        OutputMode::Interactive => HumanOutput::print_locate(&rows).into_diagnostic(),
        OutputMode::NonInteractive => JsonOutput::print_locate(&rows).into_diagnostic(),
    }
}
